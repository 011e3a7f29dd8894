pub mod handlers;
pub mod presentation;
pub mod server;

pub use handlers::{AppState, StatusResponse, TodayResponse, UploadResponse};
pub use presentation::present;
pub use server::ApiServer;
