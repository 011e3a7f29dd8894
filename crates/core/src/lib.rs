pub mod config;
pub mod config_loader;
pub mod decision;
pub mod normalize;

pub use config::{AppConfig, DatabaseConfig, ModelConfig, PublisherConfig, ServerConfig};
pub use config_loader::ConfigLoader;
pub use decision::{decide, evaluate, Decision, DecisionTier};
pub use normalize::{canonical_key, normalize, ExchangeTag, StatusTag};
