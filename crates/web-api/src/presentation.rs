//! Reader-facing view of the stored predictions.

use std::collections::HashMap;

use ipo_advisor_core::{canonical_key, normalize};
use ipo_advisor_data::ScoredPrediction;

/// One row per offering, highest probability first.
///
/// Rows are grouped by their normalized name, ignoring case. Each group
/// keeps its highest-probability row; on equal probability the first row in
/// input order wins. Names are rewritten to their normalized form and
/// `listing_date` is cut to its first line.
#[must_use]
pub fn present(predictions: Vec<ScoredPrediction>) -> Vec<ScoredPrediction> {
    let mut best: Vec<ScoredPrediction> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for prediction in predictions {
        let key = canonical_key(&prediction.offering_name);
        match index_by_key.get(&key) {
            Some(&index) => {
                if prediction.predicted_probability > best[index].predicted_probability {
                    best[index] = prediction;
                }
            }
            None => {
                index_by_key.insert(key, best.len());
                best.push(prediction);
            }
        }
    }

    for prediction in &mut best {
        prediction.offering_name = normalize(&prediction.offering_name);
        if let Some(first_line) = prediction.listing_date.lines().next() {
            prediction.listing_date = first_line.trim().to_string();
        }
    }

    best.sort_by(|a, b| b.predicted_probability.total_cmp(&a.predicted_probability));
    best
}
