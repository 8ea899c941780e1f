use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub document_id: i64,
    pub chunk_index: u32,
    /// `1 - distance`; 1.0 means identical, can go below zero.
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

impl SearchResult {
    pub fn score_from_distance(distance: f32) -> f32 {
        1.0 - distance
    }
}
