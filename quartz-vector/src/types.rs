//! Vector type and ID definitions

use serde::{Deserialize, Serialize};

/// Unique identifier for a node, stable within one index instance.
pub type VectorId = u64;

/// One (id, distance) pair returned by a search, ordered ascending by
/// distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchResult {
    /// The id of the matching node.
    pub id: VectorId,
    /// Distance to the query (smaller is closer).
    pub distance: f32,
}

impl SearchResult {
    pub fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && (self.distance - other.distance).abs() < f32::EPSILON
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_ascending_by_distance() {
        let mut results = vec![
            SearchResult::new(1, 0.5),
            SearchResult::new(2, 0.1),
            SearchResult::new(3, 0.9),
        ];

        results.sort();

        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 1);
        assert_eq!(results[2].id, 3);
    }

    #[test]
    fn ties_break_on_smaller_id() {
        let mut results = vec![SearchResult::new(5, 1.0), SearchResult::new(2, 1.0)];
        results.sort();
        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 5);
    }
}
