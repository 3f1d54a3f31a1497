//! Region score containers and top-k selection

use crate::region::RegionId;

/// Region scores in backend arrival order.
///
/// Insertion order is preserved so that equally-scored regions keep a
/// deterministic rank when sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    entries: Vec<(RegionId, f64)>,
}

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a score, replacing any earlier score for the same region
    /// without changing its position.
    pub fn insert(&mut self, id: RegionId, score: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = score;
        } else {
            self.entries.push((id, score));
        }
    }

    pub fn get(&self, id: RegionId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, score)| *score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, f64)> + '_ {
        self.entries.iter().copied()
    }
}

impl FromIterator<(RegionId, f64)> for ScoreMap {
    fn from_iter<T: IntoIterator<Item = (RegionId, f64)>>(iter: T) -> Self {
        let mut map = ScoreMap::new();
        for (id, score) in iter {
            map.insert(id, score);
        }
        map
    }
}

/// Selects the regions worth highlighting from a score map.
///
/// Non-finite scores are dropped, the rest are clamped to `[0, 1]`, sorted
/// descending with a stable sort so ties keep arrival order, truncated to
/// `top_k`, and finally filtered against `threshold`. The result can be
/// shorter than `top_k` or empty.
pub fn select_top_k(scores: &ScoreMap, top_k: usize, threshold: f64) -> Vec<(RegionId, f64)> {
    let mut selected: Vec<(RegionId, f64)> = scores
        .iter()
        .filter(|(_, score)| score.is_finite())
        .map(|(id, score)| (id, score.clamp(0.0, 1.0)))
        .collect();
    selected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    selected.truncate(top_k);
    selected.retain(|(_, score)| *score >= threshold);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(u32, f64)]) -> ScoreMap {
        pairs
            .iter()
            .map(|&(id, score)| (RegionId(id), score))
            .collect()
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut map = ScoreMap::new();
        map.insert(RegionId(1), 0.2);
        map.insert(RegionId(2), 0.5);
        map.insert(RegionId(1), 0.9);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(RegionId(1)), Some(0.9));
        let order: Vec<u32> = map.iter().map(|(id, _)| id.0).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn select_empty_input() {
        assert!(select_top_k(&ScoreMap::new(), 10, 0.0).is_empty());
    }

    #[test]
    fn select_respects_top_k_and_threshold() {
        let map = scores(&[(1, 0.9), (2, 0.1), (3, 0.8), (4, 0.7), (5, 0.6)]);
        let selected = select_top_k(&map, 3, 0.65);
        let ids: Vec<u32> = selected.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn select_can_return_fewer_than_k() {
        let map = scores(&[(1, 0.9), (2, 0.1)]);
        let selected = select_top_k(&map, 5, 0.5);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, RegionId(1));
    }

    #[test]
    fn select_drops_nan_and_clamps() {
        let map = scores(&[(1, f64::NAN), (2, 1.7), (3, -0.4), (4, f64::INFINITY)]);
        let selected = select_top_k(&map, 10, 0.0);
        let pairs: Vec<(u32, f64)> = selected.iter().map(|(id, s)| (id.0, *s)).collect();
        assert_eq!(pairs, vec![(2, 1.0), (3, 0.0)]);
    }

    #[test]
    fn select_ties_keep_arrival_order() {
        let map = scores(&[(7, 0.5), (3, 0.5), (9, 0.5)]);
        let selected = select_top_k(&map, 2, 0.0);
        let ids: Vec<u32> = selected.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn threshold_applies_after_truncation() {
        // Regions cut by top_k do not re-enter when higher-ranked ones
        // fail the threshold.
        let map = scores(&[(1, 0.9), (2, 0.3), (3, 0.2)]);
        let selected = select_top_k(&map, 2, 0.25);
        let ids: Vec<u32> = selected.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
