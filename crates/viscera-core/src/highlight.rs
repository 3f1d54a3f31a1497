//! Highlight planning: turning selected region scores into node visuals
//!
//! Planning is split from application so the whole pipeline stays testable
//! without a renderer. A [`HighlightPlan`] is computed from the selected
//! scores, the mapping table, and the node index, then applied through a
//! [`VisualSink`] which owns the actual material writes.

use std::collections::HashMap;

use crate::mapping::{MappingTable, Side};
use crate::matcher::NodeIndex;
use crate::region::RegionId;
use crate::score::ScoreMap;

/// Receiver for visual state changes. Every pass dims the whole model
/// before re-applying highlights, so stale emphasis can never survive.
pub trait VisualSink<N> {
    fn dim_all(&mut self);
    fn highlight(&mut self, node: N, intensity: f32);
}

/// A fully resolved set of node highlights plus the targets that failed to
/// resolve, computed in one pass over the current selection.
#[derive(Debug, Clone, Default)]
pub struct HighlightPlan<N> {
    highlights: Vec<(N, f32)>,
    unresolved: Vec<String>,
}

impl<N: Copy + PartialEq> HighlightPlan<N> {
    /// A plan with nothing highlighted. Applying it still dims the model.
    pub fn empty() -> Self {
        Self {
            highlights: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Builds a plan from selected `(region, score)` pairs.
    ///
    /// When several regions map onto the same target or node, the highest
    /// score wins. Targets that resolve to no node are collected for a
    /// single batched diagnostic instead of failing the pass.
    pub fn build(
        selected: &[(RegionId, f64)],
        table: &MappingTable,
        index: &NodeIndex<N>,
    ) -> Self {
        // Fan-in at the target level first, so two regions sharing a target
        // produce one intensity before any name resolution happens. Keyed
        // by target and side together: the left and right variants of a
        // paired structure are distinct targets.
        let mut target_scores: Vec<(String, Vec<String>, f64)> = Vec::new();
        let mut by_target: HashMap<(String, Option<Side>), usize> = HashMap::new();
        for &(region, score) in selected {
            let Some(specs) = table.get(region) else {
                continue;
            };
            for spec in specs {
                let key = (spec.target().to_string(), spec.side());
                match by_target.get(&key) {
                    Some(&i) => {
                        let entry = &mut target_scores[i];
                        if score > entry.2 {
                            entry.2 = score;
                        }
                    }
                    None => {
                        by_target.insert(key, target_scores.len());
                        target_scores.push((
                            spec.display_name(),
                            spec.candidates(),
                            score,
                        ));
                    }
                }
            }
        }

        let mut highlights: Vec<(N, f32)> = Vec::new();
        let mut unresolved = Vec::new();
        for (target, candidates, score) in target_scores {
            let resolved = resolve_candidates(&candidates, index).map(|(_, node)| node);
            match resolved {
                Some(node) => {
                    let intensity = score.clamp(0.0, 1.0) as f32;
                    // Node-level fan-in: distinct targets can still land on
                    // the same node through fuzzy matching.
                    match highlights.iter_mut().find(|(existing, _)| *existing == node) {
                        Some(entry) => {
                            if intensity > entry.1 {
                                entry.1 = intensity;
                            }
                        }
                        None => highlights.push((node, intensity)),
                    }
                }
                None => unresolved.push(target),
            }
        }

        Self {
            highlights,
            unresolved,
        }
    }

    /// Applies the plan: dim everything, then write each highlight.
    pub fn apply<S: VisualSink<N>>(&self, sink: &mut S) {
        sink.dim_all();
        for &(node, intensity) in &self.highlights {
            sink.highlight(node, intensity);
        }
    }

    pub fn highlights(&self) -> &[(N, f32)] {
        &self.highlights
    }

    /// Mapping targets that resolved to no scene node.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}

/// Resolves a target's candidate names against the index. Every candidate
/// gets a literal pass before any is allowed to match fuzzily, so a sided
/// spelling always beats a fuzzy hit on the bare base name.
fn resolve_candidates<'a, N: Copy>(
    candidates: &[String],
    index: &'a NodeIndex<N>,
) -> Option<(&'a str, N)> {
    candidates
        .iter()
        .find_map(|candidate| index.resolve_entry_literal(candidate.as_str()))
        .or_else(|| {
            candidates
                .iter()
                .find_map(|candidate| index.resolve_entry_normalized(candidate.as_str()))
        })
}

/// Inverse of the mapping table as seen through one node index: for every
/// node name that some region's targets resolve to, the regions that reach
/// it. Used for click-to-inspect.
pub fn reverse_index<N: Copy>(
    table: &MappingTable,
    index: &NodeIndex<N>,
) -> HashMap<String, Vec<RegionId>> {
    let mut reverse: HashMap<String, Vec<RegionId>> = HashMap::new();
    for (region, specs) in table.iter() {
        for spec in specs {
            let resolved =
                resolve_candidates(&spec.candidates(), index).map(|(name, _)| name.to_string());
            if let Some(name) = resolved {
                let regions = reverse.entry(name).or_default();
                if !regions.contains(&region) {
                    regions.push(region);
                }
            }
        }
    }
    reverse
}

/// Picks the best-scoring region that maps to the given node name. Regions
/// absent from the score map count as zero. Returns `None` when the node is
/// reached by no region at all.
pub fn best_region_for_node(
    reverse: &HashMap<String, Vec<RegionId>>,
    node_name: &str,
    scores: &ScoreMap,
) -> Option<(RegionId, f64)> {
    let regions = reverse.get(node_name)?;
    let mut best: Option<(RegionId, f64)> = None;
    for &region in regions {
        let score = scores.get(region).unwrap_or(0.0);
        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((region, score)),
        }
    }
    best
}

/// Scores waiting for the scene to become applicable. Submitting replaces
/// whatever is queued, so only the newest result is ever applied.
#[derive(Debug, Clone, Default)]
pub struct ScoreInbox {
    queued: Option<ScoreMap>,
}

impl ScoreInbox {
    pub fn submit(&mut self, scores: ScoreMap) {
        self.queued = Some(scores);
    }

    pub fn is_queued(&self) -> bool {
        self.queued.is_some()
    }

    pub fn clear(&mut self) {
        self.queued = None;
    }

    /// Takes the queued scores only when the gate is open; a closed gate
    /// leaves them queued for a later pass.
    pub fn take_if(&mut self, gate: PassGate) -> Option<ScoreMap> {
        if gate.open() {
            self.queued.take()
        } else {
            None
        }
    }
}

/// Conditions a highlight pass needs before it may touch the scene.
#[derive(Debug, Clone, Copy)]
pub struct PassGate {
    pub model_ready: bool,
    pub catalog_generation: u64,
    pub model_generation: u64,
    pub mapping_settled: bool,
}

impl PassGate {
    /// Open only against a ready model whose catalog is current and whose
    /// mapping load has settled one way or the other.
    pub fn open(&self) -> bool {
        self.model_ready
            && self.catalog_generation == self.model_generation
            && self.mapping_settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::TargetSpec;

    /// Records both the operation sequence and the resulting per-node
    /// state, so tests can assert ordering and idempotence separately.
    #[derive(Default)]
    struct RecordingSink {
        ops: Vec<Op>,
        state: HashMap<u32, State>,
        known: Vec<u32>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        DimAll,
        Highlight(u32, f32),
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum State {
        Dimmed,
        Highlighted(f32),
    }

    impl RecordingSink {
        fn with_nodes(nodes: &[u32]) -> Self {
            Self {
                known: nodes.to_vec(),
                ..Default::default()
            }
        }
    }

    impl VisualSink<u32> for RecordingSink {
        fn dim_all(&mut self) {
            self.ops.push(Op::DimAll);
            for &node in &self.known {
                self.state.insert(node, State::Dimmed);
            }
        }

        fn highlight(&mut self, node: u32, intensity: f32) {
            self.ops.push(Op::Highlight(node, intensity));
            self.state.insert(node, State::Highlighted(intensity));
        }
    }

    fn table(text: &str) -> MappingTable {
        MappingTable::from_json(text).unwrap()
    }

    fn index(names: &[&str]) -> NodeIndex<u32> {
        let mut index = NodeIndex::new();
        for (i, name) in names.iter().enumerate() {
            index.insert(name, i as u32);
        }
        index
    }

    #[test]
    fn two_region_scenario() {
        let table = table(r#"{"1": "NodeA", "2": "NodeB", "3": "NodeC"}"#);
        let index = index(&["NodeA", "NodeB", "NodeC"]);
        let selected = vec![(RegionId(1), 0.8), (RegionId(2), 0.3)];

        let plan = HighlightPlan::build(&selected, &table, &index);
        let mut sink = RecordingSink::with_nodes(&[0, 1, 2]);
        plan.apply(&mut sink);

        assert_eq!(sink.state.get(&0), Some(&State::Highlighted(0.8)));
        assert_eq!(sink.state.get(&1), Some(&State::Highlighted(0.3)));
        assert_eq!(sink.state.get(&2), Some(&State::Dimmed));
        assert!(plan.unresolved().is_empty());
    }

    #[test]
    fn dim_all_precedes_every_highlight() {
        let table = table(r#"{"1": "NodeA"}"#);
        let index = index(&["NodeA"]);
        let plan = HighlightPlan::build(&[(RegionId(1), 0.5)], &table, &index);
        let mut sink = RecordingSink::with_nodes(&[0]);
        plan.apply(&mut sink);

        assert_eq!(sink.ops[0], Op::DimAll);
        assert!(sink.ops[1..]
            .iter()
            .all(|op| matches!(op, Op::Highlight(_, _))));
    }

    #[test]
    fn reapplying_same_plan_is_idempotent() {
        let table = table(r#"{"1": "NodeA", "2": "NodeB"}"#);
        let index = index(&["NodeA", "NodeB"]);
        let plan = HighlightPlan::build(&[(RegionId(1), 0.7)], &table, &index);

        let mut sink = RecordingSink::with_nodes(&[0, 1]);
        plan.apply(&mut sink);
        let first = sink.state.clone();
        plan.apply(&mut sink);
        assert_eq!(sink.state, first);
    }

    #[test]
    fn shared_target_takes_max_score() {
        let table = table(r#"{"1": "Septum", "2": "Septum"}"#);
        let index = index(&["Septum"]);
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.4), (RegionId(2), 0.9)], &table, &index);
        assert_eq!(plan.highlights(), &[(0, 0.9)]);
    }

    #[test]
    fn shared_node_takes_max_score() {
        // Distinct targets both fuzzy-resolve onto the same node.
        let table = table(r#"{"1": "Ventricle Wall", "2": "ventricle-wall"}"#);
        let index = index(&["Ventricle Wall.001"]);
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.2), (RegionId(2), 0.6)], &table, &index);
        assert_eq!(plan.highlights(), &[(0, 0.6)]);
    }

    #[test]
    fn unresolved_targets_collected_not_fatal() {
        let table = table(r#"{"1": "NodeA", "2": "Ghost Region"}"#);
        let index = index(&["NodeA"]);
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.8), (RegionId(2), 0.5)], &table, &index);
        assert_eq!(plan.highlights(), &[(0, 0.8)]);
        assert_eq!(plan.unresolved(), &["Ghost Region".to_string()]);
    }

    #[test]
    fn regions_missing_from_table_are_skipped() {
        let table = table(r#"{"1": "NodeA"}"#);
        let index = index(&["NodeA"]);
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.8), (RegionId(99), 0.9)], &table, &index);
        assert_eq!(plan.highlights(), &[(0, 0.8)]);
        assert!(plan.unresolved().is_empty());
    }

    #[test]
    fn empty_plan_still_dims() {
        let plan: HighlightPlan<u32> = HighlightPlan::empty();
        let mut sink = RecordingSink::with_nodes(&[0, 1]);
        plan.apply(&mut sink);
        assert_eq!(sink.ops, vec![Op::DimAll]);
        assert_eq!(sink.state.get(&0), Some(&State::Dimmed));
    }

    #[test]
    fn sided_targets_resolve_through_candidates() {
        let mut index = NodeIndex::new();
        index.insert("Hippocampus_L", 0u32);
        let table =
            MappingTable::from_json(r#"{"1": {"target": "Hippocampus", "side": "left"}}"#)
                .unwrap();
        let plan = HighlightPlan::build(&[(RegionId(1), 1.0)], &table, &index);
        assert_eq!(plan.highlights(), &[(0, 1.0)]);
        let spec = TargetSpec::qualified("Hippocampus", Side::Left);
        assert!(spec.candidates().contains(&"Hippocampus_L".to_string()));
    }

    #[test]
    fn sided_variants_of_same_target_stay_distinct() {
        // Left and right hippocampus share a base target name but must
        // fan in separately and light up their own nodes.
        let table = table(
            r#"{
                "1": {"target": "Hippocampus", "side": "left"},
                "2": {"target": "Hippocampus", "side": "right"}
            }"#,
        );
        let index = index(&["Hippocampus_L", "Hippocampus_R"]);
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.4), (RegionId(2), 0.9)], &table, &index);

        let mut highlights = plan.highlights().to_vec();
        highlights.sort_by_key(|&(node, _)| node);
        assert_eq!(highlights, vec![(0, 0.4), (1, 0.9)]);
        assert!(plan.unresolved().is_empty());
    }

    #[test]
    fn sided_candidate_beats_fuzzy_base_match() {
        // The bare base name would fuzzy-hit whichever side was indexed
        // first; the sided spelling must win regardless of index order.
        let table = table(r#"{"1": {"target": "Hippocampus", "side": "left"}}"#);
        let index = index(&["Hippocampus_R", "Hippocampus_L"]);
        let plan = HighlightPlan::build(&[(RegionId(1), 1.0)], &table, &index);
        assert_eq!(plan.highlights(), &[(1, 1.0)]);
    }

    #[test]
    fn unresolved_sided_targets_report_their_side() {
        let table = table(
            r#"{
                "1": {"target": "Amygdala", "side": "left"},
                "2": {"target": "Amygdala", "side": "right"}
            }"#,
        );
        let index: NodeIndex<u32> = NodeIndex::new();
        let plan =
            HighlightPlan::build(&[(RegionId(1), 0.5), (RegionId(2), 0.5)], &table, &index);
        let mut unresolved = plan.unresolved().to_vec();
        unresolved.sort();
        assert_eq!(
            unresolved,
            vec!["Left Amygdala".to_string(), "Right Amygdala".to_string()]
        );
    }

    #[test]
    fn reverse_index_keeps_sides_apart() {
        let table = table(
            r#"{
                "1": {"target": "Hippocampus", "side": "left"},
                "2": {"target": "Hippocampus", "side": "right"}
            }"#,
        );
        let index = index(&["Hippocampus_R", "Hippocampus_L"]);
        let reverse = reverse_index(&table, &index);
        assert_eq!(reverse.get("Hippocampus_L"), Some(&vec![RegionId(1)]));
        assert_eq!(reverse.get("Hippocampus_R"), Some(&vec![RegionId(2)]));
    }

    #[test]
    fn inbox_keeps_only_the_newest_submission() {
        let open = PassGate {
            model_ready: true,
            catalog_generation: 3,
            model_generation: 3,
            mapping_settled: true,
        };
        let mut inbox = ScoreInbox::default();
        inbox.submit(vec![(RegionId(1), 0.2)].into_iter().collect());
        inbox.submit(vec![(RegionId(2), 0.8)].into_iter().collect());

        let taken = inbox.take_if(open).unwrap();
        assert_eq!(taken.get(RegionId(2)), Some(0.8));
        assert_eq!(taken.get(RegionId(1)), None);
        // Flushed exactly once.
        assert!(inbox.take_if(open).is_none());
    }

    #[test]
    fn closed_gate_leaves_scores_queued() {
        let mut gate = PassGate {
            model_ready: false,
            catalog_generation: 1,
            model_generation: 1,
            mapping_settled: true,
        };
        let mut inbox = ScoreInbox::default();
        inbox.submit(vec![(RegionId(1), 0.5)].into_iter().collect());

        assert!(inbox.take_if(gate).is_none());
        assert!(inbox.is_queued());

        gate.model_ready = true;
        assert!(inbox.take_if(gate).is_some());
    }

    #[test]
    fn stale_catalog_closes_the_gate() {
        let gate = PassGate {
            model_ready: true,
            catalog_generation: 1,
            model_generation: 2,
            mapping_settled: true,
        };
        assert!(!gate.open());

        let unsettled = PassGate {
            mapping_settled: false,
            catalog_generation: 2,
            ..gate
        };
        assert!(!unsettled.open());
    }

    #[test]
    fn reverse_index_and_best_region() {
        let table = table(r#"{"1": "NodeA", "2": "NodeA", "3": "NodeB"}"#);
        let index = index(&["NodeA", "NodeB"]);
        let reverse = reverse_index(&table, &index);

        let scores: ScoreMap = vec![(RegionId(1), 0.2), (RegionId(2), 0.9)]
            .into_iter()
            .collect();
        assert_eq!(
            best_region_for_node(&reverse, "NodeA", &scores),
            Some((RegionId(2), 0.9))
        );
        // Region 3 has no score and counts as zero.
        assert_eq!(
            best_region_for_node(&reverse, "NodeB", &scores),
            Some((RegionId(3), 0.0))
        );
        assert_eq!(best_region_for_node(&reverse, "NodeC", &scores), None);
    }
}
