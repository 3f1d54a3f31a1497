//! Name resolution between mapping-table targets and scene node names
//!
//! Artists export meshes with names like `Hippocampus_L.001` or
//! `Left Ventricle (smoothed)` while mapping tables carry clean anatomical
//! names. Resolution runs in tiers: exact match first, then filename-style
//! variants, then a normalized fuzzy pass.

use std::collections::HashMap;

/// Index of scene node names to opaque handles, preserving the order nodes
/// were discovered in.
#[derive(Debug, Clone)]
pub struct NodeIndex<N> {
    entries: Vec<(String, N)>,
    by_name: HashMap<String, usize>,
}

impl<N> Default for NodeIndex<N> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<N: Copy> NodeIndex<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under its exact exported name. The first node seen
    /// under a given name wins; duplicates are ignored.
    pub fn insert(&mut self, name: &str, node: N) {
        if self.by_name.contains_key(name) {
            return;
        }
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), node));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get_exact(&self, name: &str) -> Option<N> {
        self.by_name.get(name).map(|&i| self.entries[i].1)
    }

    /// Resolves a target name to a node handle.
    pub fn resolve(&self, target: &str) -> Option<N> {
        self.resolve_entry(target).map(|(_, node)| node)
    }

    /// Resolves a target name, also returning the exported node name that
    /// matched so diagnostics can show what was actually hit.
    pub fn resolve_entry(&self, target: &str) -> Option<(&str, N)> {
        self.resolve_entry_literal(target)
            .or_else(|| self.resolve_entry_normalized(target))
    }

    /// The exact-match tiers only: the target verbatim, or a node name
    /// whose filename-style decorations strip down to the target.
    pub fn resolve_entry_literal(&self, target: &str) -> Option<(&str, N)> {
        if let Some(&i) = self.by_name.get(target) {
            let (name, node) = &self.entries[i];
            return Some((name.as_str(), *node));
        }

        for (name, node) in &self.entries {
            for variant in filename_variants(name) {
                if variant == target {
                    return Some((name.as_str(), *node));
                }
            }
        }
        None
    }

    /// The fuzzy tier only: normalized comparison, allowing containment
    /// either way.
    pub fn resolve_entry_normalized(&self, target: &str) -> Option<(&str, N)> {
        let wanted = normalize(target);
        if wanted.is_empty() {
            return None;
        }
        for (name, node) in &self.entries {
            let have = normalize(name);
            if have.is_empty() {
                continue;
            }
            if have == wanted || have.contains(&wanted) || wanted.contains(&have) {
                return Some((name.as_str(), *node));
            }
        }
        None
    }
}

/// Produces undecorated variants of an exported node name: the name with a
/// short numeric-ish dot suffix removed (`Aorta.001` -> `Aorta`... suffixes
/// up to 3 chars), with a trailing parenthetical removed
/// (`Aorta (smoothed)` -> `Aorta`), and with both removed.
pub fn filename_variants(name: &str) -> Vec<String> {
    let mut variants = Vec::new();

    let deparen = strip_parenthetical(name);
    if let Some(ref base) = deparen {
        variants.push(base.clone());
    }

    if let Some(base) = strip_dot_suffix(name) {
        variants.push(base.to_string());
        if let Some(both) = strip_parenthetical(base) {
            variants.push(both);
        }
    }

    if let Some(ref base) = deparen {
        if let Some(both) = strip_dot_suffix(base) {
            let both = both.to_string();
            if !variants.contains(&both) {
                variants.push(both);
            }
        }
    }

    variants
}

fn strip_dot_suffix(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    let suffix = &name[dot + 1..];
    if suffix.is_empty() || suffix.len() > 3 {
        return None;
    }
    let base = name[..dot].trim_end();
    if base.is_empty() {
        return None;
    }
    Some(base)
}

fn strip_parenthetical(name: &str) -> Option<String> {
    let trimmed = name.trim_end();
    if !trimmed.ends_with(')') {
        return None;
    }
    let open = trimmed.rfind('(')?;
    let base = trimmed[..open].trim_end();
    if base.is_empty() {
        return None;
    }
    Some(base.to_string())
}

/// Lowercases and collapses every run of non-alphanumeric characters to a
/// single space, so `Left-Ventricle_wall` and `left ventricle wall` compare
/// equal.
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(names: &[&str]) -> NodeIndex<usize> {
        let mut index = NodeIndex::new();
        for (i, name) in names.iter().enumerate() {
            index.insert(name, i);
        }
        index
    }

    #[test]
    fn duplicate_names_keep_first_node() {
        let mut index = NodeIndex::new();
        index.insert("Aorta", 0);
        index.insert("Aorta", 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_exact("Aorta"), Some(0));
    }

    #[test]
    fn exact_match_wins_over_variants() {
        let index = index(&["Aorta", "Aorta.001"]);
        assert_eq!(index.resolve("Aorta.001"), Some(1));
        assert_eq!(index.resolve("Aorta"), Some(0));
    }

    #[test]
    fn dot_suffix_stripped() {
        let index = index(&["Hippocampus_L.001"]);
        assert_eq!(index.resolve("Hippocampus_L.001"), Some(0));
        assert_eq!(index.resolve("Hippocampus_L"), Some(0));
    }

    #[test]
    fn long_dot_suffix_kept() {
        // `.nii.gz`-style names should not lose meaningful extensions-like
        // segments longer than three characters.
        let index = index(&["scan.final"]);
        assert_eq!(index.get_exact("scan"), None);
        let variants = filename_variants("scan.final");
        assert!(!variants.contains(&"scan".to_string()));
    }

    #[test]
    fn parenthetical_stripped() {
        let index = index(&["Left Ventricle (smoothed)"]);
        assert_eq!(index.resolve("Left Ventricle"), Some(0));
    }

    #[test]
    fn composed_decorations_stripped() {
        let index = index(&["Left Ventricle (smoothed).001"]);
        assert_eq!(index.resolve("Left Ventricle"), Some(0));
    }

    #[test]
    fn normalized_equality() {
        let index = index(&["left_ventricle-WALL"]);
        assert_eq!(index.resolve("Left Ventricle Wall"), Some(0));
    }

    #[test]
    fn normalized_containment_both_directions() {
        let node_contains_target = index(&["Anterior Cingulate Gyrus Left"]);
        assert_eq!(node_contains_target.resolve("cingulate gyrus"), Some(0));

        let target_contains_node = index(&["Cingulate"]);
        assert_eq!(target_contains_node.resolve("Anterior Cingulate Gyrus"), Some(0));
    }

    #[test]
    fn fuzzy_tie_keeps_first_indexed() {
        let index = index(&["Ventricle L", "Ventricle R"]);
        assert_eq!(index.resolve("ventricle"), Some(0));
    }

    #[test]
    fn miss_returns_none() {
        let index = index(&["Aorta", "Mitral Valve"]);
        assert_eq!(index.resolve("Tricuspid Valve"), None);
        assert_eq!(index.resolve("   "), None);
    }

    #[test]
    fn literal_tier_never_matches_fuzzily() {
        let index = index(&["Hippocampus_R"]);
        assert!(index.resolve_entry_literal("Hippocampus").is_none());
        assert_eq!(
            index.resolve_entry_normalized("Hippocampus").map(|(_, n)| n),
            Some(0)
        );
    }

    #[test]
    fn resolve_entry_reports_matched_name() {
        let index = index(&["Hippocampus_L.001"]);
        let (name, node) = index.resolve_entry("Hippocampus_L").unwrap();
        assert_eq!(name, "Hippocampus_L.001");
        assert_eq!(node, 0);
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize("  Left--Ventricle__wall "), "left ventricle wall");
        assert_eq!(normalize("(...)"), "");
    }
}
