//! Viscera Core - region scoring, name matching, and highlight planning
//!
//! This crate provides the renderer-independent logic of the Viscera
//! viewer:
//! - Region ids, organ profiles, and label lookup tables
//! - Score maps and top-k selection
//! - Tiered name matching between mapping targets and scene node names
//! - Mapping tables from region ids to scene node targets
//! - Highlight planning with a pluggable visual sink
//! - Backend registry and inference response types

pub mod highlight;
pub mod inference;
pub mod mapping;
pub mod matcher;
pub mod region;
pub mod score;

pub use highlight::{
    best_region_for_node, reverse_index, HighlightPlan, PassGate, ScoreInbox, VisualSink,
};
pub use inference::{InferenceResult, OrganModels, Registry, TopRegion, XaiPayload};
pub use mapping::{MappingError, MappingTable, Side, TargetSpec};
pub use matcher::{filename_variants, normalize, NodeIndex};
pub use region::{
    aha_segment_name, load_lut, parse_lut, LutError, Organ, OrganProfile, RegionId,
};
pub use score::{select_top_k, ScoreMap};
