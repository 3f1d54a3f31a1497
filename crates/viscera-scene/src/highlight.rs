//! Applying highlight plans to the spawned organ model
//!
//! Each pass recomputes the full visual state from the current scores: the
//! whole model is dimmed, then selected regions are re-emphasized. Nothing
//! is patched incrementally, so a pass is always safe to re-run.

use bevy::prelude::*;
use bevy::render::alpha::AlphaMode;

use viscera_core::{
    select_top_k, HighlightPlan, MappingTable, PassGate, ScoreInbox, ScoreMap, VisualSink,
};

use crate::adapter::{NodeCatalog, OrganModel, OriginalMaterial};

/// Colors and intensities used when dimming and highlighting parts.
#[derive(Resource, Clone)]
pub struct HighlightSettings {
    pub dim_color: Color,
    pub dim_opacity: f32,
    pub highlight_color: Color,
    pub emissive_gain: f32,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            dim_color: Color::srgb(0.55, 0.58, 0.62),
            dim_opacity: 0.18,
            highlight_color: Color::srgb(0.95, 0.35, 0.15),
            emissive_gain: 2.5,
        }
    }
}

/// Score selection tuning, reset from the organ profile on model switch.
#[derive(Resource, Clone)]
pub struct SelectionParams {
    pub top_k: usize,
    pub threshold: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: 0.05,
        }
    }
}

/// Scores waiting to be applied. Writing replaces any queued scores, so
/// only the newest result is ever applied.
#[derive(Resource, Default)]
pub struct PendingScores(pub ScoreInbox);

impl PendingScores {
    pub fn submit(&mut self, scores: ScoreMap) {
        self.0.submit(scores);
    }
}

/// The scores currently driving the highlight state.
#[derive(Resource, Default)]
pub struct CurrentScores(pub ScoreMap);

/// Load state of the active organ's mapping table. Highlight passes wait
/// for a settled state; an unavailable table degrades to dim-everything.
#[derive(Resource, Default)]
pub enum MappingState {
    #[default]
    Idle,
    Loading,
    Loaded(MappingTable),
    Unavailable,
}

impl MappingState {
    pub fn settled(&self) -> bool {
        matches!(self, MappingState::Loaded(_) | MappingState::Unavailable)
    }

    pub fn table(&self) -> Option<&MappingTable> {
        match self {
            MappingState::Loaded(table) => Some(table),
            _ => None,
        }
    }
}

/// Outcome of the most recent highlight pass, for the diagnostics panel.
#[derive(Resource, Default)]
pub struct ResolutionDiagnostics {
    pub resolved: usize,
    pub unresolved: Vec<String>,
}

pub struct HighlightPlugin;

impl Plugin for HighlightPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HighlightSettings>()
            .init_resource::<SelectionParams>()
            .init_resource::<PendingScores>()
            .init_resource::<CurrentScores>()
            .init_resource::<MappingState>()
            .init_resource::<ResolutionDiagnostics>()
            .add_systems(Update, run_highlight_pass.after(crate::adapter::build_node_catalog));
    }
}

/// Writes plan output into the catalogued parts' private materials.
struct MaterialSink<'a> {
    catalog: &'a NodeCatalog,
    materials: &'a mut Assets<StandardMaterial>,
    settings: &'a HighlightSettings,
}

impl VisualSink<Entity> for MaterialSink<'_> {
    fn dim_all(&mut self) {
        for part in &self.catalog.parts {
            if let Some(material) = self.materials.get_mut(&part.material) {
                apply_dim(material, self.settings);
            }
        }
    }

    fn highlight(&mut self, node: Entity, intensity: f32) {
        let Some(indices) = self.catalog.node_parts.get(&node) else {
            return;
        };
        for &i in indices {
            let part = &self.catalog.parts[i];
            if let Some(material) = self.materials.get_mut(&part.material) {
                apply_highlight(material, &part.original, self.settings, intensity);
            }
        }
    }
}

fn apply_dim(material: &mut StandardMaterial, settings: &HighlightSettings) {
    use bevy::color::Alpha;
    material.base_color = settings.dim_color.with_alpha(settings.dim_opacity);
    material.alpha_mode = AlphaMode::Blend;
    material.emissive = LinearRgba::BLACK;
}

fn apply_highlight(
    material: &mut StandardMaterial,
    original: &OriginalMaterial,
    settings: &HighlightSettings,
    intensity: f32,
) {
    let (base_color, emissive) = highlight_tint(settings, original.base_color, intensity);
    material.base_color = base_color;
    material.alpha_mode = original.alpha_mode;
    material.emissive = emissive;
}

/// Tint toward the highlight color by intensity, with an emissive glow
/// scaled the same way so stronger regions read hotter.
pub fn highlight_tint(
    settings: &HighlightSettings,
    original: Color,
    intensity: f32,
) -> (Color, LinearRgba) {
    use bevy::color::{Alpha, Mix};
    let t = intensity.clamp(0.0, 1.0);
    let base = original.mix(&settings.highlight_color, t).with_alpha(1.0);
    let glow = settings.highlight_color.to_linear() * (settings.emissive_gain * t);
    (base, LinearRgba::new(glow.red, glow.green, glow.blue, 1.0))
}

/// Recompute and apply the highlight state whenever new scores arrive or
/// any input of the pass changes.
fn run_highlight_pass(
    model: Res<OrganModel>,
    catalog: Res<NodeCatalog>,
    mapping: Res<MappingState>,
    params: Res<SelectionParams>,
    settings: Res<HighlightSettings>,
    mut pending: ResMut<PendingScores>,
    mut current: ResMut<CurrentScores>,
    mut diagnostics: ResMut<ResolutionDiagnostics>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Queued scores stay pending until the model and mapping are usable
    let gate = PassGate {
        model_ready: model.ready,
        catalog_generation: catalog.generation,
        model_generation: model.generation,
        mapping_settled: mapping.settled(),
    };
    if !gate.open() {
        return;
    }

    let rerun = mapping.is_changed()
        || params.is_changed()
        || settings.is_changed()
        || catalog.is_changed();
    let arrived = pending.0.take_if(gate);
    if arrived.is_none() && !rerun {
        return;
    }
    if let Some(scores) = arrived {
        current.0 = scores;
    }

    let selected = select_top_k(&current.0, params.top_k, params.threshold);
    let plan = match mapping.table() {
        Some(table) => HighlightPlan::build(&selected, table, &catalog.index),
        None => HighlightPlan::empty(),
    };

    let mut sink = MaterialSink {
        catalog: &*catalog,
        materials: &mut *materials,
        settings: &*settings,
    };
    plan.apply(&mut sink);

    diagnostics.resolved = plan.highlights().len();
    diagnostics.unresolved = plan.unresolved().to_vec();
    if !plan.unresolved().is_empty() {
        tracing::warn!(
            "{} mapping targets matched no scene node: {}",
            plan.unresolved().len(),
            plan.unresolved().join(", ")
        );
    }
}
