//! UI overlays using bevy_egui

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use viscera_core::{aha_segment_name, InferenceResult, Organ, RegionId};
use viscera_scene::{
    InspectState, LoadOrganModel, MappingState, NodeCatalog, OrganModel, ResolutionDiagnostics,
    SelectionParams,
};

use crate::app::{AnalysisState, Selection};
use crate::file_picker::{trigger_scan_open, PendingScanFile, UploadedScan};
use crate::network::{ModelRegistry, RegionLabels, RunInference};

/// Grouped system parameters for the main UI system to work around Bevy's
/// 16-param limit
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub registry: Res<'w, ModelRegistry>,
    pub selection: ResMut<'w, Selection>,
    pub model: Res<'w, OrganModel>,
    pub mapping: Res<'w, MappingState>,
    pub selection_params: ResMut<'w, SelectionParams>,
    pub analysis: Res<'w, AnalysisState>,
    pub uploaded: Res<'w, UploadedScan>,
    pub pending_scan: Res<'w, PendingScanFile>,
    pub diagnostics: Res<'w, ResolutionDiagnostics>,
    pub labels: Res<'w, RegionLabels>,
    pub inspect: Res<'w, InspectState>,
    pub catalog: Res<'w, NodeCatalog>,
    pub load_requests: MessageWriter<'w, LoadOrganModel>,
    pub run_requests: MessageWriter<'w, RunInference>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        // Main UI runs in EguiPrimaryContextPass for proper input handling
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn ui_system(params: UiParams) {
    let UiParams {
        mut contexts,
        registry,
        mut selection,
        model,
        mapping,
        mut selection_params,
        analysis,
        uploaded,
        pending_scan,
        diagnostics,
        labels,
        inspect,
        catalog,
        mut load_requests,
        mut run_requests,
    } = params;

    let Ok(ctx) = contexts.ctx_mut() else { return };

    egui::SidePanel::left("controls")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Analysis");
            ui.separator();

            if !registry.loaded {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Contacting backend...");
                });
                return;
            }
            if registry.from_fallback {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "Backend unreachable, using built-in model list",
                );
            }

            // Organ selection drives the loaded model
            let organ_label = selection
                .organ
                .map(|o| o.display_name().to_string())
                .unwrap_or_else(|| "Select organ".to_string());
            egui::ComboBox::from_label("Organ")
                .selected_text(organ_label)
                .show_ui(ui, |ui| {
                    for models in &registry.registry.organs {
                        let Some(organ) = Organ::from_str_loose(&models.organ) else {
                            continue;
                        };
                        let is_current = selection.organ == Some(organ);
                        if ui
                            .selectable_label(is_current, organ.display_name())
                            .clicked()
                            && !is_current
                        {
                            selection.organ = Some(organ);
                            selection.disease = models.diseases.first().cloned();
                            load_requests.write(LoadOrganModel { organ });
                        }
                    }
                });

            if let Some(organ) = selection.organ {
                let disease_label = selection
                    .disease
                    .clone()
                    .unwrap_or_else(|| "Select disease".to_string());
                egui::ComboBox::from_label("Disease")
                    .selected_text(disease_label)
                    .show_ui(ui, |ui| {
                        for disease in registry.registry.diseases_for(organ) {
                            let is_current = selection.disease.as_deref() == Some(disease);
                            if ui.selectable_label(is_current, disease).clicked() {
                                selection.disease = Some(disease.clone());
                            }
                        }
                    });
            }

            ui.separator();

            if ui.button("Upload segmentation...").clicked() {
                trigger_scan_open(&pending_scan);
            }
            match uploaded.0.as_ref() {
                Some(scan) => {
                    ui.label(format!("File: {}", scan.filename));
                }
                None => {
                    ui.weak("No segmentation staged");
                }
            }

            let can_analyze = selection.organ.is_some()
                && selection.disease.is_some()
                && uploaded.0.is_some()
                && !analysis.in_flight;
            if ui
                .add_enabled(can_analyze, egui::Button::new("Analyze"))
                .clicked()
            {
                run_requests.write(RunInference);
            }
            if analysis.in_flight {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Running inference...");
                });
            }
            if let Some(ref error) = analysis.error {
                ui.colored_label(egui::Color32::LIGHT_RED, error);
            }

            ui.separator();
            ui.label("Highlighting");

            let mut top_k = selection_params.top_k as u32;
            if ui
                .add(egui::Slider::new(&mut top_k, 1..=25).text("Regions"))
                .changed()
            {
                selection_params.top_k = top_k as usize;
            }
            let mut threshold = selection_params.threshold;
            if ui
                .add(egui::Slider::new(&mut threshold, 0.0..=1.0).text("Min score"))
                .changed()
            {
                selection_params.threshold = threshold;
            }

            ui.separator();
            status_line(ui, &model, &mapping);
        });

    egui::SidePanel::right("results")
        .default_width(300.0)
        .show(ctx, |ui| {
            ui.heading("Results");
            ui.separator();

            match analysis.result.as_ref() {
                Some(result) => show_result(ui, selection.organ, result, &labels),
                None => {
                    ui.weak("Run an analysis to see results");
                }
            }

            ui.separator();
            ui.label("Inspect");
            match inspect.hit.as_ref() {
                Some(hit) => {
                    match hit.node_name.as_deref() {
                        Some(name) => ui.label(format!("Node: {}", name)),
                        None => ui.weak("Clicked an unnamed part"),
                    };
                    match hit.region {
                        Some((region, score)) => {
                            let name = region_display_name(
                                selection.organ,
                                region,
                                analysis.result.as_ref(),
                                &labels,
                            );
                            ui.label(format!("Region: {} ({:.3})", name, score));
                        }
                        None => {
                            ui.weak("No region maps to this part");
                        }
                    }
                }
                None => {
                    ui.weak("Click the model to inspect a part");
                }
            }

            egui::CollapsingHeader::new("Diagnostics").show(ui, |ui| {
                ui.label(format!("Highlighted nodes: {}", diagnostics.resolved));
                if !diagnostics.unresolved.is_empty() {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!("{} unresolved targets:", diagnostics.unresolved.len()),
                    );
                    for target in &diagnostics.unresolved {
                        ui.weak(target);
                    }
                }
                if ui.button("Log scene node names").clicked() {
                    tracing::info!("Scene nodes: {}", catalog.list_node_names().join(", "));
                }
            });

            if let Some(ref raw) = analysis.raw {
                egui::CollapsingHeader::new("Raw response").show(ui, |ui| {
                    egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
                        ui.monospace(raw);
                    });
                });
            }
        });
}

fn status_line(ui: &mut egui::Ui, model: &OrganModel, mapping: &MappingState) {
    if model.loading.is_some() {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading model...");
        });
        return;
    }
    match mapping {
        MappingState::Loading => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading mapping table...");
            });
        }
        MappingState::Unavailable => {
            ui.colored_label(egui::Color32::YELLOW, "Mapping unavailable, highlights off");
        }
        MappingState::Loaded(_) if model.ready => {
            ui.weak("Ready");
        }
        _ => {}
    }
}

fn show_result(
    ui: &mut egui::Ui,
    organ: Option<Organ>,
    result: &InferenceResult,
    labels: &RegionLabels,
) {
    if let Some(ref prediction) = result.prediction {
        ui.label(
            egui::RichText::new(format!("Prediction: {}", prediction))
                .strong()
                .size(16.0),
        );
    }
    let probabilities = result.class_probabilities();
    if !probabilities.is_empty() {
        ui.add_space(4.0);
        ui.label("Class probabilities");
        for (class, probability) in probabilities {
            ui.add(
                egui::ProgressBar::new(probability.clamp(0.0, 1.0) as f32)
                    .text(format!("{} {:.1}%", class, probability * 100.0)),
            );
        }
    } else if let Some(probability) = result.predicted_probability() {
        ui.label(format!("Confidence: {:.1}%", probability * 100.0));
    }
    if let Some(icv) = result.icv_mm3 {
        ui.label(format!("Intracranial volume: {:.0} mm³", icv));
    }

    let Some(organ) = organ else { return };
    let scores: Vec<(RegionId, f64)> = result.score_map(organ).iter().collect();
    if scores.is_empty() {
        return;
    }

    ui.add_space(6.0);
    ui.label("Top regions");
    let mut ranked = scores;
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (region, score) in ranked.into_iter().take(10) {
        let name = region_display_name(Some(organ), region, Some(result), labels);
        ui.add(
            egui::ProgressBar::new(score.clamp(0.0, 1.0) as f32)
                .text(format!("{} {:.3}", name, score)),
        );
    }
}

/// Human-readable name of a region: AHA segment names for the heart,
/// backend-reported label names for the brain with the shipped lookup
/// table as fallback.
fn region_display_name(
    organ: Option<Organ>,
    region: RegionId,
    result: Option<&InferenceResult>,
    labels: &RegionLabels,
) -> String {
    match organ {
        Some(Organ::Heart) => aha_segment_name(region)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Segment {}", region)),
        Some(Organ::Brain) => result
            .and_then(|r| brain_label_name(r, region))
            .or_else(|| labels.name_for(Organ::Brain, region).map(str::to_string))
            .unwrap_or_else(|| format!("Label {}", region)),
        None => format!("Region {}", region),
    }
}

fn brain_label_name(result: &InferenceResult, region: RegionId) -> Option<String> {
    let from_xai = result.xai.as_ref().and_then(|xai| {
        xai.top_regions
            .iter()
            .find(|r| r.label_id == Some(region.0 as i64))
            .and_then(|r| r.label_name.clone())
    });
    from_xai.or_else(|| {
        result
            .top_regions
            .iter()
            .find(|r| r.label_id == Some(region.0 as i64))
            .and_then(|r| r.label_name.clone())
    })
}
