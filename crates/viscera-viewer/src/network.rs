//! Backend communication: registry, mapping tables, and inference
//!
//! Fetches run as detached browser tasks and hand results back through
//! shared cells drained by Bevy systems. Every async result carries enough
//! context (organ or model generation) to be discarded when the viewer has
//! moved on since the request.

use bevy::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use viscera_core::{InferenceResult, MappingTable, Organ, OrganProfile, RegionId, Registry};
use viscera_scene::{LoadOrganModel, MappingState, OrganModel, PendingScores};

use crate::app::{AnalysisState, Selection};
use crate::file_picker::UploadedScan;

pub struct NetworkPlugin;

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelRegistry>()
            .init_resource::<RegionLabels>()
            .init_resource::<PendingRegistry>()
            .init_resource::<PendingMappingFetch>()
            .init_resource::<PendingLutFetch>()
            .init_resource::<PendingInference>()
            .add_message::<RunInference>()
            .add_systems(Startup, start_registry_fetch)
            .add_systems(
                Update,
                (
                    process_registry,
                    start_mapping_fetch,
                    process_mapping,
                    start_lut_fetch,
                    process_lut,
                    submit_inference,
                    process_inference,
                ),
            );
    }
}

/// Resource storing the backend connection configuration
#[derive(Resource, Clone)]
pub struct BackendConfig {
    /// HTTP(S) base URL for the inference API
    pub base_url: String,
}

impl BackendConfig {
    /// Create config from URL query parameters or same-origin fallback
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let Some(window) = web_sys::window() else {
            return Self {
                base_url: String::new(),
            };
        };
        let location = window.location();

        // Check for ?backend= query parameter
        if let Ok(search) = location.search() {
            if let Some(backend) = Self::parse_query_param(&search, "backend") {
                tracing::info!("Using backend from URL parameter: {}", backend);
                return Self::from_address(&backend);
            }
        }

        // Fall back to same-origin
        let host = location.host().unwrap_or_else(|_| "localhost:8000".to_string());
        let is_https = location.protocol().unwrap_or_default() == "https:";
        Self {
            base_url: format!("{}://{}", if is_https { "https" } else { "http" }, host),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }

    /// Create config from a backend address (host:port or full URL)
    pub fn from_address(addr: &str) -> Self {
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr.trim_end_matches('/'))
        };
        Self { base_url }
    }

    /// Parse a query parameter from a search string
    fn parse_query_param(search: &str, param: &str) -> Option<String> {
        let search = search.trim_start_matches('?');
        for pair in search.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                if key == param {
                    return Some(value.replace("%3A", ":").replace("%2F", "/"));
                }
            }
        }
        None
    }
}

/// The organ and disease models the backend offers.
#[derive(Resource, Default)]
pub struct ModelRegistry {
    pub registry: Registry,
    pub loaded: bool,
    pub from_fallback: bool,
}

/// Request to run inference on the staged scan.
#[derive(Message, Debug, Clone, Copy)]
pub struct RunInference;

/// Region label names for the active organ, read from the lookup table
/// shipped next to the model. Empty for organs with fixed clinical names.
#[derive(Resource, Default)]
pub struct RegionLabels {
    pub organ: Option<Organ>,
    pub names: BTreeMap<u32, String>,
}

impl RegionLabels {
    pub fn name_for(&self, organ: Organ, region: RegionId) -> Option<&str> {
        if self.organ != Some(organ) {
            return None;
        }
        self.names.get(&region.0).map(String::as_str)
    }
}

#[derive(Resource, Default)]
pub struct PendingRegistry(pub Arc<Mutex<Option<(Registry, bool)>>>);

/// Mapping fetch results, tagged with the organ they were fetched for so
/// stale responses can be dropped after an organ switch.
#[derive(Resource, Default)]
pub struct PendingMappingFetch(pub Arc<Mutex<Option<(Organ, Option<MappingTable>)>>>);

/// Lookup-table fetch results, tagged with the organ like mapping fetches.
#[derive(Resource, Default)]
pub struct PendingLutFetch(pub Arc<Mutex<Option<(Organ, Option<BTreeMap<u32, String>>)>>>);

/// Inference results, tagged with the model generation at submit time.
#[derive(Resource, Default)]
pub struct PendingInference(pub Arc<Mutex<Option<(u64, Result<InferenceResult, String>)>>>);

fn start_registry_fetch(config: Res<BackendConfig>, pending: Res<PendingRegistry>) {
    fetch_registry(&config, &pending);
}

#[cfg(target_arch = "wasm32")]
fn fetch_registry(config: &BackendConfig, pending: &PendingRegistry) {
    use wasm_bindgen_futures::spawn_local;

    let cell = pending.0.clone();
    let url = format!("{}/registry", config.base_url);

    spawn_local(async move {
        let fetched = match gloo_net::http::Request::get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(text) => serde_json::from_str::<Registry>(&text).ok(),
                Err(_) => None,
            },
            Err(e) => {
                tracing::warn!("Registry fetch failed: {:?}", e);
                None
            }
        };
        let entry = match fetched {
            Some(registry) if !registry.organs.is_empty() => (registry, false),
            _ => {
                tracing::warn!("Falling back to built-in model registry");
                (Registry::fallback(), true)
            }
        };
        if let Ok(mut slot) = cell.lock() {
            *slot = Some(entry);
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn fetch_registry(_config: &BackendConfig, pending: &PendingRegistry) {
    if let Ok(mut slot) = pending.0.lock() {
        *slot = Some((Registry::fallback(), true));
    }
}

/// Adopt a fetched registry and kick off the initial organ load
fn process_registry(
    pending: Res<PendingRegistry>,
    mut registry: ResMut<ModelRegistry>,
    mut selection: ResMut<Selection>,
    mut load_requests: MessageWriter<LoadOrganModel>,
) {
    let Ok(mut cell) = pending.0.lock() else {
        return;
    };
    let Some((fetched, from_fallback)) = cell.take() else {
        return;
    };

    registry.registry = fetched;
    registry.loaded = true;
    registry.from_fallback = from_fallback;

    if selection.organ.is_none() {
        let first = registry
            .registry
            .organs
            .iter()
            .find_map(|models| Organ::from_str_loose(&models.organ));
        if let Some(organ) = first {
            selection.organ = Some(organ);
            selection.disease = registry
                .registry
                .diseases_for(organ)
                .first()
                .cloned();
            load_requests.write(LoadOrganModel { organ });
        }
    }
}

/// Fetch the mapping table for every requested organ model
fn start_mapping_fetch(
    mut requests: MessageReader<LoadOrganModel>,
    pending: Res<PendingMappingFetch>,
) {
    let Some(request) = requests.read().last() else {
        return;
    };
    fetch_mapping(request.organ, &pending);
}

#[cfg(target_arch = "wasm32")]
fn fetch_mapping(organ: Organ, pending: &PendingMappingFetch) {
    use wasm_bindgen_futures::spawn_local;

    let cell = pending.0.clone();
    let path = OrganProfile::for_organ(organ).mapping_path;

    spawn_local(async move {
        let table = match gloo_net::http::Request::get(path).send().await {
            Ok(response) => match response.text().await {
                Ok(text) => match MappingTable::from_json(&text) {
                    Ok(table) => Some(table),
                    Err(e) => {
                        tracing::warn!("Mapping table {} is invalid: {}", path, e);
                        None
                    }
                },
                Err(_) => None,
            },
            Err(e) => {
                tracing::warn!("Mapping table fetch failed for {}: {:?}", path, e);
                None
            }
        };
        if let Ok(mut slot) = cell.lock() {
            *slot = Some((organ, table));
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn fetch_mapping(organ: Organ, pending: &PendingMappingFetch) {
    let path = OrganProfile::for_organ(organ).mapping_path;
    let table = MappingTable::load(std::path::Path::new(&format!("assets/{}", path))).ok();
    if let Ok(mut slot) = pending.0.lock() {
        *slot = Some((organ, table));
    }
}

fn process_mapping(
    pending: Res<PendingMappingFetch>,
    model: Res<OrganModel>,
    mut mapping: ResMut<MappingState>,
) {
    let Ok(mut cell) = pending.0.lock() else {
        return;
    };
    let Some((organ, table)) = cell.take() else {
        return;
    };
    // A response for a previously selected organ is stale
    if model.organ != Some(organ) {
        return;
    }

    *mapping = match table {
        Some(table) => {
            tracing::info!("Mapping table loaded for {} ({} regions)", organ, table.len());
            MappingState::Loaded(table)
        }
        None => {
            tracing::warn!("No usable mapping table for {}, highlights disabled", organ);
            MappingState::Unavailable
        }
    };
}

/// Fetch the region label table for every requested organ model
fn start_lut_fetch(mut requests: MessageReader<LoadOrganModel>, pending: Res<PendingLutFetch>) {
    let Some(request) = requests.read().last() else {
        return;
    };
    fetch_lut(request.organ, &pending);
}

#[cfg(target_arch = "wasm32")]
fn fetch_lut(organ: Organ, pending: &PendingLutFetch) {
    use wasm_bindgen_futures::spawn_local;

    let cell = pending.0.clone();
    let Some(path) = OrganProfile::for_organ(organ).lut_path else {
        if let Ok(mut slot) = cell.lock() {
            *slot = Some((organ, None));
        }
        return;
    };

    spawn_local(async move {
        let names = match gloo_net::http::Request::get(path).send().await {
            Ok(response) => match response.text().await {
                Ok(text) => match viscera_core::parse_lut(&text) {
                    Ok(names) => Some(names),
                    Err(e) => {
                        tracing::warn!("Label table {} is invalid: {}", path, e);
                        None
                    }
                },
                Err(_) => None,
            },
            Err(e) => {
                tracing::warn!("Label table fetch failed for {}: {:?}", path, e);
                None
            }
        };
        if let Ok(mut slot) = cell.lock() {
            *slot = Some((organ, names));
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn fetch_lut(organ: Organ, pending: &PendingLutFetch) {
    let names = OrganProfile::for_organ(organ).lut_path.and_then(|path| {
        viscera_core::load_lut(std::path::Path::new(&format!("assets/{}", path))).ok()
    });
    if let Ok(mut slot) = pending.0.lock() {
        *slot = Some((organ, names));
    }
}

fn process_lut(
    pending: Res<PendingLutFetch>,
    model: Res<OrganModel>,
    mut labels: ResMut<RegionLabels>,
) {
    let Ok(mut cell) = pending.0.lock() else {
        return;
    };
    let Some((organ, names)) = cell.take() else {
        return;
    };
    if model.organ != Some(organ) {
        return;
    }

    labels.organ = Some(organ);
    labels.names = names.unwrap_or_default();
    if !labels.names.is_empty() {
        tracing::info!("Label table loaded for {} ({} labels)", organ, labels.names.len());
    }
}

/// Send the staged scan to the backend when analysis is requested
fn submit_inference(
    mut requests: MessageReader<RunInference>,
    config: Res<BackendConfig>,
    selection: Res<Selection>,
    uploaded: Res<UploadedScan>,
    model: Res<OrganModel>,
    pending: Res<PendingInference>,
    mut analysis: ResMut<AnalysisState>,
) {
    if requests.read().last().is_none() {
        return;
    }
    let (Some(organ), Some(disease)) = (selection.organ, selection.disease.clone()) else {
        return;
    };
    let Some(scan) = uploaded.0.as_ref() else {
        return;
    };

    analysis.in_flight = true;
    analysis.error = None;
    post_scan(
        &config,
        organ,
        &disease,
        scan.bytes.clone(),
        model.generation,
        &pending,
    );
}

#[cfg(target_arch = "wasm32")]
fn post_scan(
    config: &BackendConfig,
    organ: Organ,
    disease: &str,
    bytes: Vec<u8>,
    generation: u64,
    pending: &PendingInference,
) {
    use wasm_bindgen_futures::spawn_local;

    let cell = pending.0.clone();
    let url = format!(
        "{}/infer?organ={}&disease={}&xai=true",
        config.base_url, organ, disease
    );

    spawn_local(async move {
        tracing::info!("Submitting scan for inference: {}", url);
        let body = js_sys::Uint8Array::from(bytes.as_slice());
        let outcome = async {
            let response = gloo_net::http::Request::post(&url)
                .header("Content-Type", "application/octet-stream")
                .body(body)
                .map_err(|e| format!("request build failed: {e:?}"))?
                .send()
                .await
                .map_err(|e| format!("request failed: {e:?}"))?;
            if !response.ok() {
                return Err(format!("backend returned HTTP {}", response.status()));
            }
            let text = response
                .text()
                .await
                .map_err(|e| format!("response read failed: {e:?}"))?;
            serde_json::from_str::<InferenceResult>(&text)
                .map_err(|e| format!("response parse failed: {e}"))
        }
        .await;

        if let Ok(mut slot) = cell.lock() {
            *slot = Some((generation, outcome));
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn post_scan(
    _config: &BackendConfig,
    _organ: Organ,
    _disease: &str,
    _bytes: Vec<u8>,
    generation: u64,
    pending: &PendingInference,
) {
    if let Ok(mut slot) = pending.0.lock() {
        *slot = Some((
            generation,
            Err("inference is only available in the browser".to_string()),
        ));
    }
}

/// Adopt inference results, discarding any that raced an organ switch
fn process_inference(
    pending: Res<PendingInference>,
    model: Res<OrganModel>,
    mut analysis: ResMut<AnalysisState>,
    mut scores: ResMut<PendingScores>,
) {
    let Ok(mut cell) = pending.0.lock() else {
        return;
    };
    let Some((generation, outcome)) = cell.take() else {
        return;
    };
    analysis.in_flight = false;

    if generation != model.generation {
        tracing::info!("Discarding inference result from a superseded model load");
        return;
    }

    match outcome {
        Ok(result) => {
            analysis.raw = serde_json::to_string_pretty(&result).ok();
            if let Some(organ) = model.organ {
                scores.submit(result.score_map(organ));
            }
            analysis.result = Some(result);
            analysis.error = None;
        }
        Err(message) => {
            tracing::error!("Inference failed: {}", message);
            analysis.error = Some(message);
        }
    }
}
