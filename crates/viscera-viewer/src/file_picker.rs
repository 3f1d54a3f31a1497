//! Browser file picker for segmentation uploads
//!
//! Uses a hidden HTML input element for the native file dialog and a
//! shared cell to hand the selected file back to the Bevy world.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};

pub struct FilePickerPlugin;

impl Plugin for FilePickerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingScanFile>()
            .init_resource::<UploadedScan>()
            .add_systems(Update, process_scan_results);
    }
}

/// A segmentation file picked by the user.
#[derive(Debug, Clone)]
pub struct ScanFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Shared cell written by the JavaScript file-read callback.
#[derive(Resource, Default, Clone)]
pub struct PendingScanFile(pub Arc<Mutex<Option<ScanFile>>>);

/// The scan currently staged for analysis.
#[derive(Resource, Default)]
pub struct UploadedScan(pub Option<ScanFile>);

/// Move picked files from the JS callback cell into the world
fn process_scan_results(pending: Res<PendingScanFile>, mut uploaded: ResMut<UploadedScan>) {
    if let Ok(mut cell) = pending.0.lock() {
        if let Some(scan) = cell.take() {
            tracing::info!("Staged scan {} ({} bytes)", scan.filename, scan.bytes.len());
            uploaded.0 = Some(scan);
        }
    }
}

/// Open the browser file dialog for a segmentation volume.
#[cfg(target_arch = "wasm32")]
pub fn trigger_scan_open(pending: &PendingScanFile) {
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::HtmlInputElement;

    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };

    let input: HtmlInputElement = match document
        .create_element("input")
        .ok()
        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
    {
        Some(input) => input,
        None => {
            tracing::error!("Failed to create file input element");
            return;
        }
    };

    input.set_type("file");
    input.set_accept(".nii,.gz");
    input.style().set_property("display", "none").ok();

    let Some(body) = document.body() else {
        return;
    };
    if body.append_child(&input).is_err() {
        return;
    }

    let input_clone = input.clone();
    let cell = pending.0.clone();

    let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        if let Some(files) = input_clone.files() {
            if let Some(file) = files.get(0) {
                let filename = file.name();
                let cell = cell.clone();

                let Ok(reader) = web_sys::FileReader::new() else {
                    return;
                };
                let reader_clone = reader.clone();

                let onload = Closure::wrap(Box::new(move |_: web_sys::Event| {
                    let Ok(result) = reader_clone.result() else {
                        return;
                    };
                    let Ok(array_buffer) = result.dyn_into::<js_sys::ArrayBuffer>() else {
                        return;
                    };
                    let bytes = js_sys::Uint8Array::new(&array_buffer).to_vec();
                    if let Ok(mut slot) = cell.lock() {
                        *slot = Some(ScanFile {
                            filename: filename.clone(),
                            bytes,
                        });
                    }
                }) as Box<dyn FnMut(_)>);

                reader.set_onload(Some(onload.as_ref().unchecked_ref()));
                onload.forget();
                reader.read_as_array_buffer(&file).ok();
            }
        }

        if let Some(parent) = input_clone.parent_node() {
            parent.remove_child(&input_clone).ok();
        }
    }) as Box<dyn FnMut(_)>);

    input.set_onchange(Some(closure.as_ref().unchecked_ref()));
    closure.forget();

    input.click();
}

#[cfg(not(target_arch = "wasm32"))]
pub fn trigger_scan_open(_pending: &PendingScanFile) {
    tracing::warn!("File picker is only available in the browser");
}
