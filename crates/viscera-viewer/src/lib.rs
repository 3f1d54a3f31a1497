//! Viscera Viewer - browser-based organ model explainability
//!
//! Loads a 3D organ model, submits an uploaded segmentation to the
//! inference backend, and highlights the anatomical regions that drove the
//! model's prediction.

mod app;
mod file_picker;
mod network;
mod ui;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging with filtering to reduce noise
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    // Run the Bevy app
    app::run();
}
