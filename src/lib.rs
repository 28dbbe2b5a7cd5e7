//! iveri-ngin
//!
//! A small scene-graph engine core for native and WASM hosts. It turns OBJ and
//! GLTF assets into shared, deduplicated geometry, organises cameras, lights and
//! meshes in a transform hierarchy and hands one frame at a time to a render
//! backend supplied by the host.
//!
//! High-level modules
//! - `camera`: look-at camera and perspective/parallel projections
//! - `context`: engine configuration, logging setup and the asset manager
//! - `data_structures`: geometry, transforms, entities and the scene graph
//! - `errors`: the crate's error types
//! - `flow`: high level flow control (scene updates, ticks and frames)
//! - `resources`: byte fetching, mesh parsers and the load-once resource cache
//! - `render`: the boundary to the render backend
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod errors;
pub mod flow;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;

/// Sets up console logging when the module is instantiated in the browser.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn wasm_start() {
    context::init_logging("info");
}
