// Engine module - terrain, trail and walker core plus the thin render/input layer
//
// Data flow: Heightfield → TerrainMesh → PathTrack → PathWalker → renderer

pub mod camera;
pub mod components;
pub mod config;
pub mod debug_overlay;
pub mod error;
pub mod heightfield;
pub mod input;
pub mod mesh;
pub mod path;
pub mod systems;
pub mod terrain;
pub mod walker;

// Re-export commonly used items
pub use components::*;
