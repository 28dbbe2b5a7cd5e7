//! Engine data structures: geometry, transforms, entities and the scene graph.
//!
//! This module contains the core data types for scene representation:
//!
//! - `geometry` holds the deduplicated vertex/index data produced by the mesh parsers
//! - `transform` is the local translation/rotation/scale of a node
//! - `entity` contains the drawable entities (camera, light, mesh) and materials
//! - `scene_graph` enables hierarchical scene organization

pub mod entity;
pub mod geometry;
pub mod scene_graph;
pub mod transform;
