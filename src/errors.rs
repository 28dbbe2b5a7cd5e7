//! Error types.
//!
//! All fallible engine APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. The error is `Clone` because a single asset
//! load may be awaited by several callers through the resource cache, and each of
//! them receives the same failure.
//!
//! - [`ParseError`] describes malformed asset data (OBJ text, GLTF documents,
//!   image payloads).
//! - [`TreeError`] describes invalid structural mutations of the scene graph.
//! - [`DegenerateTransform`] describes numeric cases that would otherwise push
//!   NaN or infinity into the matrix pipeline.

use std::sync::Arc;

use thiserror::Error;

use crate::data_structures::scene_graph::{EntityId, NodeId};

pub type Result<T> = std::result::Result<T, Error>;

/// The engine's error type.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// An asset was fetched but its content is malformed.
    #[error("failed to parse asset `{asset}`: {source}")]
    Parse {
        asset: String,
        #[source]
        source: ParseError,
    },

    /// A resource could not be fetched.
    #[error("failed to fetch `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Degenerate(#[from] DegenerateTransform),

    /// The render backend refused a submission.
    #[error("render backend error: {0}")]
    Backend(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn parse(asset: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            asset: asset.into(),
            source,
        }
    }

    pub fn io(
        path: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::from(source.into()),
        }
    }
}

/// Malformed asset content.
///
/// Line numbers are 1-based; accessor indices refer to the GLTF document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: `{token}` is not a valid number")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: `{keyword}` expects at least {expected} components")]
    MissingComponents {
        line: usize,
        keyword: &'static str,
        expected: usize,
    },

    #[error("line {line}: invalid face index `{token}`")]
    InvalidIndex { line: usize, token: String },

    #[error("line {line}: {kind} index {index} is out of range ({len} defined)")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("line {line}: a face needs at least 3 vertices, found {vertices}")]
    DegenerateFace { line: usize, vertices: usize },

    #[error("not valid UTF-8 text")]
    InvalidUtf8,

    #[error("malformed GLTF document: {0}")]
    Gltf(String),

    #[error(
        "accessor {accessor}: {length} bytes at {offset} are not {component_size}-byte aligned"
    )]
    Misaligned {
        accessor: usize,
        offset: usize,
        length: usize,
        component_size: usize,
    },

    #[error(
        "accessor {accessor}: byte range ends at {end}, but only {available} bytes are available"
    )]
    AccessorOutOfBounds {
        accessor: usize,
        end: usize,
        available: usize,
    },

    #[error("accessor {accessor}: sparse index {index} is out of range for {count} elements")]
    SparseIndexOutOfRange {
        accessor: usize,
        index: u32,
        count: usize,
    },

    #[error("accessor {accessor}: unsupported index component type {component_type}")]
    UnsupportedIndexType { accessor: usize, component_type: u32 },

    #[error("accessor {accessor}: {semantic} cannot be read from {found}")]
    UnexpectedAccessorType {
        accessor: usize,
        semantic: &'static str,
        found: String,
    },

    #[error("{semantic} has {found} elements, expected {expected}")]
    AttributeCountMismatch {
        semantic: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("index {index} is out of range for {vertices} vertices")]
    VertexIndexOutOfRange { index: u32, vertices: usize },

    #[error("payload for buffer {index} is missing")]
    MissingBuffer { index: usize },

    #[error("unsupported uri `{0}`")]
    UnsupportedUri(String),

    #[error("unsupported asset format `{0}`")]
    UnsupportedFormat(String),

    #[error("image could not be decoded: {0}")]
    Image(String),

    #[error("geometry violates its invariant: {0}")]
    InvalidGeometry(String),
}

/// Invalid structural mutation of a [`Scene`](crate::data_structures::scene_graph::Scene).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("node {0:?} does not exist in this scene")]
    UnknownNode(NodeId),

    #[error("entity {0:?} does not exist in this scene")]
    UnknownEntity(EntityId),

    #[error("node {child:?} cannot become a child of its descendant {parent:?}")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("the root node cannot be {0}")]
    RootNode(&'static str),
}

/// A numeric case that has no meaningful matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegenerateTransform {
    #[error("camera position and target coincide, the view direction is undefined")]
    ZeroLengthDirection,

    #[error("the world matrix of the camera node is not invertible")]
    SingularMatrix,

    #[error("node {0:?} has a non-finite world matrix")]
    NonFinite(NodeId),
}
