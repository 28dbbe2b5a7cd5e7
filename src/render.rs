//! Boundary between the engine core and the render backend.
//!
//! The scene traversal does not talk to a graphics API. Each entity describes its
//! contribution to a frame as a [`Draw`] and hands it to a [`RenderBackend`],
//! which owns shaders, buffers and texture units.
//!
//! # Key types
//!
//! - [`RenderBackend`] is implemented by the host (WebGL, wgpu, a test double)
//! - [`Draw`] is one submission: a camera, a light or a mesh draw call
//! - [`RecordingBackend`] keeps owned summaries of every submission; it is used by
//!   the inspector binary and by tests
//!

use cgmath::{Matrix4, Point3};

use crate::{
    data_structures::{entity::{Material, ShaderHandle}, geometry::TextureBinding},
    errors::Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    TexCoord,
}

impl VertexAttribute {
    pub fn components(self) -> usize {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 3,
            VertexAttribute::TexCoord => 2,
        }
    }
}

/// One vertex attribute stream of a mesh draw.
#[derive(Clone, Copy, Debug)]
pub struct AttributeBinding<'a> {
    pub attribute: VertexAttribute,
    pub components: usize,
    pub data: &'a [f32],
}

/// Everything a backend needs to issue one indexed triangle draw call.
#[derive(Debug)]
pub struct MeshDraw<'a> {
    pub world: Matrix4<f32>,
    pub shader: ShaderHandle,
    pub material: &'a Material,
    pub attributes: Vec<AttributeBinding<'a>>,
    pub indices: &'a [u32],
    pub textures: &'a [TextureBinding],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraDraw {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDraw {
    pub intensity: [f32; 4],
    pub position: Point3<f32>,
}

/// A single contribution of an entity to the current frame.
#[derive(Debug)]
pub enum Draw<'a> {
    Camera(CameraDraw),
    Light(LightDraw),
    Mesh(MeshDraw<'a>),
}

pub trait RenderBackend {
    /// Called once per frame before the traversal with the active view and projection.
    fn begin_frame(&mut self, _view: &Matrix4<f32>, _projection: &Matrix4<f32>) {}

    fn submit(&mut self, draw: Draw<'_>) -> Result<()>;

    fn end_frame(&mut self) {}
}

/// Owned summary of a submission, as kept by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    Camera(CameraDraw),
    Light(LightDraw),
    Mesh {
        world: Matrix4<f32>,
        shader: ShaderHandle,
        material: String,
        attributes: Vec<VertexAttribute>,
        index_count: usize,
        texture_slots: Vec<u32>,
    },
}

/// A backend that records what it is asked to draw.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub frames: usize,
    pub view: Option<Matrix4<f32>>,
    pub projection: Option<Matrix4<f32>>,
    pub submissions: Vec<Submission>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Submission> {
        self.submissions
            .iter()
            .filter(|submission| matches!(submission, Submission::Mesh { .. }))
    }

    pub fn clear(&mut self) {
        self.submissions.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_frame(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        self.view = Some(*view);
        self.projection = Some(*projection);
        self.submissions.clear();
    }

    fn submit(&mut self, draw: Draw<'_>) -> Result<()> {
        let submission = match draw {
            Draw::Camera(camera) => Submission::Camera(camera),
            Draw::Light(light) => Submission::Light(light),
            Draw::Mesh(mesh) => Submission::Mesh {
                world: mesh.world,
                shader: mesh.shader,
                material: mesh.material.name.clone(),
                attributes: mesh.attributes.iter().map(|a| a.attribute).collect(),
                index_count: mesh.indices.len(),
                texture_slots: mesh.textures.iter().map(|t| t.slot).collect(),
            },
        };
        log::trace!("Recorded {:?}", submission);
        self.submissions.push(submission);
        Ok(())
    }

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}
