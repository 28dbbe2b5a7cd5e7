//! Drawable entities that can be attached to scene nodes.
//!
//! The variant set is closed: a node carries a camera, a light or a mesh, and the
//! traversal dispatches on [`Entity`] to let each one contribute to the frame.

use std::sync::Arc;

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Transform as _};

use crate::{
    camera::Camera,
    data_structures::geometry::GeometryBuffer,
    errors::{DegenerateTransform, Result},
    render::{
        AttributeBinding, CameraDraw, Draw, LightDraw, MeshDraw, RenderBackend, VertexAttribute,
    },
};

/// Opaque handle of a compiled shader program owned by the render backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    intensity: [f32; 4],
}

impl Light {
    pub fn new(intensity: [f32; 4]) -> Self {
        Self { intensity }
    }

    pub fn intensity(&self) -> [f32; 4] {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: [f32; 4]) {
        self.intensity = intensity;
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new([1.0; 4])
    }
}

/// Surface parameters of a mesh. Textures come from the geometry itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// RGBA light coefficients.
    pub light_coefficients: [f32; 4],
    pub shader: ShaderHandle,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            light_coefficients: [1.0; 4],
            shader: ShaderHandle::default(),
        }
    }
}

/// A drawable instance of a shared [`GeometryBuffer`].
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<GeometryBuffer>,
    pub material: Material,
}

impl Mesh {
    pub fn new(geometry: Arc<GeometryBuffer>) -> Self {
        Self {
            geometry,
            material: Material::default(),
        }
    }

    pub fn with_material(geometry: Arc<GeometryBuffer>, material: Material) -> Self {
        Self { geometry, material }
    }

    /// Attributes present in the geometry, in slot order. Empty ones are skipped.
    pub fn attributes(&self) -> Vec<AttributeBinding<'_>> {
        let geometry = &self.geometry;
        [
            (VertexAttribute::Position, &geometry.positions),
            (VertexAttribute::Normal, &geometry.normals),
            (VertexAttribute::TexCoord, &geometry.tex_coords),
        ]
        .into_iter()
        .filter(|(_, data)| !data.is_empty())
        .map(|(attribute, data)| AttributeBinding {
            attribute,
            components: attribute.components(),
            data,
        })
        .collect()
    }
}

#[derive(Clone, Debug)]
pub enum Entity {
    Camera(Camera),
    Light(Light),
    Mesh(Mesh),
}

impl Entity {
    /// Lets the entity contribute to the current frame with its node's world matrix.
    pub fn draw(&self, world: &Matrix4<f32>, backend: &mut dyn RenderBackend) -> Result<()> {
        match self {
            Entity::Camera(camera) => {
                let inverse = world.invert().ok_or(DegenerateTransform::SingularMatrix)?;
                backend.submit(Draw::Camera(CameraDraw {
                    view: camera.view_matrix()? * inverse,
                    projection: camera.projection_matrix(),
                }))
            }
            Entity::Light(light) => backend.submit(Draw::Light(LightDraw {
                intensity: light.intensity(),
                position: world.transform_point(Point3::origin()),
            })),
            Entity::Mesh(mesh) => {
                if mesh.geometry.indices.is_empty() {
                    log::debug!("Mesh `{}` has no triangles, nothing to draw", mesh.material.name);
                    return Ok(());
                }
                backend.submit(Draw::Mesh(MeshDraw {
                    world: *world,
                    shader: mesh.material.shader,
                    material: &mesh.material,
                    attributes: mesh.attributes(),
                    indices: &mesh.geometry.indices,
                    textures: &mesh.geometry.textures,
                }))
            }
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            Entity::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match self {
            Entity::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match self {
            Entity::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Entity::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

impl From<Camera> for Entity {
    fn from(camera: Camera) -> Self {
        Entity::Camera(camera)
    }
}

impl From<Light> for Entity {
    fn from(light: Light) -> Self {
        Entity::Light(light)
    }
}

impl From<Mesh> for Entity {
    fn from(mesh: Mesh) -> Self {
        Entity::Mesh(mesh)
    }
}
