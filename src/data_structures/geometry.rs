//! Backend-agnostic mesh data.
//!
//! A [`GeometryBuffer`] is what the mesh parsers produce and what mesh entities
//! draw: flat attribute arrays plus a triangle index list. Vertices are already
//! deduplicated, so the index list refers to one shared vertex per distinct
//! attribute combination.

use std::sync::Arc;

use crate::errors::ParseError;

/// Decoded RGBA8 pixels of a texture image.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A texture attached to a slot of the geometry.
///
/// Slot 0 holds the base colour texture and slot 1 the metallic-roughness
/// texture. The backend decides which texture unit a slot maps to.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureBinding {
    pub slot: u32,
    pub texture: Arc<TextureData>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBuffer {
    /// 3 floats per vertex.
    pub positions: Vec<f32>,
    /// 3 floats per vertex, or empty.
    pub normals: Vec<f32>,
    /// 2 floats per vertex, or empty.
    pub tex_coords: Vec<f32>,
    /// 3 indices per triangle.
    pub indices: Vec<u32>,
    pub textures: Vec<TextureBinding>,
}

/**
 * The interleaved vertex record staged for GPU upload.
 *
 * Attributes missing from the geometry are zero-filled so that every mesh can use
 * the same vertex layout.
 */
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl GeometryBuffer {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }

    pub fn texture(&self, slot: u32) -> Option<&TextureBinding> {
        self.textures.iter().find(|binding| binding.slot == slot)
    }

    /// Checks the invariant every parser guarantees for its output.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.positions.len() % 3 != 0 {
            return Err(ParseError::InvalidGeometry(format!(
                "{} position floats do not form whole vertices",
                self.positions.len()
            )));
        }
        let vertices = self.vertex_count();
        if self.has_normals() && self.normals.len() != vertices * 3 {
            return Err(ParseError::AttributeCountMismatch {
                semantic: "normals",
                expected: vertices,
                found: self.normals.len() / 3,
            });
        }
        if self.has_tex_coords() && self.tex_coords.len() != vertices * 2 {
            return Err(ParseError::AttributeCountMismatch {
                semantic: "texture coordinates",
                expected: vertices,
                found: self.tex_coords.len() / 2,
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(ParseError::InvalidGeometry(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(ParseError::VertexIndexOutOfRange { index, vertices });
        }
        Ok(())
    }

    /// Appends `other`, offsetting its indices by the current vertex count.
    ///
    /// When only one side carries normals or texture coordinates the other side is
    /// zero-filled. Texture slots already present are kept.
    pub fn append(&mut self, other: GeometryBuffer) {
        let base = self.vertex_count();
        let added = other.vertex_count();
        let offset = base as u32;

        merge_attribute(&mut self.normals, other.normals, base, added, 3);
        merge_attribute(&mut self.tex_coords, other.tex_coords, base, added, 2);
        self.positions.extend(other.positions);
        self.indices
            .extend(other.indices.into_iter().map(|index| index + offset));
        for binding in other.textures {
            if self.texture(binding.slot).is_none() {
                self.textures.push(binding);
            } else {
                log::debug!(
                    "Texture slot {} is already bound, ignoring `{}`",
                    binding.slot,
                    binding.texture.name
                );
            }
        }
    }

    pub fn to_vertices(&self) -> Vec<ModelVertex> {
        (0..self.vertex_count())
            .map(|i| ModelVertex {
                position: [
                    self.positions[i * 3],
                    self.positions[i * 3 + 1],
                    self.positions[i * 3 + 2],
                ],
                tex_coords: [
                    self.tex_coords.get(i * 2).map_or(0.0, |f| *f),
                    self.tex_coords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                normal: [
                    self.normals.get(i * 3).map_or(0.0, |f| *f),
                    self.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    self.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ],
            })
            .collect()
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

fn merge_attribute(dst: &mut Vec<f32>, src: Vec<f32>, base: usize, added: usize, width: usize) {
    match (dst.is_empty(), src.is_empty()) {
        (_, false) => {
            if dst.is_empty() && base > 0 {
                log::debug!("Zero-filling {} vertices without this attribute", base);
                dst.resize(base * width, 0.0);
            }
            dst.extend(src);
        }
        (false, true) => dst.resize(dst.len() + added * width, 0.0),
        (true, true) => (),
    }
}
