//! GLTF 2.0 mesh decoding.
//!
//! All triangle primitives of all meshes are concatenated, in document order, into
//! one [`GeometryBuffer`]. Accessors are decoded straight from the buffer payloads
//! so that alignment and bounds problems surface as [`ParseError`]s instead of
//! being silently clamped.
//!
//! The decoder is pure. External buffers and images are fetched beforehand by the
//! asset manager and handed in as [`GltfSources`].

use std::sync::Arc;

use gltf::{
    Accessor, Gltf, Semantic,
    accessor::{DataType, Dimensions, sparse::IndexType},
    json::{
        self,
        validation::{Checked, Validate},
    },
    mesh::Mode,
};

use crate::{
    data_structures::geometry::{GeometryBuffer, TextureBinding, TextureData},
    errors::ParseError,
    resources::texture::decode_texture,
};

/// Slot of `pbrMetallicRoughness.baseColorTexture`.
pub const BASE_COLOR_SLOT: u32 = 0;
/// Slot of `pbrMetallicRoughness.metallicRoughnessTexture`.
pub const METALLIC_ROUGHNESS_SLOT: u32 = 1;

/// Payloads referenced by a document, indexed like the document's buffers and images.
///
/// Entries for buffers stored in a GLB binary chunk are ignored, the chunk is taken
/// from the document itself. An image entry is `None` when it could not be fetched.
#[derive(Clone, Debug, Default)]
pub struct GltfSources {
    pub buffers: Vec<Vec<u8>>,
    pub images: Vec<Option<Vec<u8>>>,
}

/// Parses a GLTF JSON document or a GLB container.
///
/// References from primitives and materials to accessors, materials, textures or
/// images that do not exist are dropped with a warning, leaving that attribute or
/// texture unset. Any other inconsistency is a [`ParseError::Gltf`].
pub fn parse_document(data: &[u8]) -> Result<Gltf, ParseError> {
    let Gltf { document, blob } = Gltf::from_slice_without_validation(data)
        .map_err(|e| ParseError::Gltf(e.to_string()))?;
    let mut root = document.into_json();
    let tolerated = drop_dangling_references(&mut root);

    let mut problems = Vec::new();
    root.validate(&root, json::Path::new, &mut |path, error| {
        let path = path();
        if !tolerated.contains(&path.0) {
            problems.push(format!("{}: {}", path, error));
        }
    });
    if !problems.is_empty() {
        return Err(ParseError::Gltf(problems.join("; ")));
    }
    Ok(Gltf {
        document: gltf::Document::from_json_without_validation(root),
        blob,
    })
}

/// Removes references that point past the end of their array.
///
/// Returns the validation paths to leave unreported: `textures[n].source` entries
/// that dangle, which nothing refers to any more, and primitives without a
/// `POSITION`, which the decoder skips.
fn drop_dangling_references(root: &mut json::Root) -> Vec<String> {
    let accessors = root.accessors.len();
    let materials = root.materials.len();
    let images = root.images.len();

    let mut tolerated = Vec::new();
    let mut usable_textures = Vec::with_capacity(root.textures.len());
    for (index, texture) in root.textures.iter().enumerate() {
        let usable = texture.source.value() < images;
        if !usable {
            log::warn!(
                "Texture {} refers to missing image {}",
                index,
                texture.source.value()
            );
            tolerated.push(format!("textures[{}].source", index));
        }
        usable_textures.push(usable);
    }
    let usable = |texture: usize| usable_textures.get(texture).copied().unwrap_or(false);

    for (m, mesh) in root.meshes.iter_mut().enumerate() {
        for (p, primitive) in mesh.primitives.iter_mut().enumerate() {
            primitive.attributes.retain(|semantic, accessor| {
                let exists = accessor.value() < accessors;
                if !exists {
                    log::warn!(
                        "Primitive {} of mesh {}: {} refers to missing accessor {}",
                        p,
                        m,
                        semantic.to_string(),
                        accessor.value()
                    );
                }
                exists
            });
            let positions = Checked::Valid(json::mesh::Semantic::Positions);
            if !primitive.attributes.contains_key(&positions) {
                tolerated.push(format!(
                    "meshes[{}].primitives[{}].attributes[\"POSITION\"]",
                    m, p
                ));
            }
            if let Some(indices) = primitive.indices
                && indices.value() >= accessors
            {
                log::warn!(
                    "Primitive {} of mesh {}: indices refer to missing accessor {}",
                    p,
                    m,
                    indices.value()
                );
                primitive.indices = None;
            }
            if let Some(material) = primitive.material
                && material.value() >= materials
            {
                log::warn!(
                    "Primitive {} of mesh {} refers to missing material {}",
                    p,
                    m,
                    material.value()
                );
                primitive.material = None;
            }
        }
    }

    for (index, material) in root.materials.iter_mut().enumerate() {
        let pbr = &mut material.pbr_metallic_roughness;
        for (slot, info) in [
            ("baseColorTexture", &mut pbr.base_color_texture),
            ("metallicRoughnessTexture", &mut pbr.metallic_roughness_texture),
            ("emissiveTexture", &mut material.emissive_texture),
        ] {
            if let Some(texture) = info.as_ref()
                && !usable(texture.index.value())
            {
                log::warn!("Material {}: {} is not available", index, slot);
                *info = None;
            }
        }
        if let Some(texture) = &material.normal_texture
            && !usable(texture.index.value())
        {
            log::warn!("Material {}: normalTexture is not available", index);
            material.normal_texture = None;
        }
        if let Some(texture) = &material.occlusion_texture
            && !usable(texture.index.value())
        {
            log::warn!("Material {}: occlusionTexture is not available", index);
            material.occlusion_texture = None;
        }
    }
    tolerated
}

/// Parses a document whose external buffers are given in document order.
pub fn parse(data: &[u8], buffers: Vec<Vec<u8>>) -> Result<GeometryBuffer, ParseError> {
    let gltf = parse_document(data)?;
    from_document(
        &gltf,
        &GltfSources {
            buffers,
            images: Vec::new(),
        },
    )
}

pub fn from_document(gltf: &Gltf, sources: &GltfSources) -> Result<GeometryBuffer, ParseError> {
    let mut geometry = GeometryBuffer::default();
    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of mesh {}: mode {:?} is not supported",
                    primitive.index(),
                    mesh.index(),
                    primitive.mode()
                );
                continue;
            }
            let Some(mut part) = decode_primitive(gltf, sources, &primitive)? else {
                log::warn!(
                    "Skipping primitive {} of mesh {}: no POSITION attribute",
                    primitive.index(),
                    mesh.index()
                );
                continue;
            };

            let pbr = primitive.material().pbr_metallic_roughness();
            let slots = [
                (BASE_COLOR_SLOT, pbr.base_color_texture()),
                (METALLIC_ROUGHNESS_SLOT, pbr.metallic_roughness_texture()),
            ];
            for (slot, info) in slots {
                if geometry.texture(slot).is_some() {
                    continue;
                }
                match info {
                    Some(info) => {
                        if let Some(texture) = load_image(gltf, sources, &info.texture().source())
                        {
                            part.textures.push(TextureBinding {
                                slot,
                                texture: Arc::new(texture),
                            });
                        }
                    }
                    None => log::debug!(
                        "Primitive {} of mesh {} provides no texture for slot {}",
                        primitive.index(),
                        mesh.index(),
                        slot
                    ),
                }
            }
            geometry.append(part);
        }
    }
    geometry.validate()?;
    Ok(geometry)
}

fn decode_primitive(
    gltf: &Gltf,
    sources: &GltfSources,
    primitive: &gltf::Primitive<'_>,
) -> Result<Option<GeometryBuffer>, ParseError> {
    let Some(positions) = primitive.get(&Semantic::Positions) else {
        return Ok(None);
    };
    expect_type(&positions, "POSITION", Dimensions::Vec3, |t, _| t == DataType::F32)?;
    let vertices = positions.count();
    let mut part = GeometryBuffer {
        positions: decode_floats(gltf, sources, &positions)?,
        ..Default::default()
    };

    if let Some(normals) = primitive.get(&Semantic::Normals) {
        expect_type(&normals, "NORMAL", Dimensions::Vec3, |t, _| t == DataType::F32)?;
        expect_count(&normals, "NORMAL", vertices)?;
        part.normals = decode_floats(gltf, sources, &normals)?;
    }

    let tex_coords = primitive
        .attributes()
        .filter_map(|(semantic, accessor)| match semantic {
            Semantic::TexCoords(set) => Some((set, accessor)),
            _ => None,
        })
        .min_by_key(|(set, _)| *set);
    if let Some((_, tex_coords)) = tex_coords {
        expect_type(&tex_coords, "TEXCOORD", Dimensions::Vec2, |t, normalized| {
            t == DataType::F32 || (normalized && matches!(t, DataType::U8 | DataType::U16))
        })?;
        expect_count(&tex_coords, "TEXCOORD", vertices)?;
        part.tex_coords = decode_floats(gltf, sources, &tex_coords)?;
    }

    part.indices = match primitive.indices() {
        Some(indices) => {
            if !matches!(indices.data_type(), DataType::U8 | DataType::U16 | DataType::U32)
                || indices.dimensions() != Dimensions::Scalar
            {
                return Err(ParseError::UnsupportedIndexType {
                    accessor: indices.index(),
                    component_type: gl_enum(indices.data_type()),
                });
            }
            decode(gltf, sources, &indices, read_index)?
        }
        None => (0..vertices as u32).collect(),
    };
    if let Some(&index) = part.indices.iter().find(|&&i| i as usize >= vertices) {
        return Err(ParseError::VertexIndexOutOfRange { index, vertices });
    }
    Ok(Some(part))
}

fn expect_type(
    accessor: &Accessor<'_>,
    semantic: &'static str,
    dimensions: Dimensions,
    component: impl Fn(DataType, bool) -> bool,
) -> Result<(), ParseError> {
    if accessor.dimensions() == dimensions
        && component(accessor.data_type(), accessor.normalized())
    {
        return Ok(());
    }
    Err(ParseError::UnexpectedAccessorType {
        accessor: accessor.index(),
        semantic,
        found: format!("{:?} {:?}", accessor.data_type(), accessor.dimensions()),
    })
}

fn expect_count(
    accessor: &Accessor<'_>,
    semantic: &'static str,
    expected: usize,
) -> Result<(), ParseError> {
    if accessor.count() == expected {
        Ok(())
    } else {
        Err(ParseError::AttributeCountMismatch {
            semantic,
            expected,
            found: accessor.count(),
        })
    }
}

/// The byte region an accessor reads from, starting at its first element.
struct Region<'a> {
    bytes: &'a [u8],
    stride: usize,
}

fn view_payload<'a>(
    gltf: &'a Gltf,
    sources: &'a GltfSources,
    view: &gltf::buffer::View<'_>,
) -> Result<&'a [u8], ParseError> {
    let buffer = view.buffer();
    match buffer.source() {
        gltf::buffer::Source::Bin => gltf.blob.as_deref(),
        gltf::buffer::Source::Uri(_) => sources.buffers.get(buffer.index()).map(Vec::as_slice),
    }
    .ok_or(ParseError::MissingBuffer {
        index: buffer.index(),
    })
}

/// `needed` bytes starting `offset` bytes into `view`, checked against the view and
/// the buffer payload behind it.
fn view_slice<'a>(
    gltf: &'a Gltf,
    sources: &'a GltfSources,
    view: &gltf::buffer::View<'_>,
    offset: usize,
    needed: usize,
    component_size: usize,
    accessor: usize,
) -> Result<&'a [u8], ParseError> {
    let payload = view_payload(gltf, sources, view)?;
    let start = view.offset() + offset;
    let view_end = view.offset() + view.length();
    if offset > view.length() {
        return Err(ParseError::AccessorOutOfBounds {
            accessor,
            end: start,
            available: view_end,
        });
    }
    let length = view.length() - offset;
    if start % component_size != 0 || length % component_size != 0 {
        return Err(ParseError::Misaligned {
            accessor,
            offset: start,
            length,
            component_size,
        });
    }
    if needed > length {
        return Err(ParseError::AccessorOutOfBounds {
            accessor,
            end: start + needed,
            available: view_end,
        });
    }
    if start + needed > payload.len() {
        return Err(ParseError::AccessorOutOfBounds {
            accessor,
            end: start + needed,
            available: payload.len(),
        });
    }
    Ok(&payload[start..start + needed])
}

fn region<'a>(
    gltf: &'a Gltf,
    sources: &'a GltfSources,
    accessor: &Accessor<'_>,
) -> Result<Option<Region<'a>>, ParseError> {
    let Some(view) = accessor.view() else {
        return Ok(None);
    };
    let component_size = accessor.data_type().size();
    let element_size = component_size * accessor.dimensions().multiplicity();
    let stride = view.stride().unwrap_or(element_size);
    let needed = match accessor.count() {
        0 => 0,
        count => (count - 1) * stride + element_size,
    };
    let bytes = view_slice(
        gltf,
        sources,
        &view,
        accessor.offset(),
        needed,
        component_size,
        accessor.index(),
    )?;
    Ok(Some(Region { bytes, stride }))
}

/// Decodes every component of an accessor, then applies its sparse substitutions.
/// An accessor without a buffer view starts out as zeros.
fn decode<T: Clone + Default>(
    gltf: &Gltf,
    sources: &GltfSources,
    accessor: &Accessor<'_>,
    read: impl Fn(DataType, bool, &[u8]) -> T,
) -> Result<Vec<T>, ParseError> {
    let data_type = accessor.data_type();
    let normalized = accessor.normalized();
    let components = accessor.dimensions().multiplicity();
    let component_size = data_type.size();
    let total = accessor.count() * components;

    let mut values = match region(gltf, sources, accessor)? {
        None => vec![T::default(); total],
        Some(region) => {
            let mut values = Vec::with_capacity(total);
            for element in 0..accessor.count() {
                let base = element * region.stride;
                for component in 0..components {
                    let at = base + component * component_size;
                    values.push(read(
                        data_type,
                        normalized,
                        &region.bytes[at..at + component_size],
                    ));
                }
            }
            values
        }
    };

    if let Some(sparse) = accessor.sparse() {
        let count = sparse.count();
        let indices = sparse.indices();
        let index_type = match indices.index_type() {
            IndexType::U8 => DataType::U8,
            IndexType::U16 => DataType::U16,
            IndexType::U32 => DataType::U32,
        };
        let index_size = index_type.size();
        let index_bytes = view_slice(
            gltf,
            sources,
            &indices.view(),
            indices.offset(),
            count * index_size,
            index_size,
            accessor.index(),
        )?;
        let element_size = component_size * components;
        let substitutes = sparse.values();
        let value_bytes = view_slice(
            gltf,
            sources,
            &substitutes.view(),
            substitutes.offset(),
            count * element_size,
            component_size,
            accessor.index(),
        )?;
        for n in 0..count {
            let index = read_index(index_type, false, &index_bytes[n * index_size..]);
            if index as usize >= accessor.count() {
                return Err(ParseError::SparseIndexOutOfRange {
                    accessor: accessor.index(),
                    index,
                    count: accessor.count(),
                });
            }
            for component in 0..components {
                let at = n * element_size + component * component_size;
                values[index as usize * components + component] =
                    read(data_type, normalized, &value_bytes[at..at + component_size]);
            }
        }
        log::debug!(
            "Applied {} sparse values to accessor {}",
            count,
            accessor.index()
        );
    }
    Ok(values)
}

fn decode_floats(
    gltf: &Gltf,
    sources: &GltfSources,
    accessor: &Accessor<'_>,
) -> Result<Vec<f32>, ParseError> {
    decode(gltf, sources, accessor, read_float)
}

fn read_float(data_type: DataType, normalized: bool, bytes: &[u8]) -> f32 {
    match data_type {
        DataType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        DataType::U8 if normalized => bytes[0] as f32 / 255.0,
        DataType::U16 if normalized => {
            u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0
        }
        DataType::I8 if normalized => (bytes[0] as i8 as f32 / 127.0).max(-1.0),
        DataType::I16 if normalized => {
            (i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32767.0).max(-1.0)
        }
        DataType::U8 => bytes[0] as f32,
        DataType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
        DataType::I8 => bytes[0] as i8 as f32,
        DataType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
        DataType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
    }
}

fn read_index(data_type: DataType, _normalized: bool, bytes: &[u8]) -> u32 {
    match data_type {
        DataType::U8 => bytes[0] as u32,
        DataType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
        _ => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// The OpenGL enum a component type is written as in GLTF JSON.
pub fn gl_enum(data_type: DataType) -> u32 {
    match data_type {
        DataType::I8 => 5120,
        DataType::U8 => 5121,
        DataType::I16 => 5122,
        DataType::U16 => 5123,
        DataType::U32 => 5125,
        DataType::F32 => 5126,
    }
}

/// Decodes a material image. Missing or undecodable images only log a warning.
fn load_image(
    gltf: &Gltf,
    sources: &GltfSources,
    image: &gltf::Image<'_>,
) -> Option<TextureData> {
    let name = image
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("image {}", image.index()));
    let (bytes, mime_type) = match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let bytes = view_payload(gltf, sources, &view).ok().and_then(|payload| {
                payload.get(view.offset()..view.offset() + view.length())
            });
            (bytes, Some(mime_type))
        }
        gltf::image::Source::Uri { mime_type, .. } => (
            sources
                .images
                .get(image.index())
                .and_then(|bytes| bytes.as_deref()),
            mime_type,
        ),
    };
    let Some(bytes) = bytes else {
        log::warn!("Texture `{}` has no image data", name);
        return None;
    };
    match decode_texture(bytes, &name, mime_type) {
        Ok(texture) => Some(texture),
        Err(e) => {
            log::warn!("Texture `{}` is ignored: {}", name, e);
            None
        }
    }
}
