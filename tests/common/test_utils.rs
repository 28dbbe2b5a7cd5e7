#![allow(dead_code)]

use std::{io::Cursor, sync::Arc};

use iveri_ngin::{
    Vector3, Vector4,
    data_structures::geometry::GeometryBuffer,
};
use serde_json::{Value, json};

pub const EPSILON: f32 = 1e-4;

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

#[track_caller]
pub fn assert_vec3_eq(actual: Vector3<f32>, expected: [f32; 3]) {
    assert!(
        approx_eq(actual.x, expected[0])
            && approx_eq(actual.y, expected[1])
            && approx_eq(actual.z, expected[2]),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

#[track_caller]
pub fn assert_vec4_eq(actual: Vector4<f32>, expected: [f32; 4]) {
    assert!(
        approx_eq(actual.x, expected[0])
            && approx_eq(actual.y, expected[1])
            && approx_eq(actual.z, expected[2])
            && approx_eq(actual.w, expected[3]),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// A single triangle with positions, normals and texture coordinates.
pub fn triangle() -> Arc<GeometryBuffer> {
    Arc::new(GeometryBuffer {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        tex_coords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        indices: vec![0, 1, 2],
        textures: Vec::new(),
    })
}

pub const TRIANGLE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

/// Little-endian bytes of the positions of a unit triangle: 36 bytes.
pub fn triangle_positions() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// POSITION accessor over the first 36 bytes of `bufferView` 0.
pub fn position_accessor() -> Value {
    json!({
        "bufferView": 0,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3",
        "min": [0.0, 0.0, 0.0],
        "max": [1.0, 1.0, 0.0]
    })
}

/**
 * A document with one buffer (`uri`), the given views and accessors, and one mesh
 * made of `primitives`. View 0 and accessor 0 are expected to hold the triangle
 * positions.
 */
pub fn gltf_document(
    uri: &str,
    buffer_length: usize,
    views: Value,
    accessors: Value,
    primitives: Value,
) -> Value {
    json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "uri": uri, "byteLength": buffer_length }],
        "bufferViews": views,
        "accessors": accessors,
        "meshes": [{ "primitives": primitives }]
    })
}

/// A triangle document whose indices use `component_type` and live in `index_bytes`.
///
/// Returns the document and its buffer payload.
pub fn indexed_triangle(component_type: u32, index_bytes: &[u8], count: usize) -> (Value, Vec<u8>) {
    let mut buffer = triangle_positions();
    buffer.extend_from_slice(index_bytes);
    let document = gltf_document(
        "triangle.bin",
        buffer.len(),
        json!([
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": index_bytes.len() }
        ]),
        json!([
            position_accessor(),
            { "bufferView": 1, "componentType": component_type, "count": count, "type": "SCALAR" }
        ]),
        json!([{ "attributes": { "POSITION": 0 }, "indices": 1 }]),
    );
    (document, buffer)
}

pub fn to_bytes(document: &Value) -> Vec<u8> {
    serde_json::to_vec(document).expect("document serializes")
}

/// A `width` x `height` PNG filled with one colour.
pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encodes");
    bytes
}

/// Packs a JSON document and a binary chunk into a GLB container.
pub fn glb(document: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json = to_bytes(document);
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}
