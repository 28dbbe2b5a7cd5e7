//! Wavefront OBJ parsing.
//!
//! Only the geometry statements are read: `v`, `vt`, `vn` and `f`. Each face
//! vertex is a `position/texcoord/normal` triplet. Vertices are deduplicated by
//! the literal triplet text, so `1/2/3` appearing in several faces becomes one
//! vertex, while `1/2/3` and `1//3` become two.

use std::collections::HashMap;

use crate::{data_structures::geometry::GeometryBuffer, errors::ParseError};

/// Attribute arrays as declared in the file, addressed by 1-based OBJ indices.
#[derive(Default)]
struct Declared {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

/// Emitted, deduplicated vertices.
#[derive(Default)]
struct Emitted<'a> {
    lookup: HashMap<&'a str, u32>,
    positions: Vec<f32>,
    tex_coords: Vec<Option<[f32; 2]>>,
    normals: Vec<Option<[f32; 3]>>,
}

pub fn parse(text: &str) -> Result<GeometryBuffer, ParseError> {
    let mut declared = Declared::default();
    let mut emitted = Emitted::default();
    let mut indices = Vec::new();
    let mut face = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = match raw.find('#') {
            Some(comment) => &raw[..comment],
            None => raw,
        };
        let mut tokens = content.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "v" => {
                let [x, y, z] = read_floats::<3>(&mut tokens, line, "v", 3)?;
                declared.positions.push([x, y, z]);
            }
            "vt" => {
                // `w` is ignored and `v` defaults to 0
                let [u, v] = read_floats::<2>(&mut tokens, line, "vt", 1)?;
                declared.tex_coords.push([u, v]);
            }
            "vn" => {
                let [x, y, z] = read_floats::<3>(&mut tokens, line, "vn", 3)?;
                declared.normals.push([x, y, z]);
            }
            "f" => {
                face.clear();
                for triplet in tokens {
                    face.push(emitted.resolve(triplet, &declared, line)?);
                }
                if face.len() < 3 {
                    return Err(ParseError::DegenerateFace {
                        line,
                        vertices: face.len(),
                    });
                }
                for i in 1..face.len() - 1 {
                    indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            other => log::trace!("Ignoring OBJ statement `{}` on line {}", other, line),
        }
    }

    let geometry = GeometryBuffer {
        positions: emitted.positions,
        normals: fill_missing(emitted.normals, "normals"),
        tex_coords: fill_missing(emitted.tex_coords, "texture coordinates"),
        indices,
        textures: Vec::new(),
    };
    geometry.validate()?;
    Ok(geometry)
}

impl<'a> Emitted<'a> {
    fn resolve(
        &mut self,
        triplet: &'a str,
        declared: &Declared,
        line: usize,
    ) -> Result<u32, ParseError> {
        if let Some(&index) = self.lookup.get(triplet) {
            return Ok(index);
        }
        let mut parts = triplet.split('/');
        let position = match parts.next() {
            Some(part) if !part.is_empty() => {
                lookup(&declared.positions, part, "position", triplet, line)?
            }
            _ => {
                return Err(ParseError::InvalidIndex {
                    line,
                    token: triplet.to_string(),
                });
            }
        };
        let tex_coord = match parts.next() {
            Some(part) if !part.is_empty() => Some(lookup(
                &declared.tex_coords,
                part,
                "texture coordinate",
                triplet,
                line,
            )?),
            _ => None,
        };
        let normal = match parts.next() {
            Some(part) if !part.is_empty() => {
                Some(lookup(&declared.normals, part, "normal", triplet, line)?)
            }
            _ => None,
        };
        if parts.next().is_some() {
            return Err(ParseError::InvalidIndex {
                line,
                token: triplet.to_string(),
            });
        }

        let index = self.tex_coords.len() as u32;
        self.positions.extend_from_slice(&position);
        self.tex_coords.push(tex_coord);
        self.normals.push(normal);
        self.lookup.insert(triplet, index);
        Ok(index)
    }
}

fn lookup<T: Copy>(
    values: &[T],
    part: &str,
    kind: &'static str,
    triplet: &str,
    line: usize,
) -> Result<T, ParseError> {
    let index: usize = part.parse().map_err(|_| ParseError::InvalidIndex {
        line,
        token: triplet.to_string(),
    })?;
    if index == 0 {
        return Err(ParseError::InvalidIndex {
            line,
            token: triplet.to_string(),
        });
    }
    values
        .get(index - 1)
        .copied()
        .ok_or(ParseError::IndexOutOfRange {
            line,
            kind,
            index,
            len: values.len(),
        })
}

fn read_floats<'t, const N: usize>(
    tokens: &mut impl Iterator<Item = &'t str>,
    line: usize,
    keyword: &'static str,
    required: usize,
) -> Result<[f32; N], ParseError> {
    let mut values = [0.0; N];
    for (i, value) in values.iter_mut().enumerate() {
        match tokens.next() {
            Some(token) => {
                *value = token.parse().map_err(|_| ParseError::InvalidNumber {
                    line,
                    token: token.to_string(),
                })?;
            }
            None if i < required => {
                return Err(ParseError::MissingComponents {
                    line,
                    keyword,
                    expected: required,
                });
            }
            None => break,
        }
    }
    Ok(values)
}

/// Flattens an optional per-vertex attribute. Empty when no vertex has it,
/// zero-filled where only some vertices have it.
fn fill_missing<const N: usize>(values: Vec<Option<[f32; N]>>, name: &str) -> Vec<f32> {
    let present = values.iter().filter(|v| v.is_some()).count();
    if present == 0 {
        return Vec::new();
    }
    if present < values.len() {
        log::debug!(
            "{} of {} vertices have no {}, zero-filling",
            values.len() - present,
            values.len(),
            name
        );
    }
    values
        .into_iter()
        .flat_map(|value| value.unwrap_or([0.0; N]))
        .collect()
}
