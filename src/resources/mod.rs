use std::{path::Path, sync::Arc};

use crate::{
    data_structures::geometry::GeometryBuffer,
    errors::{Error, ParseError, Result},
    resources::{
        cache::ResourceCache,
        fetch::{ByteFetcher, resolve_relative},
        gltf_mesh::GltfSources,
    },
};

/**
 * This module contains all logic for loading meshes and textures from external files.
 *
 * Fetching and parsing are kept apart: a [`ByteFetcher`] provides the bytes, the
 * parsers in [`obj`] and [`gltf_mesh`] turn them into a [`GeometryBuffer`], and the
 * [`AssetManager`] ties both to a [`ResourceCache`] so every asset is parsed once.
 */
pub mod cache;
pub mod fetch;
pub mod gltf_mesh;
pub mod obj;
pub mod texture;

pub struct AssetManager<F: ByteFetcher> {
    fetcher: Arc<F>,
    meshes: ResourceCache<GeometryBuffer>,
}

impl<F: ByteFetcher> Clone for AssetManager<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            meshes: self.meshes.clone(),
        }
    }
}

impl<F: ByteFetcher> AssetManager<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            meshes: ResourceCache::new(),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn meshes(&self) -> &ResourceCache<GeometryBuffer> {
        &self.meshes
    }

    /// Loads the mesh stored under `name`, parsing it on first use only.
    ///
    /// The format is chosen by extension: `.obj`, `.gltf` or `.glb`.
    pub async fn load_mesh(&self, name: &str) -> Result<Arc<GeometryBuffer>> {
        let fetcher = self.fetcher.clone();
        let asset = name.to_string();
        self.meshes
            .get_or_load(name, move || async move {
                load_geometry(fetcher.as_ref(), &asset).await
            })
            .await
    }
}

/// Fetches and parses a mesh without caching it.
pub async fn load_geometry<F: ByteFetcher>(fetcher: &F, name: &str) -> Result<GeometryBuffer> {
    let extension = Path::new(name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    let geometry = match extension.as_deref() {
        Some("obj") => {
            let bytes = fetcher.fetch(name).await?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| Error::parse(name, ParseError::InvalidUtf8))?;
            obj::parse(text).map_err(|e| Error::parse(name, e))?
        }
        Some("gltf") | Some("glb") => load_gltf(fetcher, name).await?,
        _ => {
            return Err(Error::parse(
                name,
                ParseError::UnsupportedFormat(extension.unwrap_or_default()),
            ));
        }
    };
    log::info!(
        "Loaded `{}`: {} vertices, {} triangles, {} textures",
        name,
        geometry.vertex_count(),
        geometry.triangle_count(),
        geometry.textures.len()
    );
    Ok(geometry)
}

async fn load_gltf<F: ByteFetcher>(fetcher: &F, name: &str) -> Result<GeometryBuffer> {
    let data = fetcher.fetch(name).await?;
    let gltf = gltf_mesh::parse_document(&data).map_err(|e| Error::parse(name, e))?;

    let buffer_uris: Vec<Option<String>> = gltf
        .buffers()
        .map(|buffer| match buffer.source() {
            gltf::buffer::Source::Bin => None,
            gltf::buffer::Source::Uri(uri) => Some(uri.to_string()),
        })
        .collect();
    let image_uris: Vec<Option<String>> = gltf
        .images()
        .map(|image| match image.source() {
            gltf::image::Source::View { .. } => None,
            gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
        })
        .collect();

    let mut sources = GltfSources::default();
    for uri in buffer_uris {
        let payload = match uri {
            None => Vec::new(),
            Some(uri) if uri.starts_with("data:") => {
                return Err(Error::parse(name, ParseError::UnsupportedUri(uri)));
            }
            Some(uri) => fetcher.fetch(&resolve_relative(name, &uri)).await?,
        };
        sources.buffers.push(payload);
    }
    for uri in image_uris {
        let bytes = match uri {
            None => None,
            Some(uri) if uri.starts_with("data:") => {
                log::warn!("Embedded data uri images in `{}` are not supported", name);
                None
            }
            Some(uri) => match fetcher.fetch(&resolve_relative(name, &uri)).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!("Image of `{}` is not available: {}", name, e);
                    None
                }
            },
        };
        sources.images.push(bytes);
    }

    gltf_mesh::from_document(&gltf, &sources).map_err(|e| Error::parse(name, e))
}
