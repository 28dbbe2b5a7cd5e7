//! Byte fetching: the I/O side of asset loading.
//!
//! Parsers never touch the file system or the network. Everything they need is
//! fetched through a [`ByteFetcher`] first. [`AssetFetcher`] reads from an asset
//! directory on native targets and issues HTTP requests relative to the page
//! origin in the browser. [`MemoryFetcher`] serves bytes registered up front.

use std::{
    collections::HashMap,
    future::Future,
    io,
    path::{Component, Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::errors::{Error, Result};

/// `Send` on native targets, nothing on wasm where futures are single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + ?Sized> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSend for T {}

/// `Sync` on native targets, nothing on wasm.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSync: Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Sync + ?Sized> MaybeSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSync for T {}

pub trait ByteFetcher: MaybeSend + MaybeSync + 'static {
    /// Reads the complete resource at `path`. Failures are reported as [`Error::Io`].
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + MaybeSend;
}

/// Fetches assets below a root directory (native) or URL prefix (wasm).
#[derive(Clone, Debug)]
pub struct AssetFetcher {
    root: String,
}

impl AssetFetcher {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

impl Default for AssetFetcher {
    fn default() -> Self {
        Self::new("assets")
    }
}

/// `path` with `.` and `..` folded away, or `None` if it is absolute or climbs
/// above the directory it is relative to.
pub fn below_root(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

#[cfg(not(target_arch = "wasm32"))]
impl ByteFetcher for AssetFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let relative = below_root(path).ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path leaves the asset root"),
            )
        })?;
        let full_path = Path::new(&self.root).join(relative);
        log::debug!("Reading {}", full_path.display());
        tokio::fs::read(&full_path)
            .await
            .map_err(|e| Error::io(path, e))
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| Error::io(file_name, "no browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| Error::io(file_name, format!("{:?}", e)))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))
        .map_err(|e| Error::io(file_name, e))?;
    let relative = below_root(file_name)
        .ok_or_else(|| Error::io(file_name, "path leaves the asset root"))?;
    base.join(&relative.to_string_lossy())
        .map_err(|e| Error::io(file_name, e))
}

#[cfg(target_arch = "wasm32")]
impl ByteFetcher for AssetFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = format_url(&self.root, path)?;
        log::debug!("Requesting {}", url);
        let response = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::io(path, e))?;
        let bytes = response.bytes().await.map_err(|e| Error::io(path, e))?;
        Ok(bytes.to_vec())
    }
}

/// Serves bytes registered with [`insert`](Self::insert) and counts fetches.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(path.into(), bytes.into());
        self
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Number of successful and failed fetches so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ByteFetcher for MemoryFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files.get(path).cloned().ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "not registered in memory"),
            )
        })
    }
}

/// Resolves a URI referenced by an asset relative to the asset's own path.
///
/// A URI starting with `/` is taken relative to the asset root.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    if uri.contains("://") {
        return uri.to_string();
    }
    if let Some(rooted) = uri.strip_prefix('/') {
        return rooted.trim_start_matches('/').to_string();
    }
    match base.rfind('/') {
        Some(split) => format!("{}/{}", &base[..split], uri),
        None => uri.to_string(),
    }
}
