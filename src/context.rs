//! Engine configuration and the shared context built from it.
//!
//! The context owns what every flow needs but no single scene should: the asset
//! manager (and through it the resource cache) and the configured defaults.

use cgmath::Deg;
use instant::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    camera::{Camera, Projection},
    errors::{Error, Result},
    resources::{
        AssetManager,
        fetch::{AssetFetcher, ByteFetcher},
    },
};

/// Default camera placement and lens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 5.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fovy: 45.0,
            aspect: 1.0,
            znear: 0.1,
            zfar: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory (native) or URL path below the page origin (wasm) assets are read from.
    pub asset_root: String,
    pub tick_duration_millis: u64,
    /// A `log` level filter such as `info` or `debug`.
    pub log_level: String,
    pub camera: CameraConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".to_string(),
            tick_duration_millis: 500,
            log_level: "info".to_string(),
            camera: CameraConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON configuration. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::from_json_str(&json)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_millis)
    }
}

/// Installs the platform logger. `level` is used unless `RUST_LOG` says otherwise.
pub fn init_logging(level: &str) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let env = env_logger::Env::default().default_filter_or(level);
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        let level = level.parse().unwrap_or(log::Level::Info);
        if let Err(e) = console_log::init_with_level(level) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }
}

pub struct Context<F: ByteFetcher = AssetFetcher> {
    pub config: EngineConfig,
    assets: AssetManager<F>,
}

impl Context<AssetFetcher> {
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = AssetFetcher::new(config.asset_root.clone());
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: ByteFetcher> Context<F> {
    pub fn with_fetcher(config: EngineConfig, fetcher: F) -> Self {
        log::debug!("Creating context with asset root `{}`", config.asset_root);
        Self {
            config,
            assets: AssetManager::new(fetcher),
        }
    }

    pub fn assets(&self) -> &AssetManager<F> {
        &self.assets
    }

    /// A camera placed as configured.
    pub fn default_camera(&self) -> Camera {
        let camera = &self.config.camera;
        Camera::new(
            camera.position,
            camera.target,
            camera.up,
            Projection::perspective(Deg(camera.fovy), camera.aspect, camera.znear, camera.zfar),
        )
    }
}
