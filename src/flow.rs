//! Flow control and the frame loop.
//!
//! A "flow" is a piece of application logic that mutates the scene over time:
//! it is initialised once, updated every frame and ticked at a fixed interval.
//! The [`FrameLoop`] owns the scene, drives the flows and renders one frame at a
//! time into a [`RenderBackend`]. It is driven by the host (a
//! `requestAnimationFrame` callback, a native loop or a test), so the engine core
//! holds no global state.
//!
//! # Lifecycle
//!
//! Each frame:
//! 1. Measure the time since the last frame
//! 2. Call `on_update` on all flows
//! 3. Call `on_tick` on all flows if the tick interval has elapsed
//! 4. Hand the active camera's view and projection to the backend
//! 5. Traverse the scene and submit every entity

use cgmath::{Matrix4, SquareMatrix};
use instant::{Duration, Instant};

use crate::{
    context::EngineConfig,
    data_structures::scene_graph::{EntityId, FrameStats, Scene},
    errors::{DegenerateTransform, Result, TreeError},
    render::RenderBackend,
};

/// Application logic attached to a [`FrameLoop`].
pub trait SceneFlow {
    /// Called once when the flow is added; build the initial scene here.
    fn on_init(&mut self, _scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    /// Called every frame with the elapsed time `dt`. Use for animations.
    fn on_update(&mut self, scene: &mut Scene, dt: Duration);

    /// Called every `tick_duration` for discrete logic that need not run every frame.
    fn on_tick(&mut self, _scene: &mut Scene) {}
}

pub struct FrameLoop {
    scene: Scene,
    flows: Vec<Box<dyn SceneFlow>>,
    active_camera: Option<EntityId>,
    tick_duration: Duration,
    time_since_tick: Duration,
    last_time: Instant,
}

impl FrameLoop {
    pub fn new(scene: Scene, tick_duration: Duration) -> Self {
        Self {
            scene,
            flows: Vec::new(),
            active_camera: None,
            tick_duration,
            time_since_tick: Duration::from_millis(0),
            last_time: Instant::now(),
        }
    }

    pub fn from_config(scene: Scene, config: &EngineConfig) -> Self {
        Self::new(scene, config.tick_duration())
    }

    /// Initialises `flow` against the scene and adds it to the loop.
    pub fn add_flow(&mut self, mut flow: Box<dyn SceneFlow>) -> Result<()> {
        flow.on_init(&mut self.scene)?;
        self.flows.push(flow);
        Ok(())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    pub fn active_camera(&self) -> Option<EntityId> {
        self.active_camera
    }

    /// Makes `camera` the camera whose view and projection frame the scene.
    pub fn set_active_camera(&mut self, camera: EntityId) -> Result<()> {
        match self.scene.entity(camera) {
            Some(entity) if entity.as_camera().is_some() => {
                self.active_camera = Some(camera);
                Ok(())
            }
            _ => Err(TreeError::UnknownEntity(camera).into()),
        }
    }

    pub fn set_tick_duration(&mut self, tick_duration: Duration) {
        self.tick_duration = tick_duration;
    }

    /// Advances the flows by `dt`. Returns true when a tick fired.
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.time_since_tick += dt;
        for flow in self.flows.iter_mut() {
            flow.on_update(&mut self.scene, dt);
        }
        if self.time_since_tick < self.tick_duration {
            return false;
        }
        for flow in self.flows.iter_mut() {
            flow.on_tick(&mut self.scene);
        }
        self.time_since_tick = Duration::from_millis(0);
        true
    }

    /// Renders the scene once. Without an active camera view and projection are the identity.
    pub fn frame(&mut self, backend: &mut dyn RenderBackend) -> Result<FrameStats> {
        let (view, projection) = self.camera_matrices()?;
        backend.begin_frame(&view, &projection);
        let stats = self.scene.render(&Matrix4::identity(), backend);
        backend.end_frame();
        stats
    }

    /// Measures the time since the previous call, then ticks and renders.
    pub fn run_frame(&mut self, backend: &mut dyn RenderBackend) -> Result<FrameStats> {
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();
        self.tick(dt);
        self.frame(backend)
    }

    fn camera_matrices(&self) -> Result<(Matrix4<f32>, Matrix4<f32>)> {
        let Some(id) = self.active_camera else {
            return Ok((Matrix4::identity(), Matrix4::identity()));
        };
        let camera = self
            .scene
            .entity(id)
            .and_then(|entity| entity.as_camera())
            .ok_or(TreeError::UnknownEntity(id))?;
        let mut view = camera.view_matrix()?;
        if let Some(node) = self.scene.entity_node(id) {
            let world = self.scene.compose_world(node)?;
            view = view * world.invert().ok_or(DegenerateTransform::SingularMatrix)?;
        }
        Ok((view, camera.projection_matrix()))
    }
}
