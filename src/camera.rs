//! Camera entity: a look-at view plus a projection.
//!
//! The view matrix is derived from `position`, `target` and `up` and cached until
//! one of them changes. Projection and view are handed to the render backend once
//! per frame and are never folded into node matrices.

use std::cell::Cell;

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3};

use crate::errors::{DegenerateTransform, Result};

/// Below this length a direction is considered zero.
const EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective {
        fovy: Rad<f32>,
        aspect: f32,
        znear: f32,
        zfar: f32,
    },
    /// Parallel projection with the given half extents.
    Orthographic {
        half_width: f32,
        half_height: f32,
        znear: f32,
        zfar: f32,
    },
}

impl Projection {
    pub fn perspective<F: Into<Rad<f32>>>(fovy: F, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self::Perspective {
            fovy: fovy.into(),
            aspect,
            znear,
            zfar,
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        match *self {
            Projection::Perspective {
                fovy,
                aspect,
                znear,
                zfar,
            } => cgmath::perspective(fovy, aspect, znear, zfar),
            Projection::Orthographic {
                half_width,
                half_height,
                znear,
                zfar,
            } => cgmath::ortho(
                -half_width,
                half_width,
                -half_height,
                half_height,
                znear,
                zfar,
            ),
        }
    }

    /// Updates the aspect ratio, keeping the vertical extent for parallel projections.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let ratio = width as f32 / height as f32;
        match self {
            Projection::Perspective { aspect, .. } => *aspect = ratio,
            Projection::Orthographic {
                half_width,
                half_height,
                ..
            } => *half_width = *half_height * ratio,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(Deg(45.0), 1.0, 0.1, 100.0)
    }
}

#[derive(Clone, Debug)]
pub struct Camera {
    position: Point3<f32>,
    target: Point3<f32>,
    up: Vector3<f32>,
    pub projection: Projection,
    view: Cell<Option<Matrix4<f32>>>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, V: Into<Vector3<f32>>>(
        position: P,
        target: P,
        up: V,
        projection: Projection,
    ) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: up.into(),
            projection,
            view: Cell::new(None),
        }
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn set_position<P: Into<Point3<f32>>>(&mut self, position: P) {
        self.position = position.into();
        self.view.set(None);
    }

    pub fn set_target<P: Into<Point3<f32>>>(&mut self, target: P) {
        self.target = target.into();
        self.view.set(None);
    }

    pub fn set_up<V: Into<Vector3<f32>>>(&mut self, up: V) {
        self.up = up.into();
        self.view.set(None);
    }

    /// Switches between perspective and parallel projection.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }

    /// Right-handed look-at view matrix; the target ends up on the negative Z axis.
    ///
    /// Fails when position and target coincide. An `up` vector that is zero or
    /// parallel to the view direction is replaced by world Y, or by world Z when
    /// the camera looks straight up or down.
    pub fn view_matrix(&self) -> Result<Matrix4<f32>> {
        if let Some(view) = self.view.get() {
            return Ok(view);
        }
        let direction = self.target - self.position;
        if direction.magnitude() < EPSILON {
            return Err(DegenerateTransform::ZeroLengthDirection.into());
        }
        let forward = direction.normalize();
        let up = stable_up(forward, self.up);
        let view = Matrix4::look_to_rh(self.position, forward, up);
        self.view.set(Some(view));
        Ok(view)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            (0.0, 0.0, 5.0),
            (0.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            Projection::default(),
        )
    }
}

fn stable_up(forward: Vector3<f32>, up: Vector3<f32>) -> Vector3<f32> {
    if up.magnitude() >= EPSILON && forward.cross(up.normalize()).magnitude() >= EPSILON {
        return up;
    }
    let fallback = if forward.y.abs() > 0.99 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    log::debug!(
        "Camera up {:?} is degenerate for direction {:?}, using {:?}",
        up,
        forward,
        fallback
    );
    fallback
}
