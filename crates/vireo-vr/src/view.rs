//! Per-eye view and projection transforms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::TrackingRuntime;
use crate::transform::{Matrix4, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left = 0,
    Right = 1,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Eye::Left => "left",
            Eye::Right => "right",
        })
    }
}

/// Everything a renderer needs per eye for one frame.
///
/// All per-eye fields are replaced together in [`EyeTransforms::compute`],
/// so a reader never sees a projection from one frame next to a view from
/// another.
#[derive(Debug, Clone)]
pub struct EyeTransforms {
    near: f32,
    far: f32,
    eye_dist_scale: f32,
    eye_pass: Eye,
    view: [Matrix4; 2],
    eye_pos: [Vec4; 2],
    head_to_eye: [Matrix4; 2],
    eye_to_head: [Matrix4; 2],
    eye_to_screen: [Matrix4; 2],
}

impl EyeTransforms {
    pub fn new(near: f32, far: f32, eye_dist_scale: f32) -> Self {
        Self {
            near,
            far,
            eye_dist_scale,
            eye_pass: Eye::Left,
            view: [Matrix4::IDENTITY; 2],
            eye_pos: [Vec4::new(0.0, 0.0, 0.0, 1.0); 2],
            head_to_eye: [Matrix4::IDENTITY; 2],
            eye_to_head: [Matrix4::IDENTITY; 2],
            eye_to_screen: [Matrix4::IDENTITY; 2],
        }
    }

    /// Query projections and eye offsets from the runtime with the current
    /// clip planes, then recompute.
    pub fn update(&mut self, head_pose: &Matrix4, view_hmd: &Matrix4, runtime: &dyn TrackingRuntime) {
        let projections = Eye::BOTH.map(|eye| runtime.projection(eye, self.near, self.far));
        let offsets = Eye::BOTH.map(|eye| runtime.head_to_eye(eye));
        self.compute(head_pose, view_hmd, projections, offsets);
    }

    /// Derive all per-eye transforms from the head pose, the head view and
    /// the runtime-provided projections and head-to-eye offsets.
    pub fn compute(
        &mut self,
        head_pose: &Matrix4,
        view_hmd: &Matrix4,
        projections: [Matrix4; 2],
        offsets: [Matrix4; 2],
    ) {
        for eye in Eye::BOTH {
            let i = eye.index();
            let mut head_to_eye = offsets[i];
            head_to_eye[12] *= self.eye_dist_scale;
            let eye_to_head = head_to_eye.inverse_rigid();

            self.head_to_eye[i] = head_to_eye;
            self.eye_to_head[i] = eye_to_head;
            self.view[i] = eye_to_head * *view_hmd;
            self.eye_pos[i] = *head_pose * head_to_eye.pos();
            self.eye_to_screen[i] = projections[i];
        }
    }

    /// Collapse both eye views onto the head view. Used before a session
    /// exists.
    pub fn reset_views(&mut self, view_hmd: &Matrix4) {
        self.view = [*view_hmd; 2];
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Takes effect on the next pose update.
    pub fn set_near(&mut self, near: f32) {
        self.near = near;
    }

    /// Takes effect on the next pose update.
    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    pub fn eye_dist_scale(&self) -> f32 {
        self.eye_dist_scale
    }

    /// Takes effect on the next pose update.
    pub fn set_eye_dist_scale(&mut self, scale: f32) {
        self.eye_dist_scale = scale;
    }

    pub fn eye_pass(&self) -> Eye {
        self.eye_pass
    }

    pub fn set_eye_pass(&mut self, eye: Eye) {
        self.eye_pass = eye;
    }

    pub fn view(&self, eye: Eye) -> &Matrix4 {
        &self.view[eye.index()]
    }

    pub fn eye_pos(&self, eye: Eye) -> Vec4 {
        self.eye_pos[eye.index()]
    }

    pub fn head_to_eye(&self, eye: Eye) -> &Matrix4 {
        &self.head_to_eye[eye.index()]
    }

    pub fn eye_to_head(&self, eye: Eye) -> &Matrix4 {
        &self.eye_to_head[eye.index()]
    }

    pub fn eye_to_screen(&self, eye: Eye) -> &Matrix4 {
        &self.eye_to_screen[eye.index()]
    }

    /// Symmetric projection for monoscopic rendering: the left projection
    /// with its horizontal skew removed.
    pub fn head_to_screen(&self) -> Matrix4 {
        let mut m = self.eye_to_screen[Eye::Left.index()];
        m[8] = 0.0;
        m
    }
}
