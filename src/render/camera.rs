//! Orbit camera: target + yaw/pitch/distance spherical state with damped
//! pointer input, and the view/projection matrices the picker unprojects
//! through.

use glam::{Mat4, Vec3};

const MIN_PITCH: f32 = -1.54;
const MAX_PITCH: f32 = 1.54;
const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 500.0;

/// Per-second exponential decay rate for orbit inertia.
const DAMPING_RATE: f32 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    aspect: f32,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    /// Default pose: eye (2, 2, 5) looking at the origin, 75° vertical
    /// field of view.
    pub fn new() -> Self {
        Self::from_eye_target(Vec3::new(2.0, 2.0, 5.0), Vec3::ZERO)
    }

    pub fn from_eye_target(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let distance = offset.length().max(MIN_DISTANCE);
        let dir = offset / distance;
        Self {
            target,
            yaw: dir.z.atan2(dir.x),
            pitch: dir.y.asin().clamp(MIN_PITCH, MAX_PITCH),
            distance,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            aspect: 1.0,
            fov_y: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn position(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            cos_pitch * self.yaw.cos(),
            self.pitch.sin(),
            cos_pitch * self.yaw.sin(),
        ) * self.distance;
        self.target + offset
    }

    /// Feed pointer-drag deltas into the orbit inertia.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw_velocity += yaw_delta;
        self.pitch_velocity += pitch_delta;
    }

    /// Scroll zoom; positive steps move the eye closer.
    pub fn zoom(&mut self, steps: f32) {
        let factor = 0.9f32.powf(steps);
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Advance damping/inertia; called once per frame by the render loop.
    pub fn update(&mut self, dt: f32) {
        self.yaw += self.yaw_velocity;
        self.pitch = (self.pitch + self.pitch_velocity).clamp(MIN_PITCH, MAX_PITCH);
        wrap_angle(&mut self.yaw);

        let decay = (-DAMPING_RATE * dt.max(0.0)).exp();
        self.yaw_velocity *= decay;
        self.pitch_velocity *= decay;
        if self.yaw_velocity.abs() < 1e-5 {
            self.yaw_velocity = 0.0;
        }
        if self.pitch_velocity.abs() < 1e-5 {
            self.pitch_velocity = 0.0;
        }
    }

    /// Re-center on a new target, preserving orientation and distance.
    pub fn frame_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-6), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

fn wrap_angle(angle: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        *angle = (*angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_is_preserved() {
        let camera = OrbitCamera::new();
        let position = camera.position();
        assert!((position - Vec3::new(2.0, 2.0, 5.0)).length() < 1e-4);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn aspect_is_exactly_width_over_height() {
        let mut camera = OrbitCamera::new();
        camera.set_aspect(1920.0, 1080.0);
        assert_eq!(camera.aspect(), 1920.0 / 1080.0);
        // Zero-sized viewports must not poison the aspect ratio.
        camera.set_aspect(0.0, 1080.0);
        assert_eq!(camera.aspect(), 1920.0 / 1080.0);
    }

    #[test]
    fn inertia_decays_to_rest() {
        let mut camera = OrbitCamera::new();
        camera.rotate(0.2, 0.1);
        for _ in 0..240 {
            camera.update(1.0 / 60.0);
        }
        assert_eq!(camera.yaw_velocity, 0.0);
        assert_eq!(camera.pitch_velocity, 0.0);
        assert!(camera.position().is_finite());
    }

    #[test]
    fn pitch_never_reaches_the_poles() {
        let mut camera = OrbitCamera::new();
        camera.rotate(0.0, 100.0);
        camera.update(1.0 / 60.0);
        assert!(camera.pitch <= MAX_PITCH);
        let up_dot = (camera.position() - camera.target).normalize().dot(Vec3::Y);
        assert!(up_dot < 1.0);
    }

    #[test]
    fn frame_target_preserves_orientation_and_distance() {
        let mut camera = OrbitCamera::new();
        let (yaw, pitch, distance) = (camera.yaw, camera.pitch, camera.distance);
        camera.frame_target(Vec3::new(3.0, 1.0, -2.0));
        assert_eq!(camera.yaw, yaw);
        assert_eq!(camera.pitch, pitch);
        assert_eq!(camera.distance, distance);
        assert_eq!(camera.target, Vec3::new(3.0, 1.0, -2.0));
    }

    #[test]
    fn zoom_clamps_distance() {
        let mut camera = OrbitCamera::new();
        camera.zoom(1000.0);
        assert_eq!(camera.distance(), MIN_DISTANCE);
        camera.zoom(-10000.0);
        assert_eq!(camera.distance(), MAX_DISTANCE);
    }

    #[test]
    fn view_projection_is_finite() {
        let mut camera = OrbitCamera::new();
        camera.set_aspect(1280.0, 720.0);
        let vp = camera.view_projection();
        assert!(vp.to_cols_array().iter().all(|value| value.is_finite()));
    }
}
