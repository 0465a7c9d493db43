// Hiking camera with three modes, switched with the 1/2/3 keys:
//   - Overview:     fixed eye above the terrain's south edge, looking at the centre
//   - Follow:       trails the hiker at a fixed offset; mouse wheel changes distance
//   - FirstPerson:  eye at the hiker's head, mouse looks around
//
// Framing derives from the terrain extents and max height, so any heightmap
// size and scale gets a sensible view without tuning.

use glam::{Mat4, Vec2, Vec3};
use super::input::InputState;
use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Overview,
    Follow,
    FirstPerson,
}

impl CameraMode {
    pub fn label(self) -> &'static str {
        match self {
            CameraMode::Overview => "overview",
            CameraMode::Follow => "follow",
            CameraMode::FirstPerson => "first person",
        }
    }
}

pub struct HikeCamera {
    pub mode: CameraMode,

    /// Point the camera is attached to (the hiker), updated every frame.
    anchor: Vec3,

    /// Distance behind the hiker in follow mode.
    /// Private: always clamped to [min_distance, max_distance] in update().
    follow_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub zoom_speed: f32,

    /// First-person look angles in radians; yaw 0 looks along +X.
    pub yaw: f32,
    pub pitch: f32,
    /// Radians per pixel of mouse movement.
    pub sensitivity: f32,

    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,

    // Terrain framing
    half_extents: Vec2,
    max_height: f32,
}

impl HikeCamera {
    pub fn new(half_extents: Vec2, max_height: f32) -> Self {
        let span = half_extents.max_element() * 2.0;
        Self {
            mode: CameraMode::Follow,
            anchor: Vec3::ZERO,
            follow_distance: 50.0,
            min_distance: 5.0,
            max_distance: span.max(50.0),
            zoom_speed: 3.0,
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            sensitivity: 0.1_f32.to_radians(),
            fov: 50.0_f32.to_radians(),
            near: 0.1,
            far: (span * 4.0).max(max_height * 4.0).max(100.0),
            half_extents,
            max_height,
        }
    }

    /// Update mode, zoom and look direction. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState, anchor: Vec3) {
        if input.was_key_pressed(KeyCode::Digit1) { self.mode = CameraMode::Overview; }
        if input.was_key_pressed(KeyCode::Digit2) { self.mode = CameraMode::Follow; }
        if input.was_key_pressed(KeyCode::Digit3) { self.mode = CameraMode::FirstPerson; }

        self.anchor = anchor;

        // Zoom: scroll up (positive delta) zooms in (decreases distance)
        self.follow_distance -= input.scroll_delta * self.zoom_speed;
        self.follow_distance = self.follow_distance.clamp(self.min_distance, self.max_distance);

        if self.mode == CameraMode::FirstPerson {
            let (dx, dy) = input.mouse_delta;
            self.yaw += dx * self.sensitivity;
            self.pitch = (self.pitch - dy * self.sensitivity)
                .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
        }
    }

    /// World-space position of the camera eye.
    pub fn camera_position(&self) -> Vec3 {
        match self.mode {
            CameraMode::Overview => Vec3::new(
                0.0,
                self.max_height * 2.5 + self.half_extents.max_element(),
                self.half_extents.y * 2.0,
            ),
            CameraMode::Follow => {
                self.anchor + Vec3::new(0.0, self.max_height * 0.2 + 5.0, self.follow_distance)
            }
            CameraMode::FirstPerson => self.anchor + Vec3::new(0.0, 2.0, 0.0),
        }
    }

    /// Unit look direction for first-person mode.
    pub fn front(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    /// View matrix for the current mode.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.camera_position();
        let target = match self.mode {
            CameraMode::Overview => Vec3::ZERO,
            CameraMode::Follow => self.anchor,
            CameraMode::FirstPerson => eye + self.front(),
        };
        Mat4::look_at_rh(eye, target, Vec3::Y)
    }

    /// Perspective projection matrix.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn follow_distance(&self) -> f32 { self.follow_distance }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_mode_looks_at_the_anchor_from_behind() {
        let mut camera = HikeCamera::new(Vec2::new(100.0, 100.0), 40.0);
        let input = InputState::new();
        let hiker = Vec3::new(3.0, 12.0, -7.0);
        camera.update(&input, hiker);

        let eye = camera.camera_position();
        assert_eq!(camera.mode, CameraMode::Follow);
        assert!(eye.y > hiker.y);
        assert!((eye.z - hiker.z - camera.follow_distance()).abs() < 1e-5);

        // The anchor projects onto the view axis (straight ahead).
        let view_space = camera.view_matrix().transform_point3(hiker);
        assert!(view_space.x.abs() < 1e-4 && view_space.y.abs() < 1e-4);
        assert!(view_space.z < 0.0);
    }

    #[test]
    fn first_person_front_is_unit_length() {
        let mut camera = HikeCamera::new(Vec2::new(10.0, 10.0), 5.0);
        camera.mode = CameraMode::FirstPerson;
        camera.yaw = 0.7;
        camera.pitch = -0.3;
        assert!((camera.front().length() - 1.0).abs() < 1e-5);
        assert_eq!(camera.camera_position(), Vec3::new(0.0, 2.0, 0.0));
    }
}
