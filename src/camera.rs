use std::f32::consts::PI;

use nalgebra as na;
use na::{vector, Matrix4, Rotation3, Vector3};

const TO_RADIANS: f32 = PI / 180.0;

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;
const MOVEMENT_SPEED: f32 = 10.0;
const LOOK_SENSITIVITY: f32 = 0.25;
const MAX_PITCH: f32 = 89.0 * TO_RADIANS;

/// Per-frame camera control state, translated from real input devices by the
/// app layer - directional movement flags plus relative look deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraInput {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub move_up: bool,
    pub move_down: bool,
    /// Doubles the movement speed while held.
    pub boost: bool,
    /// Relative look deltas in input device units, scaled by sensitivity.
    pub yaw_delta: f32,
    pub pitch_delta: f32,
}

/// Camera - position, orientation basis and the view/projection matrices
/// derived from them. Constructed once, mutated every frame by input.
pub struct Camera {
    pub origin: Vector3<f32>,
    pub fov_angle: f32,
    /// Cached tan(fov_angle / 2).
    pub fov: f32,
    pub aspect_ratio: f32,

    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
    pub right: Vector3<f32>,

    pub total_pitch: f32,
    pub total_yaw: f32,

    pub view_matrix: Matrix4<f32>,
    pub projection_matrix: Matrix4<f32>,
}

impl Camera {
    pub fn new(fov_angle: f32, origin: Vector3<f32>, aspect_ratio: f32) -> Camera {
        let mut camera = Camera {
            origin,
            fov_angle,
            fov: (fov_angle * TO_RADIANS / 2.0).tan(),
            aspect_ratio,
            forward: vector![0.0, 0.0, 1.0],
            up: vector![0.0, 1.0, 0.0],
            right: vector![1.0, 0.0, 0.0],
            total_pitch: 0.0,
            total_yaw: 0.0,
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
        };
        camera.calculate_view_matrix();
        camera.calculate_projection_matrix();
        return camera;
    }

    /// Advances position and orientation from one frame of input, then
    /// recomputes both matrices.
    pub fn update(&mut self, delta_time: f32, input: &CameraInput) {
        let mut movement_speed = MOVEMENT_SPEED;
        if input.boost {
            movement_speed *= 2.0;
        }

        if input.move_forward {
            self.origin += self.forward * delta_time * movement_speed;
        }
        if input.move_backward {
            self.origin -= self.forward * delta_time * movement_speed;
        }
        if input.move_left {
            self.origin -= self.right * delta_time * movement_speed;
        }
        if input.move_right {
            self.origin += self.right * delta_time * movement_speed;
        }
        if input.move_up {
            self.origin += self.up * delta_time * movement_speed;
        }
        if input.move_down {
            self.origin -= self.up * delta_time * movement_speed;
        }

        self.total_yaw += input.yaw_delta * LOOK_SENSITIVITY * TO_RADIANS;
        self.total_pitch = (self.total_pitch + input.pitch_delta * LOOK_SENSITIVITY * TO_RADIANS)
            .clamp(-MAX_PITCH, MAX_PITCH);

        // Pitch first, then yaw, applied to the resting forward direction.
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), self.total_yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.total_pitch);
        self.forward = rotation * vector![0.0, 0.0, 1.0];

        self.calculate_view_matrix();
        self.calculate_projection_matrix();
    }

    /// Rebuilds the orthonormal basis around `forward` and inverts the
    /// basis-and-origin matrix into the world-to-camera view matrix.
    fn calculate_view_matrix(&mut self) {
        self.right = vector![0.0, 1.0, 0.0].cross(&self.forward).normalize();
        self.up = self.forward.cross(&self.right).normalize();

        #[rustfmt::skip]
        let inv_view_matrix = Matrix4::new(
            self.right.x, self.up.x, self.forward.x, self.origin.x,
            self.right.y, self.up.y, self.forward.y, self.origin.y,
            self.right.z, self.up.z, self.forward.z, self.origin.z,
            0.0,          0.0,       0.0,            1.0,
        );

        // An orthonormal basis plus translation is always invertible.
        self.view_matrix = inv_view_matrix.try_inverse().unwrap();
    }

    /// Left-handed perspective projection taking camera space to clip space,
    /// with z mapped into [0, 1] between the near and far planes.
    fn calculate_projection_matrix(&mut self) {
        #[rustfmt::skip]
        let projection_matrix = Matrix4::new(
            1.0 / (self.aspect_ratio * self.fov), 0.0,            0.0,                        0.0,
            0.0,                                  1.0 / self.fov, 0.0,                        0.0,
            0.0,                                  0.0,            Z_FAR / (Z_FAR - Z_NEAR),   -(Z_FAR * Z_NEAR) / (Z_FAR - Z_NEAR),
            0.0,                                  0.0,            1.0,                        0.0,
        );
        self.projection_matrix = projection_matrix;
    }
}
