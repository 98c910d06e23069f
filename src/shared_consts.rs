// Lane geometry, in meters. The lane runs from the foul line at z = 0 toward -Z.
pub const LANE_HALF_WIDTH: f32 = 2.6;
pub const LANE_LENGTH: f32 = 20.0;
pub const LANE_THICKNESS: f32 = 0.1;
pub const GUTTER_WALL_HEIGHT: f32 = 0.6;
pub const BACK_WALL_HEIGHT: f32 = 3.0;

pub const BALL_RADIUS: f32 = 0.11;
pub const BALL_MASS: f32 = 1.0;
pub const BALL_START: (f32, f32, f32) = (0.0, BALL_RADIUS + 0.01, 0.0);

pub const PIN_RADIUS: f32 = 0.06;
pub const PIN_HALF_HEIGHT: f32 = 0.19;
pub const PIN_SPACING: f32 = 0.3;
pub const HEAD_PIN_Z: f32 = -18.0;

pub const CAMERA_START: (f32, f32, f32) = (0.0, 1.6, 4.0);

/// A launch force is applied for a single physics step of this length.
pub const FORCE_STEP_SECS: f32 = 0.02;
