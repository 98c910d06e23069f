pub mod autoplay;
pub mod ball;
pub mod camera;
pub mod input;
pub mod setup;
pub mod shared_consts;
pub mod shutdown;
pub mod smoothing;
pub mod tuning;
