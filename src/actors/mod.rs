pub mod camera_actor;
pub mod detection_actor;
pub mod keyboard_actor;
pub mod stream_actor;
