pub mod camera_frame;
pub mod control_msg;
