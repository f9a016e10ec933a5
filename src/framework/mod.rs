pub mod actor;
pub mod frame_slot;
pub mod streams;
