pub mod memory;
pub mod task;
pub mod video;
