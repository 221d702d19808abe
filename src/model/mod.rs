pub mod item;
pub mod label;
pub mod task;
