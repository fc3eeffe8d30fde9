pub mod fetch;
pub mod timestamp;
