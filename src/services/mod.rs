pub mod ai;
pub mod audio;
pub mod quiz;
