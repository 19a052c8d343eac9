pub mod models;
pub mod quiz;
