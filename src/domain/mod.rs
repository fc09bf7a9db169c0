pub mod models;
pub mod timer;
