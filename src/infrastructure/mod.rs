pub mod ai_client;
pub mod bus;
pub mod error;
pub mod platform;
pub mod store;
