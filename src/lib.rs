pub mod config;
pub mod core;
pub mod native;
pub mod remote;
pub mod store;
