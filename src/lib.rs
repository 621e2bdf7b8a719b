// src/lib.rs

pub mod analytics;
pub mod authoring;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod upload;
pub mod utils;

// Re-export specific items for convenience if needed
pub use routes::create_router;
