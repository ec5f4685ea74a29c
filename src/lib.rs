pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod web;

pub use web::{build_router, AppState};
