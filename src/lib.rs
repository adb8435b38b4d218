pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod permissions;
pub mod resources;
pub mod themes;
pub mod viewer;
