// Public API for the server binary and integration tests

pub mod answers;
pub mod api;
pub mod auth;
pub mod bank;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod reveal;
pub mod signal;
pub mod state;
pub mod store;
pub mod timer;
pub mod types;
pub mod ws;
