pub mod api;
pub mod color;
pub mod config;
pub mod dates;
pub mod error;
pub mod forms;
pub mod gateway;
pub mod models;
pub mod progress;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod today;
