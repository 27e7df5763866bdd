pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod graphql;
pub mod models;
pub mod notify;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;
pub mod workers;

pub use workers::{DispatchSettings, DispatchWorker};
