//! Account Manager Backend Library
//!
//! Registration, login and bearer-token authentication behind a composable
//! middleware chain. This library exposes the backend modules for use in
//! tests and the server binary.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
