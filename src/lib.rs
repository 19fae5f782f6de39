pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod params;
pub mod routes;
pub mod state;
pub mod store;
