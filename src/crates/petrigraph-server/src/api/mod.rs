//! HTTP API: routes, handlers, models and the error envelope.

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
