//! # petrigraph-server - REST Service Layer
//!
//! Thin HTTP surface over the core pipeline:
//!
//! | Endpoint | Semantics |
//! |----------|-----------|
//! | `POST /build` | intent spec (or workflow YAML) -> canonical net + build notes |
//! | `POST /validate` | net + validator config -> verdict |
//! | `POST /simulate` | net + simulator config -> trace + status |
//! | `POST /dag` | net -> task DAG + projection notes |
//! | `GET /health` | liveness + component statuses |
//!
//! A `FAIL` verdict is a successful analysis and returns 200; only
//! malformed input (400), grammar conflicts (409), budget-exhausted
//! validations (422) and internal failures (500) use error statuses.
//! Every error body is the `{schemaVersion, error: {code, message,
//! details?}}` envelope.

pub mod api;

pub use api::routes::{create_router, AppState};
