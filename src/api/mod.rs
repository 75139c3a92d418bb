//! HTTP API layer.
//!
//! [`handlers`] contains the axum request handlers, [`models`] the
//! request/response DTOs. Handlers authenticate via the extractors in
//! `crate::auth`, delegate persistence to `crate::db::handlers`, and map
//! failures through `crate::errors::Error`.

pub mod handlers;
pub mod models;
