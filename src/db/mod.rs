//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL,
//! following the repository pattern: each entity has a repository in
//! [`handlers`] that encapsulates all queries for that table, operating on a
//! `&mut PgConnection` so the caller decides whether it runs inside a
//! transaction.
//!
//! ```text
//! API handlers -> db::handlers (repositories) -> db::models -> PostgreSQL
//! ```
//!
//! Migrations live in `migrations/` and are embedded via [`crate::migrator`].
//! Constraint violations are classified into [`errors::DbError`] so API code
//! can map them onto HTTP statuses (unique -> 409, fk/check -> 400).

pub mod errors;
pub mod handlers;
pub mod models;
