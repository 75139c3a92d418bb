//! HTTP request handlers, one module per resource.

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod bookings;
pub mod cases;
pub mod documents;
pub mod lawyers;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod users;
