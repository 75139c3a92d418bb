//! Database models for analytics events and aggregates.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct AnalyticsEventCreateDBRequest {
    pub event_type: String,
    pub path: Option<String>,
    pub search_query: Option<String>,
    pub user_id: Option<UserId>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EventTypeCountDBResponse {
    pub event_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyCountDBResponse {
    pub day: DateTime<Utc>,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PathCountDBResponse {
    pub path: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SearchCountDBResponse {
    pub search_query: String,
    pub count: i64,
}
