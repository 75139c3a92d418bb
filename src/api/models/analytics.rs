//! API request/response models for analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Beacon from the frontend. `event_type` is one of `page_view`, `event`,
/// `search`, `api_call`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnalyticsEventCreate {
    pub event_type: String,
    pub path: Option<String>,
    pub search_query: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Date window shared by the aggregate endpoints; defaults to the last 30
/// days.
#[serde_with::serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AnalyticsWindowQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Result cap for the top-N endpoints (default 10)
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyCount {
    pub day: DateTime<Utc>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PathCount {
    pub path: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchCount {
    pub search_query: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsSummaryResponse {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub totals: Vec<EventTypeCount>,
    pub daily: Vec<DailyCount>,
}
