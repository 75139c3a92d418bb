//! # lawlink: Legal-Services Booking Marketplace Backend
//!
//! `lawlink` is the backend of a legal-services marketplace. Clients browse a
//! directory of verified lawyers, book paid consultations, open case threads,
//! exchange messages over a real-time channel, and settle structured payment
//! requests; lawyers manage their profiles, case loads, and billing; admins
//! verify lawyers and watch the audit and analytics surfaces.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL (via SQLx) for all persistence.
//!
//! ### Request Flow
//!
//! A request passes through the authentication extractors (JWT session
//! cookie or bearer token), reaches its handler in [`api::handlers`], which
//! performs authorization checks and drives a repository from
//! [`db::handlers`] — inside a transaction when several writes must move
//! together (the booking checkout, review aggregates, webhook
//! reconciliation). Real-time chat upgrades on `/ws/chat` and shares both
//! the authentication path and the message repository with REST.
//!
//! ### Core Components
//!
//! - [`api`]: REST surface under `/api/v1/*` plus the payment webhook
//! - [`auth`]: Argon2id passwords, JWT sessions, role permission matrix
//! - [`chat`]: per-case WebSocket rooms over broadcast channels
//! - [`db`]: repository layer and migrations
//! - [`payment_providers`]: simulated gateway and Razorpay integration
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use lawlink::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = lawlink::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     lawlink::telemetry::init_telemetry();
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod notifications;
mod openapi;
pub mod payment_providers;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, patch, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::models::users::Role,
    auth::password,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
};
pub use chat::ChatRooms;
pub use config::Config;
pub use types::{BookingId, CaseId, LawyerId, PaymentId, UserId};

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool
/// - `config`: application configuration
/// - `chat`: live case-room registry for the WebSocket layer
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub chat: ChatRooms,
}

/// Get the lawlink database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the admin on first startup, or refreshes the password
/// when one is configured.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, admin_password: Option<&str>, db: &PgPool) -> Result<UserId, errors::Error> {
    let password_hash = match admin_password {
        Some(pwd) => Some(password::hash_string(pwd)?),
        None => None,
    };

    let mut tx = db.begin().await.map_err(|e| errors::Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_by_email(email).await? {
        if password_hash.is_some() {
            user_repo
                .update(
                    existing_user.id,
                    &UserUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await?;
        }
        tx.commit().await.map_err(|e| errors::Error::Database(e.into()))?;
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash,
            full_name: "Administrator".to_string(),
            phone: None,
            avatar_url: None,
            role: Role::Admin,
        })
        .await?;

    tx.commit().await.map_err(|e| errors::Error::Database(e.into()))?;
    Ok(created_user.id)
}

/// Connect the pool, run migrations, and bootstrap the admin account.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    prepare_database(config, &pool).await?;
    Ok(pool)
}

/// Migration + bootstrap steps shared by production startup and tests.
async fn prepare_database(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials))
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{analytics, audit, auth, bookings, cases, documents, lawyers, messages, notifications, payments, reviews, users};

    let upload_limit = state.config.documents.max_file_size as usize;

    let api_routes = Router::new()
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password-resets", post(auth::request_password_reset))
        .route("/auth/password-resets/{token_id}/confirm", post(auth::confirm_password_reset))
        .route("/auth/password-change", post(auth::change_password))
        // User management
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", patch(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        // Lawyer directory and profiles
        .route("/lawyers", get(lawyers::list_lawyers))
        .route("/lawyers", post(lawyers::create_lawyer))
        .route("/lawyers/{id}", get(lawyers::get_lawyer))
        .route("/lawyers/{id}", patch(lawyers::update_lawyer))
        .route("/lawyers/{id}/verification", patch(lawyers::update_verification))
        .route("/lawyers/{id}/reviews", get(reviews::list_lawyer_reviews))
        // Bookings (checkout flow)
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/bookings/{id}/complete", post(bookings::complete_booking))
        .route("/bookings/{id}/review", post(reviews::create_review))
        // Payments
        .route("/payments", get(payments::list_payments))
        .route("/payments/{id}", get(payments::get_payment))
        .route("/payments/{id}/checkout", post(payments::create_checkout))
        .route("/payments/{id}/confirm", post(payments::confirm_payment))
        // Cases and their payment requests
        .route("/cases", post(cases::create_case))
        .route("/cases", get(cases::list_cases))
        .route("/cases/{id}", get(cases::get_case))
        .route("/cases/{id}/accept", post(cases::accept_case))
        .route("/cases/{id}/reject", post(cases::reject_case))
        .route("/cases/{id}/resolve", post(cases::resolve_case))
        .route("/cases/{id}/close", post(cases::close_case))
        .route("/cases/{id}/payments", post(cases::create_case_payment))
        .route("/cases/{id}/payments", get(cases::list_case_payments))
        .route("/cases/{id}/payments/{payment_id}/checkout", post(cases::checkout_case_payment))
        // Messages
        .route("/cases/{id}/messages", get(messages::list_messages))
        .route("/cases/{id}/messages", post(messages::create_message))
        .route("/cases/{id}/messages/read", post(messages::mark_messages_read))
        // Documents
        .route(
            "/documents",
            post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/documents/{id}", get(documents::download_document))
        .route("/documents/{id}", delete(documents::delete_document))
        .route("/cases/{id}/documents", get(documents::list_case_documents))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{id}/read", post(notifications::mark_notification_read))
        .route("/notifications/read-all", post(notifications::mark_all_notifications_read))
        // Analytics
        .route("/analytics/events", post(analytics::ingest_event))
        .route("/analytics/summary", get(analytics::summary))
        .route("/analytics/top-pages", get(analytics::top_pages))
        .route("/analytics/top-searches", get(analytics::top_searches))
        // Audit trail
        .route("/audit-logs", get(audit::list_audit_logs))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Gateway callbacks and the chat upgrade live outside /api/v1
        .route("/webhooks/payments", post(payments::webhook_handler))
        .route("/ws/chat", get(chat::ws_handler))
        .with_state(state.clone())
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects the database, runs
///    migrations, bootstraps the admin user, and builds the router
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        Self::from_pool(config, pool)
    }

    /// Build the application over an existing (migrated) pool. Used by tests.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        prepare_database(&config, &pool).await?;
        Self::from_pool(config, pool)
    }

    fn from_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let state = AppState {
            db: pool.clone(),
            config: config.clone(),
            chat: ChatRooms::new(),
        };
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("lawlink listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
