//! Test utilities for integration testing.

use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    api::models::{
        lawyers::{LawyerResponse, VerificationStatus},
        users::{CurrentUser, Role, UserResponse},
    },
    auth::session,
    db::{
        handlers::{Lawyers, Repository, Users},
        models::{lawyers::LawyerCreateDBRequest, users::UserCreateDBRequest},
    },
};

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: crate::config::Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> crate::config::Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("lawlink-test-emails-{}", std::process::id()));

    crate::config::Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        payment: Some(crate::config::PaymentConfig::Dummy(crate::config::DummyConfig::default())),
        email: crate::config::EmailConfig {
            transport: crate::config::EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let tag = Uuid::new_v4().simple().to_string();

    let user_create = UserCreateDBRequest {
        email: format!("testuser_{tag}@example.com"),
        password_hash: None,
        full_name: "Test User".to_string(),
        phone: None,
        avatar_url: None,
        role,
    };

    let user = users_repo.create(&user_create).await.expect("Failed to create test user");
    UserResponse::from(user)
}

/// Create a lawyer account plus profile; verified unless stated otherwise.
pub async fn create_test_lawyer(pool: &PgPool, verified: bool) -> (UserResponse, LawyerResponse) {
    let user = create_test_user(pool, Role::Lawyer).await;

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut lawyers_repo = Lawyers::new(&mut conn);
    let lawyer = lawyers_repo
        .create(&LawyerCreateDBRequest {
            user_id: user.id,
            bar_number: format!("BAR-{}", Uuid::new_v4().simple()),
            specializations: vec!["civil".to_string(), "family".to_string()],
            bio: Some("Test profile".to_string()),
            years_experience: 7,
            consultation_rate: Decimal::new(1200, 0),
            currency: "INR".to_string(),
        })
        .await
        .expect("Failed to create test lawyer");

    let lawyer = if verified {
        lawyers_repo
            .set_verification(lawyer.id, VerificationStatus::Verified)
            .await
            .expect("Failed to verify test lawyer")
    } else {
        lawyer
    };

    (user, LawyerResponse::from(lawyer))
}

/// Bearer token header for a test user, signed with the test secret.
pub fn auth_header(user: &UserResponse) -> (String, String) {
    let config = create_test_config();
    let current_user = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        role: user.role.clone(),
        avatar_url: user.avatar_url.clone(),
    };
    let token = session::create_session_token(&current_user, &config).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
