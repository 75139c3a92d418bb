use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutResponse,
            MeResponse, PasswordResetConfirmRequest, PasswordResetRequest, PasswordResetResponse, RegisterRequest,
            RegisterResponse,
        },
        lawyers::LawyerResponse,
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{password, session},
    db::{
        handlers::{Lawyers, PasswordResetTokens, Repository, Users},
        models::{lawyers::LawyerCreateDBRequest, users::UserCreateDBRequest, users::UserUpdateDBRequest},
    },
    email::EmailService,
    errors::Error,
    AppState,
};

fn create_session_cookie(token: &str, config: &crate::config::Config) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={}",
        config.auth.native.session.cookie_name,
        token,
        config.auth.security.jwt_expiry.as_secs()
    )
}

fn check_password_bounds(password: &str, config: &crate::config::Config) -> Result<(), Error> {
    let bounds = &config.auth.native.password;
    if password.len() < bounds.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", bounds.min_length),
        });
    }
    if password.len() > bounds.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", bounds.max_length),
        });
    }
    Ok(())
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "auth",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    check_password_bounds(&request.password, &state.config)?;

    // Hash the password on a blocking thread to avoid blocking the async runtime
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut user_repo = Users::new(&mut tx);
    if user_repo.get_by_email(&request.email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let role = if request.lawyer_profile.is_some() {
        Role::Lawyer
    } else {
        Role::User
    };

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            email: request.email,
            password_hash: Some(password_hash),
            full_name: request.full_name,
            phone: request.phone,
            avatar_url: None,
            role,
        })
        .await?;

    // A lawyer registration stands up the (unverified) profile in the same step
    if let Some(profile) = request.lawyer_profile {
        let mut lawyer_repo = Lawyers::new(&mut tx);
        lawyer_repo
            .create(&LawyerCreateDBRequest {
                user_id: created_user.id,
                bar_number: profile.bar_number,
                specializations: profile.specializations,
                bio: profile.bio,
                years_experience: profile.years_experience,
                consultation_rate: profile.consultation_rate,
                currency: state.config.bookings.currency.clone(),
            })
            .await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let user_response = UserResponse::from(created_user);
    let current_user = CurrentUser {
        id: user_response.id,
        email: user_response.email.clone(),
        full_name: user_response.full_name.clone(),
        role: user_response.role.clone(),
        avatar_url: user_response.avatar_url.clone(),
    };
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Registration successful".to_string(),
        },
        cookie,
    })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo
        .get_by_email(&request.email)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        })?;

    if !user.is_active {
        return Err(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        });
    }

    let password_hash = user.password_hash.clone().ok_or_else(|| Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    })?;

    // Verify on a blocking thread to avoid stalling the runtime
    let password = request.password.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Invalid email or password".to_string()),
        });
    }

    user_repo.touch_last_login(user.id).await?;

    let user_response = UserResponse::from(user);
    let current_user = CurrentUser {
        id: user_response.id,
        email: user_response.email.clone(),
        full_name: user_response.full_name.clone(),
        role: user_response.role.clone(),
        avatar_url: user_response.avatar_url.clone(),
    };
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0",
        state.config.auth.native.session.cookie_name
    );

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie,
    })
}

/// Current account with its lawyer profile, if any
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<MeResponse>, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut user_repo = Users::new(&mut pool_conn);
    let user = user_repo
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    let mut lawyer_repo = Lawyers::new(&mut pool_conn);
    let lawyer = lawyer_repo.get_by_user_id(current_user.id).await?.map(LawyerResponse::from);

    Ok(Json(MeResponse {
        user: UserResponse::from(user),
        lawyer,
    }))
}

/// Request password reset (send email)
#[utoipa::path(
    post,
    path = "/auth/password-resets",
    request_body = PasswordResetRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password reset email sent if the account exists", body = PasswordResetResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    // Same response either way, to avoid email enumeration
    let user = user_repo.get_by_email(&request.email).await?;

    if let Some(user) = user {
        if user.password_hash.is_some() {
            let mut token_repo = PasswordResetTokens::new(&mut tx);
            let (raw_token, token) = token_repo.create_for_user(user.id, &state.config).await?;

            let email_service = EmailService::new(&state.config)?;
            email_service
                .send_password_reset_email(&user.email, Some(&user.full_name), &token.id, &raw_token)
                .await?;
        }
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PasswordResetResponse {
        message: "If an account with that email exists, a password reset link has been sent.".to_string(),
    }))
}

/// Confirm password reset with token
#[utoipa::path(
    post,
    path = "/auth/password-resets/{token_id}/confirm",
    request_body = PasswordResetConfirmRequest,
    tag = "auth",
    params(("token_id" = String, Path, description = "Reset token ID from the email link")),
    responses(
        (status = 200, description = "Password reset successful", body = PasswordResetResponse),
        (status = 400, description = "Invalid or expired token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path(token_id): Path<uuid::Uuid>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<PasswordResetResponse>, Error> {
    check_password_bounds(&request.new_password, &state.config)?;

    let invalid = || Error::BadRequest {
        message: "Invalid or expired reset token".to_string(),
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut token_repo = PasswordResetTokens::new(&mut tx);
    let token = token_repo.get_by_id(token_id).await?.ok_or_else(invalid)?;

    if token.used_at.is_some() || token.expires_at < chrono::Utc::now() {
        return Err(invalid());
    }

    let token_hash = token.token_hash.clone();
    let raw_token = request.token.clone();
    let token_matches = tokio::task::spawn_blocking(move || password::verify_string(&raw_token, &token_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn token verification task: {e}"),
        })??;
    if !token_matches {
        return Err(invalid());
    }

    if !token_repo.mark_used(token_id).await? {
        // Lost the race against a concurrent confirmation
        return Err(invalid());
    }

    let new_password = request.new_password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut user_repo = Users::new(&mut tx);
    user_repo
        .update(
            token.user_id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PasswordResetResponse {
        message: "Password has been reset. You can now log in.".to_string(),
    }))
}

/// Change password (authenticated)
#[utoipa::path(
    post,
    path = "/auth/password-change",
    request_body = ChangePasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 401, description = "Current password is wrong"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    check_password_bounds(&request.new_password, &state.config)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    let current_hash = user.password_hash.ok_or_else(|| Error::BadRequest {
        message: "This account has no password set".to_string(),
    })?;

    let current_password = request.current_password.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&current_password, &current_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let new_password = request.new_password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    user_repo
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_sets_cookie_and_returns_user(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "new@example.com",
                "password": "a-strong-password",
                "full_name": "New User"
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["email"], "new@example.com");
        assert_eq!(body["user"]["role"], "USER");

        let cookie = response.headers().get("set-cookie").expect("session cookie");
        assert!(cookie.to_str().unwrap().starts_with("lawlink_session="));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_as_lawyer_creates_pending_profile(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "advocate@example.com",
                "password": "a-strong-password",
                "full_name": "Adv. Example",
                "lawyer_profile": {
                    "bar_number": "BAR-REG-1",
                    "specializations": ["criminal"],
                    "bio": "Trial practice",
                    "years_experience": 12,
                    "consultation_rate": "2500"
                }
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["role"], "LAWYER");

        // The profile exists but is not yet verified, so it's absent from the
        // public directory
        let directory = app.get("/api/v1/lawyers").await;
        directory.assert_status_ok();
        let listing: serde_json::Value = directory.json();
        assert_eq!(listing["total_count"], 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_registration_conflicts(pool: PgPool) {
        let app = create_test_app(pool).await;

        let payload = json!({
            "email": "dup@example.com",
            "password": "a-strong-password",
            "full_name": "Dup"
        });

        app.post("/api/v1/auth/register").json(&payload).await.assert_status(axum::http::StatusCode::CREATED);
        let second = app.post("/api/v1/auth/register").json(&payload).await;
        second.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_rejects_wrong_password(pool: PgPool) {
        let app = create_test_app(pool).await;

        app.post("/api/v1/auth/register")
            .json(&json!({
                "email": "login@example.com",
                "password": "correct-password",
                "full_name": "Login User"
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let ok = app
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "login@example.com", "password": "correct-password" }))
            .await;
        ok.assert_status_ok();

        let bad = app
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "login@example.com", "password": "wrong-password" }))
            .await;
        bad.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_short_password_rejected(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "short@example.com",
                "password": "short",
                "full_name": "Short"
            }))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_me_requires_auth_and_reflects_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        app.get("/api/v1/auth/me").await.assert_status_unauthorized();

        let user = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (name, value) = auth_header(&user);
        let response = app.get("/api/v1/auth/me").add_header(name, value).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["id"], user.id.to_string());
        assert!(body["lawyer"].is_null());
    }
}
