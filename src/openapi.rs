//! OpenAPI document assembly.

use utoipa::OpenApi;

use crate::api::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LawLink API",
        description = "Legal-services booking marketplace: consultations, cases, chat, and payments"
    ),
    paths(
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::request_password_reset,
        crate::api::handlers::auth::confirm_password_reset,
        crate::api::handlers::auth::change_password,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::get_user,
        crate::api::handlers::users::update_user,
        crate::api::handlers::users::delete_user,
        crate::api::handlers::lawyers::create_lawyer,
        crate::api::handlers::lawyers::list_lawyers,
        crate::api::handlers::lawyers::get_lawyer,
        crate::api::handlers::lawyers::update_lawyer,
        crate::api::handlers::lawyers::update_verification,
        crate::api::handlers::bookings::create_booking,
        crate::api::handlers::bookings::list_bookings,
        crate::api::handlers::bookings::get_booking,
        crate::api::handlers::bookings::cancel_booking,
        crate::api::handlers::bookings::complete_booking,
        crate::api::handlers::payments::create_checkout,
        crate::api::handlers::payments::confirm_payment,
        crate::api::handlers::payments::list_payments,
        crate::api::handlers::payments::get_payment,
        crate::api::handlers::payments::webhook_handler,
        crate::api::handlers::cases::create_case,
        crate::api::handlers::cases::list_cases,
        crate::api::handlers::cases::get_case,
        crate::api::handlers::cases::accept_case,
        crate::api::handlers::cases::reject_case,
        crate::api::handlers::cases::resolve_case,
        crate::api::handlers::cases::close_case,
        crate::api::handlers::cases::create_case_payment,
        crate::api::handlers::cases::list_case_payments,
        crate::api::handlers::cases::checkout_case_payment,
        crate::api::handlers::messages::list_messages,
        crate::api::handlers::messages::create_message,
        crate::api::handlers::messages::mark_messages_read,
        crate::api::handlers::reviews::create_review,
        crate::api::handlers::reviews::list_lawyer_reviews,
        crate::api::handlers::notifications::list_notifications,
        crate::api::handlers::notifications::mark_notification_read,
        crate::api::handlers::notifications::mark_all_notifications_read,
        crate::api::handlers::documents::upload_document,
        crate::api::handlers::documents::download_document,
        crate::api::handlers::documents::list_case_documents,
        crate::api::handlers::documents::delete_document,
        crate::api::handlers::analytics::ingest_event,
        crate::api::handlers::analytics::summary,
        crate::api::handlers::analytics::top_pages,
        crate::api::handlers::analytics::top_searches,
        crate::api::handlers::audit::list_audit_logs,
    ),
    components(schemas(
        models::users::Role,
        models::users::UserResponse,
        models::users::UserUpdate,
        models::users::CurrentUser,
        models::auth::RegisterRequest,
        models::auth::LoginRequest,
        models::auth::AuthResponse,
        models::auth::MeResponse,
        models::auth::AuthSuccessResponse,
        models::auth::PasswordResetRequest,
        models::auth::PasswordResetResponse,
        models::auth::PasswordResetConfirmRequest,
        models::auth::ChangePasswordRequest,
        models::lawyers::VerificationStatus,
        models::lawyers::LawyerProfileCreate,
        models::lawyers::LawyerUpdate,
        models::lawyers::VerificationUpdate,
        models::lawyers::LawyerResponse,
        models::bookings::BookingStatus,
        models::bookings::BookingCreate,
        models::bookings::BookingResponse,
        models::bookings::BookingCheckoutResponse,
        models::payments::PaymentStatus,
        models::payments::PaymentResponse,
        models::payments::CheckoutResponse,
        models::payments::PaymentConfirmResponse,
        models::payments::CasePaymentCreate,
        models::payments::CasePaymentResponse,
        models::cases::CaseStatus,
        models::cases::CaseCreate,
        models::cases::CaseResponse,
        models::messages::MessageCreate,
        models::messages::MessageResponse,
        models::messages::MarkReadResponse,
        models::reviews::ReviewCreate,
        models::reviews::ReviewResponse,
        models::notifications::NotificationResponse,
        models::notifications::MarkAllReadResponse,
        models::documents::DocumentResponse,
        models::analytics::AnalyticsEventCreate,
        models::analytics::AnalyticsSummaryResponse,
        models::analytics::EventTypeCount,
        models::analytics::DailyCount,
        models::analytics::PathCount,
        models::analytics::SearchCount,
        models::audit::AuditLogResponse,
    )),
    tags(
        (name = "auth", description = "Registration, login, and password management"),
        (name = "users", description = "Account management"),
        (name = "lawyers", description = "Lawyer profiles and the public directory"),
        (name = "bookings", description = "Consultation booking and lifecycle"),
        (name = "payments", description = "Checkout, reconciliation, and webhooks"),
        (name = "cases", description = "Case threads and payment requests"),
        (name = "messages", description = "Case chat over REST"),
        (name = "reviews", description = "Consultation reviews"),
        (name = "notifications", description = "In-app notifications"),
        (name = "documents", description = "Document storage"),
        (name = "analytics", description = "Usage analytics"),
        (name = "audit", description = "Administrative audit trail"),
    )
)]
pub struct ApiDoc;
