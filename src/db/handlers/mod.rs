//! Repository implementations for CRUD operations.

pub mod analytics;
pub mod audit;
pub mod bookings;
pub mod cases;
pub mod documents;
pub mod lawyers;
pub mod messages;
pub mod notifications;
pub mod password_reset_tokens;
pub mod payments;
pub mod repository;
pub mod reviews;
pub mod users;

pub use analytics::Analytics;
pub use audit::AuditLogs;
pub use bookings::Bookings;
pub use cases::Cases;
pub use documents::Documents;
pub use lawyers::Lawyers;
pub use messages::Messages;
pub use notifications::Notifications;
pub use password_reset_tokens::PasswordResetTokens;
pub use payments::{CasePayments, Payments};
pub use repository::Repository;
pub use reviews::Reviews;
pub use users::Users;
