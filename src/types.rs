//! Common type definitions and permission system types.
//!
//! ID aliases keep handler signatures readable; the permission types
//! ([`Resource`], [`Operation`], [`Permission`]) drive authorization checks
//! in `crate::auth::permissions`.

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type LawyerId = Uuid;
pub type BookingId = Uuid;
pub type PaymentId = Uuid;
pub type CaseId = Uuid;
pub type CasePaymentId = Uuid;
pub type MessageId = Uuid;
pub type ReviewId = Uuid;
pub type NotificationId = Uuid;
pub type DocumentId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Lawyers,
    Bookings,
    Payments,
    Cases,
    Messages,
    Reviews,
    Notifications,
    Documents,
    Analytics,
    AuditLogs,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// User must be a participant of the specific resource instance
    Participant,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Lawyers => "lawyers",
            Resource::Bookings => "bookings",
            Resource::Payments => "payments",
            Resource::Cases => "cases",
            Resource::Messages => "messages",
            Resource::Reviews => "reviews",
            Resource::Notifications => "notifications",
            Resource::Documents => "documents",
            Resource::Analytics => "analytics",
            Resource::AuditLogs => "audit logs",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
