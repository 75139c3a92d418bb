//! Permission matrix and the typed `RequiresPermission` extractor.
//!
//! Authorization is two-layered: this matrix answers "may this role perform
//! this operation class on this resource at all", and handlers follow up
//! with ownership/participation checks for the "Own"-scoped operations.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
    AppState,
};

/// Whether `user` may perform `operation` on `resource`.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    role_allows(&user.role, resource, operation)
}

fn role_allows(role: &Role, resource: Resource, operation: Operation) -> bool {
    use Operation::*;
    use Resource::*;

    // Admins can do everything
    if matches!(role, Role::Admin) {
        return true;
    }

    match (resource, operation) {
        // Everyone manages their own account and reads their own resources
        (Users, ReadOwn | UpdateOwn) => true,
        (Bookings, ReadOwn) => true,
        (Payments, ReadOwn) => true,
        (Cases, ReadOwn) => true,
        (Messages, ReadOwn | CreateOwn) => true,
        (Notifications, ReadOwn | UpdateOwn) => true,
        (Documents, ReadOwn | CreateOwn | DeleteOwn) => true,

        // Clients book consultations, open cases, pay, and review
        (Bookings, CreateOwn) => matches!(role, Role::User),
        (Cases, CreateOwn) => matches!(role, Role::User),
        (Reviews, CreateOwn) => matches!(role, Role::User),
        (Payments, CreateOwn | UpdateOwn) => true,

        // Anyone may stand up a lawyer profile (it starts unverified);
        // only the owner updates it
        (Lawyers, CreateOwn | UpdateOwn) => true,

        // Lawyers drive booking and case lifecycles on their own threads
        (Bookings, UpdateOwn) => true,
        (Cases, UpdateOwn) => matches!(role, Role::Lawyer),

        // Admin-only surfaces
        (Users, ReadAll | UpdateAll | DeleteAll) => false,
        (Lawyers, UpdateAll) => false,
        (Analytics, ReadAll) => false,
        (AuditLogs, ReadAll) => false,
        (_, ReadAll | CreateAll | UpdateAll | DeleteAll) => false,

        _ => false,
    }
}

/// Marker trait mapping a zero-sized resource type onto [`Resource`].
pub trait ResourceMarker: Send + Sync {
    const RESOURCE: Resource;
}

/// Marker trait mapping a zero-sized operation type onto [`Operation`].
pub trait OperationMarker: Send + Sync {
    const OPERATION: Operation;
}

macro_rules! resource_markers {
    ($($name:ident),* $(,)?) => {
        pub mod resource {
            use super::{Resource, ResourceMarker};
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        }
    };
}

macro_rules! operation_markers {
    ($($name:ident),* $(,)?) => {
        pub mod operation {
            use super::{Operation, OperationMarker};
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        }
    };
}

resource_markers!(
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
);

operation_markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);

/// Extractor that authenticates the user and checks a static permission in
/// one step. Handlers that need finer checks take [`CurrentUser`] directly.
pub struct RequiresPermission<R: ResourceMarker, O: OperationMarker> {
    pub user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R: ResourceMarker, O: OperationMarker> FromRequestParts<AppState> for RequiresPermission<R, O> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !has_permission(&user, R::RESOURCE, O::OPERATION) {
            return Err(Error::InsufficientPermissions {
                required: Permission::Allow(R::RESOURCE, O::OPERATION),
                action: O::OPERATION,
                resource: R::RESOURCE.to_string(),
            });
        }

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
