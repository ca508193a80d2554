//! Role-based authorization policy.
//!
//! Each protected endpoint has a fixed allow-list of roles. Handlers call
//! [`allowed`] at the HTTP boundary (via `AuthUser::require`); business
//! logic never inspects roles.

use crate::types::Role;

/// Protected endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /auth/profile`
    Profile,
    /// `POST /lots`
    CreateLot,
    /// `PUT /lots/:id`
    UpdateLot,
    /// `POST /lots/:id/spaces`
    AddSpaces,
    /// `POST /reservations`
    CreateReservation,
    /// `GET /reservations`
    ListReservations,
    /// `POST /payments/create-order`
    CreateOrder,
    /// `POST /payments/mark-paid`
    MarkPaid,
    /// `GET /payments/receipt/:id`
    Receipt,
    /// `GET /payments/analytics/*`
    Analytics,
    /// `POST /qr/validate-entry`
    ValidateEntry,
    /// `POST /qr/validate-exit`
    ValidateExit,
}

const ANY_ROLE: &[Role] = &[Role::User, Role::Admin, Role::Owner];
const OPERATORS: &[Role] = &[Role::Admin, Role::Owner];

impl Endpoint {
    /// Roles permitted to call this endpoint.
    #[must_use]
    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::Profile
            | Self::CreateReservation
            | Self::ListReservations
            | Self::CreateOrder
            | Self::MarkPaid
            | Self::Receipt => ANY_ROLE,
            Self::CreateLot
            | Self::UpdateLot
            | Self::AddSpaces
            | Self::Analytics
            | Self::ValidateEntry
            | Self::ValidateExit => OPERATORS,
        }
    }
}

/// Whether `role` may call `endpoint`.
#[must_use]
pub fn allowed(role: Role, endpoint: Endpoint) -> bool {
    endpoint.allowed_roles().contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drivers_can_book_and_pay() {
        for endpoint in [
            Endpoint::CreateReservation,
            Endpoint::ListReservations,
            Endpoint::CreateOrder,
            Endpoint::MarkPaid,
            Endpoint::Receipt,
        ] {
            assert!(allowed(Role::User, endpoint), "{endpoint:?}");
            assert!(allowed(Role::Owner, endpoint), "{endpoint:?}");
            assert!(allowed(Role::Admin, endpoint), "{endpoint:?}");
        }
    }

    #[test]
    fn test_operator_only_endpoints() {
        for endpoint in [
            Endpoint::CreateLot,
            Endpoint::UpdateLot,
            Endpoint::AddSpaces,
            Endpoint::Analytics,
            Endpoint::ValidateEntry,
            Endpoint::ValidateExit,
        ] {
            assert!(!allowed(Role::User, endpoint), "{endpoint:?}");
            assert!(allowed(Role::Owner, endpoint), "{endpoint:?}");
            assert!(allowed(Role::Admin, endpoint), "{endpoint:?}");
        }
    }
}
