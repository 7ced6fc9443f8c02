use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Closed set of platform roles. A role is attached to an identity at
/// account-provisioning time; unrecognized role strings are rejected at the
/// token/cookie boundary rather than compared loosely downstream.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Client,
    Employee,
    Manager,
    Admin,
}

/// Roles that operate on any order rather than only their own
pub const STAFF_ROLES: &[Role] = &[Role::Employee, Role::Manager, Role::Admin];

impl Role {
    /// Staff roles operate on any order; clients only on their own.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Employee | Role::Manager | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed to reassign order handlers
    pub fn can_assign_orders(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}
