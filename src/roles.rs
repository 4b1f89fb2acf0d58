//! Role permissions and the authorization policy.
//!
//! Each [`Role`] maps to a fixed [`Permissions`] set. Component operations call
//! [`authorize`] before touching the store; ownership rules (author-only
//! comment edits, author-or-admin content edits) are checked separately by the
//! operation itself via [`Actor::owns_or_overrides`].

use bitflags::bitflags;
use tracing::warn;

use crate::{error::ServiceError, models::Role};

bitflags! {
    /// Operations a role may perform.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Submit content; plain users always land in `pending`.
        const SUBMIT_CONTENT = 1 << 0;
        /// Choose the initial status (`draft` or `pending`) of new content.
        const CHOOSE_INITIAL_STATUS = 1 << 1;
        /// Approve or flag content.
        const MODERATE_CONTENT = 1 << 2;
        /// Edit or delete content authored by someone else.
        const OVERRIDE_OWNERSHIP = 1 << 3;
        /// List the pending moderation queue.
        const REVIEW_QUEUE = 1 << 4;
        /// Create categories.
        const CREATE_CATEGORY = 1 << 5;
        /// Rename or delete categories.
        const MANAGE_CATEGORIES = 1 << 6;
        /// Create, list, activate and deactivate accounts.
        const MANAGE_USERS = 1 << 7;
        /// Comment, review, subscribe and keep a wishlist.
        const PARTICIPATE = 1 << 8;
        /// Approve content whatever its current state.
        const FORCE_APPROVE = 1 << 9;
    }
}

impl Permissions {
    /// Permission set granted to `role`.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::all(),
            Role::TechWriter => Self::from_bits_truncate(
                Self::SUBMIT_CONTENT.bits()
                    | Self::CHOOSE_INITIAL_STATUS.bits()
                    | Self::MODERATE_CONTENT.bits()
                    | Self::CREATE_CATEGORY.bits()
                    | Self::PARTICIPATE.bits(),
            ),
            Role::User => {
                Self::from_bits_truncate(Self::SUBMIT_CONTENT.bits() | Self::PARTICIPATE.bits())
            }
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Database identifier of the acting user.
    pub user_id: i32,
    /// Role resolved from the user row.
    pub role: Role,
}

impl Actor {
    /// Build an actor from a user id and role.
    #[must_use]
    pub const fn new(user_id: i32, role: Role) -> Self { Self { user_id, role } }

    /// Permissions granted to this actor.
    #[must_use]
    pub const fn permissions(&self) -> Permissions { Permissions::for_role(self.role) }

    /// Whether the actor holds every bit in `perm`.
    #[must_use]
    pub const fn can(&self, perm: Permissions) -> bool { self.permissions().contains(perm) }

    /// Whether the actor owns a row authored by `owner_id`, or may act on
    /// other users' rows.
    #[must_use]
    pub const fn owns_or_overrides(&self, owner_id: i32) -> bool {
        self.user_id == owner_id || self.can(Permissions::OVERRIDE_OWNERSHIP)
    }
}

/// Roles that hold every bit in `perm`.
fn roles_with(perm: Permissions) -> Vec<&'static str> {
    Role::ALL
        .iter()
        .filter(|r| Permissions::for_role(**r).contains(perm))
        .map(|r| r.as_str())
        .collect()
}

/// Allow or deny `perm` for `actor`.
///
/// # Errors
/// Returns [`ServiceError::Forbidden`] naming the roles that would have been
/// allowed.
pub fn authorize(actor: &Actor, perm: Permissions) -> Result<(), ServiceError> {
    if actor.can(perm) {
        return Ok(());
    }
    warn!(user_id = actor.user_id, role = %actor.role, ?perm, "authorization denied");
    Err(ServiceError::forbidden(format!(
        "Access denied. Required role: {}",
        roles_with(perm).join(", ")
    )))
}
