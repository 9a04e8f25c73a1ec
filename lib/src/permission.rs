//! Role-based capability checks.
//!
//! Callers never look at roles directly. They ask whether a user holds a
//! [`Capability`], which keeps the role model in one place.

use crate::user::{Role, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Run one of one's own mailings right away.
    StartMailing,
    /// Disable or re-enable any mailing.
    ToggleMailing,
    ViewAllMailings,
    ViewAllRecipients,
    BlockUsers,
}

/// Signature of the capability check injected into trigger surfaces.
pub type CapabilityCheck = fn(&User, Capability) -> bool;

/// Default capability model.
///
/// Managers oversee everything but don't run mailings. Regular users may
/// only start mailings, and lose that while blocked.
pub fn has_capability(user: &User, capability: Capability) -> bool {
    match user.role {
        Role::Manager => capability != Capability::StartMailing,
        Role::User => capability == Capability::StartMailing && !user.is_blocked,
    }
}
