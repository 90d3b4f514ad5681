//! Authorization guard for privileged operations
//!
//! Every privileged entry point calls `require_admin` first, so the
//! `PermissionDenied` surface is uniform instead of ad hoc per operation.

use duespay_shared::Role;

use crate::error::{BillingError, BillingResult};

/// Reject callers that do not hold the admin role
pub fn require_admin(role: Role) -> BillingResult<()> {
    if role.is_admin() {
        Ok(())
    } else {
        Err(BillingError::PermissionDenied)
    }
}
