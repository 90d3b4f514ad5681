//! Types shared across the workspace

use serde::{Deserialize, Serialize};

/// Caller role asserted by the authentication boundary.
///
/// Identity verification happens upstream; by the time a role reaches the
/// billing engine it is a trusted attribute. `Member` is the ordinary,
/// non-privileged role used for broadcast targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Parse a role string as stored in the database / asserted by the
    /// auth boundary. Unknown values are rejected rather than defaulted.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
