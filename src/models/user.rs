use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role hierarchy: head admin, admin, then HR / hiring manager, then candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    HeadAdmin,
    Admin,
    Hr,
    HiringManager,
    Candidate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::HeadAdmin => "head_admin",
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::HiringManager => "hiring_manager",
            Role::Candidate => "candidate",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::HeadAdmin | Role::Admin)
    }

    pub fn can_book(&self) -> bool {
        !matches!(self, Role::Candidate)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "head_admin" | "headadmin" => Ok(Role::HeadAdmin),
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "hiring_manager" | "hm" => Ok(Role::HiringManager),
            "candidate" => Ok(Role::Candidate),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, email: Option<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            role,
        }
    }
}
