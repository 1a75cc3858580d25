use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated caller, tagged by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    Admin(Uuid),
    Doctor(Uuid),
    Patient(Uuid),
}

impl Actor {
    pub fn id(&self) -> Uuid {
        match self {
            Actor::Admin(id) | Actor::Doctor(id) | Actor::Patient(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Admin(_) => Role::Admin,
            Actor::Doctor(_) => Role::Doctor,
            Actor::Patient(_) => Role::Patient,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin(_))
    }

    /// True for admins and for the user whose id is `id`.
    pub fn is_self_or_admin(&self, id: Uuid) -> bool {
        self.is_admin() || self.id() == id
    }

    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Token carries no role".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Forbidden)?;

        Ok(match role {
            Role::Admin => Actor::Admin(id),
            Role::Doctor => Actor::Doctor(id),
            Role::Patient => Actor::Patient(id),
        })
    }
}

impl TryFrom<&User> for Actor {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        Actor::from_user(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(id: &str, role: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn actor_built_from_role_claim() {
        let id = Uuid::new_v4();
        let actor = Actor::from_user(&user(&id.to_string(), Some("doctor"))).unwrap();
        assert_eq!(actor, Actor::Doctor(id));
        assert_eq!(actor.role(), Role::Doctor);
        assert!(actor.is_self_or_admin(id));
        assert!(!actor.is_self_or_admin(Uuid::new_v4()));
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let id = Uuid::new_v4().to_string();
        assert_matches!(Actor::from_user(&user(&id, Some("nurse"))), Err(AppError::Forbidden(_)));
        assert_matches!(Actor::from_user(&user(&id, None)), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn non_uuid_subject_is_auth_error() {
        assert_matches!(Actor::from_user(&user("42", Some("admin"))), Err(AppError::Auth(_)));
    }
}
