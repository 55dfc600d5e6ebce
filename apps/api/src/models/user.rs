use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::taxonomy::Role;

/// The user entity model used in the database and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    #[serde(default)]
    pub id: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub acclab: Option<bool>,
}

fn default_role() -> Role {
    Role::Visitor
}

impl User {
    /// A dummy identity for anonymous API-key access.
    pub fn visitor(email: &str) -> Self {
        User {
            id: 0,
            created_at: Utc::now(),
            email: email.to_string(),
            role: Role::Visitor,
            name: None,
            unit: None,
            acclab: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Curators and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Curator)
    }

    /// Any logged-in user, as opposed to a visitor using the API key.
    pub fn is_regular(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Curator | Role::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> User {
        User {
            role,
            ..User::visitor("someone@undp.org")
        }
    }

    #[test]
    fn role_tiers_are_nested() {
        assert!(user_with_role(Role::Admin).is_admin());
        assert!(user_with_role(Role::Admin).is_staff());
        assert!(user_with_role(Role::Admin).is_regular());

        assert!(!user_with_role(Role::Curator).is_admin());
        assert!(user_with_role(Role::Curator).is_staff());

        assert!(!user_with_role(Role::User).is_staff());
        assert!(user_with_role(Role::User).is_regular());

        assert!(!user_with_role(Role::Visitor).is_regular());
    }
}
