use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

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

impl JwtClaims {
    /// Roles come from the top-level `role` claim and the
    /// `app_metadata.roles` array. Unknown names are dropped.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();

        if let Some(role) = self.role.as_deref().and_then(|r| r.parse().ok()) {
            roles.push(role);
        }

        let listed = self
            .app_metadata
            .as_ref()
            .and_then(|meta| meta.get("roles"))
            .and_then(|value| value.as_array());

        if let Some(listed) = listed {
            for role in listed.iter().filter_map(|v| v.as_str()).filter_map(|r| r.parse().ok()) {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }

        roles
    }
}

/// Staff roles within a clinic tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Receptionist,
    Doctor,
}

impl Role {
    pub fn can_manage_schedule(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Receptionist | Role::Doctor)
    }

    /// Schedule writes for any doctor and for the whole clinic.
    pub fn can_manage_clinic_schedule(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Receptionist)
    }

    pub fn can_book_appointments(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Receptionist)
    }

    pub fn can_manage_doctors(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "receptionist" | "secretary" => Ok(Role::Receptionist),
            "doctor" | "professional" => Ok(Role::Doctor),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Admin => write!(f, "admin"),
            Role::Receptionist => write!(f, "receptionist"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Any clinic role at all. Plain Supabase users carry none.
    pub fn is_staff(&self) -> bool {
        !self.roles.is_empty()
    }

    pub fn can_manage_schedule(&self) -> bool {
        self.roles.iter().any(Role::can_manage_schedule)
    }

    pub fn can_manage_clinic_schedule(&self) -> bool {
        self.roles.iter().any(Role::can_manage_clinic_schedule)
    }

    /// Whether this user may write schedule entries scoped to `doctor_id`.
    /// Doctors are limited to their own entries; `None` means clinic-wide.
    pub fn can_manage_schedule_of(&self, doctor_id: Option<&str>) -> bool {
        if self.can_manage_clinic_schedule() {
            return true;
        }
        self.has_role(Role::Doctor) && doctor_id == Some(self.id.as_str())
    }

    pub fn can_book_appointments(&self) -> bool {
        self.roles.iter().any(Role::can_book_appointments)
    }

    pub fn can_manage_doctors(&self) -> bool {
        self.roles.iter().any(Role::can_manage_doctors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(role: Option<&str>, app_metadata: Option<serde_json::Value>) -> JwtClaims {
        JwtClaims {
            sub: "user-1".to_string(),
            exp: None,
            email: None,
            role: role.map(str::to_string),
            app_metadata,
            user_metadata: None,
            aud: None,
            iat: None,
        }
    }

    #[test]
    fn test_roles_merge_claim_and_metadata() {
        let claims = claims(
            Some("doctor"),
            Some(json!({ "roles": ["owner", "doctor", "marketing"] })),
        );
        assert_eq!(claims.roles(), vec![Role::Doctor, Role::Owner]);
    }

    #[test]
    fn test_supabase_authenticated_role_is_not_a_clinic_role() {
        let claims = claims(Some("authenticated"), None);
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn test_capabilities() {
        assert!(Role::Receptionist.can_book_appointments());
        assert!(!Role::Doctor.can_book_appointments());
        assert!(Role::Doctor.can_manage_schedule());
        assert!(!Role::Receptionist.can_manage_doctors());
        assert!(!Role::Doctor.can_manage_clinic_schedule());
    }

    #[test]
    fn test_doctor_schedule_scope_is_self_only() {
        let doctor = User {
            id: "doc-1".to_string(),
            email: None,
            roles: vec![Role::Doctor],
            metadata: None,
            created_at: None,
        };
        assert!(doctor.can_manage_schedule_of(Some("doc-1")));
        assert!(!doctor.can_manage_schedule_of(Some("doc-2")));
        assert!(!doctor.can_manage_schedule_of(None));

        let receptionist = User { roles: vec![Role::Receptionist], ..doctor };
        assert!(receptionist.can_manage_schedule_of(Some("doc-2")));
        assert!(receptionist.can_manage_schedule_of(None));
    }
}
