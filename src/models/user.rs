// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_phone;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tel: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn display_phone(&self) -> String {
        format_phone(&self.tel)
    }
}

/// Sign-up payload fields; the avatar file travels alongside as multipart.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub tel: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let json = r#"{"id":"f1f2f3f4-0000-0000-0000-000000000001","name":"Maria Gomes","email":"maria@example.com","tel":"11987654321","avatar":"uploads/maria.png","created_at":"2024-03-01T12:00:00.000Z"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.name, "Maria Gomes");
        assert_eq!(user.avatar.as_deref(), Some("uploads/maria.png"));
        assert!(user.created_at.is_some());
        assert_eq!(user.display_phone(), "(11) 98765-4321");
    }
}
