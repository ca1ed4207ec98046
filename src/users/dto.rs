use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::User;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for signin.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Request body for self-service profile update; absent or empty fields
/// keep their current values.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub token: String,
}

/// Request body for admin edits. A missing `isAdmin` demotes the user,
/// matching the existing clients.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, rename = "isAdmin")]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size", rename = "pageSize")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    12
}

/// Response returned after signup, signin or profile update.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub token: String,
}

impl AuthResponse {
    pub fn new(user: &User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            token,
        }
    }
}

/// One page of the admin user list.
#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    #[serde(rename = "totalUsers")]
    pub total_users: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedUserResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn auth_response_uses_wire_field_names() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "hash".into(),
            is_admin: true,
            reset_token: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&AuthResponse::new(&user, "tok".into())).unwrap();
        assert!(json.contains("\"isAdmin\":true"));
        assert!(json.contains("\"token\":\"tok\""));
        assert!(!json.contains("password"));
    }

    #[test]
    fn page_query_defaults() {
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 12);
    }

    #[test]
    fn admin_update_missing_is_admin_defaults_false() {
        let body: AdminUpdateRequest = serde_json::from_str(r#"{"name":"Bob"}"#).unwrap();
        assert!(!body.is_admin);
        let body: AdminUpdateRequest = serde_json::from_str(r#"{"isAdmin":true}"#).unwrap();
        assert!(body.is_admin);
    }
}
