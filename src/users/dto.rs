use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::repo::{Role, User};

/// Request body for registration. Fields are optional so missing values get
/// the service's own 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Profile update: any subset of fields; empty or absent means "leave
/// unchanged".
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// Request body for role change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

/// Public projection of a user. There is no password field on this type at
/// all, so a credential can never serialize out.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersListResponse {
    pub success: bool,
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

/// Login returns only a success flag and the role, no token or profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleUser {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub success: bool,
    pub message: String,
    pub user: RoleUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            phone: "9876543210".into(),
            password_hash: "$2b$04$secret".into(),
            role: Role::User,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn public_projection_never_contains_password() {
        let public: PublicUser = sample_user().into();
        let json = serde_json::to_value(&public).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.contains("password")));
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("id").is_some());
    }

    #[test]
    fn list_response_shape() {
        let body = UsersListResponse {
            success: true,
            users: vec![sample_user().into()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["users"].as_array().unwrap().len(), 1);
        assert!(json["users"][0].get("password").is_none());
        assert!(json["users"][0].get("password_hash").is_none());
    }

    #[test]
    fn role_response_carries_id_and_role_only() {
        let user = sample_user();
        let body = RoleResponse {
            success: true,
            message: "User role updated successfully".into(),
            user: RoleUser {
                id: user.id,
                role: Role::Admin,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["user"]["role"], "admin");
        assert_eq!(json["user"].as_object().unwrap().len(), 2);
    }
}
