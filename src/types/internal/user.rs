use crate::types::db::user;

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile update input. `None` fields are left unchanged.
///
/// Which fields a caller may populate depends on their standing: privileged
/// callers may set all three, self-service callers only username and email.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// Read view of a user with flattened role and permission names.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_email_verified: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub created_at: i64,
}

impl UserProfile {
    pub fn from_parts(model: user::Model, roles: Vec<String>, permissions: Vec<String>) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            is_email_verified: model.is_email_verified,
            roles,
            permissions,
            created_at: model.created_at,
        }
    }
}
