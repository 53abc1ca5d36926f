//! Caller identity and authorization capabilities.
//!
//! Identity comes from trusted gateway headers. Operations that need elevated
//! rights take an `AdminGrant` or `IssueGrant`, which can only be minted from
//! an `Actor` with the right role.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self { email: email.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Approve/reject requests and perform destructive deletes.
    pub fn admin_grant(&self) -> Result<AdminGrant, AppError> {
        if self.is_admin() {
            Ok(AdminGrant { email: self.email.clone() })
        } else {
            Err(AppError::Unauthorized("admin role required".to_string()))
        }
    }

    /// Outward boards against requests or directly.
    pub fn issue_grant(&self) -> Result<IssueGrant, AppError> {
        match self.role {
            Role::Admin | Role::Manager => Ok(IssueGrant { email: self.email.clone() }),
            Role::User => Err(AppError::Unauthorized(
                "admin or manager role required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminGrant {
    email: String,
}

impl AdminGrant {
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Clone)]
pub struct IssueGrant {
    email: String,
}

impl IssueGrant {
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let email = header(USER_EMAIL_HEADER).ok_or(AppError::Unauthenticated)?;
        let role = match header(USER_ROLE_HEADER) {
            None => Role::User,
            Some(raw) => Role::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!("unknown role '{}'", raw))
            })?,
        };

        Ok(Actor::new(email, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<Actor, AppError> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_email_is_unauthenticated() {
        assert!(matches!(extract(&[]).await, Err(AppError::Unauthenticated)));
    }

    #[tokio::test]
    async fn role_defaults_to_user() {
        let actor = extract(&[(USER_EMAIL_HEADER, "tech@example.com")]).await.unwrap();
        assert_eq!(actor.role, Role::User);
        assert!(actor.admin_grant().is_err());
        assert!(actor.issue_grant().is_err());
    }

    #[tokio::test]
    async fn manager_may_issue_but_not_approve() {
        let actor = extract(&[(USER_EMAIL_HEADER, "m@example.com"), (USER_ROLE_HEADER, "Manager")])
            .await
            .unwrap();
        assert!(actor.issue_grant().is_ok());
        assert!(matches!(actor.admin_grant(), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn admin_grant_carries_email() {
        let grant = Actor::new("boss@example.com", Role::Admin).admin_grant().unwrap();
        assert_eq!(grant.email(), "boss@example.com");
    }
}
