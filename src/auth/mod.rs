//! Login, signup and organization lookup
//!
//! Forms are validated locally before anything is sent. A successful login
//! is written into the [`SessionContext`], which persists it.

use crate::api::{ApiError, AuthApi, LoginRequest, LoginResponse, SignupRequest};
use crate::session::{Identity, SessionContext};
use std::sync::Arc;
use thiserror::Error;

/// Shown when the server gives no usable reason
pub const GENERIC_AUTH_ERROR: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Rejected(String),
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        AuthError::Rejected(auth_error_message(&e))
    }
}

/// The body's `message` field, or the generic message
pub fn auth_error_message(error: &ApiError) -> String {
    match error {
        ApiError::Status {
            server_message: Some(message),
            ..
        } => message.clone(),
        _ => GENERIC_AUTH_ERROR.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    /// An existing organization or a new name
    pub organization: String,
}

impl SignupForm {
    fn validate(&self) -> Result<SignupRequest, AuthError> {
        let request = SignupRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            organization: self.organization.trim().to_string(),
        };
        require("Username", &request.username)?;
        require("Email", &request.email)?;
        require("Password", &request.password)?;
        require("Organization", &request.organization)?;
        Ok(request)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(())
}

pub struct AuthController {
    api: Arc<dyn AuthApi>,
}

impl AuthController {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self { api }
    }

    /// Known organizations; empty when the lookup fails
    pub async fn organizations(&self) -> Vec<String> {
        match self.api.organizations().await {
            Ok(orgs) => orgs,
            Err(e) => {
                tracing::warn!("Failed to fetch organizations: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<(), AuthError> {
        let request = form.validate()?;
        self.api.signup(&request).await?;
        tracing::info!("Registered user {}", request.username);
        Ok(())
    }

    pub async fn login(
        &self,
        session: &mut SessionContext,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let username = username.trim();
        require("Username", username)?;
        require("Password", password)?;

        let response = self
            .api
            .login(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        let identity = identity_from(username, response);
        session.set_identity(identity.clone());
        tracing::info!("Signed in as {}", identity.username);
        Ok(identity)
    }

    pub fn logout(&self, session: &mut SessionContext) {
        session.clear_identity();
    }
}

fn identity_from(username: &str, response: LoginResponse) -> Identity {
    let user_id = match response.user_id {
        Some(serde_json::Value::String(id)) => id,
        Some(serde_json::Value::Null) | None => {
            tracing::warn!("Login response carried no user id");
            String::new()
        }
        Some(other) => other.to_string(),
    };
    Identity {
        user_id,
        username: username.to_string(),
        email: response.email.filter(|e| !e.is_empty()),
        organization: response.organization.filter(|o| !o.is_empty()),
    }
}
