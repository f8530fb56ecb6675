//! Caller identity from the API Gateway authorizer.
//!
//! The Cognito authorizer in front of the functions has already verified the
//! caller; handlers only read the resulting claims. Claims are looked up in
//! this order:
//! 1. an [`AuthorizerClaims`] request extension
//! 2. the Lambda request context (`authorizer.claims` for REST APIs,
//!    `authorizer.jwt.claims` for HTTP APIs)
//! 3. the configured development user id

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use lambda_http::request::RequestContext;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::AppState;

const CLAIM_POINTERS: [&str; 2] = ["/authorizer/claims", "/authorizer/jwt/claims"];

/// Verified identity claims attached to a request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizerClaims(pub Map<String, Value>);

impl AuthorizerClaims {
    /// `sub`, falling back to `cognito:username`.
    pub fn user_id(&self) -> Option<String> {
        ["sub", "cognito:username"]
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn from_request_context(context: &RequestContext) -> Option<Self> {
        let context = serde_json::to_value(context).ok()?;
        CLAIM_POINTERS
            .iter()
            .find_map(|pointer| context.pointer(pointer).and_then(Value::as_object))
            .map(|claims| Self(claims.clone()))
    }
}

/// The authenticated caller's user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AuthorizerClaims>().cloned().or_else(|| {
            parts
                .extensions
                .get::<RequestContext>()
                .and_then(AuthorizerClaims::from_request_context)
        });

        if let Some(user_id) = claims.as_ref().and_then(AuthorizerClaims::user_id) {
            return Ok(CallerIdentity(user_id));
        }

        if let Some(dev_user_id) = &state.dev_user_id {
            tracing::debug!("No authorizer claims, using development user {}", dev_user_id);
            return Ok(CallerIdentity(dev_user_id.clone()));
        }

        Err(ApiError::Unauthorized)
    }
}
