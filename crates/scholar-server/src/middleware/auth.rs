use crate::error::AuthError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Extensions, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use scholar_token::{Payload, TokenMaker};
use serde::Serialize;
use std::sync::Arc;

/// Cookie carrying the access token unless configured otherwise.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Settings for one instance of the auth middleware.
///
/// Each route group gets its own instance, so role requirements are composed
/// by configuration rather than by checks inside handlers.
#[derive(Clone)]
pub struct AuthConfig {
    token_maker: Arc<TokenMaker>,
    skip_paths: Vec<String>,
    required_roles: Vec<String>,
    cookie_name: String,
}

impl AuthConfig {
    /// Any valid token passes.
    pub fn require_auth(token_maker: Arc<TokenMaker>) -> Self {
        Self {
            token_maker,
            skip_paths: Vec::new(),
            required_roles: Vec::new(),
            cookie_name: ACCESS_TOKEN_COOKIE.to_string(),
        }
    }

    /// A valid token carrying at least one of `roles` passes.
    pub fn require_roles<I, S>(token_maker: Arc<TokenMaker>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
            ..Self::require_auth(token_maker)
        }
    }

    /// Path prefixes that go through without a token and without identity.
    pub fn with_skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    fn should_skip(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Verified identity attached to a request by [`authenticate`].
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub subject: String,
    /// The raw token the request presented.
    #[serde(skip)]
    pub token: String,
    #[serde(skip)]
    pub payload: Payload,
}

impl AuthContext {
    fn new(payload: Payload, token: String) -> Self {
        Self {
            user_id: payload.user_id.clone(),
            email: payload.email.clone(),
            roles: payload.roles.clone(),
            subject: payload.subject.clone(),
            token,
            payload,
        }
    }

    /// The identity attached to a request, if any.
    pub fn from_extensions(extensions: &Extensions) -> Option<&AuthContext> {
        extensions.get::<AuthContext>()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.payload.has_role(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.payload.has_any_role(roles)
    }
}

/// Whether the auth middleware attached an identity to this request.
pub fn is_authenticated(extensions: &Extensions) -> bool {
    AuthContext::from_extensions(extensions).is_some()
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthContext::from_extensions(&parts.extensions)
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Axum middleware validating the access token cookie.
///
/// - skip-listed paths pass through untouched
/// - missing cookie or failed verification: 401
/// - valid token without a required role: 403
/// - otherwise an [`AuthContext`] is attached and the request continues
pub async fn authenticate(
    State(config): State<Arc<AuthConfig>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = req.uri().path().to_owned();

    if config.should_skip(&path) {
        tracing::trace!(%path, "auth skipped");
        return Ok(next.run(req).await);
    }

    let jar = CookieJar::from_headers(req.headers());
    let token = jar
        .get(&config.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(%path, cookie = %config.cookie_name, "missing access token");
            AuthError::Unauthorized
        })?;

    let payload = config.token_maker.verify_token(&token).map_err(|e| {
        tracing::warn!(%path, reason = e.kind(), error = %e, "rejected access token");
        AuthError::Unauthorized
    })?;

    if !payload.has_any_role(config.required_roles.as_slice()) {
        tracing::warn!(
            %path,
            user_id = %payload.user_id,
            required = ?config.required_roles,
            "missing required role"
        );
        return Err(AuthError::Forbidden);
    }

    req.extensions_mut().insert(AuthContext::new(payload, token));
    Ok(next.run(req).await)
}
