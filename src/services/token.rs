use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::user::UserRole,
    routes::auth::claims::{Claims, IdentityContext},
    utils::jwt::{create_jwt, decode_jwt, JwtKeys},
};

pub const AUTH_COOKIE_NAME: &str = "auth-token";
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("a {role} token must name an organization")]
    MissingOrganization { role: UserRole },
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Why a token was refused. Only ever logged; callers branch on validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    Missing,
    Malformed,
    BadSignature,
    Expired,
    WrongIssuerOrAudience,
    MissingOrganization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Valid(IdentityContext),
    Invalid(InvalidTokenReason),
}

impl TokenVerification {
    pub fn identity(&self) -> Option<IdentityContext> {
        match self {
            TokenVerification::Valid(identity) => Some(*identity),
            TokenVerification::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TokenVerification::Valid(_))
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    pub fn max_age_seconds(&self) -> i64 {
        (self.claims.exp - self.claims.iat).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct TokenService {
    keys: JwtKeys,
    issuer: String,
    audience: String,
    session_ttl: Duration,
}

impl TokenService {
    pub fn new(keys: JwtKeys, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            session_ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Issues a session token valid for [`SESSION_TTL_DAYS`].
    pub fn issue(
        &self,
        user_id: Uuid,
        role: UserRole,
        organization_id: Option<Uuid>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_with_ttl(user_id, role, organization_id, self.session_ttl)
    }

    /// Issues a token with a custom lifetime, e.g. for short step-up flows.
    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        role: UserRole,
        organization_id: Option<Uuid>,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        if !role.is_super_admin() && organization_id.is_none() {
            return Err(TokenError::MissingOrganization { role });
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            role,
            organization_id,
            iat: now,
            exp: now + ttl.num_seconds(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = create_jwt(&claims, &self.keys)?;
        Ok(IssuedToken { token, claims })
    }

    pub fn verify(&self, token: &str) -> TokenVerification {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> TokenVerification {
        let token = token.trim();
        if token.is_empty() {
            return TokenVerification::Invalid(InvalidTokenReason::Missing);
        }

        let data = match decode_jwt(token, &self.keys, &self.issuer, &self.audience, now) {
            Ok(data) => data,
            Err(err) => {
                let reason = classify_jwt_error(err.kind());
                debug!(?reason, "identity token rejected");
                return TokenVerification::Invalid(reason);
            }
        };

        let claims = data.claims;
        if !claims.role.is_super_admin() && claims.organization_id.is_none() {
            debug!(user_id = %claims.user_id, role = %claims.role, "token without organization rejected");
            return TokenVerification::Invalid(InvalidTokenReason::MissingOrganization);
        }

        TokenVerification::Valid(IdentityContext::from(&claims))
    }

    /// Reads the token from the `auth-token` cookie, falling back to an
    /// `Authorization: Bearer` header. The cookie wins when both are present.
    pub fn verify_headers(&self, headers: &HeaderMap) -> TokenVerification {
        match extract_token(headers) {
            Some(token) => self.verify(&token),
            None => TokenVerification::Invalid(InvalidTokenReason::Missing),
        }
    }
}

fn classify_jwt_error(kind: &ErrorKind) -> InvalidTokenReason {
    match kind {
        ErrorKind::ExpiredSignature => InvalidTokenReason::Expired,
        ErrorKind::InvalidSignature => InvalidTokenReason::BadSignature,
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
            InvalidTokenReason::WrongIssuerOrAudience
        }
        _ => InvalidTokenReason::Malformed,
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE_NAME) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            if scheme.eq_ignore_ascii_case("bearer") {
                Some(token.trim().to_string())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}
