//! Signed, time-limited session tokens (HS256 JWT).

use crate::error::{CoreError, CoreResult};
use crate::model::UserId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// `token_type` reported alongside issued tokens.
pub const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    pub sub: String,
    pub role: Role,
    /// Absolute expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Verified caller identity derived from token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Role,
}

/// Issues and verifies tokens with a server-held symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            default_ttl,
        }
    }

    pub fn from_config(config: &crate::config::AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::hours(i64::from(config.token_ttl_hours)),
        )
    }

    /// Issues a token valid for the configured TTL.
    pub fn issue(&self, user_id: UserId, role: Role) -> CoreResult<String> {
        self.issue_with_ttl(user_id, role, self.default_ttl)
    }

    pub fn issue_with_ttl(&self, user_id: UserId, role: Role, ttl: Duration) -> CoreResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| CoreError::Internal(format!("failed to sign token: {err}")))
    }

    /// Verifies signature, structure and expiry.
    ///
    /// Every failure is reported as `Unauthenticated`; the reason is only
    /// visible in debug logs.
    pub fn verify(&self, token: &str) -> CoreResult<CurrentUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            debug!(
                "event=token_verify module=auth status=error error_kind={:?}",
                err.kind()
            );
            CoreError::Unauthenticated
        })?;

        let id = UserId::from_str(&data.claims.sub).map_err(|_| {
            debug!("event=token_verify module=auth status=error error_kind=bad_subject");
            CoreError::Unauthenticated
        })?;
        Ok(CurrentUser {
            id,
            role: data.claims.role,
        })
    }
}

/// Exact-match role guard.
pub fn require_role(user: &CurrentUser, required: Role) -> CoreResult<()> {
    if user.role == required {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}
