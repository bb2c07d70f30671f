use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::user::ExternalIdentity;

/// Session token claims. `sub` is the resolved user id.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Claims of the assertion handed over by the OAuth exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub exp: usize,
}

pub fn create_token(user_id: &str, jwt_secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::hours(ttl_hours)).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: usize::try_from(expiration).unwrap_or_default(),
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_bytes()))?;
    Ok(token)
}

/// Returns the user id carried by a valid, unexpired session token.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<String, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::unauthorized("Invalid or expired token"));
    }
    Ok(token_data.claims.sub)
}

/// Verifies an identity assertion and turns it into the identity to sign in.
///
/// The email is required and lowercased; the display name falls back to it.
pub fn verify_identity_assertion(assertion: &str, provider_secret: &str) -> Result<ExternalIdentity, AppError> {
    let claims = decode::<IdentityClaims>(
        assertion,
        &DecodingKey::from_secret(provider_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::unauthorized(format!("Invalid identity assertion: {e}")))?
    .claims;

    let email = claims
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("identity provider did not return an email"))?;
    let subject = match claims.sub.trim() {
        "" => email.clone(),
        sub => sub.to_string(),
    };
    let display_name = claims
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| email.clone(), str::to_string);

    Ok(ExternalIdentity {
        subject,
        email,
        display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn assertion(sub: &str, email: Option<&str>, name: Option<&str>, secret: &str) -> String {
        let claims = IdentityClaims {
            sub: sub.into(),
            email: email.map(Into::into),
            name: name.map(Into::into),
            exp: (Utc::now() + Duration::minutes(5)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn token_round_trips_user_id() {
        let token = create_token("user-1", SECRET, 24).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap(), "user-1");
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = create_token("user-1", SECRET, 24).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("user-1", SECRET, -2).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn assertion_yields_normalised_identity() {
        let raw = assertion("google-1", Some(" Ada@Example.COM "), None, SECRET);
        let identity = verify_identity_assertion(&raw, SECRET).unwrap();
        assert_eq!(identity.subject, "google-1");
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.display_name, "ada@example.com");
    }

    #[test]
    fn assertion_without_subject_uses_email() {
        let raw = assertion("", Some("ada@example.com"), Some("Ada"), SECRET);
        let identity = verify_identity_assertion(&raw, SECRET).unwrap();
        assert_eq!(identity.subject, "ada@example.com");
        assert_eq!(identity.display_name, "Ada");
    }

    #[test]
    fn assertion_without_email_is_rejected() {
        let raw = assertion("google-1", None, Some("Ada"), SECRET);
        assert!(matches!(verify_identity_assertion(&raw, SECRET), Err(AppError::Validation(_))));
    }

    #[test]
    fn forged_assertion_is_rejected() {
        let raw = assertion("google-1", Some("ada@example.com"), None, "not-the-provider");
        assert!(matches!(verify_identity_assertion(&raw, SECRET), Err(AppError::Unauthorized(_))));
    }
}
