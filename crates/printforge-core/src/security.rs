use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    AuthConfig, PrintForgeError, Result, Role, TrackingCode, User, UserId, TRACKING_ALPHABET,
    TRACKING_CODE_LEN,
};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    role: Role,
    session_id: String,
    iat: usize,
    exp: usize,
}

/// Authenticated identity attached to a request after token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: Duration::seconds(config.token_ttl_secs as i64),
        }
    }

    /// Issue a token for a fresh session. Returns the token and the session
    /// id embedded in it.
    pub fn issue(&self, user: &User) -> Result<(String, String)> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires = now + self.token_ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            session_id: session_id.clone(),
            iat: now.timestamp() as usize,
            exp: expires.timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| PrintForgeError::Auth(e.to_string()))?;
        Ok((token, session_id))
    }

    pub fn verify(&self, token: &str) -> Result<AuthContext> {
        let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| PrintForgeError::Auth(format!("invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| PrintForgeError::Auth("malformed subject claim".into()))?;

        Ok(AuthContext {
            user_id,
            email: data.claims.email,
            role: data.claims.role,
            session_id: data.claims.session_id,
            issued_at: DateTime::from_timestamp(data.claims.iat as i64, 0).unwrap_or_default(),
            expires_at: DateTime::from_timestamp(data.claims.exp as i64, 0).unwrap_or_default(),
        })
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PrintForgeError::Auth(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| PrintForgeError::Auth(format!("corrupt password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Stateless CSRF protection: the token is a keyed digest of the session id,
/// so any instance sharing the secret can verify it without session storage.
/// State-changing requests must present it in `X-CSRF-Token`.
pub struct CsrfProtect {
    secret: Vec<u8>,
}

impl CsrfProtect {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn token_for(&self, session_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b":");
        hasher.update(session_id.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    pub fn verify(&self, session_id: &str, presented: &str) -> bool {
        constant_time_eq(self.token_for(session_id).as_bytes(), presented.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Generate a fresh public tracking code. Uniqueness against already-issued
/// codes is the caller's responsibility (the store re-checks on insert).
pub fn generate_tracking_code() -> TrackingCode {
    let mut rng = rand::rng();
    let code: String = (0..TRACKING_CODE_LEN)
        .map(|_| TRACKING_ALPHABET[rng.random_range(0..TRACKING_ALPHABET.len())] as char)
        .collect();
    TrackingCode::from_generated(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            password_hash: String::new(),
            display_name: "Alice".into(),
            role: Role::Customer,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn jwt_round_trip() {
        let manager = JwtManager::new(&AuthConfig::default());
        let user = test_user();
        let (token, session_id) = manager.issue(&user).unwrap();
        let ctx = manager.verify(&token).unwrap();
        assert_eq!(ctx.user_id, user.id);
        assert_eq!(ctx.session_id, session_id);
        assert_eq!(ctx.role, Role::Customer);
        assert!(!ctx.is_admin());
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let manager = JwtManager::new(&AuthConfig::default());
        let other = JwtManager::new(&AuthConfig {
            jwt_secret: "different".into(),
            ..AuthConfig::default()
        });
        let (token, _) = manager.issue(&test_user()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("hunter3!", &hash).unwrap());
    }

    #[test]
    fn csrf_tokens_are_session_bound() {
        let csrf = CsrfProtect::new("secret".as_bytes().to_vec());
        let token = csrf.token_for("session-a");
        assert!(csrf.verify("session-a", &token));
        assert!(!csrf.verify("session-b", &token));
        assert!(!csrf.verify("session-a", "forged"));
    }

    #[test]
    fn tracking_codes_use_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_tracking_code();
            assert!(TrackingCode::parse(code.as_str()).is_some());
        }
    }
}
