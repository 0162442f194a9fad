use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::config::Config;
use crate::error::Result;
use crate::models::{Claims, Identity, Role};

/// JWT Authentication Service
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expiry_seconds: config.jwt_expiry_seconds,
        }
    }

    /// Generate a signed, time-limited token for an authenticated user.
    pub fn generate_token(&self, user_id: &str, username: &str, role: Role) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = now + self.expiry_seconds as i64;

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            authenticated: true,
            iat: now,
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a token and return the identity it asserts. Every failure mode
    /// maps to `AppError::AuthRequired` via the `jsonwebtoken` From impl.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(Identity::from(token_data.claims))
    }
}
