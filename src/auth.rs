use crate::config::SecurityConfig;
use crate::error::ConfigurationError;
use crate::models::{Claims, TokenKind, User};
use anyhow::{anyhow, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    access_expire_minutes: i64,
    refresh_expire_days: i64,
}

impl JwtAuth {
    /// Fails at startup if the configured signing algorithm is unknown;
    /// token handling never has to re-check it afterwards.
    pub fn new(config: &SecurityConfig) -> Result<Self, ConfigurationError> {
        let algorithm: Algorithm = config
            .jwt_algorithm()
            .parse()
            .map_err(|_| ConfigurationError::InvalidAlgorithm(config.jwt_algorithm().to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret().as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret().as_bytes()),
            header: Header::new(algorithm),
            validation: Validation::new(algorithm),
            access_expire_minutes: config.access_token_expire_minutes,
            refresh_expire_days: config.refresh_token_expire_days,
        })
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenKind::Access, self.access_expire_minutes * 60)
    }

    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenKind::Refresh, self.refresh_expire_days * 86_400)
    }

    fn generate(&self, user: &User, kind: TokenKind, lifetime_secs: i64) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role.clone(),
            kind,
            exp: now + lifetime_secs,
            iat: now,
        };

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| anyhow!("token generation failed: {}", e))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("token validation failed: {}", e))
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<&str> {
    match auth_header {
        Some(header) if header.starts_with("Bearer ") => {
            Ok(header.trim_start_matches("Bearer ").trim())
        }
        _ => Err(anyhow!("missing or invalid Authorization header")),
    }
}
