//! HS256 bearer-token verification.
//!
//! Implements the `TokenVerifier` seam from `cargoflow-auth`: signature
//! verification happens here, the deterministic time-window checks stay in
//! `validate_claims`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use cargoflow_auth::{AccessClaims, TokenValidationError, TokenVerifier, validate_claims};

pub struct Hs256TokenVerifier {
    decoding_key: DecodingKey,
}

impl Hs256TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Claims carry RFC3339 timestamps validated by validate_claims, not
        // numeric exp/iat.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
