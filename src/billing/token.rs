//! Signed access tokens
//!
//! Tokens are HS256 JWTs whose claims carry the remaining uses and expiry.
//! A consumed token is never mutated: a new token is signed with one use
//! fewer and the same `expiresAt`, so a lineage can never outlive its grant.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::plans::{get_expiration_timestamp, plan_config, PlanId};
use super::types::AccessTokenPayload;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Wire claims: the payload plus the registered JWT timestamps
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    payload: AccessTokenPayload,
    iat: i64,
    exp: i64,
}

/// A freshly signed token and the payload it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub payload: AccessTokenPayload,
}

/// Encodes and verifies access tokens with a shared secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_token_at`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue the first token of a lineage for a purchased plan
    pub fn generate_token(&self, plan_id: PlanId, now: i64) -> Result<IssuedToken, TokenError> {
        let plan = plan_config(plan_id);
        let payload = AccessTokenPayload {
            plan_id,
            token_type: plan.token_type,
            uses_left: plan.uses,
            total_uses: plan.uses,
            expires_at: get_expiration_timestamp(plan.duration_days, now),
            quality: plan.quality,
            jti: Some(Uuid::new_v4().to_string()),
        };

        let token = self.sign(&payload, now)?;
        debug!(plan = %plan_id, uses = plan.uses, "Issued access token");
        Ok(IssuedToken { token, payload })
    }

    /// Decode a token; any signature, structure or expiry failure yields `None`
    pub fn verify_token_at(&self, token: &str, now: i64) -> Option<AccessTokenPayload> {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Rejected access token");
                return None;
            }
        };

        let payload = data.claims.payload;
        if payload.uses_left > payload.total_uses || payload.expires_at <= now {
            return None;
        }
        // exp is derived from expiresAt at signing time
        if data.claims.exp != payload.expires_at {
            return None;
        }

        Some(payload)
    }

    pub fn verify_token(&self, token: &str) -> Option<AccessTokenPayload> {
        self.verify_token_at(token, chrono::Utc::now().timestamp())
    }

    /// Re-sign the payload with one use fewer
    ///
    /// Returns `Ok(None)` when there is nothing left to consume or the grant
    /// has already expired.
    pub fn decrement_token_usage(
        &self,
        payload: &AccessTokenPayload,
        now: i64,
    ) -> Result<Option<IssuedToken>, TokenError> {
        if !payload.is_usable_at(now) {
            return Ok(None);
        }

        let next = AccessTokenPayload {
            uses_left: payload.uses_left - 1,
            ..payload.clone()
        };
        let token = self.sign(&next, now)?;

        debug!(
            plan = %next.plan_id,
            uses_left = next.uses_left,
            "Re-issued access token"
        );
        Ok(Some(IssuedToken {
            token,
            payload: next,
        }))
    }

    pub(crate) fn sign(&self, payload: &AccessTokenPayload, now: i64) -> Result<String, TokenError> {
        let expires_in = payload.expires_at - now;
        let claims = Claims {
            payload: payload.clone(),
            iat: now,
            exp: now + expires_in,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            TokenCodec::new(b"short"),
            Err(TokenError::WeakSecret)
        ));
    }

    #[test]
    fn test_round_trip_every_plan() {
        let codec = codec();
        for plan_id in PlanId::ALL {
            let issued = codec.generate_token(plan_id, NOW).unwrap();
            let decoded = codec.verify_token_at(&issued.token, NOW).unwrap();
            assert_eq!(decoded.plan_id, plan_id);
            assert_eq!(decoded, issued.payload);
            assert_eq!(decoded.uses_left, decoded.total_uses);
        }
    }

    #[test]
    fn test_expires_at_follows_plan_duration() {
        let issued = codec().generate_token(PlanId::Pack10, NOW).unwrap();
        assert_eq!(issued.payload.expires_at, NOW + 60 * 86_400);
        assert!(issued.payload.jti.is_some());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let codec = codec();
        let issued = codec.generate_token(PlanId::Pack5, NOW).unwrap();

        // Splice a bigger plan's claims onto this token's signature
        let bigger = codec.generate_token(PlanId::Pack25, NOW).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let bigger_parts: Vec<&str> = bigger.token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], bigger_parts[1], parts[2]);
        assert!(codec.verify_token_at(&tampered, NOW).is_none());

        let other = TokenCodec::new(b"ffffffffffffffffffffffffffffffff").unwrap();
        assert!(other.verify_token_at(&issued.token, NOW).is_none());
        assert!(codec.verify_token_at("not-a-token", NOW).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let issued = codec.generate_token(PlanId::Pack5, NOW).unwrap();
        let expires_at = issued.payload.expires_at;
        assert!(codec.verify_token_at(&issued.token, expires_at - 1).is_some());
        assert!(codec.verify_token_at(&issued.token, expires_at).is_none());
    }

    #[test]
    fn test_decrement_issues_new_token_with_same_expiry() {
        let codec = codec();
        let issued = codec.generate_token(PlanId::Pack10, NOW).unwrap();

        let next = codec
            .decrement_token_usage(&issued.payload, NOW + 3_600)
            .unwrap()
            .unwrap();
        assert_ne!(next.token, issued.token);
        assert_eq!(next.payload.uses_left, 9);
        assert_eq!(next.payload.expires_at, issued.payload.expires_at);
        assert_eq!(next.payload.jti, issued.payload.jti);

        let decoded = codec.verify_token_at(&next.token, NOW + 3_600).unwrap();
        assert_eq!(decoded.uses_left, 9);
    }

    #[test]
    fn test_uses_left_never_increases_across_lineage() {
        let codec = codec();
        let mut current = codec.generate_token(PlanId::Pack5, NOW).unwrap().payload;
        let mut steps = 0;
        while let Some(next) = codec.decrement_token_usage(&current, NOW + steps).unwrap() {
            assert!(next.payload.uses_left < current.uses_left);
            current = next.payload;
            steps += 1;
        }
        assert_eq!(steps, 5);
        assert_eq!(current.uses_left, 0);
    }

    #[test]
    fn test_decrement_exhausted_returns_none() {
        let codec = codec();
        let mut payload = codec.generate_token(PlanId::Pack5, NOW).unwrap().payload;
        payload.uses_left = 0;
        assert!(codec.decrement_token_usage(&payload, NOW).unwrap().is_none());
    }

    #[test]
    fn test_decrement_expired_returns_none() {
        let codec = codec();
        let payload = codec.generate_token(PlanId::Pack5, NOW).unwrap().payload;
        assert!(codec
            .decrement_token_usage(&payload, payload.expires_at)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decrement_inconsistent_counts_returns_none() {
        let codec = codec();
        let mut payload = codec.generate_token(PlanId::Pack5, NOW).unwrap().payload;
        payload.total_uses = 0;
        payload.uses_left = 3;
        assert!(codec.decrement_token_usage(&payload, NOW).unwrap().is_none());

        payload.total_uses = 2;
        assert!(codec.decrement_token_usage(&payload, NOW).unwrap().is_none());
    }
}
