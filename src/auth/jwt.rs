use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Session token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

const MAX_TTL_HOURS: i64 = 24 * 365;

/// Signing and verification keys, built once from config at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_hours.clamp(0, MAX_TTL_HOURS) as u64 * 3600),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        self.sign(user_id, now, exp)
    }

    fn sign(&self, user_id: Uuid, iat: OffsetDateTime, exp: OffsetDateTime) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: iat.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Returns the claims of a valid token; expired, malformed or foreign tokens yield `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => {
                debug!(user_id = %data.claims.sub, "jwt verified");
                Some(data.claims)
            }
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        keys_with_ttl(secret, issuer, audience, 24)
    }

    fn keys_with_ttl(secret: &str, issuer: &str, audience: &str, ttl_hours: i64) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_hours,
        })
    }

    #[test]
    fn issue_and_verify() {
        let keys = make_keys("dev-secret", "perfil", "players");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("issue");
        let claims = keys.verify(&token).expect("valid token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(keys.ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn huge_ttl_is_capped() {
        let keys = keys_with_ttl("dev-secret", "perfil", "players", i64::MAX);
        assert_eq!(keys.ttl(), Duration::from_secs(365 * 24 * 3600));
        let token = keys.issue(Uuid::new_v4()).expect("issue");
        assert!(keys.verify(&token).is_some());

        let keys = keys_with_ttl("dev-secret", "perfil", "players", -5);
        assert_eq!(keys.ttl(), Duration::ZERO);
    }

    #[test]
    fn rejects_other_secret() {
        let token = make_keys("one", "perfil", "players")
            .issue(Uuid::new_v4())
            .unwrap();
        assert!(make_keys("two", "perfil", "players").verify(&token).is_none());
    }

    #[test]
    fn rejects_wrong_issuer_or_audience() {
        let token = make_keys("same", "good-iss", "good-aud")
            .issue(Uuid::new_v4())
            .unwrap();
        assert!(make_keys("same", "bad-iss", "good-aud").verify(&token).is_none());
        assert!(make_keys("same", "good-iss", "bad-aud").verify(&token).is_none());
    }

    #[test]
    fn rejects_expired_and_garbage() {
        let keys = make_keys("dev-secret", "perfil", "players");
        let past = OffsetDateTime::now_utc() - TimeDuration::days(2);
        let expired = keys
            .sign(Uuid::new_v4(), past, past + TimeDuration::hours(24))
            .unwrap();
        assert!(keys.verify(&expired).is_none());
        assert!(keys.verify("not.a.token").is_none());
        assert!(keys.verify("").is_none());
    }
}
