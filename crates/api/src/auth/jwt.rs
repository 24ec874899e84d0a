//! Session token issuance and verification (HS256 JWT)

use std::sync::{Arc, Mutex};

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quillhub_shared::{AccountId, Role};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Lifetime of every issued session token
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Shortest signing secret accepted at startup
pub const MIN_SECRET_LEN: usize = 32;

/// Source of "now" for issuance and expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Identity claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: AccountId,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Stateless signer/verifier for bearer session tokens
///
/// The key material is fixed at construction and only ever read, so one
/// codec is shared by every request.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec with the 24h horizon and the wall clock
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        Self::with_clock(secret, Duration::hours(TOKEN_TTL_HOURS), Arc::new(SystemClock))
    }

    /// Create a codec with an explicit lifetime and clock
    pub fn with_clock(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            clock,
        })
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.whole_seconds()
    }

    /// Issue a signed token for an account
    pub fn issue(
        &self,
        account_id: AccountId,
        email: &str,
        username: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let exp = now + self.ttl;

        let claims = Claims {
            sub: account_id,
            email: email.to_string(),
            username: username.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };

        // Explicit algorithm; verify() accepts nothing else
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, algorithm, structure, and expiry of a token
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock, with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        if self.clock.now().unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Token signature is invalid")]
    BadSignature,
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signing secret must be at least {MIN_SECRET_LEN} characters")]
    WeakSecret,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    fn codec_at(start: OffsetDateTime) -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let codec = TokenCodec::with_clock(SECRET, Duration::hours(TOKEN_TTL_HOURS), clock.clone())
            .expect("valid secret");
        (codec, clock)
    }

    fn issue(codec: &TokenCodec, role: Role) -> (AccountId, String) {
        let id = AccountId::new();
        let token = codec
            .issue(id, "ada@example.com", "ada", role)
            .expect("Failed to issue token");
        (id, token)
    }

    #[test]
    fn test_issue_and_verify() {
        let (codec, _) = codec_at(OffsetDateTime::now_utc());
        let (id, token) = issue(&codec, Role::Moderator);

        let claims = codec.verify(&token).expect("Invalid token");
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.role, Role::Moderator);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn test_token_expires_exactly_at_horizon() {
        let (codec, clock) = codec_at(OffsetDateTime::now_utc());
        let (_, token) = issue(&codec, Role::User);

        clock.advance(Duration::hours(TOKEN_TTL_HOURS) - Duration::seconds(1));
        assert!(codec.verify(&token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(codec.verify(&token), Err(TokenError::Expired)));

        clock.advance(Duration::days(30));
        assert!(matches!(codec.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_flipped_signature_bit_is_rejected() {
        let (codec, _) = codec_at(OffsetDateTime::now_utc());
        let (_, token) = issue(&codec, Role::Admin);

        let (signed_part, signature) = token.rsplit_once('.').unwrap();
        let raw = URL_SAFE_NO_PAD.decode(signature).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let forged = format!("{}.{}", signed_part, URL_SAFE_NO_PAD.encode(&tampered));
                assert!(
                    matches!(codec.verify(&forged), Err(TokenError::BadSignature)),
                    "bit {} of byte {} accepted",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_bad_signature_wins_over_expiry() {
        let (codec, clock) = codec_at(OffsetDateTime::now_utc());
        let (_, token) = issue(&codec, Role::User);
        clock.advance(Duration::days(2));

        let other = TokenCodec::new("another-secret-that-is-32-chars-long!").unwrap();
        let foreign = other
            .issue(AccountId::new(), "eve@example.com", "eve", Role::Admin)
            .unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Expired)));
        assert!(matches!(codec.verify(&foreign), Err(TokenError::BadSignature)));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let (codec, _) = codec_at(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: AccountId::new(),
            email: "eve@example.com".to_string(),
            username: "eve".to_string(),
            role: Role::Admin,
            iat: now.unix_timestamp(),
            exp: (now + Duration::hours(1)).unix_timestamp(),
        };

        // Same secret, different MAC: still refused
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(codec.verify(&hs512), Err(TokenError::BadSignature)));

        // Unsigned token
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let unsigned = format!("{}.{}.", header, payload);
        assert!(codec.verify(&unsigned).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        let (codec, _) = codec_at(OffsetDateTime::now_utc());

        for garbage in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(codec.verify(garbage), Err(TokenError::Malformed)),
                "{:?} was not reported as malformed",
                garbage
            );
        }
    }

    #[test]
    fn test_unknown_role_claim_is_rejected() {
        let (codec, _) = codec_at(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();
        let payload = serde_json::json!({
            "sub": AccountId::new(),
            "email": "eve@example.com",
            "username": "eve",
            "role": "superuser",
            "iat": now.unix_timestamp(),
            "exp": (now + Duration::hours(1)).unix_timestamp(),
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_weak_secret_is_refused() {
        assert!(matches!(TokenCodec::new("short"), Err(TokenError::WeakSecret)));
        assert!(matches!(TokenCodec::new(""), Err(TokenError::WeakSecret)));
    }
}
