use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use crate::error::TokenError;

pub const DEFAULT_TTL_MINUTES: i64 = 15;

/// Resolve an algorithm name. Only HMAC algorithms are accepted since keys are shared secrets.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|_| TokenError::UnsupportedAlgorithm(name.to_string()))?;
    ensure_hmac(algorithm)?;
    Ok(algorithm)
}

fn ensure_hmac(algorithm: Algorithm) -> Result<(), TokenError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(()),
        other => Err(TokenError::UnsupportedAlgorithm(format!("{:?}", other))),
    }
}

/// Sign `claims` with an `exp` set `ttl` from now. A caller-supplied `exp` is replaced.
pub fn issue<C: Serialize>(
    claims: &C,
    secret: &str,
    ttl: Duration,
    algorithm: Algorithm,
) -> Result<String, TokenError> {
    ensure_hmac(algorithm)?;

    let mut payload = match serde_json::to_value(claims).map_err(|e| TokenError::Encode(e.to_string()))? {
        Value::Object(map) => map,
        _ => return Err(TokenError::Encode("claims must serialize to a JSON object".to_string())),
    };
    let exp = (Utc::now() + ttl).timestamp();
    payload.insert("exp".to_string(), Value::from(exp));

    encode(
        &Header::new(algorithm),
        &payload,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// [`issue`] with a 15 minute lifetime and HS256.
pub fn issue_default<C: Serialize>(claims: &C, secret: &str) -> Result<String, TokenError> {
    issue(claims, secret, Duration::minutes(DEFAULT_TTL_MINUTES), Algorithm::HS256)
}

/// Verify signature and expiry, then decode the claims. No clock leeway is granted.
pub fn verify<C: DeserializeOwned>(
    token: &str,
    secret: &str,
    algorithm: Algorithm,
) -> Result<C, TokenError> {
    ensure_hmac(algorithm)?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    // Claim sets are caller-defined; audience checks belong to the caller.
    validation.validate_aud = false;

    let data = decode::<C>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Map};

    const TEST_SECRET: &str = "test-secret-for-unit-tests-only";

    #[derive(Debug, Serialize, Deserialize)]
    struct UserClaims {
        sub: String,
        role: String,
        #[serde(default)]
        exp: i64,
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let claims = json!({ "sub": "testuser" });
        let token = issue(&claims, TEST_SECRET, Duration::minutes(30), Algorithm::HS256)
            .expect("Should issue token");
        assert!(!token.is_empty());

        let decoded: Map<String, Value> = verify(&token, TEST_SECRET, Algorithm::HS256)
            .expect("Should verify valid token");
        assert_eq!(decoded["sub"], "testuser");
        assert!(decoded.contains_key("exp"));
        assert_eq!(decoded.len(), 2, "Only the caller's claims plus exp are expected");
    }

    #[test]
    fn test_typed_claims_round_trip() {
        let claims = UserClaims { sub: "u1".into(), role: "operator".into(), exp: 0 };
        let before = Utc::now().timestamp();
        let token = issue(&claims, TEST_SECRET, Duration::hours(2), Algorithm::HS384)
            .expect("Should issue token");
        let decoded: UserClaims = verify(&token, TEST_SECRET, Algorithm::HS384).expect("Should verify");
        assert_eq!(decoded.role, "operator");
        assert!(decoded.exp >= before + 2 * 3600);
        assert!(decoded.exp <= Utc::now().timestamp() + 2 * 3600);
    }

    #[test]
    fn test_expired_token_fails() {
        let claims = json!({ "sub": "testuser" });
        let token = issue(&claims, TEST_SECRET, Duration::minutes(-1), Algorithm::HS256)
            .expect("Should issue token");
        let result: Result<Value, _> = verify(&token, TEST_SECRET, Algorithm::HS256);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_verify_wrong_secret_fails() {
        let token = issue_default(&json!({ "sub": "testuser" }), TEST_SECRET).expect("Should issue");
        let result: Result<Value, _> = verify(&token, "wrongsecret", Algorithm::HS256);
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_algorithm_mismatch_fails() {
        let token = issue_default(&json!({ "sub": "testuser" }), TEST_SECRET).expect("Should issue");
        let result: Result<Value, _> = verify(&token, TEST_SECRET, Algorithm::HS512);
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_malformed_token_fails() {
        let result: Result<Value, _> = verify("not.a.valid.jwt", TEST_SECRET, Algorithm::HS256);
        assert!(matches!(result, Err(TokenError::Invalid)));
        let result: Result<Value, _> = verify("", TEST_SECRET, Algorithm::HS256);
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_non_object_claims_rejected() {
        let result = issue_default(&"just-a-string", TEST_SECRET);
        assert!(matches!(result, Err(TokenError::Encode(_))));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS512").expect("HS512 is HMAC"), Algorithm::HS512);
        assert!(matches!(parse_algorithm("RS256"), Err(TokenError::UnsupportedAlgorithm(_))));
        assert!(matches!(parse_algorithm("nope"), Err(TokenError::UnsupportedAlgorithm(_))));
    }
}
