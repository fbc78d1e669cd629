use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a plaintext password into an argon2id PHC string with a random salt.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))
}

/// True only when `digest` is a PHC string produced for `password`.
/// Digests that do not parse (another scheme, truncation, empty) are a mismatch.
pub fn verify(password: &str, digest: &str) -> bool {
    PasswordHash::new(digest)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// [`hash`] on tokio's blocking pool, keeping CPU-bound work off the async workers.
pub async fn hash_async(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

pub async fn verify_async(password: String, digest: String) -> bool {
    tokio::task::spawn_blocking(move || verify(&password, &digest))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_correct_password() {
        let digest = hash("correct horse battery staple").expect("Should hash password");
        assert!(verify("correct horse battery staple", &digest));
    }

    #[test]
    fn test_digest_of_other_password_never_verifies() {
        let pairs = [
            ("hunter2", "hunter3"),
            ("", " "),
            ("pässwörd", "passwort"),
            ("비밀번호", "비밀번호 "),
            ("Secret", "secret"),
        ];
        for (password, other) in pairs {
            let digest = hash(other).expect("Should hash");
            assert!(!verify(password, &digest), "{:?} must not match digest of {:?}", password, other);
        }
    }

    #[test]
    fn test_empty_and_non_ascii_passwords_round_trip() {
        for password in ["", "🔑 ключ 鍵"] {
            let digest = hash(password).expect("Should hash");
            assert!(verify(password, &digest), "{:?} should verify", password);
        }
    }

    #[test]
    fn test_each_hash_gets_a_fresh_salt() {
        let first = hash("shared").expect("Should hash");
        let second = hash("shared").expect("Should hash");
        let salt = |digest: &str| {
            PasswordHash::new(digest)
                .ok()
                .and_then(|h| h.salt.map(|s| s.as_str().to_string()))
        };
        assert_ne!(salt(&first), salt(&second));
    }

    #[test]
    fn test_foreign_or_truncated_digest_is_a_mismatch() {
        let digest = hash("pw").expect("Should hash");
        let truncated = &digest[..digest.len() / 2];
        assert!(!verify("pw", truncated));
        assert!(!verify("pw", "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW"));
        assert!(!verify("pw", ""));
    }

    #[tokio::test]
    async fn test_async_variants_agree_with_sync() {
        let digest = hash_async("s3cret".to_string()).await.expect("Should hash");
        assert!(verify("s3cret", &digest));
        assert!(verify_async("s3cret".to_string(), digest.clone()).await);
        assert!(!verify_async("other".to_string(), digest).await);
    }
}
