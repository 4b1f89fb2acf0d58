//! Password hashing and account field validation.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{
        Error,
        PasswordHash,
        PasswordHasher,
        PasswordVerifier,
        SaltString,
        rand_core::OsRng,
    },
};
use regex::Regex;

static USERNAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").ok());
static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").ok());

/// Hash `pw` into a salted PHC string.
///
/// # Errors
/// Returns any error reported by the hasher.
pub fn hash_password(argon2: &Argon2, pw: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(argon2.hash_password(pw.as_bytes(), &salt)?.to_string())
}

/// Check `pw` against a stored PHC string.
///
/// The hash carries its own parameters, so any [`Argon2`] instance can verify
/// it. A malformed hash never verifies.
#[must_use]
pub fn verify_password(argon2: &Argon2, hash: &str, pw: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| argon2.verify_password(pw.as_bytes(), &parsed).is_ok())
}

/// Validate a username: 3 to 30 letters, digits or underscores.
///
/// # Errors
/// Returns a human-readable reason when the username is rejected.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if len < 3 {
        return Err("Username must be at least 3 characters long");
    }
    if len > 30 {
        return Err("Username must be at most 30 characters long");
    }
    if !USERNAME_RE.as_ref().is_some_and(|re| re.is_match(username)) {
        return Err("Username can only contain letters, numbers, and underscores");
    }
    Ok(())
}

/// Whether `email` looks like `local@domain.tld`.
#[must_use]
pub fn is_valid_email(email: &str) -> bool { EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email)) }

#[cfg(test)]
mod tests {
    use argon2::{Algorithm, Params, Version};
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn fast_argon2() -> Argon2<'static> {
        let params = Params::new(1024, 1, 1, None).expect("valid params");
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    #[test]
    fn hash_then_verify() {
        let argon2 = fast_argon2();
        let hashed = hash_password(&argon2, "secret").expect("hash");
        assert!(verify_password(&argon2, &hashed, "secret"));
        assert!(!verify_password(&argon2, &hashed, "Secret"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password(&fast_argon2(), "not-a-phc-string", "secret"));
    }

    #[rstest]
    #[case("al", false)]
    #[case("alice", true)]
    #[case("alice_92", true)]
    #[case("alice smith", false)]
    #[case("a-b-c", false)]
    #[case("abcdefghijabcdefghijabcdefghij", true)]
    #[case("abcdefghijabcdefghijabcdefghijk", false)]
    fn username_rules(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_username(name).is_ok(), ok);
    }

    #[rstest]
    #[case("a@example.com", true)]
    #[case("first.last+tag@mail.example.org", true)]
    #[case("no-at-sign.example.com", false)]
    #[case("a@localhost", false)]
    fn email_rules(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(is_valid_email(email), ok);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn only_the_original_password_verifies(pw in "[ -~]{1,24}", other in "[ -~]{1,24}") {
            let argon2 = fast_argon2();
            let hashed = hash_password(&argon2, &pw).expect("hash");
            prop_assert!(verify_password(&argon2, &hashed, &pw));
            prop_assert_eq!(verify_password(&argon2, &hashed, &other), pw == other);
        }
    }
}
