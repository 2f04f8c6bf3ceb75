use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Upper bound on password length; argon2 cost grows with input size.
const MAX_PASSWORD_LENGTH: usize = 64;

/// Hash a password with Argon2id (default parameters, random salt).
///
/// The result is a PHC string such as
/// `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`; it embeds the salt and
/// parameters, so it is the only thing that needs storing.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();

    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Verify a password against a stored PHC hash.
///
/// # Returns
/// - `Ok(true)`: password matches
/// - `Ok(false)`: password doesn't match
/// - `Err(ErrorMessage)`: empty/oversized input or a corrupt stored hash
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    let password_matched = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    Ok(password_matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_compare() {
        let hashed = hash("donate-blood-42").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(compare("donate-blood-42", &hashed).unwrap());
        assert!(!compare("donate-blood-43", &hashed).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash("samepassword").unwrap(), hash("samepassword").unwrap());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert_eq!(hash(""), Err(ErrorMessage::EmptyPassword));
        assert_eq!(
            hash("x".repeat(65)),
            Err(ErrorMessage::ExceededMaxPasswordLength(64))
        );
        assert_eq!(compare("", "irrelevant"), Err(ErrorMessage::EmptyPassword));
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert_eq!(
            compare("password", "not-a-phc-string"),
            Err(ErrorMessage::InvalidHashFormat)
        );
    }
}
