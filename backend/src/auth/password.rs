//! Password hashing, password policy and opaque token generation.

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine,
};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::AppError;

const PBKDF2_ITERATIONS: u32 = if cfg!(test) { 1_000 } else { 100_000 };
const SALT_SIZE: usize = 16;
const KEY_SIZE: usize = 32;
const TOKEN_SIZE: usize = 32;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 72;

/// Check a new password against the account password policy.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if len > MAX_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "Password cannot exceed {} characters",
            MAX_PASSWORD_CHARS
        )));
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(AppError::Validation(
            "Password must contain uppercase, lowercase, number and special character"
                .to_string(),
        ));
    }
    Ok(())
}

/// Hash a password with a fresh salt.
///
/// Returns `iterations$base64(salt)$base64(key)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let mut derived_key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut derived_key);

    format!(
        "{}${}${}",
        PBKDF2_ITERATIONS,
        BASE64.encode(salt),
        BASE64.encode(derived_key)
    )
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(iterations), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt), BASE64.decode(expected)) else {
        return false;
    };
    if iterations == 0 || expected.is_empty() {
        return false;
    }

    let mut derived_key = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived_key);

    // Constant-time comparison to prevent timing attacks
    derived_key.ct_eq(&expected).into()
}

/// Random URL-safe token for sessions and password resets.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_SIZE];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
