//! Argon2 hashing for staff passwords, counter PINs and reset codes.
//!
//! Only PHC-format hashes are stored; plain secrets never reach the database.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;

use crate::error::{DbError, DbResult};

/// Hashes a secret for storage.
pub fn hash_secret(secret: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash secret: {}", e)))?;

    Ok(hash.to_string())
}

/// Checks a secret against a stored hash. Malformed hashes never verify.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Six-digit numeric reset code, zero padded.
pub fn generate_reset_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}
