use tracing::error;

/// One-way salted hash of a plaintext password. The cost factor comes from
/// configuration (default 10) and is applied per call; hashing happens only
/// when a password is newly set or changed.
pub fn hash_password(plain: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, cost)
}

/// Compare a plaintext candidate against a stored digest. A non-match and a
/// malformed digest both resolve to `false`; the parse failure is only
/// visible in the server log.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matched) => matched,
        Err(e) => {
            error!(error = %e, "bcrypt verify error");
            false
        }
    }
}
