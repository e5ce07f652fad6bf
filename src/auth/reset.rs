use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// How long an emailed reset link stays usable.
pub const RESET_TTL: Duration = Duration::minutes(20);

const SECRET_BYTES: usize = 20;

/// Freshly generated reset secret. Only `digest` and `expires_at` are stored.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub raw: String,
    pub digest: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate(now: OffsetDateTime) -> ResetToken {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    ResetToken {
        digest: digest(&raw),
        raw,
        expires_at: now + RESET_TTL,
    }
}

/// Hex SHA-256 of the raw secret, as persisted.
pub fn digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
