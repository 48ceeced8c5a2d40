use crate::model::Secret;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

/// Secret size in bytes. Matches the MTProxy client secret and gives
/// 128 bits of entropy.
pub const SECRET_BYTES: usize = 16;

/// Produces relay secrets from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretGenerator;

impl SecretGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh secret as 32 lowercase hex characters
    pub fn generate(&self) -> Secret {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let secret = Secret::new(hex::encode(bytes));
        bytes.zeroize();
        secret
    }
}
