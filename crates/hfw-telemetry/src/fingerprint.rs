//! Error fingerprints
//!
//! Identical failures at the same step collapse to the same fingerprint across
//! runs, while the raw message never leaves the machine.

use sha2::{Digest, Sha256};

/// Number of hex characters of the message digest kept in a fingerprint
pub const FINGERPRINT_HASH_LEN: usize = 8;

/// Fingerprint of an error, derived from the last logged message and the step
/// counter at the time of the error
pub fn error_fingerprint(last_message: &str, step: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(last_message.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("{}-{}", &digest[..FINGERPRINT_HASH_LEN], step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_fingerprint() {
        let a = error_fingerprint("Creating new HCS topic", 4);
        let b = error_fingerprint("Creating new HCS topic", 4);

        assert_eq!(a, b);
        assert!(a.ends_with("-4"));
        assert_eq!(a.len(), FINGERPRINT_HASH_LEN + 2);
    }

    #[test]
    fn test_step_or_message_changes_fingerprint() {
        let base = error_fingerprint("Creating new HCS topic", 4);

        assert_ne!(base, error_fingerprint("Creating new HCS topic", 5));
        assert_ne!(base, error_fingerprint("Publish message to HCS topic", 4));
    }

    #[test]
    fn test_no_state_carried_between_calls() {
        let first = error_fingerprint("step one", 1);
        let _ = error_fingerprint("something else entirely", 9);

        assert_eq!(first, error_fingerprint("step one", 1));
    }
}
