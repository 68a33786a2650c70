//! Git operations and repository management.

pub mod change;
pub mod repository;

pub use change::{parse_name_status, ChangeRecord, ParseWarning, ParsedChanges, StatusCode};
pub use repository::{GitRepository, ResolvedTarget};

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 8;

/// Abbreviates a commit hash to [`SHORT_HASH_LEN`] characters.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_long() {
        let hash = "abc1234567890abcdef1234567890abcdef123456";
        assert_eq!(short_hash(hash), "abc12345");
    }

    #[test]
    fn short_hash_short() {
        assert_eq!(short_hash("abc12"), "abc12");
        assert_eq!(short_hash(""), "");
    }
}
