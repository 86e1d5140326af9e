//! Failure reasons surfaced by the library.
//!
//! Library code never terminates the process; every failure is propagated as
//! an [`Error`] and the binaries map it to an exit code.

use std::error;
use std::fmt;

/// Everything that can go wrong during code-book loading or key recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Invalid combination of command line arguments.
    Usage(String),
    /// The key string is not exactly twenty lowercase hex digits.
    BadKey(String),
    /// The S-box string is not sixteen decimal values in 0..=15.
    BadSbox(String),
    /// The ciphertext list could not be opened or parsed.
    CodeBook(String),
    /// `decrypt(encrypt(x)) != x` while generating a code-book.
    SelfCheck(u16),
    /// Trail enumeration produced no trails for a pattern.
    NoTrails { round: usize, pattern: u16 },
    /// A nibble of a subkey had an empty argmax set.
    NoCandidate { round: usize, nibble: usize },
    /// The exhaustive key[1] search found no match.
    SearchExhausted,
    /// A key given to `--test-key` does not reproduce the code-book.
    KeyMismatch,
}

impl Error {
    /// Exit code for the process once this error reaches a binary's driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) | Error::BadKey(_) | Error::BadSbox(_) | Error::CodeBook(_) => 1,
            Error::KeyMismatch => 2,
            Error::SearchExhausted => 3,
            Error::SelfCheck(_) | Error::NoTrails { .. } | Error::NoCandidate { .. } => 4,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Usage(msg) => write!(f, "{}", msg),
            Error::BadKey(msg) => write!(f, "bad key: {}", msg),
            Error::BadSbox(msg) => write!(f, "bad S-box: {}", msg),
            Error::CodeBook(msg) => write!(f, "bad ciphertext list: {}", msg),
            Error::SelfCheck(pt) => {
                write!(f, "cipher self-check failed at plaintext {:04x}", pt)
            }
            Error::NoTrails { round, pattern } => write!(
                f,
                "no trails for pattern {:x} in round {}, this is probably a bug",
                pattern, round
            ),
            Error::NoCandidate { round, nibble } => write!(
                f,
                "no key[{}] candidate for nibble {}, this is probably a bug",
                round, nibble
            ),
            Error::SearchExhausted => {
                write!(f, "exhausted the key[1] search space, the other subkeys are wrong")
            }
            Error::KeyMismatch => write!(f, "key is wrong"),
        }
    }
}

impl error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_severity() {
        assert_eq!(Error::BadKey(String::new()).exit_code(), 1);
        assert_eq!(Error::KeyMismatch.exit_code(), 2);
        assert_eq!(Error::SearchExhausted.exit_code(), 3);
        assert_eq!(Error::NoCandidate { round: 4, nibble: 0 }.exit_code(), 4);
    }
}
