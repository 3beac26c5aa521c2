use crate::error::EngineError;

/// Digit fallback when a hash carries no decimal digits.
pub const DEFAULT_DIGIT: u8 = 0;

/// Numeric signals derived from an opaque transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashDigest {
    /// Last decimal digit found scanning left to right
    pub trailing_digit: u8,
    /// Sum of every decimal digit in the hash
    pub digit_sum: u64,
}

impl HashDigest {
    /// Digest a hash in one pass. An empty hash is invalid input; a hash with
    /// no digits is valid and yields digit 0 / sum 0.
    pub fn of(hash: &str) -> Result<Self, EngineError> {
        if hash.is_empty() {
            return Err(EngineError::invalid_input("transaction hash is empty"));
        }

        let mut trailing_digit = DEFAULT_DIGIT;
        let mut digit_sum = 0u64;
        for digit in hash.chars().filter_map(|c| c.to_digit(10)) {
            trailing_digit = digit as u8;
            digit_sum += u64::from(digit);
        }

        Ok(Self {
            trailing_digit,
            digit_sum,
        })
    }
}

/// Last decimal digit of `hash`, or 0 if it has none.
pub fn trailing_digit(hash: &str) -> Result<u8, EngineError> {
    HashDigest::of(hash).map(|d| d.trailing_digit)
}

/// Sum of the decimal digits of `hash`; non-digits contribute nothing.
pub fn digit_sum(hash: &str) -> Result<u64, EngineError> {
    HashDigest::of(hash).map(|d| d.digit_sum)
}
