use crate::decimal::parse_bounded;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Largest id [`ShortId::from_url`] produces, so generated ids fit a signed `BIGINT`.
pub const MAX_GENERATED_SHORT_ID: u64 = i64::MAX as u64;

/// A content-derived identifier for a full URL.
///
/// Any `u64` is a valid short id: journals written by older deployments carry
/// unfolded hashes. Ids generated here always fall in `0..=i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(u64);

impl ShortId {
    /// Derives the short id of a URL.
    ///
    /// FNV-1a 64 over the raw bytes with the top bit cleared. The result is
    /// stable across processes and backends, so journal files and database rows
    /// written elsewhere stay addressable.
    pub fn from_url(url: &FullUrl) -> Self {
        Self(fnv1a_64(url.as_str().as_bytes()) & MAX_GENERATED_SHORT_ID)
    }

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The id as a signed SQL `BIGINT`, or `None` when it does not fit one.
    pub fn to_i64(self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }

    /// Generates the full short link based on the provided base URL.
    pub fn to_url(self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Parses the decimal text form of a short id.
///
/// Fails with [`StorageError::InvalidShortId`] on empty input, any non-digit
/// character, or a value that does not fit 64 bits.
pub fn parse_short_id(text: &str) -> Result<ShortId, StorageError> {
    parse_bounded(text, u64::MAX)
        .map(ShortId)
        .map_err(|e| StorageError::InvalidShortId(format!("'{text}': {e}")))
}

impl FromStr for ShortId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_short_id(s)
    }
}

impl From<u64> for ShortId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ShortId> for u64 {
    fn from(value: ShortId) -> Self {
        value.0
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The original long URL. Stored verbatim, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullUrl(String);

impl FullUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Shorthand for [`ShortId::from_url`].
    pub fn short_id(&self) -> ShortId {
        ShortId::from_url(self)
    }
}

impl From<&str> for FullUrl {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for FullUrl {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for FullUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_fnv1a_reference_values() {
        // offset basis with the sign bit cleared
        assert_eq!(ShortId::from_url(&FullUrl::new("")).get(), 0x4bf2_9ce4_8422_2325);
        // FNV-1a("a") = 0xaf63dc4c8601ec8c
        assert_eq!(ShortId::from_url(&FullUrl::new("a")).get(), 0x2f63_dc4c_8601_ec8c);
    }

    #[test]
    fn hash_is_deterministic_and_non_negative() {
        let url = FullUrl::new("https://example.com/some/long/path?q=1");
        let first = url.short_id();
        assert_eq!(first, url.short_id());
        assert!(first.to_i64().is_some_and(|id| id >= 0));
        assert_ne!(first, FullUrl::new("https://example.com/some/long/path?q=2").short_id());
    }

    #[test]
    fn no_normalization() {
        assert_ne!(
            FullUrl::new("http://example.com").short_id(),
            FullUrl::new("http://example.com/").short_id()
        );
    }

    #[test]
    fn parse_round_trips() {
        for value in [0, 1, 42, 1_000_000_007, MAX_GENERATED_SHORT_ID, u64::MAX] {
            assert_eq!(parse_short_id(&value.to_string()).unwrap().get(), value);
        }
    }

    #[test]
    fn parse_rejects_bad_input() {
        for text in ["", "12a", "+1", "-1", " 1", "1 ", "0x10", "١٢"] {
            assert!(
                matches!(parse_short_id(text), Err(StorageError::InvalidShortId(_))),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_accepts_the_full_u64_range() {
        assert_eq!(
            parse_short_id("9223372036854775808").unwrap().get(),
            1 << 63
        );
        assert_eq!(
            parse_short_id("18446744073709551615").unwrap().get(),
            u64::MAX
        );
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(parse_short_id("18446744073709551616").is_err());
        assert!(parse_short_id("99999999999999999999999").is_err());
    }

    #[test]
    fn only_generated_ids_are_guaranteed_to_fit_bigint() {
        assert_eq!(ShortId::new(42).to_i64(), Some(42));
        assert_eq!(ShortId::new(MAX_GENERATED_SHORT_ID).to_i64(), Some(i64::MAX));
        assert_eq!(ShortId::new(u64::MAX).to_i64(), None);
    }

    #[test]
    fn serde_uses_plain_numbers() {
        let id = ShortId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<ShortId>("42").unwrap(), id);
        assert_eq!(
            serde_json::from_str::<ShortId>("18014815298316937606").unwrap(),
            ShortId::new(18_014_815_298_316_937_606)
        );
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let id = ShortId::new(7);
        assert_eq!(id.to_url("http://localhost:8080"), "http://localhost:8080/7");
        assert_eq!(id.to_url("http://localhost:8080/"), "http://localhost:8080/7");
    }
}
