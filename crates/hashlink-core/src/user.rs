use crate::decimal::parse_bounded;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Largest user id; user ids share the signed `BIGINT` column type.
pub const MAX_USER: u64 = i64::MAX as u64;

/// Numeric owner of a set of URLs.
///
/// `User::ANONYMOUS` (0) owns the union of every stored URL and is also the
/// "no identity" signal passed by callers that could not resolve a user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u64", into = "u64")]
pub struct User(u64);

impl User {
    pub const ANONYMOUS: User = User(0);

    pub fn new(value: u64) -> Option<Self> {
        (value <= MAX_USER).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn is_anonymous(self) -> bool {
        self == Self::ANONYMOUS
    }
}

/// Parses the decimal text form of a user id, failing with [`StorageError::InvalidUser`].
pub fn parse_user(text: &str) -> Result<User, StorageError> {
    parse_bounded(text, MAX_USER)
        .map(User)
        .map_err(|e| StorageError::InvalidUser(format!("'{text}': {e}")))
}

impl FromStr for User {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_user(s)
    }
}

impl TryFrom<u64> for User {
    type Error = StorageError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
            .ok_or_else(|| StorageError::InvalidUser(format!("{value} exceeds {MAX_USER}")))
    }
}

impl From<User> for u64 {
    fn from(value: User) -> Self {
        value.0
    }
}

impl Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-chosen key pairing a batch request item with its response item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
