//! Region and registration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic zone a device subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    UsCentral,
    EuropeWest,
    AsiaWest,
    AsiaEast,
}

impl Region {
    /// Every supported region, in declaration order.
    pub const ALL: [Region; 4] = [
        Region::UsCentral,
        Region::EuropeWest,
        Region::AsiaWest,
        Region::AsiaEast,
    ];

    /// Wire name (e.g. `"asia-east"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::UsCentral => "us-central",
            Region::EuropeWest => "europe-west",
            Region::AsiaWest => "asia-west",
            Region::AsiaEast => "asia-east",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRegion(pub String);

impl fmt::Display for UnknownRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown region '{}'", self.0)
    }
}

impl std::error::Error for UnknownRegion {}

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| UnknownRegion(s.to_string()))
    }
}

/// Store-assigned surrogate key of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub i64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One device enrollment. Never updated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    /// Provider-issued push token, kept opaque.
    pub token: String,
    pub region: Region,
}

impl Registration {
    /// Short fingerprint of the token, safe to write to logs.
    pub fn token_fingerprint(&self) -> String {
        token_fingerprint(&self.token)
    }
}

/// First 12 hex characters of the SHA-256 of a token.
pub fn token_fingerprint(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(12);
    digest
}

/// Whether the same token may be registered more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Every registration creates a new record.
    #[default]
    AllowDuplicates,
    /// A token may be registered once; repeats fail with `DuplicateToken`.
    Unique,
}

impl TokenPolicy {
    pub fn from_unique_flag(unique: bool) -> Self {
        if unique {
            TokenPolicy::Unique
        } else {
            TokenPolicy::AllowDuplicates
        }
    }
}
