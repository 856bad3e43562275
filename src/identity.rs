//! Session identity: the display name a client posts under.

use rand::Rng;

/// Prefix used for generated usernames.
pub const DEFAULT_USERNAME_PREFIX: &str = "client-";

/// Generated suffixes are drawn from `0..USERNAME_SUFFIX_RANGE`.
pub const USERNAME_SUFFIX_RANGE: u32 = 10_000;

/// Supplies the username for a new session.
pub trait IdentityProvider: Send + Sync {
    fn username(&self) -> String;
}

/// `prefix` followed by a random number below [`USERNAME_SUFFIX_RANGE`].
///
/// Names are neither persisted nor guaranteed unique.
#[derive(Debug, Clone)]
pub struct RandomIdentity {
    prefix: String,
}

impl RandomIdentity {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for RandomIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME_PREFIX)
    }
}

impl IdentityProvider for RandomIdentity {
    fn username(&self) -> String {
        let suffix = rand::thread_rng().gen_range(0..USERNAME_SUFFIX_RANGE);
        format!("{}{}", self.prefix, suffix)
    }
}

/// Always hands out the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(pub String);

impl FixedIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl IdentityProvider for FixedIdentity {
    fn username(&self) -> String {
        self.0.clone()
    }
}
