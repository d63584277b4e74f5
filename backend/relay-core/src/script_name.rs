//! Display names handed to workers after they authenticate.

use std::fmt;

use rand::Rng;
use serde::Serialize;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "dusky", "eager", "fuzzy", "gentle", "hollow", "idle", "jolly",
    "keen", "lucid", "mellow", "nimble", "olive", "plucky", "quiet", "rustic", "silent", "tidy",
];

const NOUNS: &[&str] = &[
    "badger", "comet", "delta", "ember", "falcon", "garnet", "harbor", "iris", "juniper",
    "kestrel", "lantern", "meadow", "nebula", "otter", "pylon", "quartz", "raven", "spruce",
    "thistle", "willow",
];

const SUFFIX_RANGE: std::ops::Range<u16> = 0..10_000;

/// Human-readable label for a worker connection. Logging only; never routed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScriptName(String);

impl ScriptName {
    /// Generate a name of the form `adjective-noun-NNNN`.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
        let noun = NOUNS[rng.random_range(0..NOUNS.len())];
        let suffix = rng.random_range(SUFFIX_RANGE);
        Self(format!("{adjective}-{noun}-{suffix:04}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScriptName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
