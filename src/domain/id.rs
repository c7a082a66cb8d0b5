//! Public issue identifiers
//!
//! ID Format:
//! - Root issues: `{project-token}-{suffix}` (e.g., `faz-k3x9`)
//! - Child issues: `{root-id}.{index}` (e.g., `faz-k3x9.0`)
//!
//! The suffix is 4 characters drawn from `[a-z0-9]`. The project token is a
//! normalized form of the project name (see [`project_token`]).
//!
//! Only one level of nesting exists: a child ID is never a parent.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the random part of a root ID
pub const SUFFIX_LEN: usize = 4;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const FALLBACK_TOKEN: &str = "project";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid issue ID '{0}': expected '{{token}}-{{4 chars}}' or '{{token}}-{{4 chars}}.{{n}}'")]
    InvalidIdentifier(String),

    #[error("Nested child issues are not supported: '{0}' is already a child issue")]
    UnsupportedNesting(String),
}

/// Canonical public ID of an issue
///
/// Always lowercase and already validated. Construct with [`IssueId::parse`]
/// (or `str::parse`) for user input, [`IssueId::root`] and [`IssueId::child`]
/// for freshly allocated IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueId(String);

impl IssueId {
    /// Normalizes (trim + lowercase) and validates an externally supplied ID
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let id = raw.trim().to_lowercase();
        if is_canonical(&id) {
            Ok(Self(id))
        } else {
            Err(IdError::InvalidIdentifier(raw.to_string()))
        }
    }

    /// Builds a root ID from a project token and a suffix
    pub fn root(token: &str, suffix: &str) -> Result<Self, IdError> {
        Self::parse(&format!("{}-{}", token, suffix))
    }

    /// Builds the ID of this issue's child at `index`
    pub fn child(&self, index: u32) -> Result<Self, IdError> {
        if self.is_child() {
            return Err(IdError::UnsupportedNesting(self.0.clone()));
        }
        Ok(Self(format!("{}.{}", self.0, index)))
    }

    /// Returns true if this ID has a `.N` child segment
    pub fn is_child(&self) -> bool {
        self.0.contains('.')
    }

    /// Returns the root part of a child ID, or None for a root ID
    pub fn parent(&self) -> Option<IssueId> {
        self.0
            .split_once('.')
            .map(|(root, _)| IssueId(root.to_string()))
    }

    /// Returns the project token portion
    pub fn token(&self) -> &str {
        let base = self.0.split('.').next().unwrap_or(&self.0);
        base.rsplit_once('-').map(|(token, _)| token).unwrap_or(base)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checks `^[a-z0-9_]+-[a-z0-9]{4}(\.[0-9]+)?$`
fn is_canonical(id: &str) -> bool {
    let (base, index) = match id.split_once('.') {
        Some((base, index)) => (base, Some(index)),
        None => (id, None),
    };

    if let Some(index) = index {
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }

    let Some((token, suffix)) = base.rsplit_once('-') else {
        return false;
    };

    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && suffix.len() == SUFFIX_LEN
        && suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IssueId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IssueId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> Self {
        id.0
    }
}

impl AsRef<str> for IssueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the ID token from a project name
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single `_`, and trims separators at both ends. Falls back to `project`.
pub fn project_token(name: &str) -> String {
    let mut token = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !token.is_empty() {
                token.push('_');
            }
            pending_separator = false;
            token.push(c);
        } else {
            pending_separator = true;
        }
    }

    if token.is_empty() {
        FALLBACK_TOKEN.to_string()
    } else {
        token
    }
}

/// Source of root ID suffixes
///
/// Injected into the issue service so tests can make allocation
/// deterministic or force collisions.
pub trait SuffixGenerator {
    /// Returns a fresh `SUFFIX_LEN`-character suffix over `[a-z0-9]`
    fn next_suffix(&mut self) -> String;
}

/// Uniform random suffixes backed by [`StdRng`]
pub struct RandomSuffix {
    rng: StdRng,
}

impl RandomSuffix {
    /// Seeds from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sequence for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSuffix {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl SuffixGenerator for RandomSuffix {
    fn next_suffix(&mut self) -> String {
        (0..SUFFIX_LEN)
            .map(|_| {
                let idx = self.rng.random_range(0..SUFFIX_ALPHABET.len());
                SUFFIX_ALPHABET[idx] as char
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_lowercases_and_trims() {
        let id = IssueId::parse("  FAZ-Ab12 ").unwrap();
        assert_eq!(id.as_str(), "faz-ab12");
    }

    #[test]
    fn parse_keeps_canonical_child() {
        let id: IssueId = "faz-ab12.3".parse().unwrap();
        assert_eq!(id.to_string(), "faz-ab12.3");
        assert!(id.is_child());
    }

    #[test]
    fn parse_rejects_invalid_format() {
        assert!(IssueId::parse("abc").is_err());
        assert!(IssueId::parse("faz-abc").is_err()); // suffix too short
        assert!(IssueId::parse("faz-abcde").is_err()); // suffix too long
        assert!(IssueId::parse("faz-ab12.").is_err()); // empty index
        assert!(IssueId::parse("faz-ab12.x").is_err()); // non-numeric index
        assert!(IssueId::parse("faz-ab12.1.2").is_err()); // grandchild
        assert!(IssueId::parse("-ab12").is_err()); // empty token
        assert!(IssueId::parse("my-proj-ab12").is_err()); // dash in token
        assert!(IssueId::parse("legacy-7").is_err());
    }

    #[test]
    fn parse_error_reports_raw_input() {
        assert_eq!(
            IssueId::parse("Nope").unwrap_err(),
            IdError::InvalidIdentifier("Nope".to_string())
        );
    }

    #[test]
    fn token_may_contain_underscores_and_digits() {
        let id = IssueId::parse("my_proj2-zz99").unwrap();
        assert_eq!(id.token(), "my_proj2");
    }

    #[test]
    fn child_of_root() {
        let root = IssueId::root("faz", "ab12").unwrap();
        let child = root.child(0).unwrap();

        assert_eq!(child.as_str(), "faz-ab12.0");
        assert_eq!(child.parent(), Some(root.clone()));
        assert!(root.parent().is_none());
    }

    #[test]
    fn child_of_child_is_rejected() {
        let child = IssueId::parse("faz-ab12.0").unwrap();
        assert_eq!(
            child.child(1).unwrap_err(),
            IdError::UnsupportedNesting("faz-ab12.0".to_string())
        );
    }

    #[test]
    fn project_token_normalizes() {
        assert_eq!(project_token("Faz"), "faz");
        assert_eq!(project_token("My Cool--Project!"), "my_cool_project");
        assert_eq!(project_token("__weird__name__"), "weird_name");
        assert_eq!(project_token("snake_case"), "snake_case");
        assert_eq!(project_token("   "), "project");
        assert_eq!(project_token("日本"), "project");
    }

    #[test]
    fn seeded_suffixes_are_deterministic() {
        let mut a = RandomSuffix::seeded(7);
        let mut b = RandomSuffix::seeded(7);

        for _ in 0..10 {
            assert_eq!(a.next_suffix(), b.next_suffix());
        }
    }

    #[test]
    fn serde_roundtrip() {
        let id = IssueId::parse("faz-ab12.4").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"faz-ab12.4\"");

        let parsed: IssueId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<IssueId>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn generated_suffix_forms_valid_root(seed in any::<u64>()) {
            let suffix = RandomSuffix::seeded(seed).next_suffix();
            prop_assert_eq!(suffix.len(), SUFFIX_LEN);

            let id = IssueId::root("faz", &suffix).unwrap();
            prop_assert!(!id.is_child());
        }

        #[test]
        fn project_token_is_always_usable(name in ".{0,40}") {
            let token = project_token(&name);
            prop_assert!(!token.is_empty());
            prop_assert!(!token.starts_with('_') && !token.ends_with('_'));
            prop_assert!(!token.contains("__"));
            prop_assert!(IssueId::root(&token, "ab12").is_ok());
        }

        #[test]
        fn parse_is_idempotent(id in "[a-zA-Z0-9_]{1,10}-[a-zA-Z0-9]{4}(\\.[0-9]{1,3})?") {
            let once = IssueId::parse(&id).unwrap();
            let twice = IssueId::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
