use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Result, TrackerError};

const RAW_ID_PREFIX: &str = "id:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Common pool visible to every user of the repository.
    Shared,
    /// Per-user namespace.
    Private,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Shared, Scope::Private];

    pub const fn marker(self) -> char {
        match self {
            Scope::Shared => 'G',
            Scope::Private => 'L',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.marker() == marker)
    }

    pub const fn discriminant(self) -> u64 {
        match self {
            Scope::Shared => 0,
            Scope::Private => 1,
        }
    }

    pub fn from_discriminant(value: u64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.discriminant() == value)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Scope::Shared => "Shared",
            Scope::Private => "Private",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite `(scope, id)` key; its string form is the on-disk file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid {
    pub scope: Scope,
    pub id: u64,
}

impl Uid {
    pub const fn new(scope: Scope, id: u64) -> Self {
        Self { scope, id }
    }

    /// Same id in the other scope.
    pub const fn counterpart(self) -> Self {
        let scope = match self.scope {
            Scope::Shared => Scope::Private,
            Scope::Private => Scope::Shared,
        };
        Self { scope, id: self.id }
    }

    pub fn is_token(token: &str) -> bool {
        uid_regex().is_match(token)
    }
}

fn uid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([GL])(\d+)$").expect("uid regex"))
}

/// Parses `{scope-marker}{digits}`.
pub fn parse_uid(token: &str) -> Result<Uid> {
    let invalid = || TrackerError::InvalidIdentifier(format!("`{token}` is not a task UID"));
    let caps = uid_regex().captures(token).ok_or_else(invalid)?;
    let scope = caps
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .and_then(Scope::from_marker)
        .ok_or_else(invalid)?;
    let id = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(invalid)?;
    Ok(Uid { scope, id })
}

pub fn format_uid(scope: Scope, id: u64) -> String {
    format!("{}{}", scope.marker(), id)
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scope.marker(), self.id)
    }
}

impl FromStr for Uid {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_uid(s)
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Zero-based position in the current unresolved private listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vid(pub u64);

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Any way a command can address an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Uid(Uid),
    /// Raw id; addresses the private and shared copy alike.
    Id(u64),
    Vid(Vid),
}

impl Identity {
    /// Interprets a command-line token. A missing token means VID 0.
    pub fn parse(token: Option<&str>) -> Result<Self> {
        let Some(token) = token.map(str::trim) else {
            return Ok(Identity::Vid(Vid(0)));
        };
        if Uid::is_token(token) {
            return parse_uid(token).map(Identity::Uid);
        }
        if let Some(raw) = token.strip_prefix(RAW_ID_PREFIX) {
            return parse_digits(raw)
                .map(Identity::Id)
                .ok_or_else(|| TrackerError::InvalidIdentifier(format!("`{token}` is not a task id")));
        }
        parse_digits(token)
            .map(|n| Identity::Vid(Vid(n)))
            .ok_or_else(|| TrackerError::InvalidIdentifier(format!("`{token}` is not a VID or UID")))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Uid(uid) => write!(f, "{uid}"),
            Identity::Id(id) => write!(f, "{RAW_ID_PREFIX}{id}"),
            Identity::Vid(vid) => write!(f, "VID {vid}"),
        }
    }
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uid_accepts_shared_zero() {
        let uid = parse_uid("G0").expect("uid");
        assert_eq!(uid, Uid::new(Scope::Shared, 0));
    }

    #[test]
    fn parse_uid_rejects_unknown_marker() {
        let err = parse_uid("Z42").unwrap_err();
        assert!(matches!(err, TrackerError::InvalidIdentifier(_)));
    }

    #[test]
    fn parse_uid_rejects_missing_or_non_digit_id() {
        for token in ["G", "L4x", "L-1", "g12", " G12", "G18446744073709551616"] {
            assert!(parse_uid(token).is_err(), "{token} should be rejected");
        }
    }

    #[test]
    fn format_uid_is_inverse_of_parse() {
        let token = format_uid(Scope::Private, 1_700_000_000_123);
        assert_eq!(token, "L1700000000123");
        assert_eq!(parse_uid(&token).expect("uid").to_string(), token);
    }

    #[test]
    fn counterpart_switches_scope() {
        assert_eq!(
            Uid::new(Scope::Private, 9).counterpart(),
            Uid::new(Scope::Shared, 9)
        );
    }

    #[test]
    fn identity_parse_distinguishes_forms() {
        assert_eq!(Identity::parse(None).expect("default"), Identity::Vid(Vid(0)));
        assert_eq!(Identity::parse(Some("3")).expect("vid"), Identity::Vid(Vid(3)));
        assert_eq!(
            Identity::parse(Some("L12")).expect("uid"),
            Identity::Uid(Uid::new(Scope::Private, 12))
        );
        assert_eq!(Identity::parse(Some("id:12")).expect("id"), Identity::Id(12));
        assert!(Identity::parse(Some("id:")).is_err());
        assert!(Identity::parse(Some("three")).is_err());
        assert!(Identity::parse(Some("")).is_err());
    }
}
