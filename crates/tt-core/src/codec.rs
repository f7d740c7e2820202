use thiserror::Error;

use crate::identity::Scope;
use crate::item::{Item, Kind};
use crate::status::Status;

pub const RECORD_HEADER: &str = "tt-record";
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("invalid {field} value `{value}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} discriminant {value} is out of range")]
    InvalidEnumValue { field: &'static str, value: u64 },
    #[error("unsupported record version `{0}`")]
    UnsupportedVersion(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Header line, then id, scope, kind, status and worker (empty when unset) one
/// per line, then the description verbatim. Fields are read back by position,
/// so the description can never be mistaken for one.
pub fn encode(item: &Item) -> String {
    let mut out = String::with_capacity(item.description.len() + 64);
    out.push_str(&format!("{RECORD_HEADER} {RECORD_VERSION}\n"));
    out.push_str(&format!("{}\n", item.id));
    out.push_str(&format!("{}\n", item.scope.discriminant()));
    out.push_str(&format!("{}\n", item.kind.discriminant()));
    out.push_str(&format!("{}\n", item.status.discriminant()));
    out.push_str(item.worker.as_deref().unwrap_or(""));
    out.push('\n');
    out.push_str(&item.description);
    out.push('\n');
    out
}

/// Headerless records are the older layout without a worker line.
pub fn decode(text: &str) -> Result<Item, CodecError> {
    let mut reader = FieldReader { rest: text };

    let versioned = match text.strip_prefix(RECORD_HEADER) {
        Some(after) if after.starts_with(' ') => {
            let header = reader.line("header")?;
            let version = header[RECORD_HEADER.len()..].trim();
            if version != RECORD_VERSION.to_string() {
                return Err(CodecError::UnsupportedVersion(version.to_string()));
            }
            true
        }
        _ => false,
    };

    let id = reader.number("id")?;
    let scope = reader.number("scope").and_then(|value| {
        Scope::from_discriminant(value).ok_or(CodecError::InvalidEnumValue {
            field: "scope",
            value,
        })
    })?;
    let kind = reader.number("kind").and_then(|value| {
        Kind::from_discriminant(value).ok_or(CodecError::InvalidEnumValue {
            field: "kind",
            value,
        })
    })?;
    let status = reader.number("status").and_then(|value| {
        Status::from_discriminant(value).ok_or(CodecError::InvalidEnumValue {
            field: "status",
            value,
        })
    })?;
    let worker = if versioned {
        let line = reader.line("worker")?.trim();
        (!line.is_empty()).then(|| line.to_string())
    } else {
        None
    };

    let description = reader.rest.strip_suffix('\n').unwrap_or(reader.rest);

    Ok(Item {
        id,
        scope,
        kind,
        status,
        worker,
        description: description.to_string(),
    })
}

struct FieldReader<'a> {
    rest: &'a str,
}

impl<'a> FieldReader<'a> {
    fn line(&mut self, field: &'static str) -> Result<&'a str, CodecError> {
        if self.rest.is_empty() {
            return Err(CodecError::MissingField(field));
        }
        let (line, rest) = match self.rest.split_once('\n') {
            Some((line, rest)) => (line, rest),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Ok(line.strip_suffix('\r').unwrap_or(line))
    }

    fn number(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let line = self.line(field)?;
        line.trim()
            .parse::<u64>()
            .map_err(|_| CodecError::InvalidNumber {
                field,
                value: line.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(description: &str) -> Item {
        Item::new(42, Scope::Private, Kind::Feature, description.to_string())
    }

    #[test]
    fn encode_writes_header_and_fields_in_order() {
        let mut item = sample("Ship it");
        item.scope = Scope::Shared;
        item.status = Status::InProgress;
        item.worker = Some("alice".into());
        assert_eq!(encode(&item), "tt-record 1\n42\n0\n2\n1\nalice\nShip it\n");
    }

    #[test]
    fn decode_restores_multiline_and_empty_descriptions() {
        for description in ["", "one line", "first\nsecond\n\nfourth", "  padded  ", "ends with newline\n"] {
            let item = sample(description);
            assert_eq!(decode(&encode(&item)).expect("decode"), item);
        }
    }

    #[test]
    fn description_cannot_fake_fields() {
        let mut item = sample("3\n0\n2\n2\nmallory\nnot a field");
        item.worker = Some("bob".into());
        let decoded = decode(&encode(&item)).expect("decode");
        assert_eq!(decoded.worker.as_deref(), Some("bob"));
        assert_eq!(decoded.description, item.description);
    }

    #[test]
    fn decode_reads_legacy_layout_without_header() {
        let item = decode("1700000000\n1\n1\n2\nFix crash\nwith details\n").expect("decode");
        assert_eq!(item.id, 1_700_000_000);
        assert_eq!(item.scope, Scope::Private);
        assert_eq!(item.kind, Kind::Defect);
        assert_eq!(item.status, Status::Done);
        assert_eq!(item.worker, None);
        assert_eq!(item.description, "Fix crash\nwith details");
    }

    #[test]
    fn decode_rejects_out_of_range_discriminants() {
        let err = decode("tt-record 1\n1\n1\n7\n0\n\ntext\n").unwrap_err();
        assert_eq!(err, CodecError::InvalidEnumValue { field: "kind", value: 7 });

        let err = decode("tt-record 1\n1\n2\n0\n0\n\ntext\n").unwrap_err();
        assert_eq!(err, CodecError::InvalidEnumValue { field: "scope", value: 2 });
    }

    #[test]
    fn decode_rejects_non_numeric_and_truncated_records() {
        assert!(matches!(
            decode("tt-record 1\nabc\n1\n0\n0\n\ntext\n"),
            Err(CodecError::InvalidNumber { field: "id", .. })
        ));
        assert_eq!(
            decode("tt-record 1\n4\n1\n").unwrap_err(),
            CodecError::MissingField("kind")
        );
        assert_eq!(decode("").unwrap_err(), CodecError::MissingField("id"));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        assert_eq!(
            decode("tt-record 9\n1\n1\n0\n0\n\ntext\n").unwrap_err(),
            CodecError::UnsupportedVersion("9".into())
        );
    }
}
