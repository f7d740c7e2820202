use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::TrackerError;
use crate::identity::{Scope, Uid};
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Task,
    Defect,
    Feature,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Task, Kind::Defect, Kind::Feature];

    pub const fn discriminant(self) -> u64 {
        match self {
            Kind::Task => 0,
            Kind::Defect => 1,
            Kind::Feature => 2,
        }
    }

    pub fn from_discriminant(value: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.discriminant() == value)
    }

    pub const fn letter(self) -> char {
        match self {
            Kind::Task => 'T',
            Kind::Defect => 'D',
            Kind::Feature => 'F',
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Kind::Task => "Task",
            Kind::Defect => "Defect",
            Kind::Feature => "Feature",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the numeric discriminant or a name (`bug` is kept as an alias of `defect`).
impl FromStr for Kind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if let Ok(n) = value.parse::<u64>() {
            return Kind::from_discriminant(n)
                .ok_or_else(|| TrackerError::InvalidIdentifier(format!("kind {n} out of range")));
        }
        match value.as_str() {
            "task" | "t" => Ok(Kind::Task),
            "defect" | "bug" | "d" | "b" => Ok(Kind::Defect),
            "feature" | "f" => Ok(Kind::Feature),
            _ => Err(TrackerError::InvalidIdentifier(format!("unknown kind `{s}`"))),
        }
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: u64,
    pub scope: Scope,
    pub kind: Kind,
    pub status: Status,
    /// Claiming user; only ever set on shared items.
    pub worker: Option<String>,
    pub description: String,
}

impl Item {
    pub fn new(id: u64, scope: Scope, kind: Kind, description: String) -> Self {
        Self {
            id,
            scope,
            kind,
            status: Status::NotStarted,
            worker: None,
            description,
        }
    }

    pub fn uid(&self) -> Uid {
        Uid::new(self.scope, self.id)
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// First line of the description, leading whitespace skipped.
    pub fn short_description(&self) -> &str {
        let text = self.description.trim_start();
        text.lines().next().unwrap_or("").trim_end()
    }
}

/// Canonical listing order: newest id first, shared before private on ties.
pub fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| b.id.cmp(&a.id).then_with(|| a.scope.cmp(&b.scope)));
}
