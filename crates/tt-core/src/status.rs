use std::fmt;

use serde::Serialize;

use crate::error::{Result, TrackerError};
use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::NotStarted, Status::InProgress, Status::Done];

    pub const fn discriminant(self) -> u64 {
        match self {
            Status::NotStarted => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }

    pub fn from_discriminant(value: u64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.discriminant() == value)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Status::NotStarted => Some(Status::InProgress),
            Status::InProgress => Some(Status::Done),
            Status::Done => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Status::NotStarted => None,
            Status::InProgress => Some(Status::NotStarted),
            Status::Done => Some(Status::InProgress),
        }
    }

    pub const fn letter(self) -> char {
        match self {
            Status::NotStarted => 'N',
            Status::InProgress => 'I',
            Status::Done => 'R',
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Status::NotStarted => "Not started",
            Status::InProgress => "In progress",
            Status::Done => "Resolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Item {
    /// Moves one step forward; `done` cannot advance.
    pub fn advance(&mut self) -> Result<()> {
        let next = self.status.next().ok_or(TrackerError::InvalidTransition {
            uid: self.uid(),
            from: self.status,
            action: "advance",
        })?;
        self.status = next;
        Ok(())
    }

    /// Moves one step backward; `not_started` cannot revert.
    pub fn revert(&mut self) -> Result<()> {
        let previous = self.status.previous().ok_or(TrackerError::InvalidTransition {
            uid: self.uid(),
            from: self.status,
            action: "revert",
        })?;
        self.status = previous;
        Ok(())
    }

    /// Jumps straight to `done`. Idempotent.
    pub fn resolve(&mut self) {
        self.status = Status::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Scope;
    use crate::item::Kind;

    fn item(status: Status) -> Item {
        let mut item = Item::new(5, Scope::Private, Kind::Task, "write docs".to_string());
        item.status = status;
        item
    }

    #[test]
    fn advance_then_revert_restores_status() {
        for status in [Status::NotStarted, Status::InProgress] {
            let mut task = item(status);
            task.advance().expect("advance");
            task.revert().expect("revert");
            assert_eq!(task.status, status);
        }
    }

    #[test]
    fn revert_then_advance_restores_status() {
        for status in [Status::InProgress, Status::Done] {
            let mut task = item(status);
            task.revert().expect("revert");
            task.advance().expect("advance");
            assert_eq!(task.status, status);
        }
    }

    #[test]
    fn advance_from_done_is_rejected() {
        let mut task = item(Status::Done);
        let err = task.advance().unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                from: Status::Done,
                action: "advance",
                ..
            }
        ));
        assert_eq!(task.status, Status::Done);
    }

    #[test]
    fn revert_from_not_started_is_rejected() {
        let mut task = item(Status::NotStarted);
        assert!(matches!(
            task.revert(),
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert_eq!(task.status, Status::NotStarted);
    }

    #[test]
    fn resolve_jumps_from_any_state() {
        for status in Status::ALL {
            let mut task = item(status);
            task.resolve();
            assert_eq!(task.status, Status::Done);
        }
    }

    #[test]
    fn discriminants_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_discriminant(status.discriminant()), Some(status));
        }
        assert_eq!(Status::from_discriminant(3), None);
    }
}
