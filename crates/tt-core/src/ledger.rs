use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use crate::codec::CodecError;
use crate::error::{io_err, Result, TrackerError};
use crate::identity::{parse_uid, Scope, Uid};
use crate::store::{write_atomic, FsStore, LockGuard};

pub trait AssignmentLedger {
    /// Claimed UIDs in claim order; a missing or empty ledger is empty.
    fn list_refs(&self, user: &str) -> Result<Vec<Uid>>;

    /// Appends `uid`; `DuplicateAssignment` if it is already present.
    fn add_ref(&self, user: &str, uid: Uid) -> Result<()>;

    /// Drops `uid`, reporting whether it was present.
    fn remove_ref(&self, user: &str, uid: Uid) -> Result<bool>;
}

fn parse_refs(text: &str, path: &std::path::Path) -> Result<Vec<Uid>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            parse_uid(line).map_err(|_| {
                TrackerError::corrupt(path, CodecError::InvalidIdentifier(format!("ledger entry `{line}`")))
            })
        })
        .collect()
}

impl AssignmentLedger for FsStore {
    fn list_refs(&self, user: &str) -> Result<Vec<Uid>> {
        let path = self.layout().refs_path(user);
        match fs::read_to_string(&path) {
            Ok(text) => parse_refs(&text, &path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(io_err(&path)(err)),
        }
    }

    fn add_ref(&self, user: &str, uid: Uid) -> Result<()> {
        if uid.scope != Scope::Shared {
            return Err(TrackerError::InvalidOperation(format!(
                "{uid} is private and cannot be assigned"
            )));
        }
        if !self.layout().is_registered(user) {
            return Err(TrackerError::UnknownUser(user.to_string()));
        }
        let _guard = LockGuard::acquire(&self.layout().refs_lock_path(user))?;
        let path = self.layout().refs_path(user);
        let existing = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(io_err(&path)(err)),
        };
        if parse_refs(&existing, &path)?.contains(&uid) {
            return Err(TrackerError::DuplicateAssignment {
                uid,
                user: user.to_string(),
            });
        }

        let mut line = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&format!("{uid}\n"));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(io_err(&path))?;
        tracing::debug!(user, uid = %uid, "added ledger entry");
        Ok(())
    }

    fn remove_ref(&self, user: &str, uid: Uid) -> Result<bool> {
        if !self.layout().is_registered(user) {
            return Ok(false);
        }
        let _guard = LockGuard::acquire(&self.layout().refs_lock_path(user))?;
        let refs = self.list_refs(user)?;
        if !refs.contains(&uid) {
            return Ok(false);
        }
        let body: String = refs
            .iter()
            .filter(|entry| **entry != uid)
            .map(|entry| format!("{entry}\n"))
            .collect();
        write_atomic(&self.layout().refs_path(user), body.as_bytes())?;
        tracing::debug!(user, uid = %uid, "removed ledger entry");
        Ok(true)
    }
}
