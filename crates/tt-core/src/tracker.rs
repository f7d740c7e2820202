use std::collections::HashSet;
use std::path::Path;

use crate::description::normalize_description;
use crate::error::{Result, TrackerError};
use crate::identity::{Identity, Scope, Uid};
use crate::item::{sort_newest_first, Item, Kind};
use crate::ledger::AssignmentLedger;
use crate::store::{self, FsStore, ItemStore, Layout};

/// Fields `amend` may replace; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Amendment {
    pub kind: Option<Kind>,
    pub description: Option<String>,
    pub worker: Option<String>,
}

pub struct Tracker<S = FsStore> {
    store: S,
}

impl Tracker<FsStore> {
    /// Creates a repository under `repo_root` and registers `user` in it.
    pub fn init(repo_root: &Path, user: &str) -> Result<Self> {
        FsStore::init(Layout::new(repo_root), user).map(Self::new)
    }

    pub fn open(repo_root: &Path, user: &str) -> Result<Self> {
        FsStore::open(Layout::new(repo_root), user).map(Self::new)
    }

    /// Adds `user` to an existing repository; `false` if already present.
    pub fn register(repo_root: &Path, user: &str) -> Result<bool> {
        FsStore::register(&Layout::new(repo_root), user)
    }
}

impl<S> Tracker<S>
where
    S: ItemStore + AssignmentLedger,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user(&self) -> &str {
        self.store.user()
    }

    pub fn create(
        &self,
        scope: Scope,
        kind: Kind,
        description: &str,
        worker: Option<&str>,
    ) -> Result<Item> {
        let description = normalize_description(description)?;
        let assignee = match worker {
            Some(_) if scope == Scope::Private => {
                return Err(TrackerError::InvalidOperation(
                    "private tasks cannot have a worker".to_string(),
                ));
            }
            Some(user) => Some(self.store.with_user(user)?),
            None => None,
        };

        let mut item = Item::new(self.store.new_id()?, scope, kind, description);
        self.store.put(&item)?;
        tracing::info!(uid = %item.uid(), kind = %kind, "created task");

        if let Some(assignee) = assignee {
            Tracker::new(assignee).assign(&mut item)?;
        }
        Ok(item)
    }

    /// Looks up exactly one item. A raw id prefers the private copy.
    pub fn find(&self, identity: Identity) -> Result<Item> {
        match identity {
            Identity::Uid(uid) => self.store.get(uid),
            Identity::Vid(vid) => store::get_vid(&self.store, vid),
            Identity::Id(id) => {
                let mut copies = self.copies(id)?;
                if copies.is_empty() {
                    return Err(TrackerError::NotFound(format!("Task with id {id}")));
                }
                Ok(copies.remove(0))
            }
        }
    }

    pub fn show(&self, identity: Identity) -> Result<Item> {
        self.find(identity)
    }

    /// Marks the addressed item(s) done.
    pub fn resolve(&self, identity: Identity) -> Result<Vec<Item>> {
        self.transition(identity, |item| {
            item.resolve();
            Ok(())
        })
    }

    pub fn advance(&self, identity: Identity) -> Result<Vec<Item>> {
        self.transition(identity, Item::advance)
    }

    pub fn revert(&self, identity: Identity) -> Result<Vec<Item>> {
        self.transition(identity, Item::revert)
    }

    /// Replaces the provided fields. Kind and description changes to a private
    /// item are copied onto its shared counterpart when one exists.
    pub fn amend(&self, identity: Identity, amendment: Amendment) -> Result<Vec<Item>> {
        let mut item = self.find(identity)?;
        let description = amendment
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()?;
        let assignee = match amendment.worker.as_deref() {
            Some(_) if item.scope == Scope::Private => {
                return Err(TrackerError::InvalidOperation(format!(
                    "{} is private and cannot have a worker",
                    item.uid()
                )));
            }
            Some(user) if item.worker.as_deref() != Some(user) => {
                Some(self.store.with_user(user)?)
            }
            _ => None,
        };

        if let Some(kind) = amendment.kind {
            item.kind = kind;
        }
        if let Some(description) = description {
            item.description = description;
        }
        match assignee {
            Some(assignee) => Tracker::new(assignee).assign(&mut item)?,
            None => self.store.put(&item)?,
        }
        tracing::info!(uid = %item.uid(), "amended task");

        let mut touched = vec![item];
        let private = &touched[0];
        if private.scope == Scope::Private {
            let counterpart = private.uid().counterpart();
            if self.store.exists(counterpart)? {
                let mut shared = self.store.get(counterpart)?;
                shared.kind = private.kind;
                shared.description = private.description.clone();
                self.store.put(&shared)?;
                tracing::info!(uid = %counterpart, "propagated amendment");
                touched.push(shared);
            }
        }
        Ok(touched)
    }

    /// Claims a shared item for the current user, taking it over from any
    /// other holder.
    pub fn claim(&self, identity: Identity) -> Result<Item> {
        let mut item = self.find(identity)?;
        self.assign(&mut item)?;
        Ok(item)
    }

    /// Gives back an item the current user has claimed.
    pub fn unclaim(&self, identity: Identity) -> Result<Item> {
        let mut item = self.find(identity)?;
        ensure_shared(&item, "unclaim")?;
        if item.worker.as_deref() != Some(self.user()) {
            return Err(TrackerError::InvalidOperation(format!(
                "{} is not claimed by {}",
                item.uid(),
                self.user()
            )));
        }
        self.store.remove_ref(self.user(), item.uid())?;
        item.worker = None;
        self.store.put(&item)?;
        tracing::info!(uid = %item.uid(), user = self.user(), "unclaimed task");
        Ok(item)
    }

    /// Removes whichever user currently holds a shared item.
    pub fn unassign(&self, identity: Identity) -> Result<Item> {
        let mut item = self.find(identity)?;
        ensure_shared(&item, "unassign")?;
        let Some(worker) = item.worker.take() else {
            return Err(TrackerError::InvalidOperation(format!(
                "{} is not assigned",
                item.uid()
            )));
        };
        self.store.remove_ref(&worker, item.uid())?;
        self.store.put(&item)?;
        tracing::info!(uid = %item.uid(), user = %worker, "unassigned task");
        Ok(item)
    }

    /// Looks up the item in the current user's view, then claims it on behalf of `user`.
    pub fn reassign(&self, identity: Identity, user: &str) -> Result<Item> {
        let mut item = self.find(identity)?;
        ensure_shared(&item, "reassign")?;
        let delegate = Tracker::new(self.store.with_user(user)?);
        delegate.assign(&mut item)?;
        Ok(item)
    }

    /// Newest-first listing. `None` merges both scopes; the private listing
    /// includes claimed shared items.
    pub fn list(&self, scope: Option<Scope>, include_done: bool) -> Result<Vec<Item>> {
        let pred = |item: &Item| include_done || !item.is_done();
        match scope {
            Some(scope) => store::list(&self.store, scope, pred),
            None => {
                let mut seen: HashSet<Uid> = HashSet::new();
                let mut items: Vec<Item> = Scope::ALL
                    .into_iter()
                    .map(|scope| store::list(&self.store, scope, pred))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .flatten()
                    .filter(|item| seen.insert(item.uid()))
                    .collect();
                sort_newest_first(&mut items);
                Ok(items)
            }
        }
    }

    /// Unresolved private listing; positions are VIDs.
    pub fn unresolved(&self) -> Result<Vec<Item>> {
        store::unresolved(&self.store)
    }

    /// Makes the bound user the item's worker, keeping ledger and worker in step.
    fn assign(&self, item: &mut Item) -> Result<()> {
        ensure_shared(item, "claim")?;
        let user = self.user().to_string();
        self.store.add_ref(&user, item.uid())?;
        if let Some(previous) = item.worker.as_deref().filter(|prev| *prev != user) {
            self.store.remove_ref(previous, item.uid())?;
        }
        item.worker = Some(user);
        self.store.put(item)?;
        tracing::info!(uid = %item.uid(), user = self.user(), "assigned task");
        Ok(())
    }

    /// Private copy first, then shared.
    fn copies(&self, id: u64) -> Result<Vec<Item>> {
        let mut copies = Vec::new();
        for scope in [Scope::Private, Scope::Shared] {
            let uid = Uid::new(scope, id);
            if self.store.exists(uid)? {
                copies.push(self.store.get(uid)?);
            }
        }
        Ok(copies)
    }

    /// Applies `step` to every addressed copy, persisting only if all succeed.
    fn transition(
        &self,
        identity: Identity,
        step: impl Fn(&mut Item) -> Result<()>,
    ) -> Result<Vec<Item>> {
        let mut items = match identity {
            Identity::Id(id) => {
                let copies = self.copies(id)?;
                if copies.is_empty() {
                    return Err(TrackerError::NotFound(format!("Task with id {id}")));
                }
                copies
            }
            other => vec![self.find(other)?],
        };
        for item in &mut items {
            step(item)?;
        }
        for item in &items {
            self.store.put(item)?;
            tracing::info!(uid = %item.uid(), status = %item.status, "changed status");
        }
        Ok(items)
    }
}

fn ensure_shared(item: &Item, action: &str) -> Result<()> {
    if item.scope == Scope::Private {
        return Err(TrackerError::InvalidOperation(format!(
            "cannot {action} {}: private tasks belong to their owner",
            item.uid()
        )));
    }
    Ok(())
}
