mod fs_store;

pub use fs_store::{find_repo_root, validate_user_name, FsStore, Layout, MAIN_DIR};
pub(crate) use fs_store::{write_atomic, LockGuard};

use std::collections::HashSet;

use crate::error::{Result, TrackerError};
use crate::identity::{Scope, Uid, Vid};
use crate::item::{sort_newest_first, Item};
use crate::ledger::AssignmentLedger;

/// A store bound to one user; private-scope operations act on that user's pool.
pub trait ItemStore {
    fn user(&self) -> &str;

    /// The same backend, operating as `user`. Fails with `UnknownUser` if the
    /// user is not registered.
    fn with_user(&self, user: &str) -> Result<Self>
    where
        Self: Sized;

    /// Writes or overwrites the record for `item.uid()`.
    fn put(&self, item: &Item) -> Result<()>;

    fn get(&self, uid: Uid) -> Result<Item>;

    fn exists(&self, uid: Uid) -> Result<bool>;

    /// Every item stored directly in `scope`, in no particular order.
    fn scan(&self, scope: Scope) -> Result<Vec<Item>>;

    /// A fresh id, strictly greater than every id handed out before.
    fn new_id(&self) -> Result<u64>;
}

/// Items of `scope` matching `pred`, newest first.
///
/// The private listing also carries every shared item the bound user has
/// claimed through the ledger.
pub fn list<S>(store: &S, scope: Scope, pred: impl Fn(&Item) -> bool) -> Result<Vec<Item>>
where
    S: ItemStore + AssignmentLedger + ?Sized,
{
    let mut items: Vec<Item> = store.scan(scope)?.into_iter().filter(|i| pred(i)).collect();

    if scope == Scope::Private {
        let mut seen = HashSet::new();
        for uid in store.list_refs(store.user())? {
            if !seen.insert(uid) {
                continue;
            }
            let item = store.get(uid)?;
            if pred(&item) {
                items.push(item);
            }
        }
    }

    sort_newest_first(&mut items);
    Ok(items)
}

/// The unresolved private listing, as used for positional addressing.
pub fn unresolved<S>(store: &S) -> Result<Vec<Item>>
where
    S: ItemStore + AssignmentLedger + ?Sized,
{
    list(store, Scope::Private, |item| !item.is_done())
}

/// Resolves a VID against a fresh snapshot of [`unresolved`].
pub fn get_vid<S>(store: &S, vid: Vid) -> Result<Item>
where
    S: ItemStore + AssignmentLedger + ?Sized,
{
    let items = unresolved(store)?;
    if items.is_empty() {
        return Err(TrackerError::NotFound("Unresolved task".to_string()));
    }
    let len = items.len();
    usize::try_from(vid.0)
        .ok()
        .and_then(|idx| items.into_iter().nth(idx))
        .ok_or_else(|| TrackerError::NotFound(format!("VID {vid} (only {len} unresolved)")))
}
