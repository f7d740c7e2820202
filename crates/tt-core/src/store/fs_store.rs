use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::codec::{self, CodecError};
use crate::error::{io_err, Result, TrackerError};
use crate::identity::{parse_uid, Scope, Uid};
use crate::item::Item;

use super::ItemStore;

pub const MAIN_DIR: &str = ".tt";
const TASKS_DIR: &str = "tasks";
const REFS_FILE: &str = "refs";
const REFS_LOCK_FILE: &str = ".refs.lock";
const COUNTER_FILE: &str = "next_id";
const LOCK_FILE: &str = "lock";
const MESSAGE_FILE: &str = "desc_msg";
const FIRST_ID: u64 = 1;

/// On-disk locations under a repository root.
///
/// ```text
/// .tt/
///   lock  next_id  config.toml  desc_msg
///   tasks/
///     G<id>...            shared items
///     <user>/
///       L<id>...          private items
///       refs              claimed shared UIDs, one per line
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    repo_root: PathBuf,
}

impl Layout {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn main_dir(&self) -> PathBuf {
        self.repo_root.join(MAIN_DIR)
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.main_dir().join(TASKS_DIR)
    }

    pub fn user_dir(&self, user: &str) -> PathBuf {
        self.shared_dir().join(user)
    }

    pub fn refs_path(&self, user: &str) -> PathBuf {
        self.user_dir(user).join(REFS_FILE)
    }

    pub fn refs_lock_path(&self, user: &str) -> PathBuf {
        self.user_dir(user).join(REFS_LOCK_FILE)
    }

    pub fn counter_path(&self) -> PathBuf {
        self.main_dir().join(COUNTER_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.main_dir().join(LOCK_FILE)
    }

    /// Scratch file handed to the editor.
    pub fn message_path(&self) -> PathBuf {
        self.main_dir().join(MESSAGE_FILE)
    }

    pub fn item_path(&self, user: &str, uid: Uid) -> PathBuf {
        let dir = match uid.scope {
            Scope::Shared => self.shared_dir(),
            Scope::Private => self.user_dir(user),
        };
        dir.join(uid.to_string())
    }

    pub fn is_initialized(&self) -> bool {
        self.main_dir().is_dir()
    }

    pub fn is_registered(&self, user: &str) -> bool {
        self.user_dir(user).is_dir()
    }
}

/// Walks up from `start` to the first directory holding `.tt/`.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|candidate| candidate.join(MAIN_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// User names become directory names and ledger worker fields.
pub fn validate_user_name(user: &str) -> Result<()> {
    let invalid = |why: &str| TrackerError::InvalidIdentifier(format!("user name `{user}` {why}"));
    if user.is_empty() {
        return Err(invalid("is empty"));
    }
    if user == "." || user == ".." || user.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if user
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '\\')
    {
        return Err(invalid("contains whitespace or path separators"));
    }
    if user.ends_with(".tmp") {
        return Err(invalid("must not end in '.tmp'"));
    }
    if Uid::is_token(user) {
        return Err(invalid("would clash with a shared task record"));
    }
    Ok(())
}

/// Plain-file backend: one record per item, named by its UID.
#[derive(Debug, Clone)]
pub struct FsStore {
    layout: Layout,
    user: String,
}

impl FsStore {
    /// Creates the repository skeleton and registers `user`.
    pub fn init(layout: Layout, user: &str) -> Result<Self> {
        validate_user_name(user)?;
        let main_dir = layout.main_dir();
        if main_dir.exists() {
            return Err(TrackerError::AlreadyInitialized { path: main_dir });
        }
        let shared = layout.shared_dir();
        fs::create_dir_all(&shared).map_err(io_err(&shared))?;
        write_atomic(&layout.counter_path(), format!("{FIRST_ID}\n").as_bytes())?;
        Self::register(&layout, user)?;
        tracing::info!(root = %layout.repo_root().display(), user, "initialized repository");
        Ok(Self {
            layout,
            user: user.to_string(),
        })
    }

    pub fn open(layout: Layout, user: &str) -> Result<Self> {
        if !layout.is_initialized() {
            return Err(TrackerError::NotInitialized {
                path: layout.repo_root().to_path_buf(),
            });
        }
        validate_user_name(user)?;
        if !layout.is_registered(user) {
            return Err(TrackerError::UnknownUser(user.to_string()));
        }
        Ok(Self {
            layout,
            user: user.to_string(),
        })
    }

    /// Adds `user` to an initialized repository. Returns `false` if the user
    /// was already registered.
    pub fn register(layout: &Layout, user: &str) -> Result<bool> {
        validate_user_name(user)?;
        if !layout.is_initialized() {
            return Err(TrackerError::NotInitialized {
                path: layout.repo_root().to_path_buf(),
            });
        }
        let dir = layout.user_dir(user);
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let refs = layout.refs_path(user);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&refs)
            .map_err(io_err(&refs))?;
        tracing::info!(user, "registered user");
        Ok(true)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Registered users, sorted by name.
    pub fn users(&self) -> Result<Vec<String>> {
        let shared = self.layout.shared_dir();
        let mut users = Vec::new();
        for entry in fs::read_dir(&shared).map_err(io_err(&shared))? {
            let entry = entry.map_err(io_err(&shared))?;
            let is_dir = entry.file_type().map_err(io_err(&entry.path()))?.is_dir();
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                users.push(name.to_string());
            }
        }
        users.sort();
        Ok(users)
    }

    fn read_item(&self, path: &Path, uid: Uid) -> Result<Item> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(TrackerError::NotFound(format!("Task {uid}")));
            }
            Err(err) => return Err(io_err(path)(err)),
        };
        let item = codec::decode(&text).map_err(|err| TrackerError::corrupt(path, err))?;
        if item.uid() != uid {
            return Err(TrackerError::corrupt(
                path,
                CodecError::InvalidIdentifier(format!(
                    "record holds {} but is stored as {uid}",
                    item.uid()
                )),
            ));
        }
        Ok(item)
    }

    /// Whether `id` names a record in the shared pool or any private pool.
    fn id_in_use(&self, id: u64) -> Result<bool> {
        if self.layout.item_path(&self.user, Uid::new(Scope::Shared, id)).exists() {
            return Ok(true);
        }
        let private = Uid::new(Scope::Private, id);
        Ok(self
            .users()?
            .iter()
            .any(|user| self.layout.item_path(user, private).exists()))
    }

    /// Highest id present anywhere in the repository, plus one.
    fn seed_counter(&self) -> Result<u64> {
        let mut max = self.scan(Scope::Shared)?.iter().map(|i| i.id).max();
        for user in self.users()? {
            let store = Self {
                layout: self.layout.clone(),
                user,
            };
            let user_max = store.scan(Scope::Private)?.iter().map(|i| i.id).max();
            max = max.max(user_max);
        }
        let seed = max.map_or(FIRST_ID, |id| id.saturating_add(1));
        tracing::warn!(seed, "id counter missing; seeded from existing records");
        Ok(seed)
    }
}

impl ItemStore for FsStore {
    fn user(&self) -> &str {
        &self.user
    }

    fn with_user(&self, user: &str) -> Result<Self> {
        Self::open(self.layout.clone(), user)
    }

    fn put(&self, item: &Item) -> Result<()> {
        let path = self.layout.item_path(&self.user, item.uid());
        write_atomic(&path, codec::encode(item).as_bytes())?;
        tracing::debug!(uid = %item.uid(), path = %path.display(), "wrote record");
        Ok(())
    }

    fn get(&self, uid: Uid) -> Result<Item> {
        self.read_item(&self.layout.item_path(&self.user, uid), uid)
    }

    fn exists(&self, uid: Uid) -> Result<bool> {
        Ok(self.layout.item_path(&self.user, uid).is_file())
    }

    fn scan(&self, scope: Scope) -> Result<Vec<Item>> {
        let dir = match scope {
            Scope::Shared => self.layout.shared_dir(),
            Scope::Private => self.layout.user_dir(&self.user),
        };
        let mut items = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err(&dir))? {
            let entry = entry.map_err(io_err(&dir))?;
            let path = entry.path();
            if entry.file_type().map_err(io_err(&path))?.is_dir() {
                continue;
            }
            // Ledger, lock and temp files share the directory; only UID-named
            // files are records.
            let Some(uid) = entry.file_name().to_str().and_then(|n| parse_uid(n).ok()) else {
                continue;
            };
            if uid.scope != scope {
                return Err(TrackerError::corrupt(
                    &path,
                    CodecError::InvalidIdentifier(format!("{uid} stored in the {scope} pool")),
                ));
            }
            items.push(self.read_item(&path, uid)?);
        }
        tracing::debug!(scope = %scope, count = items.len(), "scanned records");
        Ok(items)
    }

    fn new_id(&self) -> Result<u64> {
        let _guard = LockGuard::acquire(&self.layout.lock_path())?;
        let counter = self.layout.counter_path();
        let next = match fs::read_to_string(&counter) {
            Ok(text) => text.trim().parse::<u64>().map_err(|_| {
                TrackerError::corrupt(
                    &counter,
                    CodecError::InvalidNumber {
                        field: "next_id",
                        value: text.trim().to_string(),
                    },
                )
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => self.seed_counter()?,
            Err(err) => return Err(io_err(&counter)(err)),
        };
        let exhausted = || TrackerError::InvalidOperation("task id space exhausted".into());
        let mut next = next;
        while self.id_in_use(next)? {
            tracing::warn!(id = next, "id counter behind existing records; skipping");
            next = next.checked_add(1).ok_or_else(exhausted)?;
        }
        let following = next.checked_add(1).ok_or_else(exhausted)?;
        write_atomic(&counter, format!("{following}\n").as_bytes())?;
        Ok(next)
    }
}

/// Exclusive advisory lock held until drop.
pub(crate) struct LockGuard {
    file: File,
}

impl LockGuard {
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err(path))?;
        fs2::FileExt::lock_exclusive(&file).map_err(io_err(path))?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Writes `<path>.tmp`, syncs it, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path)(err));
    }
    Ok(())
}
