/// Package version plus the git build metadata baked in by `build.rs`.
pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("TT_GIT_COUNT"),
    ".",
    env!("TT_GIT_SHA"),
    env!("TT_GIT_DIRTY")
);
