use std::collections::HashMap;
use std::env;
use std::fs;
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use tt_core::description::{editor_seed, from_editor_text};
use tt_core::store::Layout;

const FALLBACK_EDITORS: [&str; 3] = ["vim", "vi", "nano"];

/// Editor argv: `$VISUAL`, then `$EDITOR`, then the first fallback on `PATH`.
pub fn resolve_editor_command(env_map: Option<&HashMap<String, String>>) -> Result<Vec<String>> {
    let env_map = env_map.cloned().unwrap_or_else(|| env::vars().collect());
    if let Some(raw) = ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(|key| env_map.get(key))
        .find(|value| !value.trim().is_empty())
    {
        let parts = shell_words::split(raw).with_context(|| format!("parse editor `{raw}`"))?;
        if !parts.is_empty() {
            return Ok(parts);
        }
    }

    FALLBACK_EDITORS
        .into_iter()
        .find_map(|name| which::which(name).ok())
        .map(|path| vec![path.to_string_lossy().to_string()])
        .ok_or_else(|| anyhow!("no editor found; set $EDITOR or pass -m"))
}

/// Opens the editor on the scratch file seeded with `initial` and returns the
/// text with comment lines dropped.
pub fn edit_description(layout: &Layout, initial: &str) -> Result<String> {
    let path = layout.message_path();
    fs::write(&path, editor_seed(initial))
        .with_context(|| format!("write {}", path.display()))?;

    let argv = resolve_editor_command(None)?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty editor command"))?;
    tracing::debug!(editor = %program, "opening editor");
    let status = Command::new(program)
        .args(args)
        .arg(&path)
        .status()
        .with_context(|| format!("launch editor `{program}`"))?;
    if !status.success() {
        let _ = fs::remove_file(&path);
        bail!("editor `{program}` exited with {status}");
    }

    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let _ = fs::remove_file(&path);
    Ok(from_editor_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn visual_wins_over_editor() {
        let env = env_of(&[("VISUAL", "code --wait"), ("EDITOR", "nano")]);
        assert_eq!(
            resolve_editor_command(Some(&env)).expect("editor"),
            vec!["code".to_string(), "--wait".to_string()]
        );
    }

    #[test]
    fn blank_visual_falls_through_to_editor() {
        let env = env_of(&[("VISUAL", "  "), ("EDITOR", "'my editor' -n")]);
        assert_eq!(
            resolve_editor_command(Some(&env)).expect("editor"),
            vec!["my editor".to_string(), "-n".to_string()]
        );
    }

    #[test]
    fn unbalanced_quotes_are_an_error() {
        let env = env_of(&[("EDITOR", "vim '")]);
        assert!(resolve_editor_command(Some(&env)).is_err());
    }
}
