use crate::error::{Result, TrackerError};

pub const COMMENT_MARKER: char = '#';

const EDITOR_HELP: &str = "\n\
# Please enter the task description. Lines starting with '#' will be ignored and\n\
# an empty description aborts the command.\n";

/// Text handed to the editor: the current description, then the help block.
pub fn editor_seed(initial: &str) -> String {
    format!("{initial}{EDITOR_HELP}")
}

/// Drops comment lines from editor output.
pub fn from_editor_text(text: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with(COMMENT_MARKER))
        .map(|line| format!("{line}\n"))
        .collect()
}

/// Trims surrounding whitespace; nothing left is `EmptyDescription`.
pub fn normalize_description(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::EmptyDescription);
    }
    Ok(trimmed.to_string())
}
