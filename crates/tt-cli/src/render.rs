use colored::{ColoredString, Colorize};
use serde::Serialize;
use tt_core::{Item, Scope, Status, Uid};

/// JSON shape for one item; `vid` only appears in the unresolved private listing.
#[derive(Debug, Serialize)]
pub struct ItemView<'a> {
    pub uid: Uid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vid: Option<usize>,
    #[serde(flatten)]
    pub item: &'a Item,
}

impl<'a> ItemView<'a> {
    pub fn new(item: &'a Item, vid: Option<usize>) -> Self {
        Self {
            uid: item.uid(),
            vid,
            item,
        }
    }
}

fn status_colored(status: Status, text: String) -> ColoredString {
    match status {
        Status::NotStarted => text.bright_black(),
        Status::InProgress => text.yellow(),
        Status::Done => text.green(),
    }
}

/// `<vid> <marker><id> <kind> <status> <first line>`
pub fn log_line(item: &Item, vid: Option<usize>) -> String {
    let marker = item.scope.marker().to_string();
    let marker = match item.scope {
        Scope::Shared => marker.bright_blue(),
        Scope::Private => marker.yellow(),
    };
    let prefix = vid
        .map(|vid| format!("{} ", format!("{vid:<3}").yellow()))
        .unwrap_or_default();
    format!(
        "{prefix}{marker}{} {} {} {}",
        item.id.to_string().yellow(),
        item.kind.letter().to_string().bright_blue(),
        status_colored(item.status, item.status.letter().to_string()),
        item.short_description()
    )
}

pub fn show_block(item: &Item) -> String {
    let mut out = format!("{}\n", item.uid().to_string().yellow());
    if let Some(worker) = &item.worker {
        out.push_str(&format!("{worker}\n"));
    }
    out.push_str(&format!(
        "{}\n{}\n{}\n\n{}",
        item.scope.label().bright_blue(),
        item.kind.label().bright_blue(),
        status_colored(item.status, item.status.label().to_string()),
        item.description
    ));
    out
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
