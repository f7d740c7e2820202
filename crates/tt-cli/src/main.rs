mod editor;
mod render;
mod version;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tt_core::config::{self, ConfigError, Profile};
use tt_core::store::{find_repo_root, Layout};
use tt_core::{Amendment, Identity, Item, Kind, Scope, Tracker, TrackerError};

use crate::render::{log_line, print_json, show_block, ItemView};

#[derive(Parser)]
#[command(name = "tt", version = version::FULL, about = "Personal and shared task tracker")]
struct Cli {
    /// Repository root (defaults to the nearest ancestor containing `.tt`)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress logs and error messages
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Which item a command acts on.
#[derive(Args)]
struct Target {
    /// VID (position in `tt list`), UID such as `G42`, or `id:42`; defaults to VID 0
    token: Option<String>,
}

impl Target {
    fn identity(&self) -> Result<Identity> {
        Ok(Identity::parse(self.token.as_deref())?)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a task tracker in the current directory
    Init,
    /// Show or update the user name and email
    Config {
        #[arg(short = 'n', long)]
        username: Option<String>,
        #[arg(short = 'm', long)]
        email: Option<String>,
        /// Write the repository config instead of the global one
        #[arg(long)]
        repo: bool,
    },
    /// Register a user in this repository
    Register {
        /// Defaults to the configured user
        #[arg(short = 'n', long)]
        username: Option<String>,
        /// Email recorded for the registered user
        #[arg(short = 'm', long)]
        email: Option<String>,
    },
    /// Print the current user
    Whoami {
        #[arg(long)]
        json: bool,
    },
    /// Create a task; opens the editor unless -m is given
    #[command(visible_aliases = ["new", "push"])]
    Create {
        #[arg(short, long)]
        message: Option<String>,
        /// task|defect|bug|feature or 0|1|2
        #[arg(short = 't', long = "type", default_value = "task")]
        kind: String,
        /// Claim the new shared task for this user
        #[arg(short, long)]
        worker: Option<String>,
        /// Create a shared task
        #[arg(short, long, conflicts_with = "local")]
        global: bool,
        /// Create a private task (default)
        #[arg(short, long)]
        local: bool,
    },
    /// List tasks (unresolved by default)
    #[command(visible_alias = "log")]
    List {
        /// Include resolved tasks
        #[arg(short, long)]
        all: bool,
        /// List shared tasks
        #[arg(short, long)]
        global: bool,
        /// List private tasks as well when combined with -g
        #[arg(short, long)]
        local: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one task in full
    Show {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        json: bool,
    },
    /// Move a task one status forward
    #[command(visible_alias = "roll")]
    Advance(Target),
    /// Move a task one status back
    #[command(visible_alias = "rollb")]
    Revert(Target),
    /// Mark a task resolved
    #[command(visible_alias = "pop")]
    Resolve(Target),
    /// Change kind, description or worker; opens the editor when nothing is given
    Amend {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        message: Option<String>,
        /// task|defect|bug|feature or 0|1|2
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
        #[arg(short, long)]
        worker: Option<String>,
    },
    /// Claim a shared task
    #[command(visible_alias = "take")]
    Claim(Target),
    /// Give back a claimed task
    #[command(visible_alias = "takeb")]
    Unclaim(Target),
    /// Hand a shared task to another user
    #[command(visible_alias = "assign")]
    Reassign {
        user: String,
        #[command(flatten)]
        target: Target,
    },
    /// Clear the worker of a shared task
    #[command(visible_alias = "assignb")]
    Unassign(Target),
}

fn parse_kind(value: &str) -> Result<Kind> {
    Ok(value.parse::<Kind>()?)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and succeed; usage errors exit 1.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !cli.quiet {
                eprintln!("Error: {err:#}");
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Core errors carry their own category; anything else is internal.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<TrackerError>()
                .map(TrackerError::exit_code)
                .or_else(|| cause.downcast_ref::<ConfigError>().map(|_| 7))
        })
        .unwrap_or(1)
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("resolve current directory")
}

fn repo_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(root) = &cli.root {
        return Ok(root.clone());
    }
    let cwd = current_dir()?;
    find_repo_root(&cwd).ok_or_else(|| TrackerError::NotInitialized { path: cwd }.into())
}

fn open(cli: &Cli) -> Result<Tracker> {
    let root = repo_root(cli)?;
    let profile = config::resolve_profile(Some(&root))?;
    Ok(Tracker::open(&root, &profile.username)?)
}

#[derive(Serialize)]
struct WhoamiView<'a> {
    username: &'a str,
    email: &'a str,
    username_source: &'static str,
    email_source: &'static str,
}

impl<'a> From<&'a Profile> for WhoamiView<'a> {
    fn from(profile: &'a Profile) -> Self {
        Self {
            username: &profile.username,
            email: &profile.email,
            username_source: profile.username_source.as_str(),
            email_source: profile.email_source.as_str(),
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Init => {
            let root = match &cli.root {
                Some(root) => root.clone(),
                None => current_dir()?,
            };
            let profile = config::resolve_profile(Some(&root))?;
            let tracker = Tracker::init(&root, &profile.username)?;
            println!(
                "Initialized task tracker in {} for {}",
                tracker.store().layout().main_dir().display(),
                tracker.user()
            );
        }
        Command::Config {
            username,
            email,
            repo,
        } => {
            let path = if *repo {
                let root = repo_root(cli)?;
                if !Layout::new(&root).is_initialized() {
                    return Err(TrackerError::NotInitialized { path: root }.into());
                }
                config::repo_config_path(&root)
            } else {
                config::global_config_path()
                    .ok_or_else(|| anyhow!("cannot locate home directory; set TT_CONFIG"))?
            };
            let current = if username.is_none() && email.is_none() {
                config::load_config(&path)?.unwrap_or_default()
            } else {
                config::update_config(&path, username.as_deref(), email.as_deref())?
            };
            println!(
                "{} <{}>",
                current.username.as_deref().unwrap_or("-"),
                current.email.as_deref().unwrap_or("-")
            );
        }
        Command::Register { username, email } => {
            let root = repo_root(cli)?;
            let user = match username {
                Some(user) => user.clone(),
                None => config::resolve_profile(Some(&root))?.username,
            };
            if Tracker::register(&root, &user)? {
                println!("Registered {user}");
            } else {
                println!("{user} is already registered");
            }
            if let Some(email) = email {
                let path = config::user_config_path(&root, &user);
                config::update_config(&path, None, Some(email.as_str()))?;
            }
        }
        Command::Whoami { json } => {
            let root = match &cli.root {
                Some(root) => Some(root.clone()),
                None => find_repo_root(&current_dir()?),
            };
            let profile = config::resolve_profile(root.as_deref())?;
            if *json {
                print_json(&WhoamiView::from(&profile))?;
            } else {
                println!("{} <{}>", profile.username, profile.email);
            }
        }
        Command::Create {
            message,
            kind,
            worker,
            global,
            local: _,
        } => {
            let kind = parse_kind(kind)?;
            let tracker = open(cli)?;
            let scope = if *global { Scope::Shared } else { Scope::Private };
            let description = match message {
                Some(message) => message.clone(),
                None => editor::edit_description(tracker.store().layout(), "")?,
            };
            let item = tracker.create(scope, kind, &description, worker.as_deref())?;
            println!("{}", log_line(&item, None));
        }
        Command::List {
            all,
            global,
            local,
            json,
        } => {
            let tracker = open(cli)?;
            let mut rows: Vec<(Item, Option<usize>)> = Vec::new();
            if *global {
                rows.extend(
                    tracker
                        .list(Some(Scope::Shared), *all)?
                        .into_iter()
                        .map(|item| (item, None)),
                );
            }
            if !*global || *local {
                let positional = !*all;
                rows.extend(
                    tracker
                        .list(Some(Scope::Private), *all)?
                        .into_iter()
                        .enumerate()
                        .map(|(vid, item)| (item, positional.then_some(vid))),
                );
            }
            if *json {
                let views: Vec<ItemView> = rows
                    .iter()
                    .map(|(item, vid)| ItemView::new(item, *vid))
                    .collect();
                print_json(&views)?;
            } else {
                for (item, vid) in &rows {
                    println!("{}", log_line(item, *vid));
                }
            }
        }
        Command::Show { target, json } => {
            let tracker = open(cli)?;
            let item = tracker.show(target.identity()?)?;
            if *json {
                print_json(&ItemView::new(&item, None))?;
            } else {
                println!("{}", show_block(&item));
            }
        }
        Command::Advance(target) => {
            let tracker = open(cli)?;
            print_items(&tracker.advance(target.identity()?)?);
        }
        Command::Revert(target) => {
            let tracker = open(cli)?;
            print_items(&tracker.revert(target.identity()?)?);
        }
        Command::Resolve(target) => {
            let tracker = open(cli)?;
            print_items(&tracker.resolve(target.identity()?)?);
        }
        Command::Amend {
            target,
            message,
            kind,
            worker,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let tracker = open(cli)?;
            // Pin the UID first so editing time cannot shift a VID.
            let item = tracker.find(target.identity()?)?;
            let description = match message {
                Some(message) => Some(message.clone()),
                None if kind.is_none() && worker.is_none() => Some(editor::edit_description(
                    tracker.store().layout(),
                    &item.description,
                )?),
                None => None,
            };
            let touched = tracker.amend(
                Identity::Uid(item.uid()),
                Amendment {
                    kind,
                    description,
                    worker: worker.clone(),
                },
            )?;
            print_items(&touched);
        }
        Command::Claim(target) => {
            let tracker = open(cli)?;
            print_items(&[tracker.claim(target.identity()?)?]);
        }
        Command::Unclaim(target) => {
            let tracker = open(cli)?;
            print_items(&[tracker.unclaim(target.identity()?)?]);
        }
        Command::Reassign { user, target } => {
            let tracker = open(cli)?;
            print_items(&[tracker.reassign(target.identity()?, user)?]);
        }
        Command::Unassign(target) => {
            let tracker = open(cli)?;
            print_items(&[tracker.unassign(target.identity()?)?]);
        }
    }
    Ok(())
}

fn print_items(items: &[Item]) {
    for item in items {
        println!("{}", log_line(item, None));
    }
}
