//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `sharenote_core` linkage and print its version.
//! - Run the two-user Groceries scenario against the configured storage
//!   (in-memory unless a `sharenote.toml` path is given) and print every
//!   frame each live connection receives.

use sharenote_core::{
    CollabCore, ConnectionSink, CoreConfig, NewListItem, NewNote, Origin, Subscription, User,
};
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

struct PrintSink {
    label: &'static str,
}

impl ConnectionSink for PrintSink {
    fn write_frame(&self, frame: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for line in frame.lines().filter(|line| !line.is_empty()) {
            writeln!(out, "[{}] {line}", self.label)?;
        }
        out.flush()
    }
}

fn main() -> ExitCode {
    println!("sharenote_core ping={}", sharenote_core::ping());
    println!("sharenote_core version={}", sharenote_core::core_version());

    // Explicit path first, then `sharenote.toml` in the working directory.
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from(CoreConfig::filename())).filter(|path| path.is_file()));
    let config = match path {
        Some(path) => match CoreConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("config error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => CoreConfig::default(),
    };
    if let Err(err) = config.init_logging() {
        eprintln!("logging error: {err}");
        return ExitCode::FAILURE;
    }

    match run_scenario(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("scenario failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_scenario(config: &CoreConfig) -> Result<(), Box<dyn Error>> {
    let core = CollabCore::open(config)?;
    let alice = Origin::new(User::new(Uuid::new_v4(), "Alice", "alice@example.com"))
        .with_salt("s1");
    let bob = Origin::new(User::new(Uuid::new_v4(), "Bob", "bob@example.com")).with_salt("s2");
    core.register_identity(&alice.user)?;
    core.register_identity(&bob.user)?;

    let note = core.note_create(NewNote::titled("Groceries"), &alice)?;
    let _alice_live = subscribe(&core, &alice, "alice")?;
    core.co_author_create(note.id, &bob.user.email, &alice)?;
    let _bob_live = subscribe(&core, &bob, "bob")?;

    core.list_item_create(NewListItem::for_note(note.id, "Milk"), &alice)?;
    core.list_item_create(NewListItem::for_note(note.id, "Eggs"), &bob)?;

    let notes = core.notes_list(&bob.user)?;
    println!("{}", serde_json::to_string_pretty(&notes)?);
    println!("closed_connections={}", core.shutdown());
    Ok(())
}

fn subscribe(
    core: &CollabCore,
    origin: &Origin,
    label: &'static str,
) -> Result<Subscription, Box<dyn Error>> {
    let salt = origin.salt.as_deref().unwrap_or(label);
    Ok(core.subscribe(origin.user.id, salt, Arc::new(PrintSink { label }))?)
}
