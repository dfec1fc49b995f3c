use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use shelf_reader::{
    BookmarkChange, LifecycleSignal, ReaderSession, SettingsStore, SqliteProgressStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "shelf-reader", about = "Read a book and keep your place in it")]
struct Args {
    /// Identifier of the book to open
    book_id: String,

    /// Page count reported by the renderer
    #[arg(long, default_value_t = 100)]
    pages: u32,

    /// Start here instead of the last recorded position
    #[arg(long)]
    start_page: Option<u32>,

    /// Settings file (created on first save)
    #[arg(long, default_value = "shelf-reader.json")]
    settings: PathBuf,
}

#[derive(Debug, PartialEq)]
enum Command {
    Next,
    Previous,
    GoTo(i64),
    Bookmark(Option<String>),
    RemoveBookmark(u32),
    Jump(u32),
    List,
    Hide,
    Show,
    ZoomIn,
    ZoomOut,
    Rotate,
    History,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "n" | "next" => Command::Next,
        "p" | "prev" => Command::Previous,
        "g" | "goto" => Command::GoTo(rest.parse().ok()?),
        "b" | "bookmark" => Command::Bookmark((!rest.is_empty()).then(|| rest.to_string())),
        "rm" => Command::RemoveBookmark(rest.parse().ok()?),
        "j" | "jump" => Command::Jump(rest.parse().ok()?),
        "ls" => Command::List,
        "hide" => Command::Hide,
        "show" => Command::Show,
        "zoom+" => Command::ZoomIn,
        "zoom-" => Command::ZoomOut,
        "rotate" => Command::Rotate,
        "history" => Command::History,
        "q" | "quit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let settings_store = SettingsStore::new(args.settings.clone())?;
    let sync = settings_store.sync();

    let store = SqliteProgressStore::open(sync.database_path.clone())
        .with_context(|| format!("failed to open {}", sync.database_path.display()))?;

    let initial_page = match args.start_page {
        Some(page) => page,
        None => store
            .latest_progress(&args.book_id)
            .await?
            .map(|record| record.read_page)
            .unwrap_or(1),
    };

    let mut session =
        ReaderSession::activate(args.book_id.clone(), initial_page, Arc::new(store.clone()), &sync);
    session.on_document_loaded(args.pages).await;
    println!(
        "{}: page {}/{} (session {})",
        args.book_id,
        session.current_page(),
        args.pages,
        session.session().session_id
    );

    let sender = session.lifecycle_sender();
    let interrupted = CancellationToken::new();
    let interrupted_trigger = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            sender.send(LifecycleSignal::Unloading);
            interrupted_trigger.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = interrupted.cancelled() => {
                info!("Interrupted; closing session");
                break;
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = parse_command(&line) else {
            warn!("Unknown command: {}", line.trim());
            continue;
        };

        match command {
            Command::Next => report_page(session.next_page().await, &session),
            Command::Previous => report_page(session.previous_page().await, &session),
            Command::GoTo(page) => report_page(session.go_to_page(page).await, &session),
            Command::Bookmark(note) => {
                let page = session.current_page();
                match session.add_bookmark(note.as_deref()) {
                    BookmarkChange::Added => println!("bookmarked page {page}"),
                    BookmarkChange::Replaced { .. } => println!("updated bookmark on page {page}"),
                }
            }
            Command::RemoveBookmark(page) => match session.remove_bookmark(page) {
                Some(_) => println!("removed bookmark on page {page}"),
                None => println!("no bookmark on page {page}"),
            },
            Command::Jump(page) => report_page(session.jump_to_bookmark(page).await, &session),
            Command::List => {
                let bookmarks = session.bookmarks();
                if bookmarks.is_empty() {
                    println!("no bookmarks yet");
                }
                for bookmark in bookmarks {
                    println!(
                        "  p.{:<5} {}  {}",
                        bookmark.page_number,
                        bookmark.timestamp.format("%Y-%m-%d %H:%M"),
                        bookmark.note.unwrap_or_default()
                    );
                }
            }
            Command::Hide => session.signal(LifecycleSignal::Hidden),
            Command::Show => session.signal(LifecycleSignal::Visible),
            Command::ZoomIn => println!("zoom {:.1}x", session.view_mut().zoom_in()),
            Command::ZoomOut => println!("zoom {:.1}x", session.view_mut().zoom_out()),
            Command::Rotate => println!("rotation {}°", session.view_mut().rotate()),
            Command::History => {
                for record in store.list_progress().await? {
                    println!(
                        "  {:<24} page {:<5} {}",
                        record.book_id,
                        record.read_page,
                        record.updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            Command::Quit => break,
        }
    }

    let report = session.deactivate().await?;
    println!("saved at page {}", report.final_page);
    Ok(())
}

fn report_page(moved: Option<u32>, session: &ReaderSession) {
    match moved {
        Some(page) => println!("page {page}"),
        None => println!("page {} (out of range)", session.current_page()),
    }
}
