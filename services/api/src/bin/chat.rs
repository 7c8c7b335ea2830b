//! services/api/src/bin/chat.rs
//!
//! A terminal chat client. Drives a `ChatSession` against a running API server.
//!
//! `NEXUS_API_URL` selects the server (default `http://localhost:8000`) and
//! `NEXUS_SESSION_FILE` the file that keeps the login between runs.

use api_lib::client::{ApiClient, ClientError, FileSessionStorage};
use bytes::Bytes;
use nexus_chat_core::session::{ChatMessage, ChatMode, ChatSession, SessionError};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const HELP: &str = "\
Commands:
  /register <username> <email> <password>
  /login <email> <password>
  /logout
  /refresh
  /mode general|documents
  /upload <path>
  /url <address>
  /list
  /delete <content-id>
  /quit
Anything else is sent as a chat message.";

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("{0}")]
    Usage(&'static str),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let base_url =
        std::env::var("NEXUS_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let session_file =
        std::env::var("NEXUS_SESSION_FILE").unwrap_or_else(|_| ".nexus_session.json".to_string());

    let client = Arc::new(ApiClient::new(&base_url, Duration::from_secs(120))?);
    let storage = Arc::new(FileSessionStorage::new(session_file));
    let mut session = ChatSession::new(client.clone(), storage)?;

    println!("Connected to {base_url}. Type /help for commands.");
    if let Some(user) = session.auth().user() {
        println!("Signed in as {} <{}>", user.username, user.email);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&session);
        // Once a send has listened for Ctrl-C the default handler is gone.
        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c()).await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let result = if line.starts_with('/') {
            run_command(&client, &mut session, line).await
        } else {
            send(&mut session, line).await
        };
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

/// The next input line, or `None` at end of input or when `interrupt` fires first.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => {
            println!();
            Ok(None)
        }
    }
}

fn print_prompt(session: &ChatSession) {
    use std::io::Write;
    let who = session
        .auth()
        .user()
        .map(|user| user.username.as_str())
        .unwrap_or("anonymous");
    print!("[{who} | {}] > ", session.mode());
    std::io::stdout().flush().ok();
}

async fn send(session: &mut ChatSession, text: &str) -> Result<(), CommandError> {
    let reply = tokio::select! {
        result = session.submit(text) => Some(result.map(ChatMessage::clone)),
        _ = tokio::signal::ctrl_c() => None,
    };

    match reply {
        Some(message) => print_message(&message?),
        None => {
            session.abort_pending();
            println!("(cancelled)");
        }
    }
    for note in session.take_notifications() {
        eprintln!("! {note}");
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    if message.is_error {
        println!("AI (error): {}", message.content);
        return;
    }
    println!("AI: {}", message.content);
    for source in &message.sources {
        println!(
            "    [{}] {} (relevance {:.2})",
            source.content_type, source.source, source.relevance_score
        );
    }
}

fn token(session: &ChatSession) -> Result<String, CommandError> {
    session
        .auth()
        .token()
        .map(str::to_string)
        .ok_or(CommandError::Session(SessionError::NotAuthenticated))
}

async fn run_command(
    client: &ApiClient,
    session: &mut ChatSession,
    line: &str,
) -> Result<(), CommandError> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (command, args.as_slice()) {
        ("/help", _) => println!("{HELP}"),
        ("/register", [username, email, password]) => {
            let (token, user) = client.register(username, email, password).await?;
            if session.auth().is_authenticated() {
                session.logout()?;
            }
            session.login(token, user)?;
            println!("Account created.");
        }
        ("/register", _) => {
            return Err(CommandError::Usage(
                "usage: /register <username> <email> <password>",
            ))
        }
        ("/login", [email, password]) => {
            let (token, user) = client.login(email, password).await?;
            if session.auth().is_authenticated() {
                session.logout()?;
            }
            let name = user.username.clone();
            session.login(token, user)?;
            println!("Welcome back, {name}.");
        }
        ("/login", _) => return Err(CommandError::Usage("usage: /login <email> <password>")),
        ("/logout", _) => {
            session.logout()?;
            println!("Signed out.");
        }
        ("/refresh", _) => {
            let fresh = client.refresh(&token(session)?).await?;
            session.refresh(fresh)?;
            println!("Token refreshed.");
        }
        ("/mode", ["general"]) => session.set_mode(ChatMode::General)?,
        ("/mode", ["documents"]) => session.set_mode(ChatMode::Documents)?,
        ("/mode", _) => return Err(CommandError::Usage("usage: /mode general|documents")),
        ("/upload", [path]) => {
            let path = Path::new(path);
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or(CommandError::Usage("the path must end in a file name"))?;
            let data = Bytes::from(tokio::fs::read(path).await?);
            let item = client.upload(&token(session)?, filename, data).await?;
            println!(
                "Indexed {} as {} ({} chunks)",
                filename, item.content_id, item.metadata.chunk_count
            );
        }
        ("/upload", _) => return Err(CommandError::Usage("usage: /upload <path>")),
        ("/url", [url]) => {
            let item = client.add_url(&token(session)?, url).await?;
            println!(
                "Indexed {} as {} ({} chunks)",
                url, item.content_id, item.metadata.chunk_count
            );
        }
        ("/url", _) => return Err(CommandError::Usage("usage: /url <address>")),
        ("/list", _) => {
            let listing = client.list_content(&token(session)?).await?;
            if listing.content.is_empty() {
                println!("No content yet.");
            }
            for item in listing.content {
                let label = item
                    .metadata
                    .filename
                    .or(item.metadata.url)
                    .unwrap_or_default();
                println!(
                    "{}  {:<4}  {}  ({} chunks, added {})",
                    item.content_id,
                    item.content_type,
                    label,
                    item.metadata.chunk_count,
                    item.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ("/delete", [id]) => {
            let content_id = Uuid::parse_str(id)
                .map_err(|_| CommandError::Usage("the content id must be a UUID"))?;
            client.delete_content(&token(session)?, content_id).await?;
            println!("Deleted {content_id}.");
        }
        ("/delete", _) => return Err(CommandError::Usage("usage: /delete <content-id>")),
        _ => return Err(CommandError::Usage("unknown command, try /help")),
    }
    Ok(())
}
