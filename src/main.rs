//! chatdesk -- command-line client for the chatdesk backend.
//!
//! Wires together:
//!   - Configuration loading (file + CHATDESK_* environment)
//!   - Tracing/logging
//!   - The client with its file-backed session
//!   - One subcommand per run

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use chatdesk::models::{BatchUploadOptions, Credentials, UploadOptions};
use chatdesk::state::extract_text;
use chatdesk::{ApiResult, ChatState, ChatdeskClient, Config, Navigator, StreamEvent, UploadFile};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Login { username: String, password: String },
    Logout,
    Whoami,
    Ask { message: String },
    Upload { files: Vec<PathBuf> },
    Download { id: String, path: PathBuf },
    Health,
}

#[derive(Debug)]
struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

#[derive(Debug, PartialEq)]
enum ParseOutcome {
    Help,
    Version,
}

fn parse_args<I>(args: I) -> Result<Result<CliArgs, ParseOutcome>, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => return Err("--config requires a path argument".into()),
            },
            "--help" | "-h" => return Ok(Err(ParseOutcome::Help)),
            "--version" | "-V" => return Ok(Err(ParseOutcome::Version)),
            _ => rest.push(arg),
        }
    }

    let mut rest = rest.into_iter();
    let name = rest.next().ok_or("missing command")?;
    let command = match name.as_str() {
        "login" => {
            let username = rest.next().ok_or("login requires <username> <password>")?;
            let password = rest.next().ok_or("login requires <username> <password>")?;
            Command::Login { username, password }
        }
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "ask" => {
            let message = rest.by_ref().collect::<Vec<_>>().join(" ");
            if message.trim().is_empty() {
                return Err("ask requires a message".into());
            }
            Command::Ask { message }
        }
        "upload" => {
            let files: Vec<PathBuf> = rest.by_ref().map(PathBuf::from).collect();
            if files.is_empty() {
                return Err("upload requires at least one file".into());
            }
            Command::Upload { files }
        }
        "download" => {
            let id = rest.next().ok_or("download requires <id> <path>")?;
            let path = rest.next().ok_or("download requires <id> <path>")?;
            Command::Download {
                id,
                path: PathBuf::from(path),
            }
        }
        "health" => Command::Health,
        other => return Err(format!("unknown command: {other}")),
    };

    if let Some(extra) = rest.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(Ok(CliArgs {
        config_path,
        command,
    }))
}

fn print_usage() {
    println!(
        "\
chatdesk {version} -- chatdesk command-line client

USAGE:
    chatdesk [OPTIONS] <COMMAND>

COMMANDS:
    login <username> <password>    Log in and store the session
    logout                         Log out and clear the stored session
    whoami                         Show the stored user
    ask <message...>               Stream an AI reply (Ctrl+C stops it)
    upload <files...>              Upload one or more files
    download <id> <path>           Download a file to a path or directory
    health                         Check the backend health endpoint

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: chatdesk.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    CHATDESK_CONFIG        Alternative to --config flag
    CHATDESK_API_BASE_URL  Backend base URL
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Tells the user to log in again instead of navigating anywhere.
struct CliNavigator;

impl Navigator for CliNavigator {
    fn current_route(&self) -> String {
        "/cli".to_string()
    }

    fn redirect(&self, route: &str) {
        tracing::debug!(route, "Redirect requested");
        eprintln!("Session expired, run `chatdesk login <username> <password>`");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse CLI arguments
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(Ok(cli)) => cli,
        Ok(Err(ParseOutcome::Help)) => {
            print_usage();
            return Ok(());
        }
        Ok(Err(ParseOutcome::Version)) => {
            println!("chatdesk {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(2);
        }
    };

    // Allow CHATDESK_CONFIG env var as alternative to --config flag
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("CHATDESK_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("chatdesk.toml"));

    // 2. Load configuration
    let config = Config::load(&config_path)?;

    // 3. Initialize tracing/logging
    init_tracing(&config);
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        overrides = config.env_overrides.all().len(),
        "Starting chatdesk"
    );

    // 4. Build the client (hydrates the stored session)
    let client = ChatdeskClient::builder()
        .config(config)
        .navigator(Arc::new(CliNavigator))
        .build()
        .await?;

    // 5. Run the command
    match cli.command {
        Command::Login { username, password } => {
            let result = client
                .auth()
                .login(&Credentials::new(username, password))
                .await;
            report(&result)
        }
        Command::Logout => report(&client.auth().logout().await),
        Command::Whoami => whoami(&client).await,
        Command::Ask { message } => ask(&client, &message).await,
        Command::Upload { files } => upload(&client, &files).await,
        Command::Download { id, path } => download(&client, &id, &path).await,
        Command::Health => {
            let result = client.system().health().await;
            if let Some(data) = result.data() {
                println!("{}", serde_json::to_string_pretty(data)?);
            }
            report(&result)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Print the outcome of a call; a failure becomes the process error.
fn report<T>(result: &ApiResult<T>) -> anyhow::Result<()> {
    match result.error() {
        None => {
            println!("{}", result.message());
            Ok(())
        }
        Some(error) => anyhow::bail!("{}: {}", result.message(), error),
    }
}

async fn whoami(client: &ChatdeskClient) -> anyhow::Result<()> {
    if !client.auth().is_logged_in().await {
        anyhow::bail!("Not logged in");
    }
    match client.auth().current_user().await {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => println!("Logged in (no user profile stored)"),
    }
    Ok(())
}

async fn ask(client: &ChatdeskClient, message: &str) -> anyhow::Result<()> {
    let mut chat = ChatState::new();
    let conversation = chat.new_conversation();
    chat.add_user_message(message);

    let request = json!({ "message": message.trim(), "conversationId": conversation });
    let mut stream = client.chat().reply_stream(&request).await?;
    chat.set_loading(true);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = stream.next() => {
                let Some(event) = event else { break };
                if let StreamEvent::Message(frame) = &event {
                    if let Some(text) = extract_text(frame) {
                        print!("{text}");
                        stdout.flush()?;
                    }
                }
                chat.apply_stream_event(&event);
                if let StreamEvent::Error(e) = event {
                    println!();
                    anyhow::bail!("AI reply stream failed: {}", e.user_message());
                }
            }
            _ = &mut ctrl_c => {
                stream.cancel();
                tracing::info!("Reply stream cancelled");
                println!();
                eprintln!("(stopped)");
                return Ok(());
            }
        }
    }
    println!();
    tracing::debug!(messages = chat.messages().len(), "Conversation finished");
    Ok(())
}

async fn upload(client: &ChatdeskClient, paths: &[PathBuf]) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }

    if let [file] = files.as_slice() {
        let options = UploadOptions::default().on_progress(|p| eprint!("\r{p:>3}%"));
        let result = client.files().upload(file, &options).await;
        eprintln!();
        return report(&result);
    }

    let options = BatchUploadOptions::default().on_progress(|p| eprint!("\r{p:>3}%"));
    let batch = client.files().upload_multiple(&files, &options).await;
    eprintln!();
    for (file, result) in files.iter().zip(&batch.results) {
        match result.error() {
            None => println!("  ok      {}", file.name),
            Some(e) => println!("  failed  {}: {}", file.name, e),
        }
    }
    println!("{}", batch.message);
    if !batch.success {
        anyhow::bail!("{} of {} uploads failed", batch.summary.failed, batch.summary.total);
    }
    Ok(())
}

async fn download(client: &ChatdeskClient, id: &str, path: &Path) -> anyhow::Result<()> {
    let (dir, name) = if path.is_dir() {
        (path.to_path_buf(), None)
    } else {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (dir, path.file_name().and_then(|n| n.to_str()).map(str::to_string))
    };

    let result = client.files().download(id, &dir, name.as_deref()).await;
    if let Some(written) = result.data() {
        println!("{}", written.display());
    }
    report(&result)
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("chatdesk={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
