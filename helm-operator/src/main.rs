//! Helm operator client — entry point.
//!
//! ```text
//! helm-operator --username <name>            Connect with config defaults
//! helm-operator --host <addr> --port <p>     Override the target host
//! helm-operator --config <path>              Load a custom config TOML
//! helm-operator --gen-config                 Write default config to stdout
//! ```
//!
//! Once connected, commands are read line by line:
//!
//! ```text
//! ping                      round-trip liveness check
//! info                      host system information
//! exec <command>            run a command on the host
//! screenshot                request a screen capture
//! ls <path>                 list a host directory
//! move <x> <y>              move the mouse
//! click <x> <y> [button]    click (0 left, 1 middle, 2 right)
//! key <key>                 press and release a key
//! clip <text>               set the host clipboard
//! quit                      disconnect and exit
//! ```

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use helm_core::{
    ConnectionInfo, FileEntry, FileRequest, Frame, KeyEvent, MessageType, MouseClick, MouseMove,
    SessionSignal, SystemInfo,
};
use helm_operator::config::OperatorConfig;
use helm_operator::session::{CommandSender, OperatorSession, SessionEvent};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "helm-operator", about = "Helm remote-control operator client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "helm-operator.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Account to log in as.
    #[arg(short, long, default_value = "operator")]
    username: String,

    /// Override the configured host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,
}

fn read_password(username: &str) -> std::io::Result<String> {
    print!("password for {username}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ── Command parsing ──────────────────────────────────────────────

/// Parse one console line into a frame. `None` means quit.
fn parse_command(line: &str) -> Result<Option<Frame>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err(String::new());
    };
    let rest: Vec<&str> = parts.collect();

    let frame = match verb {
        "quit" | "exit" => return Ok(None),
        "ping" => Frame::ping(),
        "info" => Frame::new(MessageType::Info, Vec::new()).map_err(|e| e.to_string())?,
        "screenshot" => {
            Frame::new(MessageType::Screenshot, Vec::new()).map_err(|e| e.to_string())?
        }
        "exec" => {
            if rest.is_empty() {
                return Err("usage: exec <command>".into());
            }
            Frame::new(MessageType::SystemCommand, rest.join(" ").into_bytes())
                .map_err(|e| e.to_string())?
        }
        "ls" => {
            let path = rest.first().copied().unwrap_or(".").to_string();
            FileRequest::ListDir { path }
                .into_frame()
                .map_err(|e| e.to_string())?
        }
        "move" => {
            let (x, y) = parse_xy(&rest)?;
            MouseMove {
                x: x as i16,
                y: y as i16,
                button: 0,
                pressed: false,
            }
            .into_frame()
            .map_err(|e| e.to_string())?
        }
        "click" => {
            let (x, y) = parse_xy(&rest)?;
            let button = rest
                .get(2)
                .map(|b| b.parse::<u8>().map_err(|_| "button must be 0, 1, or 2"))
                .transpose()?
                .unwrap_or(0);
            MouseClick {
                x,
                y,
                button,
                pressed: true,
            }
            .into_frame()
            .map_err(|e| e.to_string())?
        }
        "key" => {
            let Some(key) = rest.first() else {
                return Err("usage: key <key>".into());
            };
            KeyEvent {
                key: (*key).to_string(),
                pressed: true,
            }
            .into_frame()
            .map_err(|e| e.to_string())?
        }
        "clip" => Frame::new(
            MessageType::ClipboardUpdate,
            rest.join(" ").into_bytes(),
        )
        .map_err(|e| e.to_string())?,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(Some(frame))
}

fn parse_xy(rest: &[&str]) -> Result<(i32, i32), String> {
    let (Some(x), Some(y)) = (rest.first(), rest.get(1)) else {
        return Err("usage: <x> <y>".into());
    };
    let x = x.parse().map_err(|_| "x must be an integer")?;
    let y = y.parse().map_err(|_| "y must be an integer")?;
    Ok((x, y))
}

// ── Event display ────────────────────────────────────────────────

fn show_event(event: SessionEvent) {
    match event {
        SessionEvent::Phase(phase) => println!("* session: {phase}"),
        SessionEvent::Notice(text) => println!("* {text}"),
        SessionEvent::Signal(signal) => match signal {
            SessionSignal::AuthFailed(message) => println!("! login rejected: {message}"),
            SessionSignal::ReconnectExhausted => println!("! host unreachable, giving up"),
            SessionSignal::ShowDisconnected => println!("* disconnected"),
            SessionSignal::StartScreenRefresh
            | SessionSignal::RequestSystemInfo
            | SessionSignal::ClearScreen => {}
        },
        SessionEvent::Frame(frame) => show_frame(frame),
    }
}

fn show_frame(frame: Frame) {
    match frame.msg_type() {
        MessageType::Screenshot => {
            println!("< screenshot: {} bytes", frame.payload().len());
        }
        MessageType::Info => match SystemInfo::from_bytes(frame.payload()) {
            Ok(info) => println!(
                "< host {} ({} {}), {} cpus, up {}s",
                info.hostname, info.platform, info.os_release, info.cpu_count, info.uptime_secs,
            ),
            Err(e) => println!("< unreadable system info: {e}"),
        },
        MessageType::FileTransfer => match FileEntry::deserialize_listing(frame.payload()) {
            Ok(entries) => {
                for entry in entries {
                    let marker = if entry.is_dir { "d" } else { "-" };
                    println!("< {marker} {:>10}  {}", entry.size, entry.name);
                }
            }
            Err(_) => println!("< file data: {} bytes", frame.payload().len()),
        },
        MessageType::Success | MessageType::Error => {
            let tag = if frame.msg_type() == MessageType::Error {
                "!"
            } else {
                "<"
            };
            match frame.payload_text() {
                Ok(text) => println!("{tag} {text}"),
                Err(_) => println!("{tag} {} bytes", frame.payload().len()),
            }
        }
        other => println!("< {other}: {} bytes", frame.payload().len()),
    }
}

// ── Main ─────────────────────────────────────────────────────────

async fn repl(commands: CommandSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Some(frame)) => {
                if commands.send(frame).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(message) => {
                if !message.is_empty() {
                    println!("! {message}");
                }
            }
        }
    }
    // Dropping the sender tells the session to disconnect.
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&OperatorConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = OperatorConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let host = cli.host.unwrap_or_else(|| config.connection.host.clone());
    let port = cli.port.unwrap_or(config.connection.port);
    let info = ConnectionInfo::new(host, port);

    let password = read_password(&cli.username)?;

    info!("helm-operator v{}", env!("CARGO_PKG_VERSION"));
    info!("target: {info}");

    let (session, commands, mut events) = OperatorSession::new(
        info,
        cli.username,
        password,
        config.reconnect.max_attempts,
        config.backoff_base(),
    );

    let session_handle = tokio::spawn(session.run());
    let display_handle = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            show_event(event);
        }
    });

    repl(commands).await;

    session_handle.await?;
    display_handle.await?;
    Ok(())
}
