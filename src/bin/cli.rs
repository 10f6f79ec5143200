//! ts3query CLI
//!
//! Interactive shell for a query connection: forwards typed lines as raw
//! commands and prints responses and incoming notifications.

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use ts3query::{
    BlockingDispatcher, CloseReason, Config, Dispatch, DispatchEvents, QueryFlavor, Response,
};

/// ts3query interactive client
#[derive(Parser, Debug)]
#[command(name = "ts3query-cli")]
#[command(about = "Interactive TeamSpeak 3 query client")]
#[command(version)]
struct Args {
    /// Host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port (defaults to the flavor's well-known port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect to a client instead of a server
    #[arg(long)]
    client_query: bool,

    /// Login name (ServerQuery); prompts a `login` before the shell starts
    #[arg(short, long)]
    username: Option<String>,

    /// Login password, used together with --username
    #[arg(long)]
    password: Option<String>,

    /// Virtual server id to `use` after login
    #[arg(short, long)]
    sid: Option<u32>,
}

/// Prints dispatcher signals to the terminal
struct ConsoleEvents;

impl DispatchEvents for ConsoleEvents {
    fn banned(&self, response: &Response) {
        eprintln!(
            "! banned: {} {}",
            response.error_message(),
            response.ban_extra_message().unwrap_or("")
        );
    }

    fn connection_closed(&self, reason: CloseReason) {
        eprintln!("! connection closed ({:?})", reason);
    }

    fn socket_error(&self, error: &std::io::Error) {
        eprintln!("! socket error: {}", error);
    }

    fn notification(&self, raw: &str) {
        println!("<notification> {}", raw);
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ts3query=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    let flavor = if args.client_query {
        QueryFlavor::ClientQuery
    } else {
        QueryFlavor::ServerQuery
    };
    let mut builder = Config::builder().host(&args.host).flavor(flavor);
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    let config = builder.build();

    tracing::info!("ts3query v{}", ts3query::VERSION);
    tracing::info!("Connecting to {} ({:?})", config.addr(), config.flavor);

    let dispatcher = match BlockingDispatcher::connect(&config, Arc::new(ConsoleEvents)) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = login(&dispatcher, &args) {
        tracing::error!("Login failed: {}", e);
        std::process::exit(1);
    }

    println!("Connected. Type commands, or \"quit\" to leave.");
    shell(&dispatcher);

    dispatcher.dispose();
}

/// Optional `login` / `use` round trips before the shell starts
fn login(dispatcher: &BlockingDispatcher, args: &Args) -> ts3query::Result<()> {
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        let command = ts3query::Command::new("login")?
            .arg("client_login_name", username)?
            .arg("client_login_password", password)?;
        print_response(&dispatcher.dispatch(&command)?)?;
    }

    if let Some(sid) = args.sid {
        let command = ts3query::Command::new("use")?.arg("sid", sid)?;
        print_response(&dispatcher.dispatch(&command)?)?;
    }

    Ok(())
}

/// Read stdin lines and dispatch each as raw command text
fn shell(dispatcher: &BlockingDispatcher) {
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("! stdin error: {}", e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match dispatcher.dispatch_raw(line) {
            Ok(raw) => {
                if print_response(&raw).is_err() {
                    println!("{}", raw);
                }
            }
            Err(e) => {
                eprintln!("! {}", e);
                if dispatcher.is_disposed() {
                    break;
                }
            }
        }
    }
}

/// Pretty-print a raw response: body rows, then the status
fn print_response(raw: &str) -> ts3query::Result<()> {
    let response = Response::parse(raw)?;

    for group in &response.groups() {
        let rendered: Vec<String> = group
            .parameters()
            .iter()
            .map(|p| match p.value() {
                Some(value) => format!("{}={}", p.name(), value),
                None => p.name().to_string(),
            })
            .collect();
        println!("  {}", rendered.join(" "));
    }

    if response.is_erroneous() {
        println!(
            "error {} ({})",
            response.error_id(),
            response.error_message()
        );
    } else {
        println!("ok");
    }

    Ok(())
}
