//! Entry point for `ipk25-chat`.
//!
//! Parses CLI arguments, resolves the server and runs one session.  All
//! protocol work is delegated to library modules; `main.rs` owns only process
//! setup (logging, signal handling, argument parsing, exit codes).

use std::time::Duration;

use clap::Parser;

use ipk25_chat::config::{resolve_server, ClientConfig, Transport, DEFAULT_PORT};
use ipk25_chat::console::Console;
use ipk25_chat::input::spawn_stdin_reader;
use ipk25_chat::timer::{TimerConfig, DEFAULT_MAX_RETRIES};

/// Client for the IPK25-CHAT protocol.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Transport protocol.
    #[arg(short = 't', value_enum)]
    transport: Transport,

    /// Server IP address or hostname.
    #[arg(short = 's')]
    server: String,

    /// Server port.
    #[arg(short = 'p', default_value_t = DEFAULT_PORT)]
    port: u16,

    /// UDP confirmation timeout in milliseconds.
    #[arg(short = 'd', default_value_t = 250)]
    timeout_ms: u64,

    /// Maximum number of UDP retransmissions.
    #[arg(short = 'r', default_value_t = DEFAULT_MAX_RETRIES)]
    retries: u8,
}

#[tokio::main]
async fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let console = Console::Stdout;

    let server = match resolve_server(&cli.server, cli.port).await {
        Ok(server) => server,
        Err(e) => {
            console.error(&e);
            std::process::exit(e.exit_code());
        }
    };
    let timers = TimerConfig {
        confirm_timeout: Duration::from_millis(cli.timeout_ms),
        max_retries: cli.retries,
        ..TimerConfig::default()
    };
    let config = ClientConfig::new(cli.transport, server).with_timers(timers);
    log::info!("connecting to {server} over {}", config.transport);

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let code = match ipk25_chat::run(&config, console.clone(), spawn_stdin_reader(), interrupt).await
    {
        Ok(()) => 0,
        Err(e) => {
            if !e.already_reported() {
                console.error(&e);
            }
            e.exit_code()
        }
    };

    // The stdin reader may still be blocked in a read; don't wait for it.
    std::process::exit(code);
}
