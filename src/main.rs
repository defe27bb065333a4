//! StrataKV - A Tiered Caching Proxy for the Memcached Text Protocol
//!
//! This is the main entry point for the StrataKV server.
//! It sets up the TCP listener, the primary cache tier, and handles
//! incoming connections.

use std::sync::Arc;
use stratakv::connection::{handle_connection, ConnectionStats};
use stratakv::handlers::MemoryHandler;
use stratakv::storage::{start_expiry_sweeper, StorageEngine};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: stratakv::DEFAULT_HOST.to_string(),
            port: stratakv::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("StrataKV version {}", stratakv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
StrataKV - A Tiered Caching Proxy for the Memcached Text Protocol

USAGE:
    stratakv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 11211)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    stratakv                       # Start on 127.0.0.1:11211
    stratakv --port 11212          # Start on port 11212
    stratakv --host 0.0.0.0        # Listen on all interfaces

CONNECTING:
    Use any memcached text-protocol client, or netcat:
    $ printf 'set name 0 0 3\r\nAda\r\nget name\r\n' | nc 127.0.0.1 11211
    STORED
    VALUE name 0 3
    Ada
    END
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
StrataKV v{} - Tiered Caching Proxy (l1-only orchestration)
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        stratakv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print the banner
    print_banner(&config);

    // Create the primary-tier engine (shared across all connections)
    let engine = Arc::new(StorageEngine::new());
    info!("Primary tier initialized with 64 shards");

    // Start the background expiry sweeper
    let _sweeper = start_expiry_sweeper(Arc::clone(&engine));
    info!("Background expiry sweeper started");

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, engine, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    engine: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Each connection gets its own orchestrator over the
                // shared primary tier
                let l1 = MemoryHandler::new(Arc::clone(&engine));
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, l1, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
