//! coderelay: captures code from a chat page and relays it to a local
//! file-writing endpoint.

use std::sync::Arc;

use tracing::info;

use coderelay_core::telemetry::init_tracing;
use coderelay_core::RelayConfig;
use coderelay_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let args: Vec<String> = std::env::args().collect();
    let config = RelayConfig::from_env()?;

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "receiver" => {
                let addr = args.get(2).cloned().unwrap_or(config.receiver_addr);
                coderelay_receiver::run(&addr).await?;
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("coderelay — relay code from a chat page to local files");
                println!();
                println!("Usage: coderelay [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the router host");
                println!("  receiver [addr]          Run the file-writing relay endpoint");
                println!("  help                     Show this help message");
                println!();
                println!("Environment:");
                println!("  CODERELAY_PORT           Router host port (default 8766)");
                println!("  CODERELAY_RELAY_URL      Relay endpoint (default ws://localhost:8765/)");
                println!("  CODERELAY_DATA_DIR       Settings directory (default data)");
                println!("  CODERELAY_RECEIVER_ADDR  Receiver bind address (default 127.0.0.1:8765)");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'coderelay help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    info!("Data directory: {}", config.data_dir.display());
    info!("Relay endpoint: {}", config.relay_url);

    let port = config.port;
    let state = Arc::new(AppState::start(config));
    let app = build_router(state.clone());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("coderelay listening on {}", addr);

    axum::serve(listener, app).await?;
    state.shutdown();

    Ok(())
}
