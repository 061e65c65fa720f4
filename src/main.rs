use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use asm6f_lsp::Server;

async fn run_server() -> Result<()> {
    info!("asm6f language server starting");
    Server::new()
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    info!("asm6f language server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Stdout carries the protocol; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = run_server().await {
        eprintln!("asm6f-lang: {:#}", e);
        std::process::exit(1);
    }
}
