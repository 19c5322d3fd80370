use anyhow::Result;
use tracing::info;

use matto_uci::UciEngine;

fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the UCI protocol
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    println!("Matto {} by Nicolas Lazaro", env!("CARGO_PKG_VERSION"));
    info!("matto starting");

    UciEngine::new().run()?;
    Ok(())
}
