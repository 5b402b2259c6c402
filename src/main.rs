use anyhow::Result;
use clap::Parser;
use parfold::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
