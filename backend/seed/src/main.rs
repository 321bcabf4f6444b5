use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of a running server, e.g. http://localhost:5001
    server: String,

    /// Fixture file with users and their listings
    fixture: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    seed::seed(&args.server, &args.fixture).await
}
