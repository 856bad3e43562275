use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_chat::cli::{write_completions, Args};
use relay_chat::client;
use relay_chat::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        write_completions(shell, &mut std::io::stdout());
        return Ok(());
    }

    // Logs go to stderr so chat lines on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relay_chat=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(args.color())
        .init();

    if !args.color() {
        colored::control::set_override(false);
    }

    let config = Config::resolve(&args)?;
    client::run(&config, args.color()).await?;

    Ok(())
}
