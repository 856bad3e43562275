use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "relay-chat")]
#[command(version)]
#[command(about = "Terminal chat client over a reconnecting WebSocket")]
pub struct Args {
    /// WebSocket endpoint (ws:// or wss://)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Authorization token sent with every message
    #[arg(long, env = "RELAY_CHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Post under this name instead of a random one
    #[arg(long)]
    pub username: Option<String>,

    /// Prefix for generated usernames (default "client-")
    #[arg(long)]
    pub username_prefix: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Stop after this many consecutive failed reconnects
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Print shell completions and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    /// Whether chat lines and log lines may carry ANSI colors.
    pub fn color(&self) -> bool {
        !self.no_color
    }
}

/// Write completions for `shell` to `out`.
pub fn write_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}
