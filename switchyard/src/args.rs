use clap::Parser;

/// A local gateway translating one chat-completion dialect onto many
/// upstream model providers.
#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about)]
pub(crate) struct Args {
    /// Port to listen on. Overrides the PORT environment variable.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log filter, e.g. `info` or `gateway=debug`. Overrides LOG_LEVEL.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the status of every running gateway instance and exit.
    #[arg(long)]
    pub status: bool,
}
