use anyhow::Context;
use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.status {
        return print_fleet_status();
    }

    let mut config = Config::from_env().context("failed to load configuration from environment")?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(log_level) = args.log_level {
        config.log_filter = log_level;
    }

    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    server::serve(ServeConfig {
        config,
        shutdown,
        bound_addr_sender: None,
    })
    .await
}

/// One line per instance for the fleet status surface.
fn print_fleet_status() -> anyhow::Result<()> {
    let fleet = gateway::read_fleet();

    if fleet.is_empty() {
        println!("no running gateway instances");
        return Ok(());
    }

    for entry in fleet {
        let liveness = if entry.alive { "up" } else { "stale" };
        println!(
            "{} :{} {} {} requests={} errors={}",
            liveness,
            entry.status.port,
            entry.status.provider,
            entry.status.model,
            entry.status.requests,
            entry.status.errors,
        );
    }

    Ok(())
}
