#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a gridwalk scenario headless.

mod scenario;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

/// Plays a TOML scenario and prints the final agent states and state digest.
#[derive(Debug, Parser)]
#[command(name = "gridwalk", version, about, long_about = None)]
struct Cli {
    /// Scenario file to play.
    scenario: PathBuf,
    /// Logs at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
    /// Prints every event produced during the run.
    #[arg(long)]
    events: bool,
}

/// Entry point for the gridwalk command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let text = fs::read_to_string(&cli.scenario)
        .with_context(|| format!("failed to read scenario {}", cli.scenario.display()))?;
    let scenario = Scenario::from_toml(&text)
        .with_context(|| format!("invalid scenario {}", cli.scenario.display()))?;
    info!(
        agents = scenario.agents.len(),
        orders = scenario.orders.len(),
        ticks = scenario.ticks,
        "scenario loaded"
    );

    let report = scenario.run()?;

    if cli.events {
        for event in &report.events {
            println!("{event:?}");
        }
    }
    println!("tick {}", report.ticks);
    for agent in &report.agents {
        let origin = agent.area.origin();
        println!(
            "agent {} client {} size {} at ({}, {}) cell ({}, {}) {:?} speed {} {}",
            agent.id.get(),
            agent.client.get(),
            agent.size,
            agent.position.x,
            agent.position.y,
            origin.column(),
            origin.row(),
            agent.state,
            agent.speed_level,
            match agent.target {
                Some(target) => format!("moving to ({}, {})", target.column(), target.row()),
                None => "at rest".to_owned(),
            },
        );
    }
    println!("digest {}", report.digest_hex());
    Ok(())
}
