// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use color_eyre::Result;
use rowtrail_persistence::Persistence;
use std::path::PathBuf;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

mod render;
mod scenarios;

#[cfg(test)]
mod tests;

/// rowtrail - scripted change capture runs against a `SQLite` database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses in-memory database.
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Which scripted scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        self.verbosity.log_level_filter().as_trace()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// One row through insert, self-assign, update, and delete
    SingleRow,
    /// Batch upsert, bulk update, bulk delete, and bulk copy
    Batch,
    /// Both scenarios, single-row first
    All,
}

impl Scenario {
    fn run(self, persistence: &mut Persistence) -> Result<String> {
        match self {
            Self::SingleRow => scenarios::single_row(persistence),
            Self::Batch => scenarios::batch(persistence),
            Self::All => {
                let mut out: String = scenarios::single_row(persistence)?;
                out.push_str(&scenarios::batch(persistence)?);
                Ok(out)
            }
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.log_level().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut persistence: Persistence = if let Some(db_path) = &args.database {
        info!("Using file-based database at: {}", db_path.display());
        Persistence::new_with_file(db_path)?
    } else {
        info!("Using in-memory database");
        Persistence::new_in_memory()?
    };

    print!("{}", args.scenario.run(&mut persistence)?);
    Ok(())
}
