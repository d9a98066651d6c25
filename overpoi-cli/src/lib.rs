//! Command-line interface for acquiring Overpass points of interest.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use overpoi_core::CategoryCatalog;

mod acquire;
mod error;
mod export;
mod fs;
mod logging;

pub use error::CliError;
pub use logging::init_logging;

use acquire::{AcquireArgs, run_acquire};

const ARG_SOUTH: &str = "south";
const ARG_WEST: &str = "west";
const ARG_NORTH: &str = "north";
const ARG_EAST: &str = "east";
const ARG_CATEGORY: &str = "category";
const ARG_ENDPOINT: &str = "endpoint";
const ARG_USER_AGENT: &str = "user-agent";
const ARG_MAX_AREA_KM2: &str = "max-area-km2";
const ARG_FALLBACK: &str = "fallback";
const ARG_GEOJSON: &str = "geojson";
const ARG_CSV: &str = "csv";
const ENV_SOUTH: &str = "OVERPOI_CMDS_ACQUIRE_SOUTH";
const ENV_WEST: &str = "OVERPOI_CMDS_ACQUIRE_WEST";
const ENV_NORTH: &str = "OVERPOI_CMDS_ACQUIRE_NORTH";
const ENV_EAST: &str = "OVERPOI_CMDS_ACQUIRE_EAST";
const ENV_CATEGORY: &str = "OVERPOI_CMDS_ACQUIRE_CATEGORY";

/// Run the overpoi CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Acquire(args) => run_acquire(args),
        Command::Categories => {
            let mut stdout = std::io::stdout().lock();
            write_categories(&mut stdout, &CategoryCatalog::standard())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "overpoi",
    about = "Acquire points of interest from the Overpass API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch categories of points of interest within a bounding box.
    Acquire(AcquireArgs),
    /// List the categories that can be acquired.
    Categories,
}

/// Print one tab-separated line per catalogue entry.
fn write_categories(writer: &mut dyn Write, catalog: &CategoryCatalog) -> Result<(), CliError> {
    for definition in catalog.iter() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            definition.id,
            definition.group,
            definition.display_color,
            definition.marker_size,
            definition.label,
            definition.upstream_filter
        )
        .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
