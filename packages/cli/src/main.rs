#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the developable-area tool.
//!
//! Reads a parcel boundary from a `GeoJSON` file, subtracts every
//! intersecting restriction overlay, and writes the resulting
//! `FeatureCollection` to stdout or a file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parcel_scope_builder::{BuilderConfig, DevelopableAreaBuilder};
use parcel_scope_geometry::{EngineConfig, RemoteDifferenceConfig};
use parcel_scope_overlay::RegistryProvider;

#[derive(Parser)]
#[command(name = "parcel_scope_cli", about = "Developable area computation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the developable area for a parcel boundary
    Compute {
        /// Path to a `GeoJSON` file with the parcel boundary (Feature or
        /// `FeatureCollection`)
        boundary: PathBuf,
        /// Write the result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Comma-separated list of source IDs to subtract (default: all
        /// registered sources)
        #[arg(long)]
        sources: Option<String>,
        /// Remote geometry-service difference endpoint; when omitted the
        /// computation runs fully locally
        #[arg(long)]
        remote_url: Option<String>,
    },
    /// List all registered restriction sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sources => {
            let sources = parcel_scope_overlay::registry::all_sources();
            println!("{:<16} NAME", "ID");
            println!("{}", "-".repeat(50));
            for source in &sources {
                println!("{:<16} {}", source.id(), source.name());
            }
        }
        Commands::Compute {
            boundary,
            output,
            sources,
            remote_url,
        } => {
            let raw = std::fs::read_to_string(&boundary)?;
            let boundary_json: serde_json::Value = serde_json::from_str(&raw)?;

            let provider = sources.map_or_else(RegistryProvider::new, |list| {
                RegistryProvider::with_sources(
                    list.split(',').map(|id| id.trim().to_string()).collect(),
                )
            });

            let config = BuilderConfig {
                engine: EngineConfig {
                    remote: remote_url.map(RemoteDifferenceConfig::new),
                    ..EngineConfig::default()
                },
                ..BuilderConfig::default()
            };

            let client = reqwest::Client::new();
            let result = DevelopableAreaBuilder::new(config)
                .build(&client, &provider, &boundary_json, None)
                .await?;

            for (source_id, count) in &result.subtracted {
                log::info!("{source_id}: {count} restriction feature(s) subtracted");
            }

            let rendered = serde_json::to_string_pretty(&result.to_feature_collection())?;
            match output {
                Some(path) => std::fs::write(&path, rendered)?,
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}
