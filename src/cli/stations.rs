//! CLI command for listing discovered stations and modules.

use crate::api::protocol::{Station, StationModule};
use crate::cli::sync::build_client;
use crate::cli::{Cli, CliError};
use crate::shutdown::SharedShutdown;
use crate::sync::config::{DEFAULT_BURST, DEFAULT_REQUESTS_PER_HOUR};
use crate::DataType;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

/// Stations subcommand
#[derive(Debug, Args)]
pub struct StationsCommand {
    /// Output format
    #[arg(long, default_value = "human")]
    format: OutputFormat,
}

/// Output format for the stations command
#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl StationsCommand {
    /// Execute the stations command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<()> {
        let client = build_client(cli, shutdown, DEFAULT_REQUESTS_PER_HOUR, DEFAULT_BURST)?;
        let stations = client.get_stations().await.map_err(CliError::Api)?;

        match self.format {
            OutputFormat::Json => {
                let listing: Vec<_> = stations.iter().map(station_json).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&listing)
                        .context("failed to serialize station listing")?
                );
            }
            OutputFormat::Human => {
                println!("Found {} stations:\n", stations.len());
                for station in &stations {
                    print_station(station);
                }
            }
        }
        Ok(())
    }
}

fn data_type_list(data_types: &[DataType]) -> String {
    data_types
        .iter()
        .map(|dt| format!("{} ({})", dt, dt.unit()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_station(station: &Station) {
    println!(
        "{} {} ({}, fw {}{})",
        station.id,
        station.name,
        station.station_type,
        station.firmware,
        if station.reachable { "" } else { ", unreachable" },
    );
    println!("  home: {} ({})", station.home_name, station.home_id);
    println!("  data: {}", data_type_list(&station.known_data_types()));
    for module in &station.modules {
        print_module(module);
    }
    println!();
}

fn print_module(module: &StationModule) {
    let battery = module
        .battery_percent
        .map(|p| format!(", battery {p}%"))
        .unwrap_or_default();
    println!(
        "  {} {} ({}, fw {}{}{})",
        module.id,
        module.name,
        module.module_type,
        module.firmware,
        battery,
        if module.reachable { "" } else { ", unreachable" },
    );
    println!("    data: {}", data_type_list(&module.known_data_types()));
}

fn station_json(station: &Station) -> serde_json::Value {
    json!({
        "id": station.id.as_str(),
        "type": station.station_type,
        "name": station.name,
        "firmware": station.firmware,
        "reachable": station.reachable,
        "home_id": station.home_id,
        "home_name": station.home_name,
        "data_types": station.data_types,
        "modules": station.modules.iter().map(|module| json!({
            "id": module.id.as_str(),
            "type": module.module_type,
            "name": module.name,
            "firmware": module.firmware,
            "reachable": module.reachable,
            "battery_percent": module.battery_percent,
            "data_types": module.data_types,
        })).collect::<Vec<_>>(),
    })
}
