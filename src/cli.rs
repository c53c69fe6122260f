use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::models::{history_rows, Device, DeviceStanding, NewDevice};
use crate::snapshot::{MutationOutcome, SecurityStatus};
use crate::Monitor;

#[derive(Parser, Debug)]
#[command(name = "trust-monitor", version, about = "Device-trust network monitor")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, global = true, help = "JSON settings file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the device roster.
    Devices,
    /// Show one device with its standing.
    Device { id: String },
    /// Show devices whose trust fell below the alert threshold.
    Alerts,
    /// Show the current coordinator.
    Coordinator,
    /// Fetch trust histories and print chart series in selection order.
    History {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, help = "Also print each device's history table")]
        table: bool,
    },
    /// Show the activity log in backend order.
    Logs {
        #[arg(long, help = "Only malicious activity")]
        malicious: bool,
    },
    /// Register a new device.
    AddDevice {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        device_type: String,
        #[arg(long)]
        ownership_type: String,
        #[arg(long)]
        memory_gb: f64,
        #[arg(long)]
        location: String,
    },
    /// Ask a device to leave the network.
    Leave { id: String },
}

/// One device plus the standing and actions derived from it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceView<'a> {
    #[serde(flatten)]
    device: &'a Device,
    standing: DeviceStanding,
    can_leave: bool,
}

impl<'a> From<&'a Device> for DeviceView<'a> {
    fn from(device: &'a Device) -> Self {
        Self {
            device,
            standing: device.standing(),
            can_leave: device.can_leave(),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_mutation(json: bool, outcome: MutationOutcome) -> Result<()> {
    if json {
        print_json(&outcome)?;
    }
    match outcome {
        MutationOutcome::Succeeded => {
            if !json {
                println!("ok");
            }
            Ok(())
        }
        MutationOutcome::Failed { reason } => bail!(reason),
    }
}

pub async fn execute(cli: &Cli, monitor: &Monitor) -> Result<()> {
    match &cli.command {
        Commands::Devices => {
            let snapshot = monitor.devices().refresh().await?;
            if cli.json {
                return print_json(snapshot.devices());
            }
            for device in snapshot.devices() {
                println!(
                    "{:<16} {:<20} {:<10} trust={:.3} {:?}{}{}",
                    device.id,
                    device.name,
                    device.device_type,
                    device.trust_score,
                    device.standing(),
                    if device.is_coordinator { " coordinator" } else { "" },
                    if device.is_active { "" } else { " left" },
                );
            }
        }
        Commands::Device { id } => {
            let device = monitor.devices().lookup_device(id).await?;
            let view = DeviceView::from(&device);
            if cli.json {
                return print_json(&view);
            }
            println!(
                "{} ({}) trust={:.3} {:?}{}",
                view.device.name,
                view.device.id,
                view.device.trust_score,
                view.standing,
                if view.can_leave { "" } else { " (cannot leave)" },
            );
        }
        Commands::Alerts => {
            let status = monitor.devices().refresh().await?.security_status();
            if cli.json {
                return print_json(&status);
            }
            match status {
                SecurityStatus::Safe => println!("Safe: no malicious activity detected."),
                SecurityStatus::Alert(devices) => {
                    for device in devices {
                        println!("{} ({:.2})", device.id, device.trust_score);
                    }
                }
            }
        }
        Commands::Coordinator => {
            let coordinator = monitor.devices().refresh_coordinator().await?;
            if cli.json {
                return print_json(&coordinator);
            }
            println!("{} ({})", coordinator.name, coordinator.id);
        }
        Commands::History { ids, table } => {
            let update = monitor.selection().set_selection(ids.iter().cloned());
            for (device_id, result) in update.settle().await {
                if let Err(err) = result {
                    log::warn!("no history for {device_id}: {err:#}");
                }
            }

            let chart = monitor.chart();
            if cli.json {
                return print_json(&chart);
            }
            for series in &chart.series {
                println!("{} [{}] {:?}", series.name, series.color, series.points);
                if *table {
                    for row in history_rows(&monitor.history().get(&series.name)) {
                        println!(
                            "  {} direct={} indirect={} centrality={} trust={} {}",
                            row.time, row.direct, row.indirect, row.centrality, row.trust, row.notes
                        );
                    }
                }
            }
        }
        Commands::Logs { malicious } => {
            let entries = monitor.activity().refresh().await?;
            let entries: Vec<_> = entries
                .iter()
                .filter(|entry| !*malicious || entry.is_malicious())
                .collect();
            if cli.json {
                return print_json(&entries);
            }
            for entry in entries {
                println!(
                    "{} {:<12} {:<10} {} [{}]",
                    entry.timestamp.to_rfc3339(),
                    entry.device_id,
                    String::from(entry.activity_type.clone()),
                    entry.description,
                    entry.connection_status.as_deref().unwrap_or("-"),
                );
            }
        }
        Commands::AddDevice {
            id,
            name,
            device_type,
            ownership_type,
            memory_gb,
            location,
        } => {
            let device = NewDevice {
                id: id.clone(),
                name: name.clone(),
                device_type: device_type.clone(),
                ownership_type: ownership_type.clone(),
                memory_gb: *memory_gb,
                location: location.clone(),
            };
            let outcome = monitor.devices().create_device(&device).await;
            report_mutation(cli.json, outcome)?;
        }
        Commands::Leave { id } => {
            let outcome = monitor.devices().leave_device(id).await;
            report_mutation(cli.json, outcome)?;
        }
    }

    Ok(())
}
