// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use zlrouter::config::RawConfig;
use zlrouter::jackio;
use zlrouter::telemetry::{self, Counters};
use zlrouter::Engine;

const CONFIG_TEMPLATE: &str = r#"# zlrouter configuration template.
jack_client_name: ZLRouter

# Ticks per beat; must be a power of two.
multiplier: 128
bpm: 120.0

# Directory patterns are persisted to/loaded from (spec section 6).
pattern_directory: /var/lib/zlrouter/patterns

devices:
  - hardware_id: "ttymidi:MIDI_in"
    name: "Hardware Keyboard"
    input_enabled: true
    output_enabled: true
    accepted_channels: []
    channel_track_map: []

tracks:
  - destination: zynthian
    external_channel: -1

filters: {}
input_filter_assignments: {}
output_filter_assignments: {}
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = "0.1.0",
    about = "Real-time MIDI routing, sequencing, and sampler-trigger engine for a JACK-based instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerates JACK MIDI hardware ports.
    Devices {},
    /// Parses and validates a router/pattern config without starting the JACK client.
    CheckConfig {
        /// The path to the YAML config file.
        path: String,
    },
    /// Registers the JACK client, builds the engine, and runs until JACK closes it.
    Run {
        /// The path to the YAML config file.
        config_path: String,
    },
    /// Prints a commented YAML skeleton of the config format to stdout.
    ExportConfigTemplate {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let (client, _status) = jack::Client::new("zlrouter-probe", jack::ClientOptions::NO_START_SERVER)?;
            let ports = client.ports(None, Some("midi"), jack::PortFlags::empty());
            if ports.is_empty() {
                println!("No MIDI ports found.");
                return Ok(());
            }
            println!("Ports:");
            for port in ports {
                println!("- {port}");
            }
        }
        Commands::CheckConfig { path } => {
            let raw = RawConfig::load(&PathBuf::from(&path))?;
            let resolved = raw.into_engine_config()?;
            println!(
                "OK: {} device(s), {} track(s), multiplier={}, bpm={}",
                resolved.device_configs.len(),
                resolved.track_configs.len(),
                resolved.multiplier,
                resolved.bpm
            );
        }
        Commands::Run { config_path } => {
            let raw = RawConfig::load(&PathBuf::from(&config_path))?;
            let resolved = raw.into_engine_config()?;
            let jack_client_name = resolved.jack_client_name.clone();

            let counters = Arc::new(Counters::new());
            telemetry::spawn_reporter(counters.clone(), Duration::from_secs(30));

            let device_names: Vec<String> = resolved
                .device_configs
                .iter()
                .map(|d| d.hardware_id.clone())
                .collect();

            let (engine, _clip_commands, _timer_commands) = Engine::new(&resolved, counters);
            let engine = Arc::new(parking_lot::Mutex::new(engine));

            let (client, status) = jack::Client::new(&jack_client_name, jack::ClientOptions::NO_START_SERVER)?;
            info!(?status, "registered JACK client");
            let ports = jackio::register_ports(&client, &device_names)?;
            let process = jack::ClosureProcessHandler::new(jackio::process_closure(engine, ports));
            let notifications = jackio::HotplugNotifications::new(|| {
                info!("hardware hot-plug detected, reconcile not yet wired to a running client");
            });
            let _active_client = client.activate_async(notifications, process)?;

            info!("zlrouter running, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
        }
        Commands::ExportConfigTemplate {} => {
            println!("{CONFIG_TEMPLATE}");
        }
    }

    Ok(())
}
