use clap::Parser;
use log::info;
use std::fs::File;
use std::path::PathBuf;
use wakegate::dispatch::{Configurable, Dispatcher, Stoppable, TriggerContext, WolConfig};
use wakegate::wol::DEFAULT_BROADCAST_ADDR;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hardware address of the machine to wake, e.g. 00:11:22:33:44:55.
    #[arg(required_unless_present = "config")]
    mac_address: Option<String>,

    /// Address to broadcast the magic packet to.
    #[arg(long, default_value = DEFAULT_BROADCAST_ADDR)]
    broadcast_addr: String,

    /// JSON file with an array of dispatcher configs; every entry is woken
    /// once.
    #[arg(long, conflicts_with = "mac_address")]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("INFO"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let configs: Vec<WolConfig> = match &args.config {
        Some(path) => serde_json::from_reader(File::open(path)?)?,
        None => vec![WolConfig {
            mac_address: args.mac_address.clone().unwrap(),
            broadcast_addr: args.broadcast_addr.clone(),
            cooldown_secs: 600,
        }],
    };

    for config in &configs {
        let mut dispatcher = Dispatcher::provision(config)?;
        info!("dispatching wake for {}", dispatcher.dispatch_key());
        dispatcher.on_trigger(&TriggerContext {
            remote_addr: "wakectl",
            host: &config.mac_address,
            request_id: "cli",
        });
        dispatcher.stop()?;
    }
    Ok(())
}
