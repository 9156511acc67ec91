//! Print media servers as JSON, or follow them live with `--watch`
//!
//! Usage: cargo run -p dlna-sdk-discovery --example discover_servers [-- --watch]

use dlna_discovery::{get_with_timeout, DeviceEvent, DiscoveryConfig, DiscoveryWorker};
use serde_json::json;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if std::env::args().any(|a| a == "--watch") {
        let _handle = DiscoveryWorker::spawn(DiscoveryConfig::default(), |event| match event {
            DeviceEvent::Found(device) => println!("+ {} {}", device.udn, device.friendly_name),
            DeviceEvent::Lost { udn } => println!("- {}", udn),
        })?;
        std::thread::park();
        return Ok(());
    }

    let servers: Vec<_> = get_with_timeout(Duration::from_secs(5))
        .into_iter()
        .map(|d| {
            json!({
                "udn": d.udn,
                "name": d.friendly_name,
                "location": d.location,
                "control_url": d.content_directory.control_url,
                "event_url": d.content_directory.event_sub_url,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&servers)?);
    Ok(())
}
