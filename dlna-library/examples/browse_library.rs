//! Discover media servers, connect to each and print their audio catalogs.
//!
//! Run with `DLNA_LOG_MODE=development cargo run --example browse_library`.
//! Keeps running and reprints a catalog whenever the server reports changes;
//! stops after a minute without events.

use std::time::Duration;

use dlna_library::logging::init_logging_from_env;
use dlna_library::{LibraryConfig, LibraryEvent, MediaLibrary};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let library = MediaLibrary::with_config(LibraryConfig::default())?;
    let events = library.iter();
    library.start()?;
    println!("Searching for media servers...");

    for event in events.timeout_iter(Duration::from_secs(60)) {
        match event {
            LibraryEvent::DeviceAvailable(device) => {
                println!(
                    "+ {} ({}) {}",
                    device.friendly_name,
                    device.model_name.as_deref().unwrap_or("unknown model"),
                    device.udn
                );
                library.connect(&device.udn)?;
            }
            LibraryEvent::DeviceUnavailable { udn } => println!("- {udn}"),
            LibraryEvent::CatalogChanged { udn, tracks } => {
                let name = library
                    .device(&udn)
                    .map(|d| d.friendly_name)
                    .unwrap_or_else(|| udn.clone());
                println!("{name}: {} tracks", tracks.len());

                for track in tracks.iter().take(10) {
                    let minutes = track.length.as_secs() / 60;
                    let seconds = track.length.as_secs() % 60;
                    println!(
                        "  {} - {} [{}:{:02}]",
                        track.artist.as_deref().unwrap_or("Unknown artist"),
                        track.title.as_deref().unwrap_or(&track.uri),
                        minutes,
                        seconds
                    );
                }
                if tracks.len() > 10 {
                    println!("  ... and {} more", tracks.len() - 10);
                }
            }
            LibraryEvent::ScanFailed { udn, error } => {
                eprintln!("scan of {udn} failed: {error}");
            }
        }
    }

    library.shutdown();
    Ok(())
}
