//! Live-network discovery tests
//!
//! These pass with or without media servers on the network; when servers
//! answer, the reported devices are validated.

use dlna_discovery::{get, get_iter_with_timeout, get_with_timeout, DeviceEvent};
use std::collections::HashSet;
use std::time::Duration;

#[test]
fn test_discovered_devices_are_complete() {
    for event in get_iter_with_timeout(Duration::from_secs(2)) {
        if let DeviceEvent::Found(device) = event {
            assert!(device.udn.starts_with("uuid:"), "UDN should start with 'uuid:'");
            assert!(!device.friendly_name.is_empty());
            assert!(device.content_directory.control_url.starts_with("http"));
            assert!(device.content_directory.service_type.contains("ContentDirectory"));
            println!("  - {} ({})", device.friendly_name, device.udn);
        }
    }
}

#[test]
fn test_each_udn_reported_once() {
    let mut udns = HashSet::new();
    for event in get_iter_with_timeout(Duration::from_secs(2)) {
        match event {
            DeviceEvent::Found(device) => {
                assert!(udns.insert(device.udn.clone()), "{} reported twice", device.udn);
            }
            DeviceEvent::Lost { udn } => panic!("one-shot discovery reported loss of {udn}"),
        }
    }
}

#[test]
fn test_convenience_functions() {
    let quick = get_with_timeout(Duration::from_secs(1));
    let default = get();
    println!("found {} / {} media server(s)", quick.len(), default.len());
}
