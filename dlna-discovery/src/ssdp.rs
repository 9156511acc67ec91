//! SSDP (Simple Service Discovery Protocol) implementation for device discovery
//!
//! Internal SSDP plumbing: an ephemeral-port client for M-SEARCH, a multicast
//! listener for NOTIFY announcements, and message parsing. Not part of the
//! public API.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::trace;

use crate::error::{DiscoveryError, Result};

const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

/// SSDP response or alive announcement describing one advertised target
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    /// ST for search responses, NT for announcements
    pub urn: String,
    pub usn: String,
    pub server: Option<String>,
    pub max_age: Option<u64>,
}

/// Any SSDP datagram a control point cares about
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SsdpMessage {
    SearchResponse(SsdpResponse),
    Alive(SsdpResponse),
    ByeBye { usn: String, nt: String },
}

impl SsdpMessage {
    pub fn usn(&self) -> &str {
        match self {
            SsdpMessage::SearchResponse(r) | SsdpMessage::Alive(r) => &r.usn,
            SsdpMessage::ByeBye { usn, .. } => usn,
        }
    }
}

/// SSDP client for device discovery, bound to an ephemeral port
pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    /// Create a new SSDP client with the specified read timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind UDP socket: {}", e)))?;

        socket.set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;

        socket.set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

        Ok(Self { socket })
    }

    /// Multicast an M-SEARCH request for `search_target`
    pub fn send_search(&self, search_target: &str) -> Result<()> {
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: 239.255.255.250:1900\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 2\r\n\
             ST: {}\r\n\
             USER-AGENT: dlna-sdk/1.0 UPnP/1.0\r\n\
             \r\n",
            search_target
        );

        let target = SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT);
        self.socket.send_to(request.as_bytes(), target)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send M-SEARCH: {}", e)))?;

        Ok(())
    }

    /// Send an M-SEARCH request and return an iterator of responses
    pub fn search(&self, search_target: &str) -> Result<SsdpResponseIterator<'_>> {
        self.send_search(search_target)?;
        Ok(SsdpResponseIterator::new(&self.socket))
    }

    /// Wait up to the read timeout for the next parseable message
    pub fn recv(&self) -> Result<Option<SsdpMessage>> {
        recv_message(&self.socket)
    }
}

/// Listener joined to the SSDP multicast group on port 1900
pub(crate) struct NotifyListener {
    socket: UdpSocket,
}

impl NotifyListener {
    /// Bind 0.0.0.0:1900 with address reuse so other UPnP stacks on the
    /// host keep working, then join the multicast group.
    pub fn bind(timeout: Duration) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create socket: {}", e)))?;
        socket.set_reuse_address(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set SO_REUSEADDR: {}", e)))?;

        let addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT).into();
        socket.bind(&addr.into())
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind port {}: {}", SSDP_PORT, e)))?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to join multicast group: {}", e)))?;
        socket.set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;

        Ok(Self { socket })
    }

    pub fn recv(&self) -> Result<Option<SsdpMessage>> {
        recv_message(&self.socket)
    }
}

/// Read datagrams until one parses or the socket times out.
fn recv_message(socket: &UdpSocket) -> Result<Option<SsdpMessage>> {
    let mut buffer = [0u8; 4096];
    loop {
        match socket.recv_from(&mut buffer) {
            Ok((size, from)) => {
                let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                    continue;
                };
                match parse_message(text) {
                    Some(message) => return Ok(Some(message)),
                    None => trace!(%from, "ignoring SSDP datagram"),
                }
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(DiscoveryError::NetworkError(format!("Socket error: {}", e)));
            }
        }
    }
}

/// Iterator over search responses until the socket read times out
pub(crate) struct SsdpResponseIterator<'a> {
    socket: &'a UdpSocket,
    finished: bool,
}

impl<'a> SsdpResponseIterator<'a> {
    fn new(socket: &'a UdpSocket) -> Self {
        Self {
            socket,
            finished: false,
        }
    }
}

impl<'a> Iterator for SsdpResponseIterator<'a> {
    type Item = Result<SsdpResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match recv_message(self.socket) {
                Ok(Some(SsdpMessage::SearchResponse(response))) => return Some(Ok(response)),
                // Announcements can arrive on the search socket via multicast loop
                Ok(Some(_)) => continue,
                Ok(None) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Classify a datagram by its start line and parse the relevant headers.
pub(crate) fn parse_message(text: &str) -> Option<SsdpMessage> {
    let start_line = text.lines().next()?.trim().to_ascii_uppercase();

    if start_line.starts_with("HTTP/") {
        parse_ssdp_response(text).map(SsdpMessage::SearchResponse)
    } else if start_line.starts_with("NOTIFY ") {
        parse_notify(text)
    } else {
        None
    }
}

/// Parse an SSDP search response from HTTP text
fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut urn = None;
    let mut usn = None;
    let mut server = None;
    let mut max_age = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "ST:") {
            urn = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        } else if let Some(value) = extract_header_value(line, "CACHE-CONTROL:") {
            max_age = parse_max_age(&value);
        }
    }

    match (location, urn, usn) {
        (Some(location), Some(urn), Some(usn)) => Some(SsdpResponse {
            location,
            urn,
            usn,
            server,
            max_age,
        }),
        _ => None,
    }
}

/// Parse a NOTIFY announcement (ssdp:alive or ssdp:byebye)
fn parse_notify(message: &str) -> Option<SsdpMessage> {
    let mut location = None;
    let mut nt = None;
    let mut nts = None;
    let mut usn = None;
    let mut server = None;
    let mut max_age = None;

    for line in message.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "NTS:") {
            nts = Some(value.to_ascii_lowercase());
        } else if let Some(value) = extract_header_value(line, "NT:") {
            nt = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        } else if let Some(value) = extract_header_value(line, "CACHE-CONTROL:") {
            max_age = parse_max_age(&value);
        }
    }

    let (nt, usn) = (nt?, usn?);
    match nts.as_deref()? {
        "ssdp:alive" => Some(SsdpMessage::Alive(SsdpResponse {
            location: location?,
            urn: nt,
            usn,
            server,
            max_age,
        })),
        "ssdp:byebye" => Some(SsdpMessage::ByeBye { usn, nt }),
        _ => None,
    }
}

/// Extract header value from a line like "HEADER: value"
fn extract_header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len()
        && line.is_char_boundary(header.len())
        && line[..header.len()].eq_ignore_ascii_case(header)
    {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

/// Read `max-age` out of a CACHE-CONTROL value such as `max-age = 1800`
fn parse_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        let (key, seconds) = directive.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("max-age") {
            seconds.trim().parse().ok()
        } else {
            None
        }
    })
}

/// The device UDN is the USN up to the first `::`
pub(crate) fn udn_from_usn(usn: &str) -> Option<&str> {
    let udn = usn.split("::").next()?.trim();
    if udn.to_ascii_lowercase().starts_with("uuid:") {
        Some(udn)
    } else {
        None
    }
}
