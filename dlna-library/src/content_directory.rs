//! Paginated audio search against a ContentDirectory service
//!
//! A scan issues `Search` requests for every item derived from
//! `object.item.audioItem` under the root container, page by page, and
//! collects the parsed tracks. Any failure aborts the whole scan; partial
//! results are never returned.

use std::sync::Arc;

use dlna_discovery::{Device, ServiceEndpoint};
use dlna_parser::{DidlParser, Track};
use soap_client::SoapClient;
use tracing::{debug, trace};
use xmltree::Element;

use crate::config::PAGE_SIZE;
use crate::error::ScanError;

pub const AUDIO_SEARCH_CRITERIA: &str = r#"upnp:class derivedfrom "object.item.audioItem""#;

/// One `Search` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Unescaped DIDL-Lite document
    pub result: String,
    pub number_returned: u32,
    /// Zero when the server does not know the total
    pub total_matches: u32,
}

/// The network boundary of a scan: one `Search` round trip.
///
/// Implementations block; scans run on a blocking worker.
pub trait SearchTransport: Send + Sync {
    fn search(&self, starting_index: u32, requested_count: u32) -> Result<SearchPage, ScanError>;
}

/// Creates the transport used to scan a device.
pub trait TransportFactory: Send + Sync {
    fn transport(&self, device: &Device) -> Arc<dyn SearchTransport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Device) -> Arc<dyn SearchTransport> + Send + Sync,
{
    fn transport(&self, device: &Device) -> Arc<dyn SearchTransport> {
        self(device)
    }
}

/// `Search` over SOAP.
#[derive(Debug, Clone)]
pub struct SoapSearchTransport {
    client: SoapClient,
    endpoint: ServiceEndpoint,
}

impl SoapSearchTransport {
    pub fn new(client: SoapClient, endpoint: ServiceEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl SearchTransport for SoapSearchTransport {
    fn search(&self, starting_index: u32, requested_count: u32) -> Result<SearchPage, ScanError> {
        let start = starting_index.to_string();
        let count = requested_count.to_string();

        let response = self.client.call(
            &self.endpoint.control_url,
            &self.endpoint.service_type,
            "Search",
            &[
                ("ContainerID", "0"),
                ("SearchCriteria", AUDIO_SEARCH_CRITERIA),
                ("Filter", "*"),
                ("StartingIndex", &start),
                ("RequestedCount", &count),
                ("SortCriteria", ""),
            ],
        )?;

        search_page(&response)
    }
}

fn search_page(response: &Element) -> Result<SearchPage, ScanError> {
    let result = response
        .get_child("Result")
        .ok_or_else(|| ScanError::Protocol("SearchResponse has no Result".to_string()))?
        .get_text()
        .map(|text| text.into_owned())
        .unwrap_or_default();

    Ok(SearchPage {
        result,
        number_returned: number(response, "NumberReturned")?,
        total_matches: number(response, "TotalMatches")?,
    })
}

fn number(response: &Element, name: &str) -> Result<u32, ScanError> {
    let text = response
        .get_child(name)
        .and_then(|child| child.get_text())
        .ok_or_else(|| ScanError::Protocol(format!("SearchResponse has no {name}")))?;

    text.trim()
        .parse()
        .map_err(|_| ScanError::Protocol(format!("{name} is not a number: {text:?}")))
}

/// Builds SOAP transports for discovered devices.
#[derive(Debug, Clone, Default)]
pub struct SoapTransportFactory {
    client: SoapClient,
}

impl SoapTransportFactory {
    pub fn new(client: SoapClient) -> Self {
        Self { client }
    }
}

impl TransportFactory for SoapTransportFactory {
    fn transport(&self, device: &Device) -> Arc<dyn SearchTransport> {
        Arc::new(SoapSearchTransport::new(
            self.client.clone(),
            device.content_directory.clone(),
        ))
    }
}

/// Scans the audio items of one ContentDirectory.
#[derive(Clone)]
pub struct ContentDirectoryClient {
    transport: Arc<dyn SearchTransport>,
    page_size: u32,
}

impl ContentDirectoryClient {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        Self::with_page_size(transport, PAGE_SIZE)
    }

    /// `page_size` is clamped to `1..=64`.
    pub fn with_page_size(transport: Arc<dyn SearchTransport>, page_size: u32) -> Self {
        Self {
            transport,
            page_size: page_size.clamp(1, PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch every audio item on the server.
    ///
    /// Paging follows `NumberReturned` and `TotalMatches`: an empty page
    /// ends the scan, and a total of zero with a non-empty page means the
    /// server does not know the total, so full pages are requested until one
    /// comes back empty.
    pub fn browse_audio_items(&self) -> Result<Vec<Track>, ScanError> {
        let mut tracks = Vec::new();
        let mut start: u32 = 0;
        let mut count = self.page_size;

        loop {
            trace!(start, count, "requesting search page");
            let page = self.transport.search(start, count)?;

            for track in DidlParser::new(&page.result).tracks() {
                let track = track.map_err(|e| ScanError::Protocol(e.to_string()))?;
                tracks.push(track);
            }

            if page.number_returned == 0 {
                break;
            }

            start = start.saturating_add(page.number_returned);
            let remaining = i64::from(page.total_matches) - i64::from(start);

            if remaining > 0 {
                count = remaining.min(i64::from(self.page_size)) as u32;
            } else if page.total_matches == 0 {
                count = self.page_size;
            } else {
                break;
            }
        }

        debug!(tracks = tracks.len(), returned = start, "search complete");
        Ok(tracks)
    }
}

impl std::fmt::Debug for ContentDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDirectoryClient")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
