//! Per-device track catalog

use std::collections::HashSet;
use std::sync::Arc;

use dlna_parser::Track;

use crate::content_directory::ContentDirectoryClient;
use crate::debouncer::ChangeDebouncer;

/// Visible tracks of one connected device plus its scan bookkeeping.
///
/// The track set is only ever swapped as a whole, so readers holding the
/// previous `Arc` keep a consistent snapshot.
#[derive(Debug)]
pub(crate) struct Catalog {
    session: u64,
    tracks: Arc<[Track]>,
    scanning: bool,
    pub(crate) debouncer: ChangeDebouncer,
    client: ContentDirectoryClient,
}

impl Catalog {
    pub(crate) fn new(session: u64, client: ContentDirectoryClient, debouncer: ChangeDebouncer) -> Self {
        Self {
            session,
            tracks: Arc::from(Vec::new()),
            scanning: false,
            debouncer,
            client,
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    pub(crate) fn tracks(&self) -> Arc<[Track]> {
        Arc::clone(&self.tracks)
    }

    pub(crate) fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub(crate) fn client(&self) -> &ContentDirectoryClient {
        &self.client
    }

    /// Mark a scan as started. Returns `false` if one is already running.
    pub(crate) fn begin_scan(&mut self) -> bool {
        if self.scanning {
            return false;
        }
        self.scanning = true;
        true
    }

    pub(crate) fn finish_scan(&mut self) {
        self.scanning = false;
    }

    /// Replace the visible set, keeping the first track seen for each URI.
    pub(crate) fn replace(&mut self, tracks: Vec<Track>) -> Arc<[Track]> {
        let mut seen = HashSet::with_capacity(tracks.len());
        let unique: Vec<Track> = tracks
            .into_iter()
            .filter(|track| seen.insert(track.uri.clone()))
            .collect();

        self.tracks = Arc::from(unique);
        self.tracks()
    }
}
