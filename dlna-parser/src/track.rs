//! Normalized track record built from a DIDL-Lite audio item.

use std::time::Duration;

use crate::common::DidlItem;
use crate::error::ItemError;

/// One playable audio track.
///
/// Identity for catalog replacement is the URI. Every other field is
/// optional; a missing or malformed value never invalidates the track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub uri: String,
    pub title: Option<String>,
    /// First `upnp:artist`, falling back to `dc:creator`
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Positive `upnp:originalTrackNumber`
    pub track_number: Option<u32>,
    /// First `-`-separated token of `dc:date`
    pub year: Option<String>,
    /// Zero when the server gave no usable duration
    pub length: Duration,
    pub genre: Option<String>,
    pub album_art_uri: Option<String>,
}

impl Track {
    /// Build a track from a decoded item.
    ///
    /// Fails only when the item has no resource with a non-empty URI.
    pub fn from_item(item: &DidlItem) -> Result<Self, ItemError> {
        let resource = item.resources.first();
        let uri = resource
            .and_then(|r| non_empty(r.uri.as_deref()))
            .ok_or_else(|| ItemError::MissingResource {
                id: item.id.clone(),
            })?;

        let artist = item
            .artists
            .first()
            .and_then(|a| non_empty(Some(&a.name)))
            .or_else(|| non_empty(item.creator.as_deref()));

        Ok(Track {
            uri,
            title: non_empty(item.title.as_deref()),
            artist,
            album: non_empty(item.album.as_deref()),
            track_number: item
                .original_track_number
                .as_deref()
                .and_then(|n| n.trim().parse::<u32>().ok())
                .filter(|n| *n > 0),
            year: item
                .date
                .as_deref()
                .and_then(|d| non_empty(d.split('-').next())),
            length: resource
                .and_then(|r| r.duration.as_deref())
                .and_then(parse_duration)
                .unwrap_or(Duration::ZERO),
            genre: item.genres.first().and_then(|g| non_empty(Some(&g.value))),
            album_art_uri: item
                .album_art_uris
                .first()
                .and_then(|a| non_empty(Some(&a.value))),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a UPnP duration: `H+:MM:SS` with an optional `.F+` decimal
/// fraction or `.F0/F1` rational fraction.
///
/// ```
/// use std::time::Duration;
/// use dlna_parser::parse_duration;
///
/// assert_eq!(parse_duration("0:03:58"), Some(Duration::from_secs(238)));
/// assert_eq!(parse_duration("1:00:00.5"), Some(Duration::from_millis(3_600_500)));
/// assert_eq!(parse_duration("0:00:01.1/4"), Some(Duration::from_millis(1_250)));
/// assert_eq!(parse_duration("garbage"), None);
/// ```
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (clock, fraction) = match value.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (value, None),
    };

    let mut parts = clock.split(':');
    let hours = parse_digits(parts.next()?)?;
    let minutes = parse_digits(parts.next()?)?;
    let seconds = parse_digits(parts.next()?)?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }

    let secs = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)?;
    let whole = Duration::from_secs(secs);
    let fraction = match fraction {
        None => Duration::ZERO,
        Some(f) => match f.split_once('/') {
            Some((num, den)) => {
                let (num, den) = (parse_digits(num)?, parse_digits(den)?);
                if den == 0 || num >= den {
                    return None;
                }
                Duration::from_secs_f64(num as f64 / den as f64)
            }
            None => {
                parse_digits(f)?;
                Duration::from_secs_f64(format!("0.{f}").parse::<f64>().ok()?)
            }
        },
    };

    whole.checked_add(fraction)
}

fn parse_digits(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
