//! Torznab feed and capability parsing shared by the Jackett adapter.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{Candidate, IndexerError, Protocol};

const TORRENT_ENCLOSURE_TYPE: &str = "application/x-bittorrent";

/// Negotiated capabilities of a single Torznab indexer.
#[derive(Debug, Clone, Default)]
pub struct TorznabCaps {
    pub tv_search: SearchCaps,
    pub movie_search: SearchCaps,
}

/// Availability and supported parameters of one search mode.
#[derive(Debug, Clone, Default)]
pub struct SearchCaps {
    pub available: bool,
    pub supported_params: Vec<String>,
}

impl SearchCaps {
    pub fn supports(&self, param: &str) -> bool {
        self.supported_params.iter().any(|p| p == param)
    }
}

#[derive(Debug, Deserialize)]
struct CapsXml {
    searching: Option<SearchingXml>,
}

#[derive(Debug, Deserialize)]
struct SearchingXml {
    #[serde(rename = "tv-search")]
    tv_search: Option<SearchModeXml>,
    #[serde(rename = "movie-search")]
    movie_search: Option<SearchModeXml>,
}

#[derive(Debug, Deserialize)]
struct SearchModeXml {
    #[serde(rename = "@available")]
    available: Option<String>,
    #[serde(rename = "@supportedParams")]
    supported_params: Option<String>,
}

impl SearchModeXml {
    fn into_caps(self) -> SearchCaps {
        SearchCaps {
            available: self.available.as_deref() == Some("yes"),
            supported_params: self
                .supported_params
                .unwrap_or_default()
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

/// Parse a `t=caps` response.
pub fn parse_caps(xml: &str) -> Result<TorznabCaps, IndexerError> {
    let caps: CapsXml = quick_xml::de::from_str(xml)
        .map_err(|e| IndexerError::Capabilities(format!("Invalid caps XML: {e}")))?;

    let searching = caps.searching.unwrap_or(SearchingXml {
        tv_search: None,
        movie_search: None,
    });

    Ok(TorznabCaps {
        tv_search: searching
            .tv_search
            .map(SearchModeXml::into_caps)
            .unwrap_or_default(),
        movie_search: searching
            .movie_search
            .map(SearchModeXml::into_caps)
            .unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct FeedXml {
    channel: Option<ChannelXml>,
}

#[derive(Debug, Deserialize)]
struct ChannelXml {
    #[serde(default, rename = "item")]
    items: Vec<ItemXml>,
}

#[derive(Debug, Deserialize)]
struct ItemXml {
    title: Option<String>,
    size: Option<u64>,
    enclosure: Option<EnclosureXml>,
    #[serde(default, rename = "torznab:attr", alias = "attr")]
    attrs: Vec<AttrXml>,
}

#[derive(Debug, Deserialize)]
struct EnclosureXml {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    content_type: Option<String>,
    #[serde(rename = "@length")]
    length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AttrXml {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@value")]
    value: Option<String>,
}

impl ItemXml {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .and_then(|a| a.value.as_deref())
    }
}

/// Parse a Torznab search feed into candidates.
///
/// Items missing a title or enclosure URL are skipped with a debug log;
/// a malformed item never fails the whole feed.
pub fn parse_feed(xml: &str, indexer: &str) -> Result<Vec<Candidate>, IndexerError> {
    parse_feed_at(xml, indexer, Utc::now())
}

fn parse_feed_at(xml: &str, indexer: &str, now: DateTime<Utc>) -> Result<Vec<Candidate>, IndexerError> {
    let feed: FeedXml = quick_xml::de::from_str(xml)
        .map_err(|e| IndexerError::Parse(format!("Invalid feed XML: {e}")))?;

    let items = feed.channel.map(|c| c.items).unwrap_or_default();

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match item_to_candidate(item, indexer, now) {
            Some(candidate) => candidates.push(candidate),
            None => debug!(indexer, "Skipping malformed feed item"),
        }
    }

    Ok(candidates)
}

fn item_to_candidate(item: ItemXml, indexer: &str, now: DateTime<Utc>) -> Option<Candidate> {
    let title = item.title.clone().filter(|t| !t.is_empty())?;
    let enclosure = item.enclosure.as_ref()?;
    let download_url = enclosure.url.clone().filter(|u| !u.is_empty())?;

    // Anything that is not explicitly a torrent enclosure is an NZB.
    let protocol = if enclosure.content_type.as_deref() == Some(TORRENT_ENCLOSURE_TYPE) {
        Protocol::Torrent
    } else {
        Protocol::Usenet
    };

    let size_bytes = item
        .size
        .or(enclosure.length)
        .or_else(|| item.attr("size").and_then(|v| v.parse().ok()))
        .unwrap_or(0);

    let (seeders, age_secs) = match protocol {
        Protocol::Torrent => {
            let seeders = item
                .attr("seeders")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            (seeders, 0)
        }
        Protocol::Usenet => (0, usenet_age_secs(item.attr("usenetdate"), now)),
    };

    Some(Candidate {
        title,
        download_url,
        protocol,
        size_bytes,
        seeders,
        age_secs,
        flags: flags_from_attrs(&item),
        indexer: indexer.to_string(),
        score: 0,
    })
}

/// Seconds elapsed since an RFC 2822 `usenetdate` attribute, clamped at 0.
fn usenet_age_secs(usenetdate: Option<&str>, now: DateTime<Utc>) -> u64 {
    let posted = match usenetdate.and_then(|d| DateTime::parse_from_rfc2822(d).ok()) {
        Some(dt) => dt.with_timezone(&Utc),
        None => return 0,
    };
    (now - posted).num_seconds().max(0) as u64
}

/// Map Torznab volume-factor attributes onto candidate flags.
fn flags_from_attrs(item: &ItemXml) -> Vec<String> {
    let mut flags = Vec::new();

    if let Some(factor) = item.attr("downloadvolumefactor") {
        match factor {
            "0" | "0.0" => flags.push("freeleech".to_string()),
            "0.25" => flags.push("freeleech25".to_string()),
            "0.5" => flags.push("halfleech".to_string()),
            "0.75" => flags.push("freeleech75".to_string()),
            _ => {}
        }
    }

    if let Some(factor) = item.attr("uploadvolumefactor") {
        if factor == "2" || factor == "2.0" {
            flags.push("doubleupload".to_string());
        }
    }

    flags
}
