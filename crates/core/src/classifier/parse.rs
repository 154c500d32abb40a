//! Title parsing: quality tier, season numbers, episode numbers.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Video quality tier parsed from a release title.
///
/// Ordering is by desirability: `Unknown < Sd < Hd < FullHd < Uhd`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Unknown,
    Sd,
    Hd,
    FullHd,
    Uhd,
}

impl Quality {
    /// Short display label as used in logs and library paths.
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::Sd => "sd",
            Quality::Hd => "720p",
            Quality::FullHd => "1080p",
            Quality::Uhd => "2160p",
        }
    }
}

// Quality patterns in priority order. The first matching tier wins, so the
// generic "hd" pattern never shadows "full hd" or "uhd" titles.
static QUALITY_TIERS: Lazy<Vec<(Quality, Regex)>> = Lazy::new(|| {
    vec![
        (Quality::Uhd, Regex::new(r"(?i)\b(4k|2160p|uhd)\b").unwrap()),
        (
            Quality::FullHd,
            Regex::new(r"(?i)\b(1080p|full[ ._-]?hd)\b").unwrap(),
        ),
        (Quality::Hd, Regex::new(r"(?i)\b(720p|hd)\b").unwrap()),
        (Quality::Sd, Regex::new(r"(?i)\b(480p|360p|sd)\b").unwrap()),
    ]
});

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"s(\d{1,2})e\d{1,3}").unwrap());
static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"s(\d{1,2})\s*[-–]\s*s?(\d{1,2})").unwrap());
static SEASON_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bs(\d{1,2})\b").unwrap());
static SEASON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bseason\s*(\d{1,2})\b").unwrap());
static EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)s\d{1,2}e(\d{1,3})(?:\s*-\s*(?:s?\d{1,2}e|e)?(\d{1,3}))?").unwrap()
});

/// Parse the quality tier from a release title.
pub fn quality(title: &str) -> Quality {
    for (tier, pattern) in QUALITY_TIERS.iter() {
        if pattern.is_match(title) {
            return *tier;
        }
    }
    Quality::Unknown
}

/// Parse the season numbers covered by a release title.
///
/// Rules are tried in a fixed order and the first match wins:
/// `SxxEyy` marker, season range (`S01-S03`), bare `S01` token, the word
/// `season` followed by a number. A title matching none of these yields an
/// empty list. A reversed range (`S05-S02`) also yields an empty list; such
/// titles are malformed and a guessed order could import the wrong pack.
pub fn seasons(title: &str) -> Vec<u32> {
    let lower = title.to_lowercase();

    if let Some(caps) = SEASON_EPISODE.captures(&lower) {
        if let Some(n) = parse_num(caps.get(1)) {
            return vec![n];
        }
    }

    if let Some(caps) = SEASON_RANGE.captures(&lower) {
        if let (Some(start), Some(end)) = (parse_num(caps.get(1)), parse_num(caps.get(2))) {
            if start <= end {
                return (start..=end).collect();
            }
            return Vec::new();
        }
    }

    if let Some(caps) = SEASON_BARE.captures(&lower) {
        if let Some(n) = parse_num(caps.get(1)) {
            return vec![n];
        }
    }

    if let Some(caps) = SEASON_WORD.captures(&lower) {
        if let Some(n) = parse_num(caps.get(1)) {
            return vec![n];
        }
    }

    Vec::new()
}

/// Parse the episode numbers covered by a release title.
///
/// `S01E03` yields `[3]`, `S01E01-E04` (and the `S01E01-S01E04` form) yields
/// the inclusive range. No episode marker means a season pack, which yields
/// an empty list. A reversed range yields an empty list.
pub fn episodes(title: &str) -> Vec<u32> {
    let caps = match EPISODE.captures(title) {
        Some(caps) => caps,
        None => return Vec::new(),
    };

    let start = match parse_num(caps.get(1)) {
        Some(n) => n,
        None => return Vec::new(),
    };

    match parse_num(caps.get(2)) {
        Some(end) if end >= start => (start..=end).collect(),
        Some(_) => Vec::new(),
        None => vec![start],
    }
}

fn parse_num(m: Option<regex_lite::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_uhd() {
        assert_eq!(quality("Show.S01.2160p.WEB-DL"), Quality::Uhd);
        assert_eq!(quality("Movie 4K HDR"), Quality::Uhd);
        assert_eq!(quality("Movie.UHD.BluRay"), Quality::Uhd);
    }

    #[test]
    fn test_quality_full_hd() {
        assert_eq!(quality("Show.S01.1080p.WEB-DL"), Quality::FullHd);
        assert_eq!(quality("Movie Full HD rip"), Quality::FullHd);
        assert_eq!(quality("Movie.full_hd.x264"), Quality::FullHd);
        assert_eq!(quality("Movie full.hd"), Quality::FullHd);
    }

    #[test]
    fn test_quality_hd() {
        assert_eq!(quality("Show.S01.720p.HDTV"), Quality::Hd);
        assert_eq!(quality("Movie HD rip"), Quality::Hd);
    }

    #[test]
    fn test_quality_sd() {
        assert_eq!(quality("Old.Show.480p"), Quality::Sd);
        assert_eq!(quality("Ancient.Clip.360p"), Quality::Sd);
    }

    #[test]
    fn test_quality_unknown() {
        assert_eq!(quality("Some.Release.x264"), Quality::Unknown);
        assert_eq!(quality(""), Quality::Unknown);
    }

    #[test]
    fn test_quality_tokens_are_word_bounded() {
        // "hd" inside a longer token must not count as a quality marker.
        assert_eq!(quality("Show.HDTV.x264"), Quality::Unknown);
        assert_eq!(quality("Movie.HDR10.x265"), Quality::Unknown);
        assert_eq!(quality("Show.720p.HDTV.x264"), Quality::Hd);
    }

    #[test]
    fn test_quality_priority_over_later_tiers() {
        // "2160p" also contains no "hd" token but "4K UHD BluRay" contains
        // both "uhd" and "hd"; the first tier must win.
        assert_eq!(quality("Movie.4K.UHD.BluRay.HDR"), Quality::Uhd);
        // "full hd" must not fall through to the plain hd tier.
        assert_eq!(quality("Movie full hd"), Quality::FullHd);
    }

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::Uhd > Quality::FullHd);
        assert!(Quality::FullHd > Quality::Hd);
        assert!(Quality::Hd > Quality::Sd);
        assert!(Quality::Sd > Quality::Unknown);
    }

    #[test]
    fn test_seasons_episode_marker() {
        assert_eq!(seasons("Show.S02E05.1080p"), vec![2]);
        assert_eq!(seasons("show s12e113"), vec![12]);
    }

    #[test]
    fn test_seasons_range() {
        assert_eq!(seasons("Show.S01-S03.Complete"), vec![1, 2, 3]);
        assert_eq!(seasons("Show S01 - 03"), vec![1, 2, 3]);
        assert_eq!(seasons("Show S02\u{2013}S04"), vec![2, 3, 4]);
    }

    #[test]
    fn test_seasons_reversed_range_rejected() {
        assert_eq!(seasons("Show.S05-S02"), Vec::<u32>::new());
    }

    #[test]
    fn test_seasons_bare_token() {
        assert_eq!(seasons("Show S03 Complete 1080p"), vec![3]);
        // Multiple bare tokens: the first one wins, not a union.
        assert_eq!(seasons("Show S01 S03 S05"), vec![1]);
    }

    #[test]
    fn test_seasons_word_form() {
        assert_eq!(seasons("Show Season 4 1080p"), vec![4]);
        assert_eq!(seasons("Show season12"), vec![12]);
    }

    #[test]
    fn test_seasons_none() {
        assert_eq!(seasons("Some Movie 2021 1080p"), Vec::<u32>::new());
    }

    #[test]
    fn test_seasons_marker_beats_range() {
        // SxxEyy is the most specific rule and is tried first.
        assert_eq!(seasons("Show.S02E01.S01-S05"), vec![2]);
    }

    #[test]
    fn test_episodes_single() {
        assert_eq!(episodes("Show.S01E03.1080p"), vec![3]);
        assert_eq!(episodes("show s01e113"), vec![113]);
    }

    #[test]
    fn test_episodes_range() {
        assert_eq!(episodes("Show.S01E01-E04"), vec![1, 2, 3, 4]);
        assert_eq!(episodes("Show S01E02 - S01E04"), vec![2, 3, 4]);
        assert_eq!(episodes("Show S01E02-04"), vec![2, 3, 4]);
    }

    #[test]
    fn test_episodes_reversed_range_rejected() {
        assert_eq!(episodes("Show.S01E05-E02"), Vec::<u32>::new());
    }

    #[test]
    fn test_episodes_season_pack() {
        assert_eq!(episodes("Show.S01.Complete.1080p"), Vec::<u32>::new());
        assert_eq!(episodes("Some Movie 2021"), Vec::<u32>::new());
    }

    #[test]
    fn test_episodes_case_insensitive() {
        assert_eq!(episodes("show s01e03"), vec![3]);
        assert_eq!(episodes("SHOW S01E03"), vec![3]);
    }
}
