//! Candidate scoring rules and the ranking comparator.

use std::cmp::Ordering;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::indexer::{Candidate, Protocol};

/// Ruleset marker applying to every TV library.
pub const ALL_TV: &str = "ALL_TV";
/// Ruleset marker applying to every movie library.
pub const ALL_MOVIES: &str = "ALL_MOVIES";

/// The library a search is being ranked for.
#[derive(Debug, Clone)]
pub struct LibraryTarget {
    /// Library tag as configured (e.g. "anime", "kids-tv").
    pub library: String,
    /// Whether this is a TV library (movie otherwise).
    pub is_tv: bool,
}

/// A single scoring rule.
///
/// The rule fires when any keyword matches the title (word-bounded,
/// case-insensitive) or any flag is present on the candidate. With `negate`
/// set the modifier applies when the rule does NOT fire instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub negate: bool,
    pub score_modifier: i64,
}

impl ScoringRule {
    fn fires(&self, candidate: &Candidate) -> bool {
        let keyword_hit = self.keywords.iter().any(|kw| {
            let pattern = format!(r"(?i)\b{}\b", regex_lite::escape(kw));
            Regex::new(&pattern)
                .map(|re| re.is_match(&candidate.title))
                .unwrap_or(false)
        });
        if keyword_hit {
            return true;
        }
        self.flags.iter().any(|flag| {
            candidate
                .flags
                .iter()
                .any(|cf| cf.eq_ignore_ascii_case(flag))
        })
    }

    /// Score contribution of this rule for a candidate (0 when inactive).
    pub fn contribution(&self, candidate: &Candidate) -> i64 {
        if self.fires(candidate) != self.negate {
            self.score_modifier
        } else {
            0
        }
    }
}

/// A named set of scoring rules bound to one or more libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRuleSet {
    pub name: String,
    /// Library tags this set applies to, or the `ALL_TV` / `ALL_MOVIES`
    /// markers.
    pub libraries: Vec<String>,
    pub rules: Vec<ScoringRule>,
}

impl ScoringRuleSet {
    /// Whether this ruleset applies to the given library target.
    pub fn applies_to(&self, target: &LibraryTarget) -> bool {
        self.libraries.iter().any(|lib| {
            lib == &target.library
                || (target.is_tv && lib == ALL_TV)
                || (!target.is_tv && lib == ALL_MOVIES)
        })
    }
}

/// Score candidates against every applicable ruleset, then drop candidates
/// with a negative total. A zero score is the neutral state and is kept.
pub fn score_and_filter(
    mut candidates: Vec<Candidate>,
    rulesets: &[ScoringRuleSet],
    target: &LibraryTarget,
) -> Vec<Candidate> {
    let applicable: Vec<&ScoringRuleSet> =
        rulesets.iter().filter(|rs| rs.applies_to(target)).collect();

    for candidate in &mut candidates {
        candidate.score = applicable
            .iter()
            .flat_map(|rs| rs.rules.iter())
            .map(|rule| rule.contribution(candidate))
            .sum();
    }

    candidates.retain(|c| c.score >= 0);
    candidates
}

/// Ranking comparator. `Greater` means `a` ranks better than `b`.
///
/// Cascade: quality, then score, then usenet over torrent, then freshness
/// (lower age) for usenet pairs or seeders for torrent pairs, then smaller
/// size. The result is a strict total order so sorts are deterministic.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    a.quality()
        .cmp(&b.quality())
        .then_with(|| a.score.cmp(&b.score))
        .then_with(|| protocol_rank(a.protocol).cmp(&protocol_rank(b.protocol)))
        .then_with(|| match a.protocol {
            // Protocols are equal past the previous step.
            Protocol::Usenet => b.age_secs.cmp(&a.age_secs),
            Protocol::Torrent => a.seeders.cmp(&b.seeders),
        })
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
}

fn protocol_rank(protocol: Protocol) -> u8 {
    match protocol {
        Protocol::Usenet => 1,
        Protocol::Torrent => 0,
    }
}

/// Sort candidates best-first.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| compare(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Quality;

    fn candidate(title: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            download_url: "magnet:?xt=urn:btih:abc".to_string(),
            protocol: Protocol::Torrent,
            size_bytes: 1000,
            seeders: 10,
            age_secs: 0,
            flags: vec![],
            indexer: "test".to_string(),
            score: 0,
        }
    }

    fn target_tv() -> LibraryTarget {
        LibraryTarget {
            library: "tv-main".to_string(),
            is_tv: true,
        }
    }

    fn ruleset(libraries: Vec<&str>, rules: Vec<ScoringRule>) -> ScoringRuleSet {
        ScoringRuleSet {
            name: "test-set".to_string(),
            libraries: libraries.into_iter().map(String::from).collect(),
            rules,
        }
    }

    fn keyword_rule(keyword: &str, modifier: i64, negate: bool) -> ScoringRule {
        ScoringRule {
            name: format!("kw-{keyword}"),
            keywords: vec![keyword.to_string()],
            flags: vec![],
            negate,
            score_modifier: modifier,
        }
    }

    #[test]
    fn test_keyword_rule_word_bounded() {
        let rule = keyword_rule("cam", -100, false);
        assert_eq!(rule.contribution(&candidate("Movie.2021.CAM.x264")), -100);
        // "cam" inside another word must not fire.
        assert_eq!(rule.contribution(&candidate("Movie.American.1080p")), 0);
    }

    #[test]
    fn test_keyword_rule_case_insensitive() {
        let rule = keyword_rule("remux", 50, false);
        assert_eq!(rule.contribution(&candidate("Movie REMUX 1080p")), 50);
        assert_eq!(rule.contribution(&candidate("Movie remux 1080p")), 50);
    }

    #[test]
    fn test_negated_rule_fires_on_absence() {
        let rule = keyword_rule("x265", -10, true);
        assert_eq!(rule.contribution(&candidate("Movie x264")), -10);
        assert_eq!(rule.contribution(&candidate("Movie x265")), 0);
    }

    #[test]
    fn test_flag_rule() {
        let rule = ScoringRule {
            name: "prefer-freeleech".to_string(),
            keywords: vec![],
            flags: vec!["freeleech".to_string()],
            negate: false,
            score_modifier: 25,
        };
        let mut c = candidate("Movie 1080p");
        assert_eq!(rule.contribution(&c), 0);
        c.flags.push("freeleech".to_string());
        assert_eq!(rule.contribution(&c), 25);
    }

    #[test]
    fn test_ruleset_library_binding() {
        let rs = ruleset(vec!["anime"], vec![]);
        assert!(rs.applies_to(&LibraryTarget {
            library: "anime".to_string(),
            is_tv: true
        }));
        assert!(!rs.applies_to(&target_tv()));

        let rs_all_tv = ruleset(vec![ALL_TV], vec![]);
        assert!(rs_all_tv.applies_to(&target_tv()));
        assert!(!rs_all_tv.applies_to(&LibraryTarget {
            library: "movies".to_string(),
            is_tv: false
        }));
    }

    #[test]
    fn test_score_accumulates_across_rulesets() {
        let rulesets = vec![
            ruleset(vec![ALL_TV], vec![keyword_rule("web", 10, false)]),
            ruleset(vec!["tv-main"], vec![keyword_rule("hdr", 5, false)]),
            // Movie-only set must not contribute for a TV target.
            ruleset(vec![ALL_MOVIES], vec![keyword_rule("web", 100, false)]),
        ];

        let scored = score_and_filter(
            vec![candidate("Show.S01E01.WEB.HDR.1080p")],
            &rulesets,
            &target_tv(),
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 15);
    }

    #[test]
    fn test_negative_total_dropped_zero_kept() {
        let rulesets = vec![ruleset(
            vec![ALL_TV],
            vec![
                keyword_rule("cam", -100, false),
                keyword_rule("web", 100, false),
            ],
        )];

        let scored = score_and_filter(
            vec![
                candidate("Show.S01E01.CAM"),     // -100, dropped
                candidate("Show.S01E01.CAM.WEB"), // 0, kept
                candidate("Show.S01E01.WEB"),     // +100, kept
            ],
            &rulesets,
            &target_tv(),
        );

        assert_eq!(scored.len(), 2);
        assert!(scored.iter().all(|c| c.score >= 0));
    }

    #[test]
    fn test_compare_quality_dominates() {
        let mut a = candidate("Show.S01E01.720p");
        let b = candidate("Show.S01E01.1080p");
        a.score = 1000;
        a.seeders = 9999;
        assert_eq!(compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_compare_score_breaks_quality_tie() {
        let mut a = candidate("Show.S01E01.1080p");
        let mut b = candidate("Show.S01E01.1080p");
        a.score = 5;
        b.score = 10;
        assert_eq!(compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_compare_usenet_over_torrent() {
        let torrent = candidate("Show.S01E01.1080p");
        let mut nzb = candidate("Show.S01E01.1080p");
        nzb.protocol = Protocol::Usenet;
        nzb.seeders = 0;
        nzb.age_secs = 3600;
        assert_eq!(compare(&nzb, &torrent), Ordering::Greater);
    }

    #[test]
    fn test_compare_usenet_fresher_wins() {
        let mut fresh = candidate("Show.S01E01.1080p");
        let mut stale = candidate("Show.S01E01.1080p");
        for c in [&mut fresh, &mut stale] {
            c.protocol = Protocol::Usenet;
            c.seeders = 0;
        }
        fresh.age_secs = 3600;
        stale.age_secs = 86400;
        assert_eq!(compare(&fresh, &stale), Ordering::Greater);
    }

    #[test]
    fn test_compare_torrent_seeders_then_size() {
        let mut few = candidate("Show.S01E01.1080p");
        let mut many = candidate("Show.S01E01.1080p");
        few.seeders = 5;
        many.seeders = 50;
        assert_eq!(compare(&many, &few), Ordering::Greater);

        let mut small = candidate("Show.S01E01.1080p");
        let mut large = candidate("Show.S01E01.1080p");
        small.size_bytes = 1_000_000;
        large.size_bytes = 2_000_000;
        assert_eq!(compare(&small, &large), Ordering::Greater);
    }

    #[test]
    fn test_rank_sorts_best_first() {
        let mut sd = candidate("Show.S01E01.480p");
        sd.seeders = 1000;
        let hd = candidate("Show.S01E01.720p");
        let fhd = candidate("Show.S01E01.1080p");

        let mut list = vec![sd, fhd, hd];
        rank(&mut list);

        assert_eq!(list[0].quality(), Quality::FullHd);
        assert_eq!(list[1].quality(), Quality::Hd);
        assert_eq!(list[2].quality(), Quality::Sd);
    }
}
