/*!
 * Ranking of search results.
 *
 * Two independent policies live here:
 * - title matching, used to pick a catalog entry for a free-text title
 *   (`score_match` / `rank_matches`)
 * - download ranking, used to pick the subtitle to fetch automatically
 *   (`select_best`)
 *
 * Both sorts are stable, so ties keep the order the server returned.
 */

use std::cmp::Ordering;

use crate::tools::types::SubtitleItem;

/// Points for a case-insensitive exact title match
pub const EXACT_TITLE_POINTS: i32 = 100;
/// Points when the query is a case-insensitive substring of the title
pub const PARTIAL_TITLE_POINTS: i32 = 50;
/// Points for a matching year
pub const YEAR_POINTS: i32 = 30;
/// Points for a matching title type
pub const TYPE_POINTS: i32 = 20;

/// Anything that can be matched against a free-text title query
pub trait MatchCandidate {
    fn title(&self) -> &str;
    fn year(&self) -> Option<i32>;
    /// Declared title type, e.g. `movie` or `tvSeries`
    fn kind(&self) -> Option<&str>;
}

/// Map a user facing type hint onto the catalog's type vocabulary.
/// Unknown hints are compared verbatim.
pub fn catalog_type_for_hint(hint: &str) -> &str {
    match hint {
        "tvshow" => "tvSeries",
        "movie" => "movie",
        "episode" => "tvEpisode",
        other => other,
    }
}

/// Scoring and selection over search results
pub struct SubtitleSelector;

impl SubtitleSelector {
    /// Score how well a candidate matches a title query
    pub fn score_match<C: MatchCandidate + ?Sized>(
        candidate: &C,
        query_title: &str,
        query_year: Option<i32>,
        type_hint: Option<&str>,
    ) -> i32 {
        let mut score = 0;

        let title = candidate.title().to_lowercase();
        let query = query_title.to_lowercase();
        if title == query {
            score += EXACT_TITLE_POINTS;
        } else if title.contains(&query) {
            score += PARTIAL_TITLE_POINTS;
        }

        if let Some(year) = query_year {
            if candidate.year() == Some(year) {
                score += YEAR_POINTS;
            }
        }

        if let Some(hint) = type_hint {
            if candidate.kind() == Some(catalog_type_for_hint(hint)) {
                score += TYPE_POINTS;
            }
        }

        score
    }

    /// Candidates sorted by descending match score, ties in input order
    pub fn rank_matches<'a, C: MatchCandidate>(
        candidates: &'a [C],
        query_title: &str,
        query_year: Option<i32>,
        type_hint: Option<&str>,
    ) -> Vec<(&'a C, i32)> {
        let mut ranked: Vec<(&C, i32)> = candidates
            .iter()
            .map(|c| (c, Self::score_match(c, query_title, query_year, type_hint)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Best matching candidate, if any
    pub fn best_match<'a, C: MatchCandidate>(
        candidates: &'a [C],
        query_title: &str,
        query_year: Option<i32>,
        type_hint: Option<&str>,
    ) -> Option<&'a C> {
        Self::rank_matches(candidates, query_title, query_year, type_hint)
            .into_iter()
            .next()
            .map(|(candidate, _)| candidate)
    }

    /// Order items for automatic download: by score, then download count,
    /// both descending with missing values counted as zero
    pub fn rank_for_download(items: &[SubtitleItem]) -> Vec<&SubtitleItem> {
        let mut ranked: Vec<&SubtitleItem> = items.iter().collect();
        ranked.sort_by(|a, b| compare_for_download(b, a));
        ranked
    }

    /// Item to download automatically, `None` for an empty list
    pub fn select_best(items: &[SubtitleItem]) -> Option<&SubtitleItem> {
        Self::rank_for_download(items).into_iter().next()
    }
}

fn compare_for_download(a: &SubtitleItem, b: &SubtitleItem) -> Ordering {
    let score_a = a.score.unwrap_or(0.0);
    let score_b = b.score.unwrap_or(0.0);
    score_a
        .total_cmp(&score_b)
        .then_with(|| a.download_count.unwrap_or(0).cmp(&b.download_count.unwrap_or(0)))
}
