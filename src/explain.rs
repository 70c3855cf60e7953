//! Rule-based explanations for individual recommendations.
//!
//! An explanation decomposes a recommendation into per-feature
//! contribution scores (genre overlap, description keyword overlap,
//! author match), a confidence band, and a short natural-language
//! summary for display. This is a transparent frequency summary over
//! the item's metadata and the query text, not a generative step and
//! not an attribution of the embedding model's internals.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::catalog::Item;
use crate::vector::Score;

/// Contribution weight caps: genre overlap up to 0.5, description
/// keywords up to 0.3, author match up to 0.2.
const GENRE_WEIGHT: f32 = 0.5;
const KEYWORD_WEIGHT: f32 = 0.3;
const AUTHOR_WEIGHT: f32 = 0.2;

/// Keyword overlap saturates at this many common words.
const KEYWORD_SATURATION: usize = 5;

/// A feature only appears in the summary above this contribution.
const FEATURE_FLOOR: f32 = 0.1;

/// Confidence band for a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        };
        write!(f, "{label}")
    }
}

/// Per-feature contribution scores, each bounded by its weight cap.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContributionScores {
    pub genres: f32,
    pub description_keywords: f32,
    pub authors: f32,
}

impl ContributionScores {
    #[must_use]
    pub fn total(&self) -> f32 {
        self.genres + self.description_keywords + self.authors
    }
}

/// Why an item was recommended for a query.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// Similarity rendered as a 0-100 match percentage (negative for
    /// opposed vectors).
    pub match_score: i32,
    pub confidence: Confidence,
    /// Display-ready sentence for the serving layer.
    pub summary: String,
    /// The features the summary is built from, one phrase each.
    pub matching_features: Vec<String>,
    pub contributions: ContributionScores,
}

/// Explains why `item` was recommended for `query`.
///
/// `score` is the cosine similarity the ranking produced; it drives the
/// match percentage and the base confidence band, while the metadata
/// contributions can only raise confidence, never lower it.
#[must_use]
pub fn explain_recommendation(query: &str, item: &Item, score: Score) -> Explanation {
    debug!(item = %item.id, query, "generating recommendation explanation");

    let contributions = contribution_scores(query, item);
    let confidence = confidence_band(score, &contributions);
    let matching_features = matching_features(query, item, &contributions);
    let summary = build_summary(query, &matching_features);

    Explanation {
        match_score: (score.get() * 100.0).round() as i32,
        confidence,
        summary,
        matching_features,
        contributions,
    }
}

/// Rule-based feature contributions for a query/item pair.
#[must_use]
pub fn contribution_scores(query: &str, item: &Item) -> ContributionScores {
    let mut scores = ContributionScores::default();

    // Genre terms: query words (minus the filler words "genre"/"genres")
    // against the item's genre set.
    let genre_terms: BTreeSet<String> = words(query)
        .into_iter()
        .filter(|w| w != "genre" && w != "genres")
        .collect();
    if !genre_terms.is_empty() && !item.genres.is_empty() {
        let overlap = genre_terms.intersection(&item.genres).count();
        if overlap > 0 {
            let denominator = genre_terms.len().max(item.genres.len()) as f32;
            scores.genres = overlap as f32 / denominator * GENRE_WEIGHT;
        }
    }

    let query_words = words(query);
    let description_words = words(&item.description);
    if !query_words.is_empty() && !description_words.is_empty() {
        let overlap = query_words.intersection(&description_words).count();
        if overlap > 0 {
            let saturated = (overlap as f32 / KEYWORD_SATURATION as f32).min(1.0);
            scores.description_keywords = saturated * KEYWORD_WEIGHT;
        }
    }

    let author_terms: BTreeSet<String> = query_words
        .into_iter()
        .filter(|w| w != "by")
        .collect();
    let author_words = words(&item.author);
    if !author_terms.is_empty() && !author_words.is_empty() {
        let overlap = author_terms.intersection(&author_words).count();
        if overlap > 0 {
            let denominator = author_terms.len().max(author_words.len()) as f32;
            scores.authors = overlap as f32 / denominator * AUTHOR_WEIGHT;
        }
    }

    scores
}

/// Similarity sets the base band; strong metadata overlap upgrades it.
fn confidence_band(score: Score, contributions: &ContributionScores) -> Confidence {
    let similarity = score.get();
    let mut confidence = if similarity > 0.7 {
        Confidence::High
    } else if similarity > 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let total = contributions.total();
    if total > 0.6 {
        confidence = Confidence::VeryHigh;
    } else if total > 0.3 && confidence == Confidence::Low {
        confidence = Confidence::Medium;
    }

    confidence
}

fn matching_features(query: &str, item: &Item, scores: &ContributionScores) -> Vec<String> {
    let mut features = Vec::new();

    if scores.genres > FEATURE_FLOOR && !item.genres.is_empty() {
        let genres: Vec<&str> = item.genres.iter().map(String::as_str).collect();
        features.push(format!("shares genres like {}", genres.join(", ")));
    }

    if scores.description_keywords > FEATURE_FLOOR {
        let query_words = words(query);
        let description_words = words(&item.description);
        let common: Vec<String> = query_words
            .intersection(&description_words)
            .take(3)
            .cloned()
            .collect();
        if !common.is_empty() {
            features.push(format!(
                "has keywords in description like '{}'",
                common.join(", ")
            ));
        }
    }

    if scores.authors > FEATURE_FLOOR && !item.author.trim().is_empty() {
        features.push(format!("is by {}", item.author.trim()));
    }

    features
}

fn build_summary(query: &str, matching_features: &[String]) -> String {
    let mut summary = format!(
        "Recommended because it's a good match for your interest in '{}'. ",
        query.trim()
    );
    if matching_features.is_empty() {
        summary.push_str("Its content aligns well with your query.");
    } else {
        summary.push_str("Specifically, it ");
        summary.push_str(&matching_features.join(", and "));
        summary.push('.');
    }
    summary
}

/// Lower-cased word set; ordered so feature phrases are deterministic.
fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemId;

    fn item(
        title: &str,
        author: &str,
        description: &str,
        genres: &[&str],
        rating: f32,
    ) -> Item {
        Item {
            id: ItemId::new_unchecked(1),
            title: title.to_string(),
            author: author.to_string(),
            description: description.to_string(),
            genres: genres.iter().map(|g| g.to_lowercase()).collect(),
            rating: Some(rating),
            vector: vec![1.0],
        }
    }

    #[test]
    fn test_keyword_overlap_drives_explanation() {
        let book = item(
            "The Hitchhiker's Guide to the Galaxy",
            "Douglas Adams",
            "a comedic science fiction series with philosophical undertones \
             about a man travelling through space",
            &["Science Fiction", "Comedy", "Absurdist"],
            4.5,
        );
        let query = "science fiction about time travel and artificial intelligence";

        let explanation = explain_recommendation(query, &book, Score::new(0.75).unwrap());

        assert_eq!(explanation.match_score, 75);
        assert_eq!(explanation.confidence, Confidence::High);

        // Three description words overlap: about, fiction, science
        assert!(explanation.contributions.description_keywords > FEATURE_FLOOR);
        assert_eq!(explanation.contributions.genres, 0.0);
        assert_eq!(explanation.contributions.authors, 0.0);

        assert_eq!(explanation.matching_features.len(), 1);
        assert!(explanation.summary.contains("has keywords in description"));
        assert!(explanation.summary.contains("about, fiction, science"));
    }

    #[test]
    fn test_weak_overlap_falls_back_to_generic_summary() {
        let book = item(
            "Pride and Prejudice",
            "Jane Austen",
            "a classic novel of manners, love, and marriage among the \
             english gentry of the 19th century",
            &["Romance", "Classic", "Historical"],
            4.2,
        );
        let query = "a historical drama with strong female characters";

        let explanation = explain_recommendation(query, &book, Score::new(0.60).unwrap());

        assert_eq!(explanation.match_score, 60);
        assert_eq!(explanation.confidence, Confidence::Medium);

        // One genre word and one stray description word overlap, both
        // below the feature floor
        assert!(explanation.contributions.genres > 0.0);
        assert!(explanation.contributions.genres <= FEATURE_FLOOR);
        assert!(explanation.contributions.description_keywords <= FEATURE_FLOOR);

        assert!(explanation.matching_features.is_empty());
        assert!(
            explanation
                .summary
                .ends_with("Its content aligns well with your query.")
        );
    }

    #[test]
    fn test_genre_match_upgrades_low_confidence() {
        let book = item("Whodunit", "Author", "unrelated text", &["mystery"], 4.0);

        let explanation = explain_recommendation("mystery", &book, Score::new(0.4).unwrap());

        // Exact single-genre match contributes the full genre weight,
        // lifting the Low band from the 0.4 similarity
        assert!((explanation.contributions.genres - GENRE_WEIGHT).abs() < 1e-6);
        assert_eq!(explanation.confidence, Confidence::Medium);
        assert!(
            explanation
                .summary
                .contains("shares genres like mystery")
        );
    }

    #[test]
    fn test_author_match_feature() {
        let book = item(
            "Dragon Tales",
            "Iris Vale",
            "a dragon forges an unlikely alliance",
            &["fantasy"],
            4.0,
        );

        let explanation =
            explain_recommendation("by iris vale", &book, Score::new(0.8).unwrap());

        assert!(explanation.contributions.authors > FEATURE_FLOOR);
        assert_eq!(explanation.confidence, Confidence::High);
        assert!(explanation.summary.contains("is by Iris Vale"));
    }

    #[test]
    fn test_genre_filler_words_ignored() {
        let book = item("Any", "Author", "unrelated text", &["mystery"], 3.0);

        let scores = contribution_scores("genre mystery", &book);
        // "genre" is filler; only "mystery" counts against one genre
        assert!((scores.genres - GENRE_WEIGHT).abs() < 1e-6);
    }

    #[test]
    fn test_negative_similarity_renders_negative_match_score() {
        let book = item("Any", "Author", "text", &[], 3.0);
        let explanation = explain_recommendation("query", &book, Score::new(-0.25).unwrap());

        assert_eq!(explanation.match_score, -25);
        assert_eq!(explanation.confidence, Confidence::Low);
    }
}
