//! Search query construction and result filtering.
//!
//! All three listing shapes (quality, trending, free-form search) build a
//! provider query string from structured inputs. Queries are kept to at most
//! three qualifiers; beyond that the search endpoint starts rejecting with
//! 422s. When a complex query fails anyway, callers retry once with
//! [`fallback_query`] before giving up.

use chrono::{DateTime, Duration, Utc};

use super::types::RawRepositorySummary;

/// Hard ceiling on qualifiers per query.
pub const MAX_QUALIFIERS: usize = 3;

/// Star floor for the quality listing.
const QUALITY_MIN_STARS: u64 = 500;

/// Trending window and floors.
const TRENDING_WINDOW_DAYS: i64 = 30;
const TRENDING_MIN_STARS: u64 = 50;
const TRENDING_MIN_ISSUES: u64 = 5;

/// Substrings that exclude a result outright, matched case-insensitively
/// against name and description before caching or returning.
pub const BANNED_KEYWORDS: &[&str] = &[
    "nazi", "hitler", "kkk", "porn", "nsfw", "hentai", "bestiality", "rape",
];

/// Structured filters for the quality ("popular") listing.
#[derive(Debug, Clone, Default)]
pub struct QualityFilters {
    pub language: Option<String>,
    pub topic: Option<String>,
    /// Adds a good-first-issue qualifier when room remains.
    pub beginner_friendly: bool,
}

/// Search qualifiers derived from stored user preferences.
#[derive(Debug, Clone, Default)]
pub struct UserPreferences {
    pub preferred_language: Option<String>,
    pub preferred_topic: Option<String>,
}

/// The strictly simpler query used as a one-shot retry after a failed
/// complex query.
#[must_use]
pub fn fallback_query() -> &'static str {
    "stars:>100"
}

/// Build the star-sorted quality query, capped at [`MAX_QUALIFIERS`].
#[must_use]
pub fn quality_query(filters: &QualityFilters) -> String {
    let mut qualifiers = vec![format!("stars:>{QUALITY_MIN_STARS}")];

    if let Some(language) = filters.language.as_deref() {
        if !language.is_empty() && qualifiers.len() < MAX_QUALIFIERS {
            qualifiers.push(format!("language:{language}"));
        }
    }
    if let Some(topic) = filters.topic.as_deref() {
        if !topic.is_empty() && qualifiers.len() < MAX_QUALIFIERS {
            qualifiers.push(format!("topic:{topic}"));
        }
    }
    if filters.beginner_friendly && qualifiers.len() < MAX_QUALIFIERS {
        qualifiers.push("good-first-issues:>10".to_string());
    }

    qualifiers.join(" ")
}

/// Cache-key signature covering every dimension of the quality filters.
#[must_use]
pub fn quality_signature(filters: &QualityFilters) -> String {
    format!(
        "lang={}|topic={}|beginner={}",
        filters
            .language
            .as_deref()
            .unwrap_or("")
            .to_lowercase(),
        filters.topic.as_deref().unwrap_or("").to_lowercase(),
        filters.beginner_friendly
    )
}

/// Build the trending query: created within the last month, above the star
/// and open-issue floors. Exactly [`MAX_QUALIFIERS`] qualifiers.
#[must_use]
pub fn trending_query(now: DateTime<Utc>) -> String {
    let since = (now - Duration::days(TRENDING_WINDOW_DAYS)).format("%Y-%m-%d");
    format!("created:>{since} stars:>{TRENDING_MIN_STARS} open-issues:>{TRENDING_MIN_ISSUES}")
}

/// Augment a free-form search query with preference-derived qualifiers,
/// but only for dimensions the query does not already constrain.
#[must_use]
pub fn augment_search_query(query: &str, prefs: &UserPreferences) -> String {
    let mut augmented = query.trim().to_string();
    let lower = augmented.to_lowercase();
    let mut qualifiers = lower.matches(':').count();

    if qualifiers < MAX_QUALIFIERS && !lower.contains("language:") {
        if let Some(language) = prefs.preferred_language.as_deref() {
            if !language.is_empty() {
                augmented.push_str(&format!(" language:{language}"));
                qualifiers += 1;
            }
        }
    }
    if qualifiers < MAX_QUALIFIERS && !lower.contains("topic:") {
        if let Some(topic) = prefs.preferred_topic.as_deref() {
            if !topic.is_empty() {
                augmented.push_str(&format!(" topic:{topic}"));
            }
        }
    }

    augmented
}

/// True when a repository's name or description contains a banned keyword.
#[must_use]
pub fn is_blocked(raw: &RawRepositorySummary) -> bool {
    let name = raw.full_name.to_lowercase();
    let description = raw
        .description
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    BANNED_KEYWORDS
        .iter()
        .any(|kw| name.contains(kw) || description.contains(kw))
}

/// Drop blocked results, preserving order.
#[must_use]
pub fn filter_blocked(repos: Vec<RawRepositorySummary>) -> Vec<RawRepositorySummary> {
    repos.into_iter().filter(|r| !is_blocked(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::testutil::sample_raw;

    #[test]
    fn quality_query_without_filters_is_the_star_floor() {
        assert_eq!(quality_query(&QualityFilters::default()), "stars:>500");
    }

    #[test]
    fn quality_query_caps_at_three_qualifiers() {
        let filters = QualityFilters {
            language: Some("rust".to_string()),
            topic: Some("cli".to_string()),
            beginner_friendly: true,
        };
        let query = quality_query(&filters);
        assert_eq!(query, "stars:>500 language:rust topic:cli");
        assert_eq!(query.split(' ').count(), MAX_QUALIFIERS);
    }

    #[test]
    fn beginner_qualifier_fills_remaining_room() {
        let filters = QualityFilters {
            language: Some("go".to_string()),
            topic: None,
            beginner_friendly: true,
        };
        assert_eq!(
            quality_query(&filters),
            "stars:>500 language:go good-first-issues:>10"
        );
    }

    #[test]
    fn quality_signature_distinguishes_filter_dimensions() {
        let a = quality_signature(&QualityFilters {
            language: Some("Rust".to_string()),
            ..Default::default()
        });
        let b = quality_signature(&QualityFilters {
            topic: Some("rust".to_string()),
            ..Default::default()
        });
        assert_ne!(a, b);

        // Case does not split the cache.
        let c = quality_signature(&QualityFilters {
            language: Some("rust".to_string()),
            ..Default::default()
        });
        assert_eq!(a, c);
    }

    #[test]
    fn trending_query_uses_a_thirty_day_window_and_both_floors() {
        let now = DateTime::parse_from_rfc3339("2026-08-29T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let query = trending_query(now);
        assert_eq!(query, "created:>2026-07-30 stars:>50 open-issues:>5");
        assert_eq!(query.split(' ').count(), MAX_QUALIFIERS);
    }

    #[test]
    fn search_augmentation_respects_existing_qualifiers() {
        let prefs = UserPreferences {
            preferred_language: Some("python".to_string()),
            preferred_topic: Some("ml".to_string()),
        };
        let augmented = augment_search_query("web framework language:rust", &prefs);
        assert!(!augmented.contains("language:python"));
        assert!(augmented.contains("topic:ml"));
    }

    #[test]
    fn search_augmentation_adds_missing_preferences() {
        let prefs = UserPreferences {
            preferred_language: Some("python".to_string()),
            preferred_topic: None,
        };
        assert_eq!(
            augment_search_query("http server", &prefs),
            "http server language:python"
        );
    }

    #[test]
    fn search_augmentation_is_identity_without_preferences() {
        assert_eq!(
            augment_search_query("http server", &UserPreferences::default()),
            "http server"
        );
    }

    #[test]
    fn blocked_names_are_filtered() {
        let ok = sample_raw(1, "acme/widgets", 10);
        let bad_name = sample_raw(2, "evil/nazi-tools", 10);
        let mut bad_description = sample_raw(3, "acme/other", 10);
        bad_description.description = Some("NSFW content archive".to_string());

        assert!(!is_blocked(&ok));
        assert!(is_blocked(&bad_name));
        assert!(is_blocked(&bad_description));

        let kept = filter_blocked(vec![ok, bad_name, bad_description]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].full_name, "acme/widgets");
    }
}
