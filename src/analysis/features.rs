//! Page feature extraction for clustering
//!
//! Each page is reduced to a [`PageFeatures`] vector by a list of
//! [`FeatureExtractor`]s. The clustering engine only sees the vector and
//! [`similarity`]; string heuristics stay in the extractors.

use crate::crawler::looks_like_price;
use crate::model::{Page, SlotKind};
use crate::url::{is_placeholder, path_segments, url_pattern, SlugRules};
use serde_json::Value;

/// Weight of URL pattern agreement in [`similarity`]
pub const URL_PATTERN_WEIGHT: f64 = 0.5;
/// Weight of heading profile agreement in [`similarity`]
pub const HEADING_WEIGHT: f64 = 0.2;
/// Weight of presence flag agreement in [`similarity`]
pub const FLAG_WEIGHT: f64 = 0.2;
/// Weight of link density agreement in [`similarity`]
pub const LINK_DENSITY_WEIGHT: f64 = 0.1;

/// Media elements needed for a page to count as media-rich
const RICH_MEDIA_MIN: usize = 3;

/// Presence signals of one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub has_date: bool,
    pub has_author: bool,
    pub has_price: bool,
    pub rich_media: bool,
    pub structured_data: bool,
}

impl FeatureFlags {
    fn as_array(&self) -> [bool; 5] {
        [
            self.has_date,
            self.has_author,
            self.has_price,
            self.rich_media,
            self.structured_data,
        ]
    }
}

/// Feature vector of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageFeatures {
    /// Templated path, e.g. `/blog/:slug`
    pub url_pattern: String,

    /// Heading counts for h1..h6
    pub heading_profile: [u32; 6],

    pub flags: FeatureFlags,

    /// Share of link tokens among word and link tokens, in [0, 1]
    pub link_density: f64,
}

/// One independently testable feature heuristic
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Writes this extractor's part of the feature vector
    fn extract(&self, page: &Page, features: &mut PageFeatures);
}

/// Templates the page path into a URL pattern
#[derive(Debug, Clone, Default)]
pub struct UrlPatternExtractor {
    pub rules: SlugRules,
}

impl FeatureExtractor for UrlPatternExtractor {
    fn name(&self) -> &'static str {
        "url-pattern"
    }

    fn extract(&self, page: &Page, features: &mut PageFeatures) {
        features.url_pattern = url_pattern(&page.path(), &self.rules);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingProfileExtractor;

impl FeatureExtractor for HeadingProfileExtractor {
    fn name(&self) -> &'static str {
        "heading-profile"
    }

    fn extract(&self, page: &Page, features: &mut PageFeatures) {
        let mut profile = [0u32; 6];
        for heading in &page.headings {
            if (1..=6).contains(&heading.level) {
                profile[usize::from(heading.level - 1)] += 1;
            }
        }
        features.heading_profile = profile;
    }
}

/// Date, author, price, rich media and structured data detection
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceFlagExtractor;

impl FeatureExtractor for PresenceFlagExtractor {
    fn name(&self) -> &'static str {
        "presence-flags"
    }

    fn extract(&self, page: &Page, features: &mut PageFeatures) {
        features.flags = detect_flags(page);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkDensityExtractor;

impl FeatureExtractor for LinkDensityExtractor {
    fn name(&self) -> &'static str {
        "link-density"
    }

    fn extract(&self, page: &Page, features: &mut PageFeatures) {
        let links = page.links.len() as f64;
        let total = links + page.word_count as f64;
        features.link_density = if total > 0.0 { links / total } else { 0.0 };
    }
}

/// The extractors used when none are supplied
pub fn default_extractors() -> Vec<Box<dyn FeatureExtractor>> {
    vec![
        Box::new(UrlPatternExtractor::default()),
        Box::new(HeadingProfileExtractor),
        Box::new(PresenceFlagExtractor),
        Box::new(LinkDensityExtractor),
    ]
}

/// Runs every extractor over `page`
pub fn extract_features(page: &Page, extractors: &[Box<dyn FeatureExtractor>]) -> PageFeatures {
    let mut features = PageFeatures::default();
    for extractor in extractors {
        extractor.extract(page, &mut features);
    }
    features
}

/// Weighted agreement of two feature vectors, in [0, 1]
pub fn similarity(a: &PageFeatures, b: &PageFeatures) -> f64 {
    let score = URL_PATTERN_WEIGHT * pattern_similarity(&a.url_pattern, &b.url_pattern)
        + HEADING_WEIGHT * profile_similarity(&a.heading_profile, &b.heading_profile)
        + FLAG_WEIGHT * flag_similarity(&a.flags, &b.flags)
        + LINK_DENSITY_WEIGHT * (1.0 - (a.link_density - b.link_density).abs());
    score.clamp(0.0, 1.0)
}

/// Positional agreement of two URL patterns
///
/// Segments are compared from the left until the first literal mismatch.
/// Equal segments score 1, two different placeholders score 0.5. The sum
/// is divided by the longer pattern's segment count.
pub fn pattern_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let left = path_segments(a);
    let right = path_segments(b);
    let longest = left.len().max(right.len());
    if longest == 0 {
        return 1.0;
    }

    let mut score = 0.0;
    for (l, r) in left.iter().zip(right.iter()) {
        if l == r {
            score += 1.0;
        } else if is_placeholder(l) && is_placeholder(r) {
            score += 0.5;
        } else {
            break;
        }
    }

    score / longest as f64
}

/// Ruzicka similarity of two heading count profiles
fn profile_similarity(a: &[u32; 6], b: &[u32; 6]) -> f64 {
    let (min_sum, max_sum) = a
        .iter()
        .zip(b.iter())
        .fold((0u32, 0u32), |(lo, hi), (x, y)| (lo + x.min(y), hi + x.max(y)));

    if max_sum == 0 {
        1.0
    } else {
        f64::from(min_sum) / f64::from(max_sum)
    }
}

fn flag_similarity(a: &FeatureFlags, b: &FeatureFlags) -> f64 {
    let (a, b) = (a.as_array(), b.as_array());
    let agree = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    agree as f64 / a.len() as f64
}

const DATE_META: &[&str] = &[
    "article:published_time",
    "article:modified_time",
    "date",
    "dc.date",
    "pubdate",
];
const AUTHOR_META: &[&str] = &["author", "article:author", "dc.creator"];
const PRICE_META: &[&str] = &["product:price:amount", "og:price:amount", "price"];

/// Detects the presence flags of a page
///
/// Signals come from meta tags, JSON-LD, captured block slots and, for
/// prices, the main content text.
pub fn detect_flags(page: &Page) -> FeatureFlags {
    let has_meta = |keys: &[&str]| keys.iter().any(|k| page.meta.contains_key(*k));
    let has_json_key = |keys: &[&str]| {
        page.json_ld
            .iter()
            .any(|value| keys.iter().any(|k| json_has_key(value, k)))
    };
    let has_slot = |name: &str| {
        page.blocks
            .iter()
            .any(|b| b.slots.iter().any(|s| s.name == name))
    };
    let has_slot_kind = |kind: SlotKind| {
        page.blocks
            .iter()
            .any(|b| b.slots.iter().any(|s| s.kind == kind))
    };

    let has_date = has_meta(DATE_META)
        || has_json_key(&["datePublished", "dateCreated"])
        || has_slot_kind(SlotKind::Date);
    let has_author = has_meta(AUTHOR_META) || has_json_key(&["author"]) || has_slot("author");
    let has_price = has_meta(PRICE_META)
        || has_json_key(&["price", "offers"])
        || has_slot("price")
        || page
            .main_content
            .as_deref()
            .map(looks_like_price)
            .unwrap_or(false);
    let rich_media = page.media_count >= RICH_MEDIA_MIN || has_json_key(&["video", "contentUrl"]);

    FeatureFlags {
        has_date,
        has_author,
        has_price,
        rich_media,
        structured_data: !page.json_ld.is_empty(),
    }
}

/// Whether `key` occurs anywhere in a JSON value
fn json_has_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| json_has_key(v, key)),
        Value::Array(items) => items.iter().any(|v| json_has_key(v, key)),
        _ => false,
    }
}
