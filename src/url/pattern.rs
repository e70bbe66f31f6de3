//! URL path patterns
//!
//! Concrete paths are turned into templates by replacing variable segments
//! with placeholders: `/blog/2024-05-01/hello-world` becomes
//! `/blog/:date/:slug`.

/// Kind of a single path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Literal,
    Numeric,
    Uuid,
    Date,
    Slug,
}

impl SegmentKind {
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Literal => None,
            Self::Numeric => Some(":id"),
            Self::Uuid => Some(":uuid"),
            Self::Date => Some(":date"),
            Self::Slug => Some(":slug"),
        }
    }
}

/// Tunable slug detection thresholds
///
/// A segment counts as a slug when it is the last segment of a path below
/// the top level and looks like lowercase words joined by `-`/`_`, or when
/// it is longer than `long_segment_len` and contains a separator anywhere
/// in the path.
#[derive(Debug, Clone, Copy)]
pub struct SlugRules {
    pub long_segment_len: usize,
}

impl Default for SlugRules {
    fn default() -> Self {
        Self {
            long_segment_len: 12,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && is_digits(s) && (s.starts_with("19") || s.starts_with("20"))
}

fn is_two_digits_in(s: &str, min: u8, max: u8) -> bool {
    s.len() == 2 && s.parse::<u8>().is_ok_and(|n| (min..=max).contains(&n))
}

/// `yyyy-mm` or `yyyy-mm-dd` with a 19xx/20xx year
fn is_dashed_date(s: &str) -> bool {
    match s.split('-').collect::<Vec<_>>().as_slice() {
        [year, month] => is_year(year) && is_two_digits_in(month, 1, 12),
        [year, month, day] => {
            is_year(year) && is_two_digits_in(month, 1, 12) && is_two_digits_in(day, 1, 31)
        }
        _ => false,
    }
}

/// Length of the `yyyy/mm(/dd)` run starting at `start`, or 0
fn date_run_len(segments: &[&str], start: usize) -> usize {
    if !segments.get(start).is_some_and(|y| is_year(y)) {
        return 0;
    }
    if !segments
        .get(start + 1)
        .is_some_and(|m| is_two_digits_in(m, 1, 12))
    {
        return 0;
    }
    if segments
        .get(start + 2)
        .is_some_and(|d| is_two_digits_in(d, 1, 31))
    {
        3
    } else {
        2
    }
}

fn in_date_run(segments: &[&str], index: usize) -> bool {
    (index.saturating_sub(2)..=index).any(|start| index < start + date_run_len(segments, start))
}

/// Lowercase alphanumeric words joined by single `-` or `_`
fn is_slug_shaped(s: &str) -> bool {
    !s.is_empty()
        && s.split(['-', '_'])
            .all(|w| !w.is_empty() && w.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

/// Classifies the segment at `index` of a path
///
/// A bare year only reads as a date when it starts a `yyyy/mm(/dd)` run;
/// every other all-digit segment is an id.
pub fn classify_segment(segments: &[&str], index: usize, rules: &SlugRules) -> SegmentKind {
    let Some(segment) = segments.get(index).copied() else {
        return SegmentKind::Literal;
    };

    if is_dashed_date(segment) || in_date_run(segments, index) {
        return SegmentKind::Date;
    }
    if is_digits(segment) {
        return SegmentKind::Numeric;
    }
    if is_uuid(segment) {
        return SegmentKind::Uuid;
    }

    if is_slug_shaped(segment) {
        let has_separator = segment.contains('-') || segment.contains('_');
        let is_leaf = index > 0 && index + 1 == segments.len();
        if is_leaf || (has_separator && segment.len() > rules.long_segment_len) {
            return SegmentKind::Slug;
        }
    }

    SegmentKind::Literal
}

/// Splits a path into its non-empty segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Returns true if a pattern segment is a placeholder or wildcard
pub fn is_placeholder(segment: &str) -> bool {
    segment.starts_with(':') || segment == "*"
}

/// Builds the URL pattern of a path
///
/// # Examples
///
/// ```
/// use site_strata::url::{url_pattern, SlugRules};
///
/// let rules = SlugRules::default();
/// assert_eq!(url_pattern("/blog/hello-world", &rules), "/blog/:slug");
/// assert_eq!(url_pattern("/product/42/reviews", &rules), "/product/:id/reviews");
/// assert_eq!(url_pattern("/", &rules), "/");
/// ```
pub fn url_pattern(path: &str, rules: &SlugRules) -> String {
    let segments = path_segments(path);

    let templated: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            classify_segment(&segments, index, rules)
                .placeholder()
                .unwrap_or(segment)
        })
        .collect();

    format!("/{}", templated.join("/"))
}

/// Generalizes several patterns into the most specific common one
///
/// Equal segments are kept; differing segments at the same position become
/// `:param` when both sides are placeholders and `*` otherwise. Patterns of
/// different lengths keep their common prefix followed by `**`. Returns
/// None when nothing is shared.
pub fn common_pattern<'a, I>(patterns: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut iter = patterns.into_iter();
    let first = iter.next()?;
    let mut merged: Vec<String> = path_segments(first).iter().map(|s| s.to_string()).collect();
    let mut ragged = false;

    for pattern in iter {
        let segments = path_segments(pattern);
        if segments.len() != merged.len() {
            ragged = true;
        }

        let shared = merged.len().min(segments.len());
        merged.truncate(shared);
        for (slot, segment) in merged.iter_mut().zip(segments.iter()) {
            if slot == segment {
                continue;
            }
            *slot = if is_placeholder(slot) && is_placeholder(segment) {
                ":param".to_string()
            } else {
                "*".to_string()
            };
        }
    }

    if ragged {
        // Trim trailing wildcards; they carry no information before `**`
        while merged.last().is_some_and(|s| is_placeholder(s)) {
            merged.pop();
        }
        if merged.is_empty() {
            return None;
        }
        return Some(format!("/{}/**", merged.join("/")));
    }

    Some(format!("/{}", merged.join("/")))
}

/// Returns true if `child` strictly extends `parent`, segment by segment
///
/// `/blog/:slug` extends `/blog`; `/blog` does not extend itself.
pub fn pattern_extends(parent: &str, child: &str) -> bool {
    let parent_segments = path_segments(parent);
    let child_segments = path_segments(child);

    child_segments.len() > parent_segments.len()
        && parent_segments
            .iter()
            .zip(child_segments.iter())
            .all(|(p, c)| p == c || (is_placeholder(p) && is_placeholder(c)))
}
