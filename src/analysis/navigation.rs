//! Navigation extraction
//!
//! Aggregates link placement across pages. A link becomes part of the
//! primary navigation or the footer when it sits in that zone on enough of
//! the pages; breadcrumbs come from path prefixes that pages of one URL
//! pattern consistently link back to.

use crate::analysis::{AnalysisError, AnalysisResult};
use crate::config::AnalysisConfig;
use crate::model::{LinkZone, NavEntry, Navigation, Page};
use crate::url::{path_segments, url_pattern, SlugRules};
use std::collections::{BTreeMap, HashMap, HashSet};
use url::Url;

/// Per-target tallies for one navigation zone
#[derive(Debug, Default)]
struct LinkTally {
    pages: usize,
    position_sum: usize,
    labels: BTreeMap<String, usize>,
}

/// Extracts primary navigation, footer and breadcrumbs from `pages`
///
/// # Errors
///
/// Returns `AnalysisError::NoPages` if `pages` is empty
pub fn extract_navigation(pages: &[Page], config: &AnalysisConfig) -> AnalysisResult<Navigation> {
    if pages.is_empty() {
        return Err(AnalysisError::NoPages);
    }

    let with_links = pages.iter().filter(|p| !p.links.is_empty()).count();
    if with_links == 0 {
        tracing::debug!("No page carries links; navigation is empty");
        return Ok(Navigation::default());
    }

    let primary = promote_zone(pages, with_links, config.nav_threshold, |zone| zone.is_primary());
    let footer = promote_zone(pages, with_links, config.nav_threshold, |zone| {
        zone == LinkZone::Footer
    });
    let breadcrumbs = extract_breadcrumbs(pages, config.nav_threshold);

    tracing::debug!(
        "Navigation: {} primary, {} footer, {} breadcrumb entries",
        primary.len(),
        footer.len(),
        breadcrumbs.len()
    );

    Ok(Navigation {
        primary_nav: primary,
        footer,
        breadcrumbs,
    })
}

/// Promotes links whose zone satisfies `in_zone` on at least `threshold`
/// of the pages that have links
fn promote_zone(
    pages: &[Page],
    with_links: usize,
    threshold: f64,
    in_zone: impl Fn(LinkZone) -> bool,
) -> Vec<NavEntry> {
    let mut tallies: HashMap<String, LinkTally> = HashMap::new();

    for page in pages {
        let page_url = Url::parse(&page.url).ok();
        let mut seen: HashSet<String> = HashSet::new();

        for (position, link) in page.links.iter().filter(|l| in_zone(l.zone)).enumerate() {
            let target = target_pattern(&link.url, page_url.as_ref());
            if !seen.insert(target.clone()) {
                continue;
            }
            let tally = tallies.entry(target).or_default();
            tally.pages += 1;
            tally.position_sum += position;
            let label = link.text.trim();
            if !label.is_empty() {
                *tally.labels.entry(label.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut promoted: Vec<(f64, String, LinkTally)> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.pages as f64 / with_links as f64 >= threshold)
        .map(|(target, tally)| {
            let mean_position = tally.position_sum as f64 / tally.pages as f64;
            (mean_position, target, tally)
        })
        .collect();

    promoted.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    promoted
        .into_iter()
        .map(|(_, target, tally)| NavEntry {
            label: dominant_label(&tally.labels).unwrap_or_else(|| target.clone()),
            target_pattern: target,
        })
        .collect()
}

/// Most frequent label; ties go to the lexicographically smallest
fn dominant_label(labels: &BTreeMap<String, usize>) -> Option<String> {
    labels
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(label, _)| label.clone())
}

/// Path for links on the page's own origin, the full URL otherwise
fn target_pattern(link: &str, page_url: Option<&Url>) -> String {
    match (Url::parse(link), page_url) {
        (Ok(target), Some(page)) if target.origin() == page.origin() => target.path().to_string(),
        _ => link.to_string(),
    }
}

/// Breadcrumb entries from path prefixes shared by pages of one pattern
///
/// Pages are grouped by URL pattern; groups of two or more pages are
/// considered. A proper prefix of the pattern becomes an entry when at
/// least `threshold` of the group links to the page's own concrete prefix,
/// in any zone. Breadcrumb-zone anchors supply the label when present.
fn extract_breadcrumbs(pages: &[Page], threshold: f64) -> Vec<NavEntry> {
    let rules = SlugRules::default();
    let mut groups: BTreeMap<String, Vec<&Page>> = BTreeMap::new();
    for page in pages {
        groups
            .entry(url_pattern(&page.path(), &rules))
            .or_default()
            .push(page);
    }

    let mut entries: Vec<NavEntry> = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();

    for (pattern, members) in groups.iter().filter(|(_, m)| m.len() >= 2) {
        let pattern_segments = path_segments(pattern);

        for depth in 0..pattern_segments.len() {
            let prefix_pattern = join_path(&pattern_segments[..depth]);
            if emitted.contains(&prefix_pattern) {
                continue;
            }

            let mut supporting = 0usize;
            let mut labels: BTreeMap<String, usize> = BTreeMap::new();

            for page in members {
                let path = page.path();
                let segments = path_segments(&path);
                let concrete = join_path(&segments[..depth.min(segments.len())]);
                let page_url = Url::parse(&page.url).ok();

                let mut matching = page
                    .links
                    .iter()
                    .filter(|l| target_pattern(&l.url, page_url.as_ref()) == concrete);
                let link = matching
                    .clone()
                    .find(|l| l.zone == LinkZone::Breadcrumb)
                    .or_else(|| matching.next());
                if let Some(link) = link {
                    supporting += 1;
                    let label = link.text.trim();
                    if !label.is_empty() {
                        *labels.entry(label.to_string()).or_insert(0) += 1;
                    }
                }
            }

            if supporting as f64 / members.len() as f64 >= threshold {
                emitted.insert(prefix_pattern.clone());
                entries.push(NavEntry {
                    label: dominant_label(&labels).unwrap_or_else(|| prefix_pattern.clone()),
                    target_pattern: prefix_pattern,
                });
            }
        }
    }

    entries
}

fn join_path(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}
