//! Relationship detection between page types
//!
//! Rules are tried in a fixed priority order for every ordered pair of
//! distinct page types; the first rule that matches decides the relationship.
//!
//! 1. listing-detail: pages of A link to a majority of B's pages, and B's
//!    URL pattern strictly extends A's
//! 2. parent-child: breadcrumb nesting places B's pages one level beneath a
//!    page of A. A page without breadcrumb links falls back to its path parent.

use crate::analysis::{AnalysisError, AnalysisResult};
use crate::model::{LinkZone, Page, PageType, Relationship, RelationshipKind};
use crate::url::{page_id, path_segments, pattern_extends, to_id};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Link and parent indexes over one page set
pub struct RelationshipDetector {
    /// Page id -> ids of pages it links to
    outbound: HashMap<String, HashSet<String>>,
    /// Page id -> id of its breadcrumb or path parent
    parents: HashMap<String, String>,
}

impl RelationshipDetector {
    pub fn new(pages: &[Page]) -> Self {
        let mut outbound = HashMap::new();
        let mut parents = HashMap::new();

        for page in pages {
            let targets: HashSet<String> = page
                .links
                .iter()
                .filter_map(|link| to_id(&link.url).ok())
                .filter(|id| *id != page.id)
                .collect();
            outbound.insert(page.id.clone(), targets);

            if let Some(parent) = breadcrumb_parent(page).or_else(|| path_parent(page)) {
                parents.insert(page.id.clone(), parent);
            }
        }

        Self { outbound, parents }
    }

    /// Detects relationships between `page_types`
    ///
    /// Pairs whose winning rule scores below `threshold` are omitted.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::NoPageTypes` if `page_types` is empty
    pub fn detect(&self, page_types: &[PageType], threshold: f64) -> AnalysisResult<Vec<Relationship>> {
        if page_types.is_empty() {
            return Err(AnalysisError::NoPageTypes);
        }

        let mut relationships = Vec::new();
        for a in page_types {
            for b in page_types {
                if a.id == b.id {
                    continue;
                }
                let Some(relationship) = self.evaluate(a, b) else {
                    continue;
                };
                if relationship.confidence >= threshold {
                    relationships.push(relationship);
                } else {
                    tracing::trace!(
                        "Dropped {} {} -> {} ({:.2})",
                        relationship.kind,
                        relationship.from,
                        relationship.to,
                        relationship.confidence
                    );
                }
            }
        }

        tracing::debug!("Detected {} relationships", relationships.len());
        Ok(relationships)
    }

    /// Applies the rules in priority order; the first match wins
    fn evaluate(&self, a: &PageType, b: &PageType) -> Option<Relationship> {
        if a.page_ids.is_empty() || b.page_ids.is_empty() {
            return None;
        }

        if let Some(confidence) = self.listing_detail(a, b) {
            return Some(Relationship {
                from: a.id.clone(),
                to: b.id.clone(),
                kind: RelationshipKind::ListingDetail,
                description: format!("{} pages list {} pages", a.name, b.name),
                confidence,
            });
        }

        let confidence = self.parent_child(a, b)?;
        Some(Relationship {
            from: a.id.clone(),
            to: b.id.clone(),
            kind: RelationshipKind::ParentChild,
            description: format!("{} pages are nested under {} pages", b.name, a.name),
            confidence,
        })
    }

    /// Fraction of A's pages linking to a majority of B's pages, if any do
    ///
    /// Only applies when B's URL pattern strictly extends A's.
    fn listing_detail(&self, a: &PageType, b: &PageType) -> Option<f64> {
        let (Some(a_pattern), Some(b_pattern)) = (a.url_pattern.as_deref(), b.url_pattern.as_deref())
        else {
            return None;
        };
        if !pattern_extends(a_pattern, b_pattern) {
            return None;
        }

        let b_ids: HashSet<&str> = b.page_ids.iter().map(String::as_str).collect();
        let satisfying = a
            .page_ids
            .iter()
            .filter(|id| {
                let linked = self
                    .outbound
                    .get(id.as_str())
                    .map(|targets| targets.iter().filter(|t| b_ids.contains(t.as_str())).count())
                    .unwrap_or(0);
                linked * 2 > b_ids.len()
            })
            .count();

        (satisfying > 0).then(|| fraction(satisfying, a.page_ids.len()))
    }

    /// Fraction of A's pages that are the parent of some B page, if any are
    fn parent_child(&self, a: &PageType, b: &PageType) -> Option<f64> {
        let a_ids: HashSet<&str> = a.page_ids.iter().map(String::as_str).collect();
        let parents: HashSet<&str> = b
            .page_ids
            .iter()
            .filter_map(|id| self.parents.get(id))
            .map(String::as_str)
            .filter(|parent| a_ids.contains(parent))
            .collect();

        (!parents.is_empty()).then(|| fraction(parents.len(), a_ids.len()))
    }
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64).clamp(0.0, 1.0)
    }
}

/// Last breadcrumb-zone link that is not the page itself
fn breadcrumb_parent(page: &Page) -> Option<String> {
    page.links_in(LinkZone::Breadcrumb)
        .filter_map(|link| to_id(&link.url).ok())
        .filter(|id| *id != page.id)
        .last()
}

/// Page id of the URL one path segment up
fn path_parent(page: &Page) -> Option<String> {
    let mut url = Url::parse(&page.url).ok()?;
    let segments: Vec<String> = path_segments(url.path())
        .iter()
        .map(|s| s.to_string())
        .collect();
    if segments.is_empty() {
        return None;
    }

    let parent_path = format!("/{}", segments[..segments.len() - 1].join("/"));
    url.set_path(&parent_path);
    url.set_query(None);
    Some(page_id(&url))
}
