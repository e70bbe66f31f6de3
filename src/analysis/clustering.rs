//! Page-type clustering
//!
//! Average-linkage agglomerative clustering over page feature vectors:
//! 1. Start from singletons
//! 2. Merge the most similar pair while its similarity reaches the threshold
//! 3. Fold clusters below the minimum size into the catch-all type
//! 4. Keep merging the most similar reported clusters while the type count
//!    exceeds the cap, regardless of threshold

use crate::analysis::features::{
    default_extractors, extract_features, similarity, FeatureExtractor, FeatureFlags, PageFeatures,
};
use crate::analysis::{AnalysisError, AnalysisResult};
use crate::model::{Page, PageType, PageTypeFeatures, OTHER_TYPE_ID};
use crate::url::{common_pattern, is_placeholder, path_segments};
use std::collections::HashSet;

/// Sample URLs kept per page type
const MAX_EXAMPLES: usize = 3;

/// Clusters pages into page types with the default extractors
///
/// # Arguments
///
/// * `pages` - The pages to cluster; each ends up in exactly one type
/// * `threshold` - Minimum average similarity for a merge
/// * `max_clusters` - Hard cap on returned types, the catch-all included
/// * `min_cluster_size` - Smaller clusters are folded into the catch-all
///
/// # Errors
///
/// Returns `AnalysisError::NoPages` if `pages` is empty
pub fn cluster(
    pages: &[Page],
    threshold: f64,
    max_clusters: usize,
    min_cluster_size: usize,
) -> AnalysisResult<Vec<PageType>> {
    PageClusterer::default().cluster(pages, threshold, max_clusters, min_cluster_size)
}

/// Clustering engine with a configurable extractor set
pub struct PageClusterer {
    extractors: Vec<Box<dyn FeatureExtractor>>,
}

impl Default for PageClusterer {
    fn default() -> Self {
        Self::new(default_extractors())
    }
}

impl PageClusterer {
    pub fn new(extractors: Vec<Box<dyn FeatureExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn cluster(
        &self,
        pages: &[Page],
        threshold: f64,
        max_clusters: usize,
        min_cluster_size: usize,
    ) -> AnalysisResult<Vec<PageType>> {
        if pages.is_empty() {
            return Err(AnalysisError::NoPages);
        }

        let features: Vec<_> = pages
            .iter()
            .map(|page| extract_features(page, &self.extractors))
            .collect();

        let n = pages.len();
        let mut sim = vec![vec![0.0; n]; n];
        for i in 0..n {
            sim[i][i] = 1.0;
            for j in (i + 1)..n {
                let s = similarity(&features[i], &features[j]);
                sim[i][j] = s;
                sim[j][i] = s;
            }
        }

        let mut clusters = Agglomeration::new(&sim);
        clusters.merge_while(|best| best >= threshold);

        let min_size = min_cluster_size.max(1);
        let max_clusters = max_clusters.max(1);
        loop {
            let reported = clusters.reported_count(min_size);
            if reported <= max_clusters {
                break;
            }
            if !clusters.merge_best_among(|members| members.len() >= min_size) {
                break;
            }
        }

        let (mut kept, mut other): (Vec<Vec<usize>>, Vec<usize>) = (Vec::new(), Vec::new());
        for members in clusters.into_members() {
            if members.len() >= min_size {
                kept.push(members);
            } else {
                other.extend(members);
            }
        }

        // Only reachable with a cap of one and both kinds present
        if !other.is_empty() && kept.len() + 1 > max_clusters {
            for members in kept.drain(..) {
                other.extend(members);
            }
        }

        let patterns: Vec<&str> = features.iter().map(|f| f.url_pattern.as_str()).collect();
        let mut used_ids: HashSet<String> = HashSet::from([OTHER_TYPE_ID.to_string()]);

        let mut page_types: Vec<PageType> = kept
            .into_iter()
            .map(|mut members| {
                members.sort_unstable();
                let pattern = common_pattern(members.iter().map(|&i| patterns[i]));
                let summary = summarize_features(pages, &features, &members);
                let name = type_name(pattern.as_deref(), &summary);
                let id = unique_id(&type_id(pattern.as_deref(), &name), &mut used_ids);
                build_type(id, name, pattern, &members, pages, &sim, summary, 1.0)
            })
            .collect();

        page_types.sort_by(|a, b| b.page_count.cmp(&a.page_count).then_with(|| a.id.cmp(&b.id)));

        if !other.is_empty() {
            other.sort_unstable();
            let summary = summarize_features(pages, &features, &other);
            page_types.push(build_type(
                OTHER_TYPE_ID.to_string(),
                "Other".to_string(),
                None,
                &other,
                pages,
                &sim,
                summary,
                0.0,
            ));
        }

        tracing::debug!(
            "Clustered {} pages into {} page types",
            pages.len(),
            page_types.len()
        );
        Ok(page_types)
    }
}

/// Cluster membership plus the average-linkage similarity matrix
struct Agglomeration {
    members: Vec<Vec<usize>>,
    /// Average similarity between clusters `i` and `j`
    linkage: Vec<Vec<f64>>,
}

impl Agglomeration {
    fn new(sim: &[Vec<f64>]) -> Self {
        Self {
            members: (0..sim.len()).map(|i| vec![i]).collect(),
            linkage: sim.to_vec(),
        }
    }

    /// Most similar pair among clusters accepted by `eligible`
    ///
    /// Ties go to the lowest indices so results are deterministic.
    fn best_pair(&self, eligible: impl Fn(&[usize]) -> bool) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..self.members.len() {
            if !eligible(&self.members[i]) {
                continue;
            }
            for j in (i + 1)..self.members.len() {
                if !eligible(&self.members[j]) {
                    continue;
                }
                let s = self.linkage[i][j];
                if best.map_or(true, |(_, _, b)| s > b) {
                    best = Some((i, j, s));
                }
            }
        }
        best
    }

    fn merge_while(&mut self, accept: impl Fn(f64) -> bool) {
        while let Some((i, j, s)) = self.best_pair(|_| true) {
            if !accept(s) {
                break;
            }
            self.merge(i, j);
        }
    }

    fn merge_best_among(&mut self, eligible: impl Fn(&[usize]) -> bool) -> bool {
        match self.best_pair(eligible) {
            Some((i, j, _)) => {
                self.merge(i, j);
                true
            }
            None => false,
        }
    }

    /// Merges cluster `j` into `i` (i < j), updating linkage by size-weighted
    /// averaging
    fn merge(&mut self, i: usize, j: usize) {
        let (size_i, size_j) = (self.members[i].len() as f64, self.members[j].len() as f64);
        for k in 0..self.members.len() {
            if k == i || k == j {
                continue;
            }
            let merged = (size_i * self.linkage[i][k] + size_j * self.linkage[j][k]) / (size_i + size_j);
            self.linkage[i][k] = merged;
            self.linkage[k][i] = merged;
        }

        let moved = self.members.remove(j);
        self.members[i].extend(moved);
        self.linkage.remove(j);
        for row in &mut self.linkage {
            row.remove(j);
        }
    }

    /// Types that would be reported: kept clusters plus the catch-all
    fn reported_count(&self, min_size: usize) -> usize {
        let kept = self.members.iter().filter(|m| m.len() >= min_size).count();
        let has_other = self.members.iter().any(|m| m.len() < min_size);
        kept + usize::from(has_other)
    }

    fn into_members(self) -> Vec<Vec<usize>> {
        self.members
    }
}

/// Mean pairwise similarity of `members`
///
/// A single member scores `singleton`.
fn mean_pairwise(members: &[usize], sim: &[Vec<f64>], singleton: f64) -> f64 {
    if members.len() < 2 {
        return singleton;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (a, &i) in members.iter().enumerate() {
        for &j in &members[a + 1..] {
            total += sim[i][j];
            pairs += 1;
        }
    }
    (total / pairs as f64).clamp(0.0, 1.0)
}

fn summarize_features(
    pages: &[Page],
    features: &[PageFeatures],
    members: &[usize],
) -> PageTypeFeatures {
    let n = members.len().max(1) as f64;
    let majority = |flag: fn(&FeatureFlags) -> bool| {
        let hits = members.iter().filter(|&&i| flag(&features[i].flags)).count();
        hits as f64 * 2.0 >= n
    };

    PageTypeFeatures {
        has_date: majority(|f| f.has_date),
        has_author: majority(|f| f.has_author),
        has_price: majority(|f| f.has_price),
        rich_content: majority(|f| f.rich_media),
        has_structured_data: majority(|f| f.structured_data),
        avg_word_count: members.iter().map(|&i| pages[i].word_count as f64).sum::<f64>() / n,
        avg_link_count: members.iter().map(|&i| pages[i].links.len() as f64).sum::<f64>() / n,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_type(
    id: String,
    name: String,
    url_pattern: Option<String>,
    members: &[usize],
    pages: &[Page],
    sim: &[Vec<f64>],
    features: PageTypeFeatures,
    singleton_confidence: f64,
) -> PageType {
    PageType {
        id,
        name,
        page_count: members.len(),
        confidence: mean_pairwise(members, sim, singleton_confidence),
        url_pattern,
        examples: members
            .iter()
            .take(MAX_EXAMPLES)
            .map(|&i| pages[i].url.clone())
            .collect(),
        features,
        page_ids: members.iter().map(|&i| pages[i].id.clone()).collect(),
    }
}

/// Human-readable type name from the shared pattern or dominant feature
fn type_name(pattern: Option<&str>, features: &PageTypeFeatures) -> String {
    if pattern == Some("/") {
        return "Home".to_string();
    }

    let segments = pattern.map(path_segments).unwrap_or_default();
    let literal = segments
        .iter()
        .rev()
        .find(|s| !is_placeholder(s) && **s != "**");

    match literal {
        Some(word) => {
            let base = title_case(word);
            let is_detail = segments
                .last()
                .is_some_and(|s| is_placeholder(s) || *s == "**");
            if is_detail {
                format!("{} Detail", base)
            } else {
                base
            }
        }
        None if features.has_price => "Product".to_string(),
        None if features.has_date && features.has_author => "Article".to_string(),
        None if features.rich_content => "Media Page".to_string(),
        None => "Page".to_string(),
    }
}

/// Stable id from the pattern, falling back to the name
fn type_id(pattern: Option<&str>, name: &str) -> String {
    let source: Vec<String> = match pattern {
        Some(p) if p != "/" => path_segments(p)
            .iter()
            .map(|s| match *s {
                "**" => "nested".to_string(),
                "*" => "any".to_string(),
                s => s.trim_start_matches(':').to_string(),
            })
            .collect(),
        Some(_) => vec!["home".to_string()],
        None => vec![name.to_string()],
    };

    let slug: String = source
        .join("-")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "type".to_string()
    } else {
        slug
    }
}

fn unique_id(candidate: &str, used: &mut HashSet<String>) -> String {
    let mut id = candidate.to_string();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}-{}", candidate, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

pub(super) fn title_case(word: &str) -> String {
    word.split(|c: char| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
