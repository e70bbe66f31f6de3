//! Content-model inference over a crawled page store
//!
//! Analysis runs four phases in sequence, each producing one artifact:
//! - Navigation extraction (primary nav, footer, breadcrumbs)
//! - Page type clustering
//! - Relationship detection between page types
//! - Recurring content object detection
//!
//! Phases only read pages; none of them mutate the store.

mod clustering;
mod features;
mod navigation;
mod objects;
mod relationships;

pub use clustering::{cluster, PageClusterer};
pub use features::{
    default_extractors, detect_flags, extract_features, pattern_similarity, similarity,
    FeatureExtractor, FeatureFlags, HeadingProfileExtractor, LinkDensityExtractor, PageFeatures,
    PresenceFlagExtractor, UrlPatternExtractor,
};
pub use navigation::extract_navigation;
pub use objects::detect_objects;
pub use relationships::RelationshipDetector;

use crate::config::AnalysisConfig;
use crate::model::{DetectedObject, Navigation, Page, PageType, Relationship, SiteModel};
use crate::storage::{ArtifactKind, PageStore, StoreError};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

/// Errors raised by the analysis phases
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No pages to analyze")]
    NoPages,

    #[error("No page types to relate")]
    NoPageTypes,

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Missing artifact: {0}")]
    MissingArtifact(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Runs every analysis phase over `pages`
///
/// `cancel` is checked between phases and inside object detection.
///
/// # Errors
///
/// * `AnalysisError::NoPages` - `pages` is empty
/// * `AnalysisError::Cancelled` - `cancel` was raised
pub fn analyze(pages: &[Page], config: &AnalysisConfig, cancel: &AtomicBool) -> AnalysisResult<SiteModel> {
    if pages.is_empty() {
        return Err(AnalysisError::NoPages);
    }
    let start = Instant::now();
    tracing::info!("Analyzing {} pages", pages.len());

    let navigation = extract_navigation(pages, config)?;
    check_cancelled(cancel)?;

    let page_types = cluster(
        pages,
        config.cluster_threshold,
        config.max_clusters,
        config.min_cluster_size,
    )?;
    tracing::info!("Found {} page types", page_types.len());
    check_cancelled(cancel)?;

    let relationships =
        RelationshipDetector::new(pages).detect(&page_types, config.relationship_threshold)?;
    tracing::info!("Found {} relationships", relationships.len());
    check_cancelled(cancel)?;

    let objects = detect_objects(pages, &page_types, config, cancel)?;
    tracing::info!("Found {} content objects", objects.len());

    tracing::info!("Analysis finished in {:.2?}", start.elapsed());
    Ok(SiteModel {
        navigation,
        page_types,
        relationships,
        objects,
    })
}

/// Runs analysis over the successful (2xx) pages of `store`
pub fn analyze_store(
    store: &dyn PageStore,
    config: &AnalysisConfig,
    cancel: &AtomicBool,
) -> AnalysisResult<SiteModel> {
    let pages: Vec<Page> = store.all()?.into_iter().filter(Page::is_success).collect();
    tracing::debug!("{} successful pages in store", pages.len());
    analyze(&pages, config, cancel)
}

/// Writes the four artifacts of `model` to the store's artifact slot
pub fn save_model(store: &mut dyn PageStore, model: &SiteModel) -> AnalysisResult<()> {
    store.save_artifact(
        ArtifactKind::Navigation,
        &serde_json::to_string_pretty(&model.navigation)?,
    )?;
    store.save_artifact(
        ArtifactKind::PageTypes,
        &serde_json::to_string_pretty(&model.page_types)?,
    )?;
    store.save_artifact(
        ArtifactKind::Relationships,
        &serde_json::to_string_pretty(&model.relationships)?,
    )?;
    store.save_artifact(
        ArtifactKind::Objects,
        &serde_json::to_string_pretty(&model.objects)?,
    )?;
    tracing::debug!("Saved analysis artifacts");
    Ok(())
}

/// Reads the artifacts written by [`save_model`]
///
/// Returns `Ok(None)` when the store holds no analysis yet.
///
/// # Errors
///
/// Returns `AnalysisError::MissingArtifact` when only some artifacts exist
pub fn load_model(store: &dyn PageStore) -> AnalysisResult<Option<SiteModel>> {
    let navigation = store.load_artifact(ArtifactKind::Navigation)?;
    let page_types = store.load_artifact(ArtifactKind::PageTypes)?;
    let relationships = store.load_artifact(ArtifactKind::Relationships)?;
    let objects = store.load_artifact(ArtifactKind::Objects)?;

    if navigation.is_none() && page_types.is_none() && relationships.is_none() && objects.is_none() {
        return Ok(None);
    }

    Ok(Some(SiteModel {
        navigation: parse_artifact::<Navigation>(navigation, ArtifactKind::Navigation)?,
        page_types: parse_artifact::<Vec<PageType>>(page_types, ArtifactKind::PageTypes)?,
        relationships: parse_artifact::<Vec<Relationship>>(
            relationships,
            ArtifactKind::Relationships,
        )?,
        objects: parse_artifact::<Vec<DetectedObject>>(objects, ArtifactKind::Objects)?,
    }))
}

fn parse_artifact<T: DeserializeOwned>(body: Option<String>, kind: ArtifactKind) -> AnalysisResult<T> {
    let body = body.ok_or(AnalysisError::MissingArtifact(kind.as_str()))?;
    Ok(serde_json::from_str(&body)?)
}

fn check_cancelled(cancel: &AtomicBool) -> AnalysisResult<()> {
    if cancel.load(Ordering::SeqCst) {
        tracing::info!("Analysis cancelled");
        return Err(AnalysisError::Cancelled);
    }
    Ok(())
}
