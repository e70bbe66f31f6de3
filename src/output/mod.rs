//! Output module for crawl statistics and model summaries
//!
//! This module handles:
//! - Loading and printing statistics of a page store
//! - Summarizing an inferred site model for the terminal

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::model::SiteModel;

/// Headline numbers of a site model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub primary_nav: usize,
    pub footer: usize,
    pub breadcrumbs: usize,
    /// (name, page count, confidence) per page type, in model order
    pub page_types: Vec<(String, usize, f64)>,
    pub relationships: usize,
    /// (name, instance count) per detected object
    pub objects: Vec<(String, usize)>,
}

/// Builds the summary of `model`
pub fn summarize_model(model: &SiteModel) -> ModelSummary {
    ModelSummary {
        primary_nav: model.navigation.primary_nav.len(),
        footer: model.navigation.footer.len(),
        breadcrumbs: model.navigation.breadcrumbs.len(),
        page_types: model
            .page_types
            .iter()
            .map(|t| (t.name.clone(), t.page_count, t.confidence))
            .collect(),
        relationships: model.relationships.len(),
        objects: model
            .objects
            .iter()
            .map(|o| (o.name.clone(), o.instances.len()))
            .collect(),
    }
}

/// Prints a site model summary to stdout
pub fn print_model_summary(model: &SiteModel) {
    let summary = summarize_model(model);

    println!("=== Site Model ===\n");

    println!("Navigation:");
    println!("  Primary entries: {}", summary.primary_nav);
    println!("  Footer entries: {}", summary.footer);
    println!("  Breadcrumb entries: {}", summary.breadcrumbs);
    println!();

    println!("Page Types ({}):", summary.page_types.len());
    for (name, count, confidence) in &summary.page_types {
        println!("  {}: {} pages (confidence {:.2})", name, count, confidence);
    }
    println!();

    println!("Relationships: {}", summary.relationships);
    for rel in &model.relationships {
        println!("  {} -> {} [{}] {:.2}", rel.from, rel.to, rel.kind, rel.confidence);
    }
    println!();

    println!("Content Objects ({}):", summary.objects.len());
    for (name, instances) in &summary.objects {
        println!("  {}: {} instances", name, instances);
    }
}
