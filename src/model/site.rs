//! Content-model artifacts produced by analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Id of the catch-all page type
pub const OTHER_TYPE_ID: &str = "other";

/// Summary signals of a page type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTypeFeatures {
    pub has_date: bool,
    pub has_author: bool,
    pub has_price: bool,
    pub rich_content: bool,
    pub has_structured_data: bool,
    pub avg_word_count: f64,
    pub avg_link_count: f64,
}

/// A cluster of structurally similar pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageType {
    pub id: String,
    pub name: String,
    pub page_count: usize,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    pub examples: Vec<String>,
    pub features: PageTypeFeatures,
    pub page_ids: Vec<String>,
}

impl PageType {
    pub fn is_other(&self) -> bool {
        self.id == OTHER_TYPE_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    ListingDetail,
    ParentChild,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingDetail => "listing-detail",
            Self::ParentChild => "parent-child",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed link between two page types of the same run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub description: String,
    pub confidence: f64,
}

/// Value type suggested for an object field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Url,
    Image,
    Date,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
}

/// One occurrence of a detected object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInstance {
    pub page_id: String,
    pub url: String,
    pub values: BTreeMap<String, String>,
}

/// A content fragment recurring across pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub name: String,
    pub instances: Vec<ObjectInstance>,
    pub confidence: f64,
    pub suggested_fields: Vec<SuggestedField>,
    pub page_type_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavEntry {
    pub label: String,
    pub target_pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub primary_nav: Vec<NavEntry>,
    pub footer: Vec<NavEntry>,
    pub breadcrumbs: Vec<NavEntry>,
}

/// The four analysis artifacts of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteModel {
    pub navigation: Navigation,
    pub page_types: Vec<PageType>,
    pub relationships: Vec<Relationship>,
    pub objects: Vec<DetectedObject>,
}
