//! Data model shared by the crawler, the page store and analysis
//!
//! Every type serializes to JSON with camelCase field names.

mod page;
mod site;

pub use page::{
    BlockSlot, ContentBlock, Heading, LinkZone, Page, PageLink, PageSnapshot, SlotKind,
    SYNTHETIC_FAILURE_STATUS,
};
pub use site::{
    DetectedObject, FieldType, NavEntry, Navigation, ObjectInstance, PageType, PageTypeFeatures,
    Relationship, RelationshipKind, SiteModel, SuggestedField, OTHER_TYPE_ID,
};
