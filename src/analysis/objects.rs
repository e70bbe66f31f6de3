//! Recurring content object detection
//!
//! Content blocks captured at fetch time are grouped by structural
//! signature. A group that recurs on enough distinct pages becomes a
//! candidate object; candidates rooted in the same tag with similar
//! signatures are merged before fields and confidence are derived.

use crate::analysis::clustering::title_case;
use crate::analysis::{AnalysisError, AnalysisResult};
use crate::config::AnalysisConfig;
use crate::model::{
    ContentBlock, DetectedObject, FieldType, ObjectInstance, Page, PageType, SlotKind,
    SuggestedField,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Weight of page coverage in object confidence; slot consistency gets the rest
const COVERAGE_WEIGHT: f64 = 0.5;

/// A block together with the page it was found on
struct Occurrence<'a> {
    page: &'a Page,
    block: &'a ContentBlock,
}

/// Occurrences sharing one or more similar signatures
struct BlockGroup<'a> {
    tag: String,
    /// Tokens of the group's first signature, compared on every merge
    tokens: HashSet<String>,
    signatures: Vec<String>,
    occurrences: Vec<Occurrence<'a>>,
}

impl BlockGroup<'_> {
    fn distinct_pages(&self) -> usize {
        self.occurrences
            .iter()
            .map(|o| o.page.id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Detects content objects that recur across `pages`
///
/// `cancel` is checked once per page while blocks are collected.
///
/// # Errors
///
/// * `AnalysisError::NoPages` - `pages` is empty
/// * `AnalysisError::Cancelled` - `cancel` was raised
pub fn detect_objects(
    pages: &[Page],
    page_types: &[PageType],
    config: &AnalysisConfig,
    cancel: &AtomicBool,
) -> AnalysisResult<Vec<DetectedObject>> {
    if pages.is_empty() {
        return Err(AnalysisError::NoPages);
    }

    let mut by_signature: BTreeMap<&str, Vec<Occurrence<'_>>> = BTreeMap::new();
    for page in pages {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!("Object detection cancelled");
            return Err(AnalysisError::Cancelled);
        }
        for block in &page.blocks {
            by_signature
                .entry(block.signature.as_str())
                .or_default()
                .push(Occurrence { page, block });
        }
    }

    let mut groups: Vec<BlockGroup<'_>> = Vec::new();
    for (signature, occurrences) in by_signature {
        let Some(first) = occurrences.first() else {
            continue;
        };
        let group = BlockGroup {
            tag: first.block.tag.clone(),
            tokens: first.block.signature_tokens().map(str::to_string).collect(),
            signatures: vec![signature.to_string()],
            occurrences,
        };
        if group.distinct_pages() < config.object_min_pages {
            tracing::trace!("Signature {} recurs on too few pages", signature);
            continue;
        }
        merge_into(&mut groups, group, config.object_similarity);
    }

    groups.sort_by(|a, b| {
        b.occurrences
            .len()
            .cmp(&a.occurrences.len())
            .then_with(|| a.signatures.cmp(&b.signatures))
    });

    let mut per_type: HashMap<String, usize> = HashMap::new();
    let objects: Vec<DetectedObject> = groups
        .iter()
        .map(|group| {
            let object = build_object(group, page_types);
            let n = per_type.entry(object.object_type.clone()).or_insert(0);
            *n += 1;
            DetectedObject {
                id: format!("obj-{}-{}", object.object_type, n),
                ..object
            }
        })
        .collect();

    tracing::debug!("Detected {} content objects", objects.len());
    Ok(objects)
}

/// Adds `group` to the first compatible existing group, or appends it
fn merge_into<'a>(groups: &mut Vec<BlockGroup<'a>>, group: BlockGroup<'a>, similarity: f64) {
    let target = groups
        .iter_mut()
        .find(|existing| existing.tag == group.tag && jaccard(&existing.tokens, &group.tokens) >= similarity);

    match target {
        Some(existing) => {
            tracing::trace!(
                "Merging {:?} into {:?}",
                group.signatures,
                existing.signatures
            );
            existing.signatures.extend(group.signatures);
            existing.occurrences.extend(group.occurrences);
        }
        None => groups.push(group),
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn build_object(group: &BlockGroup<'_>, page_types: &[PageType]) -> DetectedObject {
    let instances: Vec<ObjectInstance> = group
        .occurrences
        .iter()
        .map(|o| ObjectInstance {
            page_id: o.page.id.clone(),
            url: o.page.url.clone(),
            values: o
                .block
                .slots
                .iter()
                .map(|slot| (slot.name.clone(), slot.value.clone()))
                .collect(),
        })
        .collect();

    let suggested_fields = suggest_fields(group);

    let member_pages: HashSet<&str> = instances.iter().map(|i| i.page_id.as_str()).collect();
    let referenced: Vec<&PageType> = page_types
        .iter()
        .filter(|t| t.page_ids.iter().any(|id| member_pages.contains(id.as_str())))
        .collect();

    let object_type = infer_type(&suggested_fields, &group.tag);
    let name = group
        .occurrences
        .iter()
        .find_map(|o| o.block.class_hint.as_deref())
        .map(title_case)
        .unwrap_or_else(|| title_case(&object_type));

    let confidence = COVERAGE_WEIGHT * coverage(&member_pages, &referenced)
        + (1.0 - COVERAGE_WEIGHT) * consistency(&instances, &suggested_fields);

    DetectedObject {
        id: String::new(),
        object_type,
        name,
        instances,
        confidence: confidence.clamp(0.0, 1.0),
        suggested_fields,
        page_type_refs: referenced.iter().map(|t| t.id.clone()).collect(),
    }
}

/// Fields in first-seen order; required when every instance carries them
fn suggest_fields(group: &BlockGroup<'_>) -> Vec<SuggestedField> {
    let mut order: Vec<(String, SlotKind)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for occurrence in &group.occurrences {
        for slot in &occurrence.block.slots {
            match seen.get_mut(&slot.name) {
                Some(count) => *count += 1,
                None => {
                    seen.insert(slot.name.clone(), 1);
                    order.push((slot.name.clone(), slot.kind));
                }
            }
        }
    }

    let total = group.occurrences.len();
    order
        .into_iter()
        .map(|(name, kind)| SuggestedField {
            required: seen.get(&name).copied().unwrap_or(0) == total,
            field_type: field_type(kind),
            name,
        })
        .collect()
}

fn field_type(kind: SlotKind) -> FieldType {
    match kind {
        SlotKind::Text => FieldType::Text,
        SlotKind::Link => FieldType::Url,
        SlotKind::Image => FieldType::Image,
        SlotKind::Date => FieldType::Date,
        SlotKind::Number => FieldType::Number,
    }
}

fn infer_type(fields: &[SuggestedField], tag: &str) -> String {
    let has = |name: &str| fields.iter().any(|f| f.name == name);

    let kind = if has("price") {
        "product"
    } else if has("date") && has("title") {
        "teaser"
    } else if has("image") && has("title") {
        "card"
    } else if has("author") {
        "byline"
    } else {
        tag
    };
    kind.to_string()
}

/// Fraction of the referenced types' pages that carry the object
fn coverage(member_pages: &HashSet<&str>, referenced: &[&PageType]) -> f64 {
    let type_pages: HashSet<&str> = referenced
        .iter()
        .flat_map(|t| t.page_ids.iter().map(String::as_str))
        .collect();
    if type_pages.is_empty() {
        return 0.0;
    }
    let covered = type_pages.iter().filter(|id| member_pages.contains(*id)).count();
    covered as f64 / type_pages.len() as f64
}

/// Mean fraction of suggested fields present per instance
fn consistency(instances: &[ObjectInstance], fields: &[SuggestedField]) -> f64 {
    if instances.is_empty() || fields.is_empty() {
        return 0.0;
    }
    let total: f64 = instances
        .iter()
        .map(|instance| {
            let present = fields
                .iter()
                .filter(|f| instance.values.contains_key(&f.name))
                .count();
            present as f64 / fields.len() as f64
        })
        .sum();
    total / instances.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockSlot, PageSnapshot, PageTypeFeatures};

    fn slot(name: &str, kind: SlotKind, value: &str) -> BlockSlot {
        BlockSlot {
            name: name.to_string(),
            kind,
            value: value.to_string(),
        }
    }

    fn product_card(title: &str, with_price: bool) -> ContentBlock {
        let mut slots = vec![
            slot("image", SlotKind::Image, "https://example.com/p.jpg"),
            slot("title", SlotKind::Text, title),
        ];
        if with_price {
            slots.push(slot("price", SlotKind::Number, "$10"));
        }
        ContentBlock {
            tag: "li".into(),
            class_hint: Some("product-card".into()),
            signature: "li(img+h3+span)".into(),
            slots,
        }
    }

    fn page(id: &str, blocks: Vec<ContentBlock>) -> Page {
        let snapshot = PageSnapshot {
            final_url: format!("https://example.com/{}", id),
            status: 200,
            blocks,
            ..Default::default()
        };
        Page::from_snapshot(id.to_string(), snapshot, 1)
    }

    fn page_type(id: &str, page_ids: &[&str]) -> PageType {
        PageType {
            id: id.to_string(),
            name: id.to_string(),
            page_count: page_ids.len(),
            confidence: 1.0,
            url_pattern: None,
            examples: Vec::new(),
            features: PageTypeFeatures::default(),
            page_ids: page_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_detects_recurring_product_card() {
        let pages = vec![
            page("a", vec![product_card("Lamp", true), product_card("Desk", true)]),
            page("b", vec![product_card("Chair", true)]),
            page("c", vec![]),
        ];
        let types = vec![page_type("shop", &["a", "b"]), page_type("home", &["c"])];

        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &types, &AnalysisConfig::default(), &cancel).unwrap();

        assert_eq!(objects.len(), 1);
        let object = &objects[0];
        assert_eq!(object.id, "obj-product-1");
        assert_eq!(object.object_type, "product");
        assert_eq!(object.name, "Product Card");
        assert_eq!(object.instances.len(), 3);
        assert_eq!(object.instances[0].values["title"], "Lamp");
        assert_eq!(object.page_type_refs, vec!["shop"]);
        assert_eq!(object.confidence, 1.0);

        let price = object.suggested_fields.iter().find(|f| f.name == "price").unwrap();
        assert_eq!(price.field_type, FieldType::Number);
        assert!(price.required);
    }

    #[test]
    fn test_optional_field_and_confidence() {
        let pages = vec![
            page("a", vec![product_card("Lamp", true)]),
            page("b", vec![product_card("Chair", false)]),
            page("c", vec![]),
        ];
        let types = vec![page_type("shop", &["a", "b", "c"])];

        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &types, &AnalysisConfig::default(), &cancel).unwrap();
        let object = &objects[0];

        let price = object.suggested_fields.iter().find(|f| f.name == "price").unwrap();
        assert!(!price.required);
        let title = object.suggested_fields.iter().find(|f| f.name == "title").unwrap();
        assert!(title.required);

        // coverage 2/3, consistency (3/3 + 2/3) / 2
        let expected = 0.5 * (2.0 / 3.0) + 0.5 * (5.0 / 6.0);
        assert!((object.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_single_page_blocks_ignored() {
        let pages = vec![
            page("a", vec![product_card("Lamp", true), product_card("Desk", true)]),
            page("b", vec![]),
        ];
        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &[], &AnalysisConfig::default(), &cancel).unwrap();
        assert!(objects.is_empty());
    }

    #[test]
    fn test_merge_compares_against_first_signature() {
        let block = |signature: &str| {
            let mut card = product_card("Lamp", false);
            card.signature = signature.into();
            card
        };
        // h3+img+span ~ h3+img+time at 3/5; img+time+p only reaches 1/2
        // against their union and 1/3 against the first signature
        let blocks = vec![
            block("li(h3+img+span)"),
            block("li(h3+img+time)"),
            block("li(img+time+p)"),
        ];
        let pages = vec![page("a", blocks.clone()), page("b", blocks)];
        let config = AnalysisConfig {
            object_similarity: 0.5,
            ..Default::default()
        };

        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &[], &config, &cancel).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].instances.len(), 4);
        assert_eq!(objects[1].instances.len(), 2);
    }

    #[test]
    fn test_similar_signatures_merge() {
        let mut variant = product_card("Stool", true);
        variant.signature = "li(img+h3+span+a)".into();
        variant.slots.push(slot("link", SlotKind::Link, "https://example.com/stool"));

        let pages = vec![
            page("a", vec![product_card("Lamp", true)]),
            page("b", vec![product_card("Desk", true)]),
            page("c", vec![variant.clone()]),
            page("d", vec![variant]),
        ];
        let config = AnalysisConfig {
            object_similarity: 0.75,
            ..Default::default()
        };

        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &[], &config, &cancel).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].instances.len(), 4);

        let link = objects[0]
            .suggested_fields
            .iter()
            .find(|f| f.name == "link")
            .unwrap();
        assert_eq!(link.field_type, FieldType::Url);
        assert!(!link.required);
    }

    #[test]
    fn test_different_tags_stay_apart() {
        let mut article = product_card("Post", false);
        article.tag = "article".into();
        article.class_hint = None;
        article.signature = "article(img+h3+span)".into();
        article.slots.push(slot("date", SlotKind::Date, "2024-01-01"));

        let pages = vec![
            page("a", vec![product_card("Lamp", true), article.clone()]),
            page("b", vec![product_card("Desk", true), article]),
        ];
        let cancel = AtomicBool::new(false);
        let objects = detect_objects(&pages, &[], &AnalysisConfig::default(), &cancel).unwrap();

        assert_eq!(objects.len(), 2);
        let types: Vec<&str> = objects.iter().map(|o| o.object_type.as_str()).collect();
        assert!(types.contains(&"product"));
        assert!(types.contains(&"teaser"));
        assert!(objects.iter().all(|o| !o.instances.is_empty()));
    }

    #[test]
    fn test_cancelled() {
        let pages = vec![page("a", vec![product_card("Lamp", true)])];
        let cancel = AtomicBool::new(true);
        let result = detect_objects(&pages, &[], &AnalysisConfig::default(), &cancel);
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn test_zero_pages_is_an_error() {
        let cancel = AtomicBool::new(false);
        let result = detect_objects(&[], &[], &AnalysisConfig::default(), &cancel);
        assert!(matches!(result, Err(AnalysisError::NoPages)));
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["li", "img", "h3"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["li", "img", "h3", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(jaccard(&a, &b), 0.75);
    }
}
