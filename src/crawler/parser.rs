//! HTML parser for extracting page content and links
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow, with the DOM zone each was found in
//! - Title, meta tags, headings, language and JSON-LD
//! - Main content text, its hash and word/media counts
//! - Structural content blocks for object detection

use crate::model::{BlockSlot, ContentBlock, Heading, LinkZone, PageLink, SlotKind};
use crate::url::normalize_with_base;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Upper bound on blocks kept per page
const MAX_BLOCKS_PER_PAGE: usize = 64;

/// Tags whose text never counts as content
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Page chrome dropped when falling back to the whole body
const CHROME_TAGS: &[&str] = &["header", "nav", "footer", "aside"];

/// Tags that may form a content block
const BLOCK_TAGS: &[&str] = &[
    "article",
    "section",
    "li",
    "figure",
    "aside",
    "blockquote",
    "div",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub canonical: Option<String>,
    pub meta: BTreeMap<String, String>,
    pub headings: Vec<Heading>,
    pub lang: Option<String>,
    pub json_ld: Vec<serde_json::Value>,

    /// Normalized, deduplicated http(s) links in document order
    pub links: Vec<PageLink>,

    /// Whitespace-collapsed main content text
    pub main_content: Option<String>,

    /// SHA-256 of `main_content` (hex)
    pub content_hash: String,

    pub word_count: usize,
    pub media_count: usize,
    pub blocks: Vec<ContentBlock>,
}

/// Parses HTML content and extracts everything a page record carries
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Anything that is not http(s) after resolution
///
/// `rel="nofollow"` links are followed.
///
/// # Example
///
/// ```
/// use site_strata::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let main_root = find_main_root(&document);
    let main_text = main_root
        .map(|root| collapse_whitespace(&collect_text(root, main_root_is_body(root))))
        .unwrap_or_default();

    let media_count = main_root.map(count_media).unwrap_or(0);
    let blocks = main_root
        .map(|root| extract_blocks(root, base_url))
        .unwrap_or_default();

    ParsedPage {
        title: extract_title(&document),
        canonical: extract_canonical(&document, base_url),
        meta: extract_meta(&document),
        headings: extract_headings(&document),
        lang: extract_lang(&document),
        json_ld: extract_json_ld(&document),
        links: extract_links(&document, base_url),
        content_hash: content_hash(&main_text),
        word_count: main_text.split_whitespace().count(),
        main_content: Some(main_text).filter(|t| !t.is_empty()),
        media_count,
        blocks,
    }
}

/// Hashes whitespace-collapsed text; near-identical renders hash the same
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collapse_whitespace(text).as_bytes());
    hex::encode(hasher.finalize())
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn extract_canonical(document: &Html, base_url: &Url) -> Option<String> {
    let canonical_selector = selector("link[rel='canonical'][href]")?;

    document
        .select(&canonical_selector)
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| normalize_with_base(href, base_url).ok())
        .map(|url| url.to_string())
}

/// Collects `<meta>` tags keyed by name, property or http-equiv
///
/// Keys are lowercased; the first occurrence of a key wins.
fn extract_meta(document: &Html) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let Some(meta_selector) = selector("meta[content]") else {
        return meta;
    };

    for element in document.select(&meta_selector) {
        let attrs = element.value();
        let key = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .or_else(|| attrs.attr("http-equiv"));

        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            let key = key.trim().to_lowercase();
            if !key.is_empty() {
                meta.entry(key).or_insert_with(|| content.trim().to_string());
            }
        }
    }

    meta
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let Some(heading_selector) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&heading_selector)
        .filter_map(|element| {
            let level = element.value().name()[1..].parse::<u8>().ok()?;
            let text = element_text(element);
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect()
}

fn extract_lang(document: &Html) -> Option<String> {
    let html_selector = selector("html[lang]")?;
    document
        .select(&html_selector)
        .next()
        .and_then(|element| element.value().attr("lang"))
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let Some(script_selector) = selector("script[type='application/ld+json']") else {
        return Vec::new();
    };

    document
        .select(&script_selector)
        .filter_map(|element| {
            let raw = element.text().collect::<String>();
            match serde_json::from_str::<serde_json::Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Some(a_selector) = selector("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if !seen.insert(url.clone()) {
            continue;
        }

        let mut text = element_text(element);
        if text.is_empty() {
            text = element
                .value()
                .attr("aria-label")
                .or_else(|| element.value().attr("title"))
                .map(collapse_whitespace)
                .unwrap_or_default();
        }

        links.push(PageLink {
            url,
            text,
            zone: link_zone(element),
        });
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    normalize_with_base(href, base_url)
        .ok()
        .map(|url| url.to_string())
}

fn is_breadcrumb_container(element: &Element) -> bool {
    let mentions = |value: Option<&str>| {
        value.is_some_and(|v| v.to_ascii_lowercase().contains("breadcrumb"))
    };

    mentions(element.attr("aria-label"))
        || mentions(element.attr("class"))
        || mentions(element.attr("id"))
        || mentions(element.attr("itemtype"))
}

/// Decides the DOM zone of a link from its ancestors
///
/// Breadcrumb containers win over footers, footers over navs, navs over
/// headers; anything else is body.
fn link_zone(link: ElementRef<'_>) -> LinkZone {
    let mut zone = LinkZone::Body;

    for ancestor in link.ancestors() {
        let Some(element) = ancestor.value().as_element() else {
            continue;
        };

        let role = element.attr("role").unwrap_or("");
        let id = element.attr("id").unwrap_or("");
        let candidate = if is_breadcrumb_container(element) {
            LinkZone::Breadcrumb
        } else if element.name() == "footer" || role == "contentinfo" || id == "footer" {
            LinkZone::Footer
        } else if element.name() == "nav" || role == "navigation" || id == "nav" {
            LinkZone::Nav
        } else if element.name() == "header" || role == "banner" || id == "header" {
            LinkZone::Header
        } else {
            continue;
        };

        if zone_rank(candidate) > zone_rank(zone) {
            zone = candidate;
        }
    }

    zone
}

fn zone_rank(zone: LinkZone) -> u8 {
    match zone {
        LinkZone::Body => 0,
        LinkZone::Header => 1,
        LinkZone::Nav => 2,
        LinkZone::Footer => 3,
        LinkZone::Breadcrumb => 4,
    }
}

/// Picks the element holding the main content
///
/// `<main>`, then `<article>`, then `[role=main]`, else `<body>`.
fn find_main_root(document: &Html) -> Option<ElementRef<'_>> {
    ["main", "article", "[role='main']", "body"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).next())
}

fn main_root_is_body(root: ElementRef<'_>) -> bool {
    root.value().name() == "body"
}

/// Collects text below `root`, skipping scripts and, for a body fallback,
/// the page chrome
fn collect_text(root: ElementRef<'_>, skip_chrome: bool) -> String {
    let mut out = String::new();
    collect_text_into(root, skip_chrome, &mut out);
    out
}

fn collect_text_into(element: ElementRef<'_>, skip_chrome: bool, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                let name = el.name();
                if NON_CONTENT_TAGS.contains(&name) {
                    continue;
                }
                if skip_chrome && (CHROME_TAGS.contains(&name) || is_breadcrumb_container(el)) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text_into(child_ref, skip_chrome, out);
                }
            }
            _ => {}
        }
    }
}

fn count_media(root: ElementRef<'_>) -> usize {
    selector("img, video, audio, iframe, picture")
        .map(|sel| {
            root.select(&sel)
                .filter(|el| {
                    // <img> inside <picture> is the same media item
                    !(el.value().name() == "img"
                        && el
                            .parent()
                            .and_then(|p| p.value().as_element().map(|e| e.name() == "picture"))
                            .unwrap_or(false))
                })
                .count()
        })
        .unwrap_or(0)
}

/// Finds repeated structural fragments below `root`
///
/// A block is an element from [`BLOCK_TAGS`] with at least two element
/// children that yields at least two distinct slots and holds no smaller
/// block itself.
fn extract_blocks(root: ElementRef<'_>, base_url: &Url) -> Vec<ContentBlock> {
    let Some(block_selector) = selector(&BLOCK_TAGS.join(", ")) else {
        return Vec::new();
    };

    let candidates: Vec<(ElementRef<'_>, Vec<BlockSlot>)> = root
        .select(&block_selector)
        .filter(|el| el.children().filter_map(ElementRef::wrap).count() >= 2)
        .filter_map(|el| {
            let slots = extract_slots(el, base_url);
            (slots.len() >= 2).then_some((el, slots))
        })
        .collect();

    let candidate_ids: HashSet<_> = candidates.iter().map(|(el, _)| el.id()).collect();

    candidates
        .into_iter()
        .filter(|(el, _)| {
            // Keep innermost blocks only
            !el.descendants()
                .skip(1)
                .any(|node| candidate_ids.contains(&node.id()))
        })
        .take(MAX_BLOCKS_PER_PAGE)
        .map(|(el, slots)| ContentBlock {
            tag: el.value().name().to_string(),
            class_hint: el.value().classes().next().map(|c| c.to_lowercase()),
            signature: block_signature(el),
            slots,
        })
        .collect()
}

/// `tag(child+child+...)` over direct element children, consecutive repeats
/// collapsed
fn block_signature(element: ElementRef<'_>) -> String {
    let mut children: Vec<String> = Vec::new();
    for child in element.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        let token = match child.value().attr("role") {
            Some(role) => format!("{}[{}]", name, role),
            None => name.to_string(),
        };
        if children.last() != Some(&token) {
            children.push(token);
        }
    }
    format!("{}({})", element.value().name(), children.join("+"))
}

/// Captures the named values of a block, each name at most once
fn extract_slots(block: ElementRef<'_>, base_url: &Url) -> Vec<BlockSlot> {
    let mut slots: Vec<BlockSlot> = Vec::new();
    let mut push = |name: &str, kind: SlotKind, value: String| {
        let value = collapse_whitespace(&value);
        if !value.is_empty() && !slots.iter().any(|s| s.name == name) {
            slots.push(BlockSlot {
                name: name.to_string(),
                kind,
                value,
            });
        }
    };

    for node in block.descendants().skip(1) {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let attrs = el.value();
        let name = attrs.name();
        let class = attrs.attr("class").unwrap_or("").to_ascii_lowercase();

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                push("title", SlotKind::Text, element_text(el));
            }
            "img" => {
                if let Some(src) = attrs
                    .attr("src")
                    .and_then(|src| base_url.join(src).ok())
                {
                    push("image", SlotKind::Image, src.to_string());
                }
            }
            "a" => {
                if let Some(href) = attrs.attr("href").and_then(|h| resolve_link(h, base_url)) {
                    push("link", SlotKind::Link, href);
                }
            }
            "time" => {
                let value = attrs
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(el));
                push("date", SlotKind::Date, value);
            }
            "p" => push("description", SlotKind::Text, element_text(el)),
            _ => {}
        }

        if class.contains("price") || (is_leaf(el) && looks_like_price(&element_text(el))) {
            push("price", SlotKind::Number, element_text(el));
        }
        if class.contains("author") || attrs.attr("rel") == Some("author") {
            push("author", SlotKind::Text, element_text(el));
        }
    }

    slots
}

fn is_leaf(element: ElementRef<'_>) -> bool {
    element.children().all(|c| !c.value().is_element())
}

/// A currency symbol directly followed by a digit (`$19`, `€ 4,50`)
pub(crate) fn looks_like_price(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '$' | '€' | '£' | '¥') {
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                return true;
            }
        }
    }
    false
}
