//! Crawled page records and the snapshot a fetch produces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status recorded for pages whose fetch failed below HTTP
pub const SYNTHETIC_FAILURE_STATUS: u16 = 0;

/// DOM region a link was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkZone {
    Header,
    Nav,
    Footer,
    Breadcrumb,
    Body,
}

impl LinkZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Nav => "nav",
            Self::Footer => "footer",
            Self::Breadcrumb => "breadcrumb",
            Self::Body => "body",
        }
    }

    /// Header and nav links both feed the primary navigation
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Header | Self::Nav)
    }
}

impl fmt::Display for LinkZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound link, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub url: String,
    #[serde(default)]
    pub text: String,
    pub zone: LinkZone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Kind of value captured in a block slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Text,
    Link,
    Image,
    Date,
    Number,
}

/// A named value inside a content block (`title`, `image`, `date`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSlot {
    pub name: String,
    pub kind: SlotKind,
    pub value: String,
}

/// A structural fragment of the main content
///
/// `signature` is a tag/role outline of the fragment with text stripped, so
/// two cards rendering different products share a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_hint: Option<String>,
    pub signature: String,
    #[serde(default)]
    pub slots: Vec<BlockSlot>,
}

impl ContentBlock {
    /// Tokens of the structural signature, used for similarity
    pub fn signature_tokens(&self) -> impl Iterator<Item = &str> {
        self.signature
            .split(|c: char| c == '>' || c == '+' || c == '(' || c == ')' || c.is_whitespace())
            .filter(|t| !t.is_empty())
    }
}

/// Everything a single fetch yields, before the scheduler assigns identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    /// URL after redirects, normalized
    pub final_url: String,
    pub status: u16,
    pub redirect_chain: Vec<String>,
    pub canonical: Option<String>,
    pub title: Option<String>,
    pub meta: BTreeMap<String, String>,
    pub headings: Vec<Heading>,
    pub lang: Option<String>,
    pub json_ld: Vec<serde_json::Value>,
    pub links: Vec<PageLink>,
    pub main_content: Option<String>,
    pub content_hash: Option<String>,
    pub screenshot: Option<String>,
    pub word_count: usize,
    pub media_count: usize,
    pub blocks: Vec<ContentBlock>,
}

/// One crawled URL as kept in the page store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// HTTP status; 0 when the fetch failed below HTTP
    pub status: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_chain: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_ld: Vec<serde_json::Value>,
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_content: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub crawled_at: DateTime<Utc>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub media_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ContentBlock>,
}

impl Page {
    /// Builds a page from a fetch snapshot
    ///
    /// `id` must be the page id of the snapshot's final URL. URLs passed
    /// through on the way there stay in `redirect_chain`.
    pub fn from_snapshot(id: String, snapshot: PageSnapshot, depth: u32) -> Self {
        Self {
            id,
            url: snapshot.final_url,
            canonical: snapshot.canonical,
            status: snapshot.status,
            redirect_chain: snapshot.redirect_chain,
            title: snapshot.title,
            meta: snapshot.meta,
            headings: snapshot.headings,
            lang: snapshot.lang,
            json_ld: snapshot.json_ld,
            links: snapshot.links,
            main_content: snapshot.main_content,
            content_hash: snapshot.content_hash,
            screenshot: snapshot.screenshot,
            crawled_at: Utc::now(),
            depth,
            fetch_error: None,
            word_count: snapshot.word_count,
            media_count: snapshot.media_count,
            blocks: snapshot.blocks,
        }
    }

    /// Records a fetch that never produced an HTTP response
    pub fn failed(id: String, url: String, depth: u32, error: impl Into<String>) -> Self {
        Self {
            id,
            url,
            canonical: None,
            status: SYNTHETIC_FAILURE_STATUS,
            redirect_chain: Vec::new(),
            title: None,
            meta: BTreeMap::new(),
            headings: Vec::new(),
            lang: None,
            json_ld: Vec::new(),
            links: Vec::new(),
            main_content: None,
            content_hash: None,
            screenshot: None,
            crawled_at: Utc::now(),
            depth,
            fetch_error: Some(error.into()),
            word_count: 0,
            media_count: 0,
            blocks: Vec::new(),
        }
    }

    /// True for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The path component of the page URL, `/` when unparseable
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    /// Links found in the given zone
    pub fn links_in(&self, zone: LinkZone) -> impl Iterator<Item = &PageLink> {
        self.links.iter().filter(move |l| l.zone == zone)
    }
}
