//! Core data model: icon records, the icon index, the inverted index and
//! the synonym map.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The style families a source may support for an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Outline,
    Solid,
    Mini,
    Filled,
    Duotone,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Outline => "outline",
            Variant::Solid => "solid",
            Variant::Mini => "mini",
            Variant::Filled => "filled",
            Variant::Duotone => "duotone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Variant::Default),
            "outline" => Some(Variant::Outline),
            "solid" => Some(Variant::Solid),
            "mini" => Some(Variant::Mini),
            "filled" => Some(Variant::Filled),
            "duotone" => Some(Variant::Duotone),
            _ => None,
        }
    }
}

/// License metadata for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// One entry in the icon index. Identity is `(source, name)`, joined as
/// `source:name` for the `id` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconRecord {
    pub id: String,
    pub name: String,
    pub source: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(rename = "viewBox")]
    pub view_box: String,
    /// Opaque content key resolved against the blob store.
    pub path: String,
}

fn default_dimension() -> u32 {
    24
}

impl IconRecord {
    pub fn key(source: &str, name: &str) -> String {
        format!("{source}:{name}")
    }
}

/// Aggregate statistics carried alongside the icon index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexStats {
    #[serde(rename = "totalIcons")]
    pub total_icons: usize,
    pub sources: Vec<String>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

/// The full icon index: `source:name` -> record, plus aggregate stats.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IconIndex {
    pub icons: HashMap<String, IconRecord>,
    pub stats: IndexStats,
}

impl IconIndex {
    pub fn get(&self, source: &str, name: &str) -> Option<&IconRecord> {
        self.icons.get(&IconRecord::key(source, name))
    }
}

/// Posting list for one term of the inverted index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Posting {
    #[serde(rename = "iconIds")]
    pub icon_ids: Vec<String>,
    pub df: usize,
}

/// Inverted index over icon names/tags, plus prefix, source and category
/// posting lists for fast candidate gathering.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvertedIndex {
    pub terms: HashMap<String, Posting>,
    pub prefixes: HashMap<String, Vec<String>>,
    pub sources: HashMap<String, Vec<String>>,
    pub categories: HashMap<String, Vec<String>>,
    #[serde(rename = "totalDocs")]
    pub total_docs: usize,
}

/// `token -> [token, ...]`. Symmetry is not required.
pub type SynonymMap = HashMap<String, Vec<String>>;

/// Per-source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub description: String,
    pub website: String,
    pub repository: String,
    pub license: License,
    pub variants: Vec<Variant>,
    #[serde(rename = "defaultVariant")]
    pub default_variant: Variant,
}

/// Fully determines a transform's output; also the fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub size: u32,
    pub stroke_width: f64,
    pub color: String,
    pub rotate: Option<f64>,
    pub mirror: bool,
    pub class_name: Option<String>,
    pub custom_attributes: Vec<(String, String)>,
}

impl TransformParams {
    /// Deterministic JSON-ish serialization used as half of the transform
    /// cache key.
    pub fn fingerprint_suffix(&self) -> String {
        let mut attrs: Vec<String> = self
            .custom_attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        attrs.sort();
        format!(
            "size={}&stroke={}&color={}&rotate={}&mirror={}&class={}&attrs={}",
            self.size,
            self.stroke_width,
            self.color,
            self.rotate.map(|r| r.to_string()).unwrap_or_default(),
            self.mirror,
            self.class_name.as_deref().unwrap_or(""),
            attrs.join(";"),
        )
    }
}
