//! Static per-source configuration table. Dispatch across icon sources is
//! modelled as a lookup into this table keyed by source id, rather than
//! per-source trait objects.

use crate::models::{License, SourceConfig, Variant};
use std::collections::HashMap;
use std::sync::OnceLock;

fn build_table() -> HashMap<&'static str, SourceConfig> {
    let entries = [
        SourceConfig {
            id: "lucide".to_string(),
            display_name: "Lucide".to_string(),
            description: "Beautiful & consistent icon toolkit".to_string(),
            website: "https://lucide.dev".to_string(),
            repository: "https://github.com/lucide-icons/lucide".to_string(),
            license: License {
                kind: "ISC".to_string(),
                url: "https://github.com/lucide-icons/lucide/blob/main/LICENSE".to_string(),
            },
            variants: vec![Variant::Default],
            default_variant: Variant::Default,
        },
        SourceConfig {
            id: "material".to_string(),
            display_name: "Material Symbols".to_string(),
            description: "Google's Material Design icon set".to_string(),
            website: "https://fonts.google.com/icons".to_string(),
            repository: "https://github.com/google/material-design-icons".to_string(),
            license: License {
                kind: "Apache-2.0".to_string(),
                url: "https://github.com/google/material-design-icons/blob/master/LICENSE"
                    .to_string(),
            },
            variants: vec![Variant::Outline, Variant::Filled],
            default_variant: Variant::Outline,
        },
        SourceConfig {
            id: "heroicons".to_string(),
            display_name: "Heroicons".to_string(),
            description: "Hand-crafted SVG icons by the makers of Tailwind CSS".to_string(),
            website: "https://heroicons.com".to_string(),
            repository: "https://github.com/tailwindlabs/heroicons".to_string(),
            license: License {
                kind: "MIT".to_string(),
                url: "https://github.com/tailwindlabs/heroicons/blob/master/LICENSE".to_string(),
            },
            variants: vec![Variant::Outline, Variant::Solid, Variant::Mini],
            default_variant: Variant::Outline,
        },
        SourceConfig {
            id: "ionicons".to_string(),
            display_name: "Ionicons".to_string(),
            description: "Premium hand-crafted icons from Ionic".to_string(),
            website: "https://ionic.io/ionicons".to_string(),
            repository: "https://github.com/ionic-team/ionicons".to_string(),
            license: License {
                kind: "MIT".to_string(),
                url: "https://github.com/ionic-team/ionicons/blob/main/LICENSE".to_string(),
            },
            variants: vec![Variant::Outline, Variant::Filled],
            default_variant: Variant::Outline,
        },
        SourceConfig {
            id: "feather".to_string(),
            display_name: "Feather".to_string(),
            description: "Simply beautiful open-source icons".to_string(),
            website: "https://feathericons.com".to_string(),
            repository: "https://github.com/feathericons/feather".to_string(),
            license: License {
                kind: "MIT".to_string(),
                url: "https://github.com/feathericons/feather/blob/main/LICENSE".to_string(),
            },
            variants: vec![Variant::Default],
            default_variant: Variant::Default,
        },
    ];

    entries.into_iter().map(|c| (leak(&c.id), c)).collect()
}

fn leak(s: &str) -> &'static str {
    Box::leak(s.to_string().into_boxed_str())
}

static TABLE: OnceLock<HashMap<&'static str, SourceConfig>> = OnceLock::new();

/// The default source used when a request omits `source`.
pub const DEFAULT_SOURCE: &str = "lucide";

pub fn table() -> &'static HashMap<&'static str, SourceConfig> {
    TABLE.get_or_init(build_table)
}

pub fn get(source: &str) -> Option<&'static SourceConfig> {
    table().get(source)
}

/// Resolve the blob-store path suffix for a non-default variant of a
/// source. Variant-to-key mapping is inherently source-specific; unmapped
/// combinations return `None` and the caller surfaces
/// `VARIANT_NOT_AVAILABLE`.
pub fn variant_path_suffix(source: &str, variant: Variant) -> Option<&'static str> {
    let config = get(source)?;
    if !config.variants.contains(&variant) {
        return None;
    }
    if variant == config.default_variant {
        return Some("");
    }
    match (source, variant) {
        ("heroicons", Variant::Outline) => Some("/outline"),
        ("heroicons", Variant::Solid) => Some("/solid"),
        ("heroicons", Variant::Mini) => Some("/20/solid"),
        ("material", Variant::Outline) => Some("/outlined"),
        ("material", Variant::Filled) => Some("/filled"),
        ("ionicons", Variant::Outline) => Some("-outline"),
        ("ionicons", Variant::Filled) => Some(""),
        _ => None,
    }
}

/// List all configured sources with icon counts drawn from the index.
pub fn list_with_counts(
    index: &crate::models::IconIndex,
) -> Vec<serde_json::Value> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in index.icons.values() {
        *counts.entry(record.source.as_str()).or_insert(0) += 1;
    }

    table()
        .values()
        .map(|config| {
            serde_json::json!({
                "id": config.id,
                "displayName": config.display_name,
                "description": config.description,
                "website": config.website,
                "repository": config.repository,
                "license": config.license,
                "variants": config.variants.iter().map(Variant::as_str).collect::<Vec<_>>(),
                "defaultVariant": config.default_variant.as_str(),
                "count": counts.get(config.id.as_str()).copied().unwrap_or(0),
            })
        })
        .collect()
}
