//! Batch and bulk icon operations: per-icon independent processing for
//! `/icons/batch`, and multi-format archive composition for `/bulk`.

use std::io::Write;

use crate::error::ApiError;

pub const MAX_BATCH_ICONS: usize = 50;
pub const MAX_BULK_ICONS: usize = 100;
const MAX_BULK_UNCOMPRESSED_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchItemResult {
    pub source: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchItemError {
    pub code: String,
    pub message: String,
}

impl From<ApiError> for BatchItemError {
    fn from(e: ApiError) -> Self {
        BatchItemError {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

pub fn validate_batch_size(count: usize) -> Result<(), ApiError> {
    if count == 0 {
        return Err(ApiError::NoValidIcons);
    }
    if count > MAX_BATCH_ICONS {
        return Err(ApiError::BatchLimitExceeded {
            requested: count,
            max: MAX_BATCH_ICONS,
        });
    }
    Ok(())
}

pub fn validate_bulk_size(count: usize) -> Result<(), ApiError> {
    if count == 0 {
        return Err(ApiError::NoValidIcons);
    }
    if count > MAX_BULK_ICONS {
        return Err(ApiError::BulkLimitExceeded {
            requested: count,
            max: MAX_BULK_ICONS,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkFormat {
    Zip,
    SvgBundle,
    JsonSprite,
}

impl BulkFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zip" => Some(Self::Zip),
            "svg-bundle" => Some(Self::SvgBundle),
            "json-sprite" => Some(Self::JsonSprite),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            BulkFormat::Zip => "application/zip",
            BulkFormat::SvgBundle => "image/svg+xml",
            BulkFormat::JsonSprite => "application/json",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            BulkFormat::Zip => "zip",
            BulkFormat::SvgBundle => "svg",
            BulkFormat::JsonSprite => "json",
        }
    }
}

/// One successfully-resolved icon ready for archive composition.
pub struct BulkIcon {
    pub source: String,
    pub name: String,
    pub svg: String,
}

fn sanitized_filename(source: &str, name: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    };
    format!("{}-{}.svg", clean(source), clean(name))
}

/// Build a ZIP archive (store-only, no compression) from resolved icons.
/// Rejects the batch outright if the uncompressed total would exceed the
/// size cap, rather than truncating silently.
pub fn compose_zip(icons: &[BulkIcon]) -> Result<Vec<u8>, ApiError> {
    let total_bytes: u64 = icons.iter().map(|i| i.svg.len() as u64).sum();
    if total_bytes > MAX_BULK_UNCOMPRESSED_BYTES {
        return Err(ApiError::InvalidParameter(format!(
            "bulk archive of {total_bytes} bytes exceeds the {MAX_BULK_UNCOMPRESSED_BYTES} byte cap"
        )));
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        let mut used_names = std::collections::HashSet::new();
        for icon in icons {
            let mut filename = sanitized_filename(&icon.source, &icon.name);
            let mut suffix = 1;
            while !used_names.insert(filename.clone()) {
                filename = format!(
                    "{}-{suffix}.svg",
                    sanitized_filename(&icon.source, &icon.name).trim_end_matches(".svg")
                );
                suffix += 1;
            }
            writer
                .start_file(filename, options)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
            writer
                .write_all(icon.svg.as_bytes())
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
        }
        writer
            .finish()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Build a single SVG document bundling every icon as a `<symbol>`.
pub fn compose_svg_bundle(icons: &[BulkIcon]) -> String {
    let mut out = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none">"#);
    for icon in icons {
        let id = format!("{}-{}", icon.source, icon.name);
        let inner = extract_svg_inner(&icon.svg);
        out.push_str(&format!(r#"<symbol id="{id}">{inner}</symbol>"#));
    }
    out.push_str("</svg>");
    out
}

fn extract_svg_inner(svg: &str) -> String {
    let start = svg.find('>').map(|i| i + 1).unwrap_or(0);
    let end = svg.rfind("</svg>").unwrap_or(svg.len());
    if start < end {
        svg[start..end].to_string()
    } else {
        String::new()
    }
}

/// Build a JSON document mapping `source:name` to its SVG body.
pub fn compose_json_sprite(icons: &[BulkIcon]) -> serde_json::Value {
    let entries: serde_json::Map<String, serde_json::Value> = icons
        .iter()
        .map(|icon| {
            (
                format!("{}:{}", icon.source, icon.name),
                serde_json::json!({ "svg": icon.svg }),
            )
        })
        .collect();
    serde_json::json!({ "icons": entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_icons() -> Vec<BulkIcon> {
        vec![
            BulkIcon {
                source: "lucide".to_string(),
                name: "home".to_string(),
                svg: r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#.to_string(),
            },
            BulkIcon {
                source: "lucide".to_string(),
                name: "settings".to_string(),
                svg: r#"<svg viewBox="0 0 24 24"><path d="M1 1"/></svg>"#.to_string(),
            },
        ]
    }

    #[test]
    fn zip_composition_succeeds_under_cap() {
        let zip_bytes = compose_zip(&sample_icons()).unwrap();
        assert!(!zip_bytes.is_empty());
        assert_eq!(&zip_bytes[0..2], b"PK");
    }

    #[test]
    fn svg_bundle_wraps_each_icon_in_a_symbol() {
        let bundle = compose_svg_bundle(&sample_icons());
        assert!(bundle.contains(r#"<symbol id="lucide-home">"#));
        assert!(bundle.contains(r#"<symbol id="lucide-settings">"#));
    }

    #[test]
    fn json_sprite_keys_by_source_and_name() {
        let sprite = compose_json_sprite(&sample_icons());
        assert!(sprite["icons"]["lucide:home"]["svg"].is_string());
    }

    #[test]
    fn batch_size_limits_are_enforced() {
        assert!(validate_batch_size(0).is_err());
        assert!(validate_batch_size(MAX_BATCH_ICONS).is_ok());
        assert!(validate_batch_size(MAX_BATCH_ICONS + 1).is_err());
    }

    #[test]
    fn filename_sanitization_strips_unsafe_characters() {
        assert_eq!(sanitized_filename("lucide", "../etc"), "lucide-etc.svg");
    }
}
