//! Parses and validates every untrusted input that reaches the service:
//! query parameters, path segments, JSON bodies, SVG payloads, and
//! blob-store keys.

use crate::error::ApiError;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::sync::OnceLock;

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").unwrap())
}

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#([0-9a-fA-F]{3}){1,2}$").unwrap())
}

fn named_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z]+$").unwrap())
}

fn attr_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-_:.]*$").unwrap())
}

/// Parse an icon/category `size` parameter. `None` input yields the default.
pub fn parse_size(s: Option<&str>) -> Result<u32, ApiError> {
    match s {
        None => Ok(24),
        Some(raw) => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::InvalidSize(format!("invalid size: '{raw}'")))?;
            if (8..=512).contains(&value) {
                Ok(value as u32)
            } else {
                Err(ApiError::InvalidSize(format!(
                    "size must be between 8 and 512, got {value}"
                )))
            }
        }
    }
}

/// Parse a `strokeWidth`/`stroke` parameter. `None` yields the default `2.0`.
pub fn parse_stroke_width(s: Option<&str>) -> Result<f64, ApiError> {
    match s {
        None => Ok(2.0),
        Some(raw) => {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::InvalidParameter(format!("invalid stroke width: '{raw}'")))?;
            if (0.5..=3.0).contains(&value) {
                Ok(value)
            } else {
                Err(ApiError::InvalidParameter(format!(
                    "stroke width must be between 0.5 and 3, got {value}"
                )))
            }
        }
    }
}

/// Parse a `color` parameter: `currentColor` (default), a hex color, or a
/// CSS named color.
pub fn parse_color(s: Option<&str>) -> Result<String, ApiError> {
    match s {
        None => Ok("currentColor".to_string()),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == "currentColor" {
                return Ok("currentColor".to_string());
            }
            if hex_color_re().is_match(trimmed) {
                return Ok(trimmed.to_string());
            }
            if named_color_re().is_match(trimmed) {
                return Ok(trimmed.to_lowercase());
            }
            Err(ApiError::InvalidColor(format!("invalid color: '{raw}'")))
        }
    }
}

/// Parse a `rotate` parameter in degrees. Normalization into `[0, 360)`
/// happens in the transform engine, not here.
pub fn parse_rotate(s: Option<&str>) -> Result<Option<f64>, ApiError> {
    match s {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ApiError::InvalidParameter(format!("invalid rotate: '{raw}'"))),
    }
}

/// Parse a boolean `mirror` flag. `true`/`1`/`yes`/`on` (case-insensitive)
/// are true; everything else is false.
pub fn parse_mirror(s: Option<&str>) -> bool {
    match s {
        None => false,
        Some(raw) => matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
    }
}

/// Parse a pagination `limit`, clamped to `[1, max]`, floored if fractional.
pub fn parse_limit(s: Option<&str>, default: u32, max: u32) -> u32 {
    let Some(raw) = s else { return default };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => (v.floor() as i64).clamp(1, max as i64) as u32,
        _ => default,
    }
}

/// Parse a pagination `offset`, floored, never negative.
pub fn parse_offset(s: Option<&str>) -> u32 {
    let Some(raw) = s else { return 0 };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.floor() as u32,
        _ => 0,
    }
}

/// Validate an icon `name`: `^[a-z0-9-]+$`, length 1..100.
pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > 100 || !name_re().is_match(name) {
        return Err(ApiError::InvalidParameter(format!(
            "invalid icon name: '{name}'"
        )));
    }
    Ok(())
}

/// Validate a `source`: `^[a-z0-9-]+$`, length 1..50.
pub fn validate_source(source: &str) -> Result<(), ApiError> {
    if source.is_empty() || source.len() > 50 || !name_re().is_match(source) {
        return Err(ApiError::InvalidParameter(format!(
            "invalid source: '{source}'"
        )));
    }
    Ok(())
}

const DANGEROUS_URL_SCHEMES: [&str; 5] =
    ["javascript:", "vbscript:", "data:text/html", "file:", "about:"];

/// Validate a single custom attribute `(key, value)` pair.
pub fn validate_custom_attribute(key: &str, value: &str) -> Result<(), ApiError> {
    if !attr_name_re().is_match(key) {
        return Err(ApiError::InvalidParameter(format!(
            "invalid custom attribute name: '{key}'"
        )));
    }
    let lower_key = key.to_lowercase();
    if lower_key.starts_with("on") {
        return Err(ApiError::InvalidParameter(format!(
            "event-handler attributes are not allowed: '{key}'"
        )));
    }
    let lower_value = value.to_lowercase();
    if DANGEROUS_URL_SCHEMES
        .iter()
        .any(|scheme| lower_value.contains(scheme))
    {
        return Err(ApiError::InvalidParameter(format!(
            "unsafe attribute value for '{key}'"
        )));
    }
    Ok(())
}

/// Sanitize a blob-store key: reject traversal, absolute paths, and
/// anything outside a conservative character allowlist.
pub fn sanitize_key(key: &str) -> Option<String> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return None;
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return None;
    }
    // Collapse runs of '/'.
    let mut collapsed = String::with_capacity(key.len());
    let mut last_was_slash = false;
    for c in key.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.contains("//") {
        return None;
    }
    Some(collapsed)
}

/// Allowlisted SVG element names.
const ALLOWED_ELEMENTS: &[&str] = &[
    "svg", "g", "path", "circle", "ellipse", "line", "polygon", "polyline", "rect", "text",
    "tspan", "defs", "use", "symbol", "linearGradient", "radialGradient", "stop", "clipPath",
    "mask", "pattern", "filter", "feGaussianBlur", "feOffset", "feBlend", "feColorMatrix",
    "title", "desc", "metadata",
];

/// Allowlisted SVG attribute names.
const ALLOWED_ATTRIBUTES: &[&str] = &[
    "id", "class", "style", "transform", "fill", "stroke", "stroke-width", "stroke-linecap",
    "stroke-linejoin", "stroke-dasharray", "stroke-dashoffset", "opacity", "fill-opacity",
    "stroke-opacity", "d", "cx", "cy", "r", "rx", "ry", "x", "y", "x1", "y1", "x2", "y2",
    "points", "width", "height", "font-family", "font-size", "font-weight", "text-anchor",
    "dominant-baseline", "viewBox", "preserveAspectRatio", "xmlns", "xmlns:xlink", "version",
    "offset", "stop-color", "stop-opacity", "gradientUnits", "gradientTransform", "spreadMethod",
    "xlink:href", "href", "clip-path", "mask", "clip-rule", "filter", "stdDeviation", "in", "in2",
    "mode", "result", "type", "values", "dur", "repeatCount", "role", "aria-label", "aria-hidden",
    "focusable",
];

const MAX_SVG_PAYLOAD_BYTES: usize = 1_048_576;

/// Result of sanitizing an untrusted SVG payload.
pub struct SanitizeOutcome {
    /// `Some` only when no threat was detected; `None` on any rejection.
    /// Partial sanitization is never exposed.
    pub sanitized: Option<String>,
    pub threats: Vec<String>,
}

/// Sanitize an SVG payload by parsing it as XML (not regex) and rejecting
/// any element or attribute outside the allowlist.
pub fn sanitize_svg(payload: &str) -> SanitizeOutcome {
    let mut threats = Vec::new();

    if payload.len() > MAX_SVG_PAYLOAD_BYTES {
        threats.push("PAYLOAD_TOO_LARGE".to_string());
        return SanitizeOutcome {
            sanitized: None,
            threats,
        };
    }

    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(false);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if !ALLOWED_ELEMENTS.iter().any(|allowed| *allowed == name) {
                    threats.push(format!("DISALLOWED_ELEMENT:{name}"));
                }
                for attr in e.attributes().flatten() {
                    let attr_name = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    if !ALLOWED_ATTRIBUTES
                        .iter()
                        .any(|allowed| *allowed == attr_name)
                    {
                        threats.push(format!("DISALLOWED_ATTRIBUTE:{attr_name}"));
                        continue;
                    }
                    if let Ok(value) = attr.decode_and_unescape_value(reader.decoder()) {
                        let lower = value.to_lowercase();
                        if DANGEROUS_URL_SCHEMES.iter().any(|s| lower.contains(s)) {
                            threats.push(format!("UNSAFE_URL:{attr_name}"));
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(_) => {
                threats.push("MALFORMED_XML".to_string());
                break;
            }
        }
    }

    // Script tags and inline event handlers never appear in the allowlist,
    // but a direct substring scan catches payloads that confuse the
    // tolerant XML reader (e.g. unbalanced tags around a <script> block).
    let lower_payload = payload.to_lowercase();
    if lower_payload.contains("<script") {
        threats.push("SCRIPT_TAG".to_string());
    }
    if ON_EVENT_RE().is_match(&lower_payload) {
        threats.push("EVENT_HANDLER".to_string());
    }

    if threats.is_empty() {
        SanitizeOutcome {
            sanitized: Some(payload.to_string()),
            threats,
        }
    } else {
        SanitizeOutcome {
            sanitized: None,
            threats,
        }
    }
}

#[allow(non_snake_case)]
pub(crate) fn ON_EVENT_RE() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\son\w+\s*=").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_boundaries() {
        assert!(parse_size(Some("7")).is_err());
        assert!(parse_size(Some("513")).is_err());
        assert_eq!(parse_size(Some("8")).unwrap(), 8);
        assert_eq!(parse_size(Some("512")).unwrap(), 512);
        assert_eq!(parse_size(None).unwrap(), 24);
    }

    #[test]
    fn stroke_width_boundaries() {
        assert!(parse_stroke_width(Some("0.4")).is_err());
        assert!(parse_stroke_width(Some("3.1")).is_err());
        assert_eq!(parse_stroke_width(Some("0.5")).unwrap(), 0.5);
        assert_eq!(parse_stroke_width(Some("3")).unwrap(), 3.0);
    }

    #[test]
    fn mirror_parsing() {
        assert!(parse_mirror(Some(" true ")));
        assert!(!parse_mirror(Some("no")));
        assert!(parse_mirror(Some("ON")));
    }

    #[test]
    fn color_idempotent() {
        for c in ["#fff", "#FF00FF", "currentColor", "red"] {
            let once = parse_color(Some(c)).unwrap();
            let twice = parse_color(Some(&once)).unwrap();
            assert_eq!(once, twice);
        }
        assert!(parse_color(Some("not a color!")).is_err());
    }

    #[test]
    fn key_sanitization() {
        assert_eq!(sanitize_key("lucide/home.svg").as_deref(), Some("lucide/home.svg"));
        assert!(sanitize_key("../etc/passwd").is_none());
        assert!(sanitize_key("/abs/path").is_none());
        assert_eq!(sanitize_key("a//b").as_deref(), None);
    }

    #[test]
    fn sanitizer_rejects_script() {
        let out = sanitize_svg("<svg><script>alert(1)</script></svg>");
        assert!(out.sanitized.is_none());
        assert!(!out.threats.is_empty());
    }

    #[test]
    fn sanitizer_rejects_event_handler() {
        let out = sanitize_svg(r#"<svg onload="evil()"><path d="M0 0"/></svg>"#);
        assert!(out.sanitized.is_none());
    }

    #[test]
    fn sanitizer_rejects_javascript_url() {
        let out = sanitize_svg(r#"<svg><a href="javascript:alert(1)"><path d="M0 0"/></a></svg>"#);
        assert!(out.sanitized.is_none());
    }

    #[test]
    fn sanitizer_accepts_clean_svg() {
        let out = sanitize_svg(r#"<svg viewBox="0 0 24 24"><path d="M0 0" fill="currentColor"/></svg>"#);
        assert!(out.sanitized.is_some());
        assert!(out.threats.is_empty());
    }
}
