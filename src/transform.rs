//! Deterministic SVG transform engine. Applies size, color, stroke-width,
//! class name, custom attributes and geometric (rotate/mirror) rewrites to
//! an icon's source SVG, in a fixed order so the same inputs always
//! produce byte-identical output.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::TransformParams;

const CACHE_CAPACITY: usize = 1000;

fn root_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(.*?)<svg([^>]*)>(.*)</svg>\s*$").unwrap())
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*"([^"]*)""#).unwrap())
}

fn current_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"currentColor").unwrap())
}

fn stroke_width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"stroke-width\s*=\s*"[^"]*""#).unwrap())
}

/// Apply the six ordered rewrite rules and return the resulting SVG
/// document plus a weak ETag over its bytes.
pub fn apply(svg: &str, params: &TransformParams) -> (String, String) {
    let Some(caps) = root_tag_re().captures(svg) else {
        // Malformed input should have been rejected upstream; fall back to
        // returning the document untouched rather than panicking.
        return (svg.to_string(), weak_etag(svg));
    };

    let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let root_attrs_raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let mut inner = caps.get(3).map(|m| m.as_str()).unwrap_or_default().to_string();

    let mut attrs = parse_attrs(root_attrs_raw);
    let view_box = attrs
        .get("viewBox")
        .cloned()
        .unwrap_or_else(|| "0 0 24 24".to_string());

    // Rule 1: size.
    attrs.insert("width".to_string(), params.size.to_string());
    attrs.insert("height".to_string(), params.size.to_string());

    // Rule 2: color. currentColor is the convention these icon sets use
    // for "inherit from caller"; substitute the resolved color directly.
    if params.color != "currentColor" {
        inner = current_color_re().replace_all(&inner, params.color.as_str()).to_string();
        if let Some(fill) = attrs.get("fill").cloned()
            && fill == "currentColor"
        {
            attrs.insert("fill".to_string(), params.color.clone());
        }
        if let Some(stroke) = attrs.get("stroke").cloned()
            && stroke == "currentColor"
        {
            attrs.insert("stroke".to_string(), params.color.clone());
        }
    }

    // Rule 3: stroke width.
    let sw_value = format!(r#"stroke-width="{}""#, params.stroke_width);
    inner = stroke_width_re().replace_all(&inner, sw_value.as_str()).to_string();
    if attrs.contains_key("stroke-width") {
        attrs.insert("stroke-width".to_string(), params.stroke_width.to_string());
    }

    // Rule 4: class name, merged with any existing class, tokens deduplicated.
    if let Some(class_name) = &params.class_name {
        let mut tokens: Vec<&str> = Vec::new();
        if let Some(existing) = attrs.get("class") {
            for token in existing.split_whitespace() {
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
        }
        for token in class_name.split_whitespace() {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        attrs.insert("class".to_string(), tokens.join(" "));
    }

    // Rule 5: custom attributes, applied last so they can override
    // anything computed above.
    for (key, value) in &params.custom_attributes {
        attrs.insert(key.clone(), value.clone());
    }

    // Rule 6: geometric transforms (rotate/mirror), composed around the
    // viewBox center and prepended to any existing `transform` attribute
    // on the root tag.
    if params.rotate.is_some() || params.mirror {
        let (cx, cy) = view_box_center(&view_box);
        let mut composed = String::new();
        if params.mirror {
            composed.push_str(&format!("scale(-1, 1) translate({}, 0)", -(cx * 2.0)));
        }
        if let Some(deg) = params.rotate {
            let normalized = ((deg % 360.0) + 360.0) % 360.0;
            if !composed.is_empty() {
                composed.push(' ');
            }
            composed.push_str(&format!("rotate({normalized} {cx} {cy})"));
        }
        let merged = match attrs.get("transform") {
            Some(existing) if !existing.is_empty() => format!("{composed} {existing}"),
            _ => composed,
        };
        attrs.insert("transform".to_string(), merged);
    }

    let rebuilt_attrs = serialize_attrs(&attrs);
    let output = format!("{prefix}<svg{rebuilt_attrs}>{inner}</svg>");
    let etag = weak_etag(&output);
    (output, etag)
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    attr_re()
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn serialize_attrs(attrs: &HashMap<String, String>) -> String {
    // Deterministic ordering: keep a stable, human-sensible attribute
    // order rather than hashmap iteration order.
    const ORDER: &[&str] = &[
        "xmlns", "viewBox", "width", "height", "fill", "stroke", "stroke-width",
        "stroke-linecap", "stroke-linejoin", "class", "transform",
    ];
    let mut seen = std::collections::HashSet::new();
    let mut out = String::new();
    for key in ORDER {
        if let Some(value) = attrs.get(*key) {
            out.push_str(&format!(r#" {key}="{value}""#));
            seen.insert(key.to_string());
        }
    }
    let mut rest: Vec<_> = attrs
        .iter()
        .filter(|(k, _)| !seen.contains(*k))
        .collect();
    rest.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in rest {
        out.push_str(&format!(r#" {key}="{value}""#));
    }
    out
}

fn view_box_center(view_box: &str) -> (f64, f64) {
    let parts: Vec<f64> = view_box
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    if parts.len() == 4 {
        (parts[0] + parts[2] / 2.0, parts[1] + parts[3] / 2.0)
    } else {
        (12.0, 12.0)
    }
}

fn weak_etag(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("W/\"{:x}\"", hasher.finish())
}

fn hash_source(svg: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    svg.hash(&mut hasher);
    hasher.finish()
}

struct CacheEntry {
    output: Arc<str>,
    etag: String,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

/// A FIFO-eviction cache over `(source hash, transform params)` -> the
/// rewritten SVG. Unlike the response-level memory cache, reads do not
/// promote an entry's position: popularity doesn't protect a transform
/// result from a full cache, only recency of insertion does.
pub struct TransformCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY)
    }
}

impl TransformCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
        }
    }

    fn key(svg: &str, params: &TransformParams) -> String {
        format!("{:x}:{}", hash_source(svg), params.fingerprint_suffix())
    }

    pub fn get_or_compute(&self, svg: &str, params: &TransformParams) -> (Arc<str>, String) {
        let key = Self::key(svg, params);

        if let Some(entry) = self.inner.lock().entries.get(&key) {
            return (entry.output.clone(), entry.etag.clone());
        }

        let (output, etag) = apply(svg, params);
        let output: Arc<str> = Arc::from(output);

        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(victim) = inner.order.pop_front() {
                inner.entries.remove(&victim);
            }
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                output: output.clone(),
                etag: etag.clone(),
            },
        );

        (output, etag)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> TransformParams {
        TransformParams {
            size: 24,
            stroke_width: 2.0,
            color: "currentColor".to_string(),
            rotate: None,
            mirror: false,
            class_name: None,
            custom_attributes: Vec::new(),
        }
    }

    #[test]
    fn applies_size() {
        let svg = r#"<svg viewBox="0 0 24 24" width="16" height="16"><path d="M0 0"/></svg>"#;
        let mut params = sample_params();
        params.size = 48;
        let (out, _) = apply(svg, &params);
        assert!(out.contains(r#"width="48""#));
        assert!(out.contains(r#"height="48""#));
    }

    #[test]
    fn substitutes_current_color() {
        let svg = r#"<svg viewBox="0 0 24 24"><path d="M0 0" stroke="currentColor"/></svg>"#;
        let mut params = sample_params();
        params.color = "#ff0000".to_string();
        let (out, _) = apply(svg, &params);
        assert!(out.contains("#ff0000"));
        assert!(!out.contains("currentColor"));
    }

    #[test]
    fn merges_class_name() {
        let svg = r#"<svg viewBox="0 0 24 24" class="icon"><path d="M0 0"/></svg>"#;
        let mut params = sample_params();
        params.class_name = Some("lg".to_string());
        let (out, _) = apply(svg, &params);
        assert!(out.contains(r#"class="icon lg""#));
    }

    #[test]
    fn wraps_rotation_around_viewbox_center() {
        let svg = r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;
        let mut params = sample_params();
        params.rotate = Some(90.0);
        let (out, _) = apply(svg, &params);
        assert!(out.contains("rotate(90 12 12)"));
    }

    #[test]
    fn cache_is_deterministic_for_same_inputs() {
        let cache = TransformCache::new(4);
        let svg = r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;
        let params = sample_params();
        let (a, etag_a) = cache.get_or_compute(svg, &params);
        let (b, etag_b) = cache.get_or_compute(svg, &params);
        assert_eq!(a, b);
        assert_eq!(etag_a, etag_b);
    }

    #[test]
    fn cache_evicts_fifo_past_capacity() {
        let cache = TransformCache::new(1);
        let svg = r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;
        let mut p1 = sample_params();
        p1.size = 16;
        let mut p2 = sample_params();
        p2.size = 32;
        cache.get_or_compute(svg, &p1);
        cache.get_or_compute(svg, &p2);
        assert_eq!(cache.len(), 1);
    }
}
