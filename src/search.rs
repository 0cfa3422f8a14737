//! Icon search: tokenization, synonym expansion, inverted-index candidate
//! gathering with a linear-scan fallback, and multi-signal scoring.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::cache::MemoryCache;
use crate::models::{IconIndex, IconRecord, InvertedIndex, SynonymMap};

const RESULT_CACHE_CAPACITY: usize = 200;
const RESULT_CACHE_TTL: Duration = Duration::from_secs(300);

const WEIGHT_EXACT_NAME: f64 = 2.0;
const WEIGHT_NAME_SUBSTRING: f64 = 0.8;
const WEIGHT_EXACT_TAG: f64 = 0.5;
const WEIGHT_NAME_TOKEN_CONTAINS: f64 = 0.15;
const WEIGHT_TAG_TOKEN: f64 = 0.2;
const WEIGHT_NAME_TOKEN_STARTSWITH: f64 = 0.3;
const WEIGHT_SYNONYM_ONLY: f64 = 0.1;
const IDF_SCALE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub source: Option<String>,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct ScoredIcon {
    pub record: IconRecord,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub icons: Vec<ScoredIcon>,
    pub total: usize,
    pub has_more: bool,
    pub search_method: &'static str,
    pub cache_hit: bool,
}

#[derive(Clone)]
struct CachedSearch {
    icons: Vec<ScoredIcon>,
    total: usize,
}

pub struct SearchEngine {
    result_cache: MemoryCache<CachedSearch>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            result_cache: MemoryCache::new(RESULT_CACHE_CAPACITY, RESULT_CACHE_TTL),
        }
    }

    pub fn search(
        &self,
        query: &SearchQuery,
        index: &IconIndex,
        inverted: Option<&InvertedIndex>,
        synonyms: Option<&SynonymMap>,
    ) -> SearchResult {
        let cache_key = cache_key(query);

        if let Some(cached) = self.result_cache.get(&cache_key) {
            return paginate(cached.icons, cached.total, "cached", true, query);
        }

        let tokens = tokenize(&query.text);
        let (scored, method) = match inverted {
            Some(inverted) if !tokens.is_empty() => (
                score_with_index(&tokens, index, inverted, synonyms, query),
                "inverted_index",
            ),
            _ => (score_linear(&tokens, index, synonyms, query), "linear"),
        };

        let mut scored = scored;
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let total = scored.len();
        self.result_cache.insert(
            cache_key,
            CachedSearch {
                icons: scored.clone(),
                total,
            },
        );

        paginate(scored, total, method, false, query)
    }
}

fn cache_key(query: &SearchQuery) -> String {
    format!(
        "search:{}:{}:{}",
        query.text.to_lowercase(),
        query.source.as_deref().unwrap_or(""),
        query.category.as_deref().unwrap_or(""),
    )
}

fn paginate(
    icons: Vec<ScoredIcon>,
    total: usize,
    method: &'static str,
    cache_hit: bool,
    query: &SearchQuery,
) -> SearchResult {
    let start = query.offset as usize;
    let end = (start + query.limit as usize).min(icons.len());
    let page = if start < icons.len() {
        icons[start..end].to_vec()
    } else {
        Vec::new()
    };
    let has_more = end < total;
    SearchResult {
        icons: page,
        total,
        has_more,
        search_method: method,
        cache_hit,
    }
}

/// Lowercase, split on non-alphanumeric boundaries, drop tokens shorter
/// than 2 characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= 2)
        .map(|s| s.to_string())
        .collect()
}

fn expand_synonyms(tokens: &[String], synonyms: Option<&SynonymMap>) -> HashSet<String> {
    let mut expanded: HashSet<String> = tokens.iter().cloned().collect();
    if let Some(map) = synonyms {
        for token in tokens {
            if let Some(alts) = map.get(token) {
                expanded.extend(alts.iter().cloned());
            }
        }
    }
    expanded
}

/// Union of posting lists for every expanded token, their 4-char-prefix
/// fuzzy matches (resolved through `terms`, not treated as ids directly),
/// and the raw query text's own posting list if it happens to be an
/// indexed term.
fn gather_candidates(
    expanded: &HashSet<String>,
    query_norm: &str,
    inverted: &InvertedIndex,
) -> HashSet<String> {
    let mut ids = HashSet::new();

    for term in expanded {
        if let Some(posting) = inverted.terms.get(term) {
            ids.extend(posting.icon_ids.iter().cloned());
        }

        let prefix_len = term.len().min(4);
        if let Some(prefix_terms) = inverted.prefixes.get(&term[..prefix_len]) {
            for candidate_term in prefix_terms {
                if candidate_term == term {
                    continue;
                }
                if candidate_term.starts_with(term.as_str()) || term.starts_with(candidate_term.as_str()) {
                    if let Some(posting) = inverted.terms.get(candidate_term) {
                        ids.extend(posting.icon_ids.iter().cloned());
                    }
                }
            }
        }
    }

    if let Some(posting) = inverted.terms.get(query_norm) {
        ids.extend(posting.icon_ids.iter().cloned());
    }

    ids
}

fn score_with_index(
    tokens: &[String],
    index: &IconIndex,
    inverted: &InvertedIndex,
    synonyms: Option<&SynonymMap>,
    query: &SearchQuery,
) -> Vec<ScoredIcon> {
    let query_norm = query.text.trim().to_lowercase();
    let expanded = expand_synonyms(tokens, synonyms);
    let synonym_only: Vec<&str> = expanded
        .iter()
        .filter(|t| !tokens.contains(t))
        .map(|s| s.as_str())
        .collect();

    let mut candidates = gather_candidates(&expanded, &query_norm, inverted);

    if let Some(source) = &query.source {
        let allowed: HashSet<&str> = inverted
            .sources
            .get(source)
            .map(|ids| ids.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default();
        candidates.retain(|id| allowed.contains(id.as_str()));
    }
    if let Some(category) = &query.category {
        let allowed: HashSet<&str> = inverted
            .categories
            .get(category)
            .map(|ids| ids.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default();
        candidates.retain(|id| allowed.contains(id.as_str()));
    }

    candidates
        .into_iter()
        .filter_map(|id| {
            let record = index.icons.get(&id)?;
            let score = score_for_record(
                record,
                &query_norm,
                tokens,
                &synonym_only,
                Some((inverted, inverted.total_docs)),
            );
            (score > 0.0).then(|| ScoredIcon {
                record: record.clone(),
                score,
            })
        })
        .collect()
}

fn score_linear(
    tokens: &[String],
    index: &IconIndex,
    synonyms: Option<&SynonymMap>,
    query: &SearchQuery,
) -> Vec<ScoredIcon> {
    let query_norm = query.text.trim().to_lowercase();
    let expanded = expand_synonyms(tokens, synonyms);
    let synonym_only: Vec<&str> = expanded
        .iter()
        .filter(|t| !tokens.contains(t))
        .map(|s| s.as_str())
        .collect();

    index
        .icons
        .values()
        .filter(|record| {
            query.source.as_deref().is_none_or(|s| s == record.source)
                && query.category.as_deref().is_none_or(|c| c == record.category)
        })
        .filter_map(|record| {
            if tokens.is_empty() && query_norm.is_empty() {
                return Some(ScoredIcon {
                    record: record.clone(),
                    score: 0.0,
                });
            }
            let score = score_for_record(record, &query_norm, tokens, &synonym_only, None);
            (score > 0.0).then(|| ScoredIcon {
                record: record.clone(),
                score,
            })
        })
        .collect()
}

fn score_for_record(
    record: &IconRecord,
    query_norm: &str,
    tokens: &[String],
    synonym_only: &[&str],
    inverted: Option<(&InvertedIndex, usize)>,
) -> f64 {
    let name_lower = record.name.to_lowercase();
    let tags_lower: Vec<String> = record.tags.iter().map(|t| t.to_lowercase()).collect();
    let mut score = 0.0;

    if !query_norm.is_empty() {
        if name_lower == query_norm {
            score += WEIGHT_EXACT_NAME;
        } else if name_lower.contains(query_norm) {
            score += WEIGHT_NAME_SUBSTRING;
        }
        if tags_lower.iter().any(|t| t == query_norm) {
            score += WEIGHT_EXACT_TAG;
        }
    }

    for token in tokens {
        let name_contains = name_lower.contains(token.as_str());
        let tag_match = tags_lower.iter().any(|t| t == token);
        let name_starts = name_lower.starts_with(token.as_str());

        if name_contains {
            score += WEIGHT_NAME_TOKEN_CONTAINS;
        }
        if tag_match {
            score += WEIGHT_TAG_TOKEN;
        }
        if name_starts {
            score += WEIGHT_NAME_TOKEN_STARTSWITH;
        }

        let token_matched = name_contains || tag_match || name_starts;
        if token_matched
            && let Some((inverted, total_docs)) = inverted
            && let Some(posting) = inverted.terms.get(token)
            && posting.df > 0
            && total_docs > 0
        {
            score += (total_docs as f64 / posting.df as f64).ln().max(0.0) * IDF_SCALE;
        }
    }

    for synonym in synonym_only {
        if name_lower.contains(*synonym) || tags_lower.iter().any(|t| t == synonym) {
            score += WEIGHT_SYNONYM_ONLY;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, name: &str, category: &str, tags: &[&str]) -> IconRecord {
        IconRecord {
            id: id.to_string(),
            name: name.to_string(),
            source: "lucide".to_string(),
            category: category.to_string(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            variants: vec![],
            width: 24,
            height: 24,
            view_box: "0 0 24 24".to_string(),
            path: format!("lucide/{name}.svg"),
        }
    }

    fn sample_index() -> IconIndex {
        let mut icons = HashMap::new();
        icons.insert(
            "lucide:home".to_string(),
            make_record("lucide:home", "home", "navigation", &["house", "building"]),
        );
        icons.insert(
            "lucide:homeland".to_string(),
            make_record("lucide:homeland", "homeland", "navigation", &[]),
        );
        icons.insert(
            "lucide:settings".to_string(),
            make_record("lucide:settings", "settings", "tools", &["gear", "config"]),
        );
        IconIndex {
            icons,
            stats: Default::default(),
        }
    }

    #[test]
    fn tokenizes_on_non_alnum_boundaries_and_drops_short_tokens() {
        assert_eq!(tokenize("Shopping-Cart 2"), vec!["shopping", "cart"]);
    }

    #[test]
    fn linear_scan_exact_name_outranks_prefix_match() {
        let index = sample_index();
        let query = SearchQuery {
            text: "home".to_string(),
            source: None,
            category: None,
            limit: 10,
            offset: 0,
        };
        let engine = SearchEngine::new();
        let result = engine.search(&query, &index, None, None);
        assert_eq!(result.search_method, "linear");
        assert_eq!(result.icons[0].record.name, "home");
    }

    #[test]
    fn pagination_reports_has_more() {
        let index = sample_index();
        let query = SearchQuery {
            text: "".to_string(),
            source: None,
            category: Some("navigation".to_string()),
            limit: 1,
            offset: 0,
        };
        let engine = SearchEngine::new();
        let result = engine.search(&query, &index, None, None);
        assert_eq!(result.total, 2);
        assert!(result.has_more);
    }

    #[test]
    fn second_identical_query_is_a_cache_hit() {
        let index = sample_index();
        let query = SearchQuery {
            text: "settings".to_string(),
            source: None,
            category: None,
            limit: 10,
            offset: 0,
        };
        let engine = SearchEngine::new();
        let first = engine.search(&query, &index, None, None);
        let second = engine.search(&query, &index, None, None);
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.search_method, "cached");
    }

    #[test]
    fn inverted_index_prefix_matches_resolve_through_terms() {
        let index = sample_index();
        let mut terms = HashMap::new();
        terms.insert(
            "home".to_string(),
            crate::models::Posting {
                icon_ids: vec!["lucide:home".to_string()],
                df: 1,
            },
        );
        terms.insert(
            "homeland".to_string(),
            crate::models::Posting {
                icon_ids: vec!["lucide:homeland".to_string()],
                df: 1,
            },
        );
        let mut prefixes = HashMap::new();
        prefixes.insert(
            "home".to_string(),
            vec!["home".to_string(), "homeland".to_string()],
        );
        let inverted = InvertedIndex {
            terms,
            prefixes,
            sources: HashMap::new(),
            categories: HashMap::new(),
            total_docs: 3,
        };

        let query = SearchQuery {
            text: "home".to_string(),
            source: None,
            category: None,
            limit: 10,
            offset: 0,
        };
        let engine = SearchEngine::new();
        let result = engine.search(&query, &index, Some(&inverted), None);
        assert_eq!(result.search_method, "inverted_index");
        let names: Vec<&str> = result.icons.iter().map(|s| s.record.name.as_str()).collect();
        assert!(names.contains(&"home"));
        assert!(names.contains(&"homeland"));
        assert_eq!(result.icons[0].record.name, "home");
    }
}
