use super::ranking;
use super::snippet::build_snippet;
use super::{SearchFilters, SearchHit, SearchResultPage};
use crate::config::SearchConfig;
use crate::index::tokenizer::{query_terms, word_offset};
use crate::index::{validate_truth_score, DocumentId, IndexStore, RankingSignals, TermSuggestion};
use crate::url::host_allowed;
use crate::{Result, ValidationError};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Shortest prefix `suggest` accepts
pub const MIN_SUGGEST_PREFIX: usize = 2;

/// Read-only query side of the index
pub struct QueryEngine<'a> {
    index: &'a dyn IndexStore,
    config: &'a SearchConfig,
}

struct Ranked {
    signals: RankingSignals,
    relevance: f64,
    score: f64,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a dyn IndexStore, config: &'a SearchConfig) -> Self {
        Self { index, config }
    }

    /// Ranks every document matching any query term and returns one page
    ///
    /// Ordering is score descending, then most recently crawled, then URL, so
    /// identical index state always produces identical pages.
    pub fn search(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResultPage> {
        self.validate(query, page, per_page, filters)?;

        let terms = query_terms(query);
        if terms.is_empty() {
            debug!("Query '{}' has no indexable terms", query);
            return Ok(SearchResultPage::empty(page, per_page));
        }

        let mut relevance = self.score_candidates(&terms)?;
        self.apply_required_terms(&mut relevance, &filters.required_terms)?;

        let ids: Vec<DocumentId> = relevance.keys().copied().collect();
        let domains: Vec<String> = filters.domains.iter().map(|d| d.to_lowercase()).collect();

        let mut ranked: Vec<Ranked> = self
            .index
            .ranking_signals(&ids)?
            .into_iter()
            .filter(|signals| passes_filters(signals, filters, &domains))
            .map(|signals| {
                let relevance = relevance
                    .get(&signals.document_id)
                    .copied()
                    .unwrap_or_default();
                Ranked {
                    score: ranking::blend(relevance, signals.truth_score),
                    relevance,
                    signals,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.signals.crawled_at.cmp(&a.signals.crawled_at))
                .then_with(|| a.signals.url.cmp(&b.signals.url))
        });

        let total_matches = ranked.len();
        let offset = (page - 1).saturating_mul(per_page);
        let results = ranked
            .into_iter()
            .skip(offset)
            .take(per_page)
            .map(|entry| self.build_hit(entry, &terms))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Query '{}' matched {} documents, returning {} on page {}",
            query,
            total_matches,
            results.len(),
            page
        );

        Ok(SearchResultPage {
            results,
            total_matches,
            page,
            per_page,
            total_pages: total_matches.div_ceil(per_page),
            ranking_version: ranking::RANKING_FORMULA_VERSION,
        })
    }

    /// Indexed terms starting with `prefix`, ordered by document frequency
    pub fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<TermSuggestion>> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.chars().count() < MIN_SUGGEST_PREFIX {
            return Err(ValidationError::PrefixTooShort {
                min: MIN_SUGGEST_PREFIX,
            }
            .into());
        }

        let limit = limit.clamp(1, self.config.max_per_page);
        Ok(self.index.suggest_terms(&prefix, limit)?)
    }

    fn validate(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
        filters: &SearchFilters,
    ) -> std::result::Result<(), ValidationError> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if page == 0 {
            return Err(ValidationError::InvalidPage(page));
        }
        if per_page == 0 || per_page > self.config.max_per_page {
            return Err(ValidationError::InvalidPerPage {
                got: per_page,
                max: self.config.max_per_page,
            });
        }
        if let Some(min) = filters.min_truth_score {
            validate_truth_score(min)?;
        }
        if let (Some(after), Some(before)) = (filters.crawled_after, filters.crawled_before) {
            if after > before {
                return Err(ValidationError::InvalidDateRange);
            }
        }
        Ok(())
    }

    /// OR-union of the postings of every term, with summed tf-idf relevance
    fn score_candidates(&self, terms: &[String]) -> Result<HashMap<DocumentId, f64>> {
        let total_documents = self.index.document_count()?;
        let mut relevance: HashMap<DocumentId, f64> = HashMap::new();

        for term in terms {
            let postings = self.index.lookup_postings(term)?;
            if postings.is_empty() {
                continue;
            }

            let idf = ranking::idf(total_documents, postings.len() as u64);
            for hit in postings {
                *relevance.entry(hit.document_id).or_insert(0.0) +=
                    ranking::term_weight(hit.frequency, idf);
            }
        }

        Ok(relevance)
    }

    fn apply_required_terms(
        &self,
        candidates: &mut HashMap<DocumentId, f64>,
        required: &[String],
    ) -> Result<()> {
        let mut terms: Vec<String> = Vec::new();
        for raw in required {
            for term in query_terms(raw) {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }

        for term in terms {
            if candidates.is_empty() {
                break;
            }
            let containing: HashSet<DocumentId> = self
                .index
                .lookup_postings(&term)?
                .into_iter()
                .map(|hit| hit.document_id)
                .collect();
            candidates.retain(|id, _| containing.contains(id));
        }

        Ok(())
    }

    fn build_hit(&self, entry: Ranked, terms: &[String]) -> Result<SearchHit> {
        let document = self.index.get_document(entry.signals.document_id)?;

        let mut first_position: Option<u32> = None;
        for term in terms {
            let positions = self.index.term_positions(term, document.id)?;
            if let Some(&pos) = positions.first() {
                first_position = Some(first_position.map_or(pos, |p| p.min(pos)));
            }
        }
        let anchor = first_position.and_then(|pos| word_offset(&document.body, pos));

        Ok(SearchHit {
            document_id: document.id,
            snippet: build_snippet(&document.body, anchor, self.config.snippet_length),
            url: document.url,
            host: document.host,
            title: document.title,
            score: entry.score,
            relevance: entry.relevance,
            truth_score: entry.signals.truth_score,
            crawled_at: entry.signals.crawled_at,
            language: entry.signals.language,
        })
    }
}

fn passes_filters(signals: &RankingSignals, filters: &SearchFilters, domains: &[String]) -> bool {
    if !domains.is_empty() && !host_allowed(&signals.host, domains) {
        return false;
    }
    if filters
        .crawled_after
        .is_some_and(|after| signals.crawled_at < after)
    {
        return false;
    }
    if filters
        .crawled_before
        .is_some_and(|before| signals.crawled_at > before)
    {
        return false;
    }
    if let Some(wanted) = &filters.language {
        let matches = signals
            .language
            .as_deref()
            .is_some_and(|lang| primary_subtag(lang).eq_ignore_ascii_case(primary_subtag(wanted)));
        if !matches {
            return false;
        }
    }
    if filters
        .min_truth_score
        .is_some_and(|min| signals.truth_score < min)
    {
        return false;
    }
    true
}

fn primary_subtag(tag: &str) -> &str {
    tag.trim().split(['-', '_']).next().unwrap_or_default()
}
