//! Relevance scoring
//!
//! `relevance(d) = Σ tf(t, d) · ln(1 + N / df(t))` over the distinct query
//! terms present in `d`, and the final score scales relevance by the
//! document's truth score:
//!
//! `score(d) = relevance(d) · (TRUTH_FLOOR + TRUTH_WEIGHT · truth(d))`
//!
//! With both constants at 0.5, a truth score of 0 halves relevance and a
//! truth score of 1 leaves it untouched. A matching document therefore never
//! scores zero. Any change to these formulas must bump
//! [`RANKING_FORMULA_VERSION`].

/// Reported with every result page so callers can tell rankings apart
pub const RANKING_FORMULA_VERSION: u32 = 1;

pub const TRUTH_FLOOR: f64 = 0.5;
pub const TRUTH_WEIGHT: f64 = 0.5;

/// Smoothed inverse document frequency; always positive for `df >= 1`
pub fn idf(total_documents: u64, document_frequency: u64) -> f64 {
    let df = document_frequency.max(1) as f64;
    let n = total_documents.max(document_frequency) as f64;
    (1.0 + n / df).ln()
}

pub fn term_weight(term_frequency: u32, idf: f64) -> f64 {
    f64::from(term_frequency) * idf
}

pub fn blend(relevance: f64, truth_score: f64) -> f64 {
    relevance * (TRUTH_FLOOR + TRUTH_WEIGHT * truth_score)
}
