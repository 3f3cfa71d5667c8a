//! Tokenizer shared by indexing and querying
//!
//! Text is lowercased and split on every non-alphanumeric character. Tokens
//! shorter than two characters and a fixed set of English stopwords are
//! dropped. Positions count every word in the unfiltered stream, so they map
//! directly back onto the words of the original text.

use std::collections::BTreeMap;

const MIN_TOKEN_CHARS: usize = 2;

const STOPWORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he", "her",
    "his", "if", "in", "into", "is", "it", "its", "not", "of", "on", "or", "she", "so", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to", "was",
    "we", "were", "what", "when", "where", "which", "who", "will", "with", "you", "your",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    /// Word offset in the unfiltered word stream
    pub position: u32,
}

/// Frequency and positions of one term within one text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermStats {
    pub frequency: u32,
    pub positions: Vec<u32>,
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Splits `text` into the raw lowercase words that positions refer to
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn keep(word: &str) -> bool {
    word.chars().count() >= MIN_TOKEN_CHARS && !is_stopword(word)
}

pub fn tokenize(text: &str) -> Vec<Token> {
    words(text)
        .zip(0u32..)
        .filter(|(word, _)| keep(word))
        .map(|(term, position)| Token { term, position })
        .collect()
}

/// Distinct terms of a query, in first-occurrence order
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !terms.contains(&token.term) {
            terms.push(token.term);
        }
    }
    terms
}

/// Per-term frequency and positions, the source of a document's postings
pub fn term_frequencies(text: &str) -> BTreeMap<String, TermStats> {
    let mut stats: BTreeMap<String, TermStats> = BTreeMap::new();
    for token in tokenize(text) {
        let entry = stats.entry(token.term).or_default();
        entry.frequency += 1;
        entry.positions.push(token.position);
    }
    stats
}

/// Byte offset of the word at `position`, counted the same way as [`tokenize`]
pub fn word_offset(text: &str, position: u32) -> Option<usize> {
    let mut in_word = false;
    let mut index = 0u32;

    for (offset, c) in text.char_indices() {
        let alnum = c.is_alphanumeric();
        if alnum && !in_word {
            if index == position {
                return Some(offset);
            }
            index += 1;
        }
        in_word = alnum;
    }
    None
}
