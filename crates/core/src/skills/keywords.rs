//! # Keyword Cloud
//!
//! Frequency-weighted keywords over the market stage's pain point text.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of words in a cloud
pub const MAX_KEYWORDS: usize = 40;

const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
    "will", "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y",
];

/// A word in the cloud with its display weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub count: usize,
    /// Font size in rem, 1.0..=3.0
    pub size: f64,
    /// HSL lightness percentage, 20..=50 (darker is more frequent)
    pub lightness: f64,
}

fn punctuation() -> Option<&'static Regex> {
    static PUNCT: OnceLock<Option<Regex>> = OnceLock::new();
    PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").ok()).as_ref()
}

fn is_numeric(word: &str) -> bool {
    word.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Build a keyword cloud from free text, most frequent first
pub fn keyword_cloud(text: &str) -> Vec<Keyword> {
    let lowered = text.to_lowercase();
    let cleaned = match punctuation() {
        Some(re) => re.replace_all(&lowered, ""),
        None => lowered.as_str().into(),
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() > 2 && !STOP_WORDS.contains(&word) && !is_numeric(word) {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(wa, ca), (wb, cb)| cb.cmp(ca).then_with(|| wa.cmp(wb)));
    ranked.truncate(MAX_KEYWORDS);

    let (Some(&(_, max)), Some(&(_, min))) = (ranked.first(), ranked.last()) else {
        return Vec::new();
    };

    ranked
        .into_iter()
        .map(|(word, count)| {
            let (size, lightness) = if max == min {
                (1.2, 40.0)
            } else {
                let ratio = (count - min) as f64 / (max - min) as f64;
                (1.0 + ratio * 2.0, 50.0 - ratio * 30.0)
            };
            Keyword {
                text: word.to_string(),
                count,
                size,
                lightness,
            }
        })
        .collect()
}
