//! Derived text metrics for section content
//!
//! Metrics are pure functions of the normalized content. They are attached
//! to a [`SectionRecord`] after extraction and before staging/persistence.

use crate::types::SectionRecord;

/// Single-word terms matched against whole whitespace tokens
const MANDATE_WORDS: &[&str] = &[
    "shall",
    "must",
    "require",
    "prohibited",
    "forbidden",
    "enforceable",
];

/// Multi-word terms matched as substrings of the lowercased text
const MANDATE_PHRASES: &[&str] = &[
    "may not",
    "shall not",
    "must not",
    "is required",
    "is mandated",
    "restricted to",
    "obligated to",
    "subject to",
    "compliance with",
    "not allowed",
];

/// Text metric calculator
pub trait TextMetrics: Send + Sync {
    /// Readability score, `None` when the text has no words
    fn readability(&self, text: &str) -> Option<f64>;

    /// Number of mandatory/restrictive terms
    fn mandate_count(&self, text: &str) -> u32;

    /// Fill the derived fields of a record from its content
    fn annotate(&self, record: &mut SectionRecord) {
        record.readability_score = self.readability(&record.content);
        record.mandate_count = self.mandate_count(&record.content);
    }
}

/// Flesch reading ease plus the restrictive-term count
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTextMetrics;

impl TextMetrics for StandardTextMetrics {
    fn readability(&self, text: &str) -> Option<f64> {
        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .collect();
        if words.is_empty() {
            return None;
        }

        let sentences = count_sentences(text).max(1) as f64;
        let syllables: u32 = words.iter().map(|w| count_syllables(w)).sum();
        let word_count = words.len() as f64;

        let score = 206.835
            - 1.015 * (word_count / sentences)
            - 84.6 * (f64::from(syllables) / word_count);
        Some((score * 100.0).round() / 100.0)
    }

    fn mandate_count(&self, text: &str) -> u32 {
        let lowered = text.to_lowercase();

        let words = lowered
            .split_whitespace()
            .filter(|token| MANDATE_WORDS.contains(token))
            .count();
        let phrases: usize = MANDATE_PHRASES
            .iter()
            .map(|phrase| lowered.matches(phrase).count())
            .sum();

        (words + phrases) as u32
    }
}

/// Sentence terminators followed by whitespace or end of text
fn count_sentences(text: &str) -> usize {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            // Collapse "?!" and "..."
            while matches!(chars.peek(), Some('.' | '!' | '?')) {
                chars.next();
            }
            if chars.peek().map_or(true, |n| n.is_whitespace()) {
                count += 1;
            }
        }
    }
    count
}

/// Vowel-group syllable estimate, minimum one per word
fn count_syllables(word: &str) -> u32 {
    let letters: Vec<char> = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if letters.is_empty() {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0u32;
    let mut previous_vowel = false;
    for &c in &letters {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    // Silent trailing "e" ("made"), but not "-le" ("table")
    let n = letters.len();
    if groups > 1 && letters[n - 1] == 'e' && !(n >= 2 && letters[n - 2] == 'l') {
        groups -= 1;
    }

    groups.max(1)
}
