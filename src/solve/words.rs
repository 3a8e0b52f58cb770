//! English number-word parsing for the numeral-literacy MCQ branch.
//!
//! Handles the standard additive/scale grammar ("sixty-three thousand and
//! forty" → 63040) up to the millions, with hyphens and the filler word
//! "and" tolerated anywhere.

use once_cell::sync::Lazy;
use regex::Regex;

fn unit_value(word: &str) -> Option<i64> {
    let v = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(v)
}

fn scale_value(word: &str) -> Option<i64> {
    match word {
        "hundred" => Some(100),
        "thousand" => Some(1_000),
        "million" => Some(1_000_000),
        _ => None,
    }
}

fn is_number_word(word: &str) -> bool {
    word == "and" || unit_value(word).is_some() || scale_value(word).is_some()
}

/// Parse a complete number phrase ("sixty-three thousand and forty").
///
/// `None` when the phrase is empty or contains a non-number word.
pub fn parse_number_phrase(phrase: &str) -> Option<i64> {
    let lowered = phrase.to_ascii_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c == ' ' || c == '-')
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        .filter(|w| !w.is_empty())
        .collect();
    parse_words(&words)
}

fn parse_words(words: &[&str]) -> Option<i64> {
    if words.is_empty() {
        return None;
    }
    let mut total: i64 = 0;
    let mut current: i64 = 0;
    let mut saw_value = false;
    for word in words {
        if *word == "and" {
            continue;
        }
        if let Some(v) = unit_value(word) {
            current += v;
            saw_value = true;
        } else if let Some(scale) = scale_value(word) {
            if scale == 100 {
                current = current.max(1) * 100;
            } else {
                total += current.max(if saw_value { 0 } else { 1 }) * scale;
                current = 0;
            }
            saw_value = true;
        } else {
            return None;
        }
    }
    saw_value.then_some(total + current)
}

/// Number-word runs within free text, longest first.
static RE_NUMBER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-z]+(?:[\s-]+(?:[a-z]+))*").unwrap());

/// Find the first spelled-out number phrase in free text.
///
/// Scans word runs, keeps the longest prefix of consecutive number words in
/// each, and returns the first phrase that parses to a value. Single-word
/// phrases below twenty are ignored — statements like "one of the following"
/// would otherwise false-positive.
pub fn find_spelled_number(text: &str) -> Option<i64> {
    for run in RE_NUMBER_RUN.find_iter(text) {
        let words: Vec<&str> = run
            .as_str()
            .split(|c: char| c == ' ' || c == '-' || c == '\n')
            .filter(|w| !w.is_empty())
            .collect();
        let mut best: Option<i64> = None;
        let mut start = 0;
        while start < words.len() {
            if !is_number_word(&words[start].to_ascii_lowercase()) {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < words.len() && is_number_word(&words[end].to_ascii_lowercase()) {
                end += 1;
            }
            let lowered: Vec<String> = words[start..end]
                .iter()
                .map(|w| w.to_ascii_lowercase())
                .collect();
            let refs: Vec<&str> = lowered.iter().map(|s| s.as_str()).collect();
            // trim trailing "and" so "forty and the rest" parses as 40
            let mut slice = &refs[..];
            while slice.last() == Some(&"and") {
                slice = &slice[..slice.len() - 1];
            }
            if let Some(v) = parse_words(slice) {
                let multi_word = slice.len() > 1;
                if multi_word || v >= 20 {
                    best = Some(v);
                    break;
                }
            }
            start = end;
        }
        if best.is_some() {
            return best;
        }
    }
    None
}
