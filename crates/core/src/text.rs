//! Small text helpers shared by the pipeline stages: word counting that copes
//! with CJK prose, the word-overlap ratio used to spot near-identical chapter
//! variants, and char-boundary-safe slicing.

use std::collections::HashSet;

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3040..=0x30FF     // kana
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified ideographs
        | 0xAC00..=0xD7AF   // hangul syllables
        | 0xF900..=0xFAFF)
}

/// Splits text into lowercase words. Each CJK character is its own word;
/// other words are runs of alphanumerics (apostrophes inside a word are kept).
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut chars = text.chars().peekable();
    std::iter::from_fn(move || loop {
        let ch = chars.next()?;
        if is_cjk(ch) {
            return Some(ch.to_string());
        }
        if !ch.is_alphanumeric() {
            continue;
        }
        let mut word: String = ch.to_lowercase().collect();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() && !is_cjk(next) {
                word.extend(next.to_lowercase());
                chars.next();
            } else if next == '\'' || next == '\u{2019}' {
                chars.next();
                match chars.peek() {
                    Some(&after) if after.is_alphanumeric() && !is_cjk(after) => word.push('\''),
                    _ => break,
                }
            } else {
                break;
            }
        }
        return Some(word);
    })
}

/// Counts words the way a manuscript word target is meant: whitespace
/// separated tokens, with every CJK character counted as one word.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .map(|token| {
            let cjk = token.chars().filter(|ch| is_cjk(*ch)).count();
            let has_other = token
                .chars()
                .any(|ch| !is_cjk(ch) && ch.is_alphanumeric());
            cjk + usize::from(has_other)
        })
        .sum()
}

pub fn word_set(text: &str) -> HashSet<String> {
    words(text).collect()
}

/// Shared distinct words divided by the distinct word count of the larger
/// text. Two empty texts are identical; one empty text shares nothing.
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let left = word_set(a);
    let right = word_set(b);
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let shared = left.intersection(&right).count();
    shared as f64 / left.len().max(right.len()) as f64
}

pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Removes markdown code fences (and the language tag on an opening fence)
/// that models like to wrap their answers in.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}
