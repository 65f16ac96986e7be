//! Extractive pre-summarization and small text helpers used before the
//! generative call.

use std::collections::HashSet;

use regex::Regex;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 50;
const CONVERGENCE: f64 = 1e-6;

/// Remove "read more" style boilerplate up to the end of its sentence.
pub fn clean_text(text: &str) -> String {
    let patterns = [
        r"(?im)read more.*?(\.\s|$)",
        r"(?im)also read.*?(\.\s|$)",
        r"(?im)related articles.*?(\.\s|$)",
    ];

    let mut cleaned = text.to_string();
    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            // Keep the sentence terminator so neighbours stay separated.
            cleaned = re.replace_all(&cleaned, "$1").into_owned();
        }
    }
    cleaned
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace, and
/// at paragraph breaks (blank lines). A single line break inside a
/// paragraph is read as a space.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut paragraph = String::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            split_paragraph(&paragraph, &mut sentences);
            paragraph.clear();
            continue;
        }
        if !paragraph.is_empty() {
            paragraph.push(' ');
        }
        paragraph.push_str(line);
    }
    split_paragraph(&paragraph, &mut sentences);
    sentences
}

fn split_paragraph(paragraph: &str, sentences: &mut Vec<String>) {
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            push_sentence(sentences, &mut current);
        }
    }
    push_sentence(sentences, &mut current);
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

fn words(sentence: &str) -> HashSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Word-overlap similarity normalised by sentence length.
fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let common = a.intersection(b).count() as f64;
    common / ((a.len() as f64).ln() + (b.len() as f64).ln())
}

/// TextRank: rank sentences by damped power iteration over the overlap
/// graph, keep the best `max_sentences`, and emit them in original order.
pub fn extractive_summary(text: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= max_sentences {
        return sentences.join(" ");
    }

    let bags: Vec<HashSet<String>> = sentences.iter().map(|s| words(s)).collect();
    let n = sentences.len();
    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let w = overlap(&bags[i], &bags[j]);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }
    let out_sums: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();

    let mut scores = vec![1.0; n];
    for _ in 0..MAX_ITERATIONS {
        let next: Vec<f64> = (0..n)
            .map(|i| {
                let incoming: f64 = (0..n)
                    .filter(|&j| out_sums[j] > 0.0)
                    .map(|j| weights[j][i] / out_sums[j] * scores[j])
                    .sum();
                (1.0 - DAMPING) + DAMPING * incoming
            })
            .collect();
        let delta: f64 = next
            .iter()
            .zip(&scores)
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    let mut ranked: Vec<usize> = (0..n).collect();
    // Stable sort keeps earlier sentences ahead on ties.
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    let mut chosen: Vec<usize> = ranked.into_iter().take(max_sentences).collect();
    chosen.sort_unstable();

    chosen
        .into_iter()
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `src` of the first `<img>` in an HTML fragment.
pub fn first_image(html: &str) -> Option<String> {
    let img_re = Regex::new(r#"(?i)<img\b[^>]*?\ssrc=["']([^"']+)["']"#).ok()?;
    img_re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}
