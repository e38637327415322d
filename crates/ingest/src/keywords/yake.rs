//! Unsupervised statistical keyword extraction in the style of YAKE.
//!
//! Every word gets a score from local features (casing, position,
//! frequency, context diversity, spread across sentences); candidate
//! phrases of up to `max_ngram` words combine the scores of their words.
//! Lower scores are better. Near-duplicate phrases are dropped by
//! normalized edit-distance similarity.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::stopwords::is_stopword;
use super::KeywordExtractor;

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+|\n\s*\n").expect("valid sentence regex"));
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+(?:['’\-]\w+)*|[^\w\s]").expect("valid token regex"));

/// Words shorter than this are treated like stop words.
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YakeConfig {
    /// Longest candidate phrase, in words.
    pub max_ngram: usize,
    /// Number of keywords returned.
    pub top: usize,
    /// Candidates more similar than this to a selected keyword are skipped.
    pub dedup_threshold: f64,
}

impl Default for YakeConfig {
    fn default() -> Self {
        Self {
            max_ngram: 3,
            top: 5,
            dedup_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct YakeExtractor {
    config: YakeConfig,
}

impl YakeExtractor {
    pub fn new(config: YakeConfig) -> Self {
        Self { config }
    }
}

impl KeywordExtractor for YakeExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        if self.config.top == 0 || self.config.max_ngram == 0 {
            return Vec::new();
        }
        let corpus = Corpus::build(text);
        if corpus.sentence_count == 0 {
            return Vec::new();
        }
        let term_scores = corpus.term_scores();
        let mut candidates = corpus.candidates(self.config.max_ngram, &term_scores);
        candidates.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.first_seen.cmp(&b.first_seen))
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut selected: Vec<String> = Vec::with_capacity(self.config.top);
        for cand in candidates {
            if selected.len() >= self.config.top {
                break;
            }
            let duplicate = selected
                .iter()
                .any(|kw| similarity(kw, &cand.key) > self.config.dedup_threshold);
            if !duplicate {
                selected.push(cand.key);
            }
        }
        selected
    }
}

// ── Corpus statistics ───────────────────────────────────────────────────────

#[derive(Debug)]
struct Word {
    key: String,
    stop: bool,
    numeric: bool,
}

#[derive(Debug, Default)]
struct TermStats {
    tf: usize,
    tf_capitalized: usize,
    tf_acronym: usize,
    sentences: Vec<usize>,
    left: Vec<usize>,
    right: Vec<usize>,
    stop: bool,
}

#[derive(Debug)]
struct Corpus {
    words: Vec<Word>,
    /// Runs of word indices not interrupted by punctuation.
    phrases: Vec<Vec<usize>>,
    terms: HashMap<String, TermStats>,
    sentence_count: usize,
}

#[derive(Debug)]
struct Candidate {
    key: String,
    score: f64,
    first_seen: usize,
}

impl Corpus {
    fn build(text: &str) -> Self {
        let mut corpus = Corpus {
            words: Vec::new(),
            phrases: Vec::new(),
            terms: HashMap::new(),
            sentence_count: 0,
        };

        for sentence in SENTENCE_SPLIT_RE.split(text) {
            let mut phrase: Vec<usize> = Vec::new();
            let mut position = 0usize;
            let sentence_id = corpus.sentence_count;

            for token in TOKEN_RE.find_iter(sentence).map(|m| m.as_str()) {
                if !token.chars().any(|c| c.is_alphanumeric()) {
                    corpus.flush_phrase(&mut phrase);
                    continue;
                }
                corpus.push_word(token, sentence_id, position, &mut phrase);
                position += 1;
            }
            corpus.flush_phrase(&mut phrase);

            if position > 0 {
                corpus.sentence_count += 1;
            }
        }
        corpus
    }

    fn push_word(
        &mut self,
        surface: &str,
        sentence: usize,
        position: usize,
        phrase: &mut Vec<usize>,
    ) {
        let key = surface.to_lowercase();
        let numeric = surface.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '\'');
        let stop = is_stopword(&key) || key.chars().count() < MIN_TERM_CHARS;
        let acronym = surface.chars().count() > 1
            && surface.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
            && surface.chars().any(|c| c.is_alphabetic());
        let capitalized = position > 0 && surface.chars().next().is_some_and(char::is_uppercase);

        let idx = self.words.len();
        let stats = self.terms.entry(key.clone()).or_default();
        stats.tf += 1;
        stats.stop = stop;
        stats.sentences.push(sentence);
        if acronym {
            stats.tf_acronym += 1;
        } else if capitalized {
            stats.tf_capitalized += 1;
        }

        if let Some(&prev) = phrase.last() {
            let prev_key = self.words[prev].key.clone();
            self.terms.entry(key.clone()).or_default().left.push(prev);
            self.terms.entry(prev_key).or_default().right.push(idx);
        }

        self.words.push(Word { key, stop, numeric });
        phrase.push(idx);
    }

    fn flush_phrase(&mut self, phrase: &mut Vec<usize>) {
        if !phrase.is_empty() {
            self.phrases.push(std::mem::take(phrase));
        }
    }

    /// Per-term score; lower means more keyword-like.
    fn term_scores(&self) -> HashMap<&str, f64> {
        let content_tfs: Vec<f64> = self
            .terms
            .values()
            .filter(|t| !t.stop)
            .map(|t| t.tf as f64)
            .collect();
        let (mean, std) = mean_std(&content_tfs);
        let max_tf = self.terms.values().map(|t| t.tf).max().unwrap_or(1) as f64;
        let norm = if mean + std > 0.0 { mean + std } else { 1.0 };

        self.terms
            .iter()
            .map(|(key, t)| {
                let tf = t.tf as f64;
                let casing = t.tf_capitalized.max(t.tf_acronym) as f64 / (1.0 + tf.ln());
                let position = position_feature(&t.sentences);
                let frequency = tf / norm;
                let relatedness =
                    1.0 + (self.diversity(&t.left) + self.diversity(&t.right)) * tf / max_tf;
                let spread = distinct_count(&t.sentences) as f64 / self.sentence_count as f64;
                let score = position * relatedness
                    / (casing + frequency / relatedness + spread / relatedness);
                (key.as_str(), score)
            })
            .collect()
    }

    /// Share of distinct neighbouring terms among all neighbour occurrences.
    fn diversity(&self, neighbours: &[usize]) -> f64 {
        if neighbours.is_empty() {
            return 0.0;
        }
        let distinct: HashSet<&str> = neighbours
            .iter()
            .map(|&i| self.words[i].key.as_str())
            .collect();
        distinct.len() as f64 / neighbours.len() as f64
    }

    fn candidates(&self, max_ngram: usize, term_scores: &HashMap<&str, f64>) -> Vec<Candidate> {
        // key -> (occurrences, first position, member terms)
        let mut found: HashMap<String, (usize, usize, Vec<usize>)> = HashMap::new();

        for phrase in &self.phrases {
            for start in 0..phrase.len() {
                for n in 1..=max_ngram {
                    let Some(slice) = phrase.get(start..start + n) else {
                        break;
                    };
                    let first = &self.words[slice[0]];
                    let last = &self.words[slice[n - 1]];
                    if first.stop || last.stop || slice.iter().any(|&i| self.words[i].numeric) {
                        continue;
                    }
                    let key = slice
                        .iter()
                        .map(|&i| self.words[i].key.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    found
                        .entry(key)
                        .and_modify(|e| e.0 += 1)
                        .or_insert_with(|| (1, slice[0], slice.to_vec()));
                }
            }
        }

        found
            .into_iter()
            .map(|(key, (tf, first_seen, members))| {
                let mut product = 1.0;
                let mut sum = 0.0;
                for &i in &members {
                    let word = &self.words[i];
                    if word.stop {
                        continue;
                    }
                    let h = term_scores.get(word.key.as_str()).copied().unwrap_or(1.0);
                    product *= h;
                    sum += h;
                }
                Candidate {
                    key,
                    score: product / (tf as f64 * (1.0 + sum)),
                    first_seen,
                }
            })
            .collect()
    }
}

// ── Math helpers ────────────────────────────────────────────────────────────

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn median(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// `ln(ln(3 + median))` over the distinct sentences a term occurs in.
fn position_feature(sentences: &[usize]) -> f64 {
    let mut distinct = sentences.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    (3.0 + median(&distinct)).ln().ln()
}

fn distinct_count(values: &[usize]) -> usize {
    values.iter().collect::<HashSet<_>>().len()
}

/// Normalized edit similarity in `[0, 1]`; 1 means identical.
pub(crate) fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: &str = "Market market grows. Teams build. Teams ship. Market share rises.";
    const SAMPLE: &str = "Rust is a systems programming language. Rust guarantees memory safety. \
                          Many teams adopt Rust for reliability.";

    #[test]
    fn empty_and_stopword_text_yield_nothing() {
        let yake = YakeExtractor::default();
        assert!(yake.extract("").is_empty());
        assert!(yake.extract("   \n ").is_empty());
        assert!(yake.extract("and the of it is to").is_empty());
    }

    #[test]
    fn frequent_term_is_selected() {
        let keywords = YakeExtractor::default().extract(SAMPLE);
        assert!(!keywords.is_empty());
        assert!(keywords.len() <= 5);
        assert!(keywords.contains(&"rust".to_string()), "{keywords:?}");
    }

    #[test]
    fn keywords_are_lowercase_and_unique() {
        let keywords = YakeExtractor::default().extract(SAMPLE);
        let unique: HashSet<&String> = keywords.iter().collect();
        assert_eq!(unique.len(), keywords.len());
        for kw in &keywords {
            assert_eq!(kw, &kw.to_lowercase());
            assert!(kw.split(' ').count() <= 3);
            let first = kw.split(' ').next().unwrap();
            let last = kw.split(' ').last().unwrap();
            assert!(!is_stopword(first) && !is_stopword(last), "{kw}");
        }
    }

    #[test]
    fn respects_top_and_ngram_limits() {
        let yake = YakeExtractor::new(YakeConfig {
            max_ngram: 1,
            top: 2,
            dedup_threshold: 0.9,
        });
        let keywords = yake.extract(SAMPLE);
        assert_eq!(keywords.len(), 2);
        assert!(keywords.iter().all(|k| !k.contains(' ')));
    }

    #[test]
    fn numbers_never_become_keywords() {
        let keywords =
            YakeExtractor::default().extract("Revenue 2024 grew. Revenue 2024 report covers 2024.");
        assert!(!keywords.is_empty());
        assert!(keywords.iter().all(|k| !k.contains("2024")), "{keywords:?}");
    }

    #[test]
    fn output_is_deterministic() {
        let yake = YakeExtractor::default();
        assert_eq!(yake.extract(SAMPLE), yake.extract(SAMPLE));
    }

    #[test]
    fn strict_dedup_threshold_filters_near_duplicates() {
        let yake = YakeExtractor::new(YakeConfig {
            max_ngram: 1,
            top: 5,
            dedup_threshold: 0.5,
        });
        let keywords = yake.extract("Parsing parser parsers. Parsing parser parsers again.");
        for (i, a) in keywords.iter().enumerate() {
            for b in &keywords[i + 1..] {
                assert!(similarity(a, b) <= 0.5, "{a} ~ {b}");
            }
        }
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn position_uses_distinct_sentences() {
        let corpus = Corpus::build(MARKET);
        let market = &corpus.terms["market"];
        assert_eq!(market.sentences, vec![0, 0, 3]);
        // median of {0, 3} is 1.5
        let expected = 4.5f64.ln().ln();
        assert!((position_feature(&market.sentences) - expected).abs() < 1e-12);
        assert!((expected - 0.408_18).abs() < 1e-4);
    }

    #[test]
    fn term_score_follows_feature_formula() {
        let corpus = Corpus::build(MARKET);
        assert_eq!(corpus.sentence_count, 4);

        // Content tfs: market 3, teams 2, grows/build/ship/share/rises 1.
        let (mean, std) = mean_std(&[3.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let position = 4.5f64.ln().ln();
        let frequency = 3.0 / (mean + std);
        // Distinct neighbours on both sides, tf equals the max tf.
        let relatedness = 1.0 + (1.0 + 1.0) * 3.0 / 3.0;
        // Two of four sentences; no capitalised occurrence past a sentence start.
        let spread = 2.0 / 4.0;
        let casing = 0.0;
        let expected =
            position * relatedness / (casing + frequency / relatedness + spread / relatedness);

        let scores = corpus.term_scores();
        assert!((scores["market"] - expected).abs() < 1e-9, "{}", scores["market"]);
        assert!((expected - 1.9429).abs() < 1e-3);
    }

    #[test]
    fn multiword_phrase_from_early_sentence_ranks_first() {
        let keywords = YakeExtractor::default().extract(SAMPLE);
        assert_eq!(keywords[0], "systems programming language");
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&[3, 1, 2]), 2.0);
        assert_eq!(median(&[4, 1, 2, 3]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
