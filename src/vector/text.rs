//! Text normalization and term analysis for the vocabulary-based strategies.
//!
//! Chinese text has no whitespace between words, so the analyzer treats every
//! CJK ideograph as a token and lets n-grams recover multi-character words
//! ("公交车" yields 公, 交, 车, 公交, 交车). Latin letters and digits form
//! ordinary word tokens.

/// Full-width ASCII variants start here (U+FF01 '！').
const FULLWIDTH_START: u32 = 0xFF01;

/// Full-width ASCII variants end here (U+FF5E '～').
const FULLWIDTH_END: u32 = 0xFF5E;

/// Offset between a full-width variant and its ASCII counterpart.
const FULLWIDTH_OFFSET: u32 = 0xFEE0;

/// Ideographic space (U+3000).
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Returns true for characters in the CJK Unified Ideographs block.
#[must_use]
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}')
}

/// Folds full-width forms to their half-width ASCII equivalent.
fn fold_width(c: char) -> char {
    if c == IDEOGRAPHIC_SPACE {
        return ' ';
    }
    let code = c as u32;
    if (FULLWIDTH_START..=FULLWIDTH_END).contains(&code) {
        char::from_u32(code - FULLWIDTH_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

/// Normalizes text before analysis.
///
/// Full-width characters are folded to ASCII, Latin text is lowercased,
/// everything that is not a CJK ideograph, ASCII letter or digit becomes a
/// space, and runs of whitespace collapse to one space.
///
/// ```ignore
/// assert_eq!(normalize("  墨尔本怎么坐公交车？？！ "), "墨尔本怎么坐公交车");
/// assert_eq!(normalize("Ｍｙｋｉ卡"), "myki卡");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().map(fold_width) {
        let keep = is_cjk(c) || c.is_ascii_alphanumeric();
        if keep {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// A single token with the script it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ideograph(&'a str),
    Word(&'a str),
}

impl Token<'_> {
    fn text(&self) -> &str {
        match self {
            Token::Ideograph(s) | Token::Word(s) => s,
        }
    }
}

/// Splits one whitespace-free segment of normalized text into tokens.
fn tokenize_segment(segment: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (idx, c) in segment.char_indices() {
        if is_cjk(c) {
            if let Some(start) = word_start.take() {
                tokens.push(Token::Word(&segment[start..idx]));
            }
            tokens.push(Token::Ideograph(&segment[idx..idx + c.len_utf8()]));
        } else if word_start.is_none() {
            word_start = Some(idx);
        }
    }
    if let Some(start) = word_start {
        tokens.push(Token::Word(&segment[start..]));
    }

    tokens
}

/// Joins a run of tokens into a single n-gram term.
fn join_gram(tokens: &[Token<'_>]) -> String {
    let mut term = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let needs_space = i > 0
            && (matches!(token, Token::Word(_)) || matches!(tokens[i - 1], Token::Word(_)));
        if needs_space {
            term.push(' ');
        }
        term.push_str(token.text());
    }
    term
}

/// Produces the analyzed terms for a text: 1..=`ngram_max` grams over the
/// tokens of each whitespace-separated segment, in document order.
///
/// N-grams never span a whitespace boundary of the normalized text.
#[must_use]
pub fn analyze(text: &str, ngram_max: usize) -> Vec<String> {
    let normalized = normalize(text);
    let ngram_max = ngram_max.max(1);
    let mut terms = Vec::new();

    for segment in normalized.split(' ').filter(|s| !s.is_empty()) {
        let tokens = tokenize_segment(segment);
        for n in 1..=ngram_max {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(join_gram(window));
            }
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_folds_width() {
        assert_eq!(normalize("  墨尔本怎么坐公交车？？！  "), "墨尔本怎么坐公交车");
        assert_eq!(normalize("如何使用Ｍｙｋｉ卡？"), "如何使用myki卡");
        assert_eq!(normalize("Hello,\tWorld!"), "hello world");
        assert_eq!(normalize("？！"), "");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("a\u{3000}\u{3000}b"), "a b");
        assert_eq!(normalize("\n租房  问题\n"), "租房 问题");
    }

    #[test]
    fn test_analyze_chinese_bigrams() {
        let terms = analyze("公交车", 2);
        assert_eq!(terms, vec!["公", "交", "车", "公交", "交车"]);
    }

    #[test]
    fn test_analyze_mixed_scripts() {
        let terms = analyze("Myki卡", 2);
        assert_eq!(terms, vec!["myki", "卡", "myki 卡"]);
    }

    #[test]
    fn test_analyze_does_not_cross_whitespace() {
        let terms = analyze("学生 优惠", 2);
        assert!(terms.contains(&"学生".to_string()));
        assert!(terms.contains(&"优惠".to_string()));
        assert!(!terms.iter().any(|t| t == "生优"));
    }

    #[test]
    fn test_analyze_unigrams_only() {
        let terms = analyze("停车 rules", 1);
        assert_eq!(terms, vec!["停", "车", "rules"]);
    }

    #[test]
    fn test_analyze_empty() {
        assert!(analyze("", 2).is_empty());
        assert!(analyze("？？", 2).is_empty());
    }
}
