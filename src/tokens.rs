//! Token count approximation.
//!
//! Embedding models tokenize into sub-word units, so a whitespace word count
//! undercounts. Every budget check in the pipeline goes through
//! [`estimate_tokens`] so thresholds stay consistent even though the number is
//! not an exact tokenizer count.

/// Approximate sub-word tokens produced per whitespace-delimited word.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Inverse ratio used to turn a token budget into a word budget.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Estimate the token count of `text`.
///
/// Counts runs of non-whitespace, multiplies by [`TOKENS_PER_WORD`] and
/// rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).ceil() as usize
}

/// Convert a token budget into a whole number of words (rounded down).
pub fn tokens_to_words(tokens: usize) -> usize {
    (tokens as f64 * WORDS_PER_TOKEN).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("  \n\t "), 0);
    }

    #[test]
    fn test_rounds_up() {
        // 1 word => 1.3 => 2
        assert_eq!(estimate_tokens("hello"), 2);
        // 10 words => 13
        assert_eq!(estimate_tokens("a b c d e f g h i j"), 13);
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(estimate_tokens("one   two\n\nthree"), estimate_tokens("one two three"));
    }

    #[test]
    fn test_window_budget_fits() {
        assert_eq!(tokens_to_words(800), 600);
        assert_eq!(tokens_to_words(150), 112);
        let window = vec!["w"; 600].join(" ");
        assert!(estimate_tokens(&window) <= 800);
    }
}
