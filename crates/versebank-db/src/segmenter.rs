//! Lyric segmentation into deduplicated verses.
//!
//! Lyrics are split on blank lines and on section tag lines such as
//! `[Chorus]`. Short fragments are dropped, and repeated sections (a chorus
//! sung three times, or the same lines with different punctuation) collapse
//! to their first occurrence.
//!
//! # Example
//!
//! ```
//! use versebank_db::segmenter::segment_lyrics;
//!
//! let verse = "one two three four five six seven eight nine ten \
//!              eleven twelve thirteen fourteen fifteen sixteen seventeen";
//! let lyrics = format!("[Verse 1]\n{verse}\n\n[Chorus]\n{verse}\n\nshort line");
//!
//! assert_eq!(segment_lyrics(&lyrics), vec![verse.to_string()]);
//! ```

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use versebank_core::defaults;

/// A blank line (possibly holding spaces or tabs), or a line that is only a
/// bracketed section tag.
static VERSE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\n[ \t]*\n|^[ \t]*\[[^\]\n]*\][ \t]*$").expect("verse boundary regex")
});

/// Anything that is neither a word character nor whitespace.
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));

/// Thresholds for segmentation and deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Segments with fewer whitespace-delimited tokens are discarded.
    pub min_tokens: usize,
    /// Number of normalized leading tokens that identify a duplicate.
    pub prefix_tokens: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_tokens: defaults::SEGMENT_MIN_TOKENS,
            prefix_tokens: defaults::SEGMENT_PREFIX_TOKENS,
        }
    }
}

/// Splits lyrics into unique, sufficiently long verses.
#[derive(Debug, Clone, Default)]
pub struct VerseSegmenter {
    config: SegmenterConfig,
}

impl VerseSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment `lyrics` into verses in order of first appearance.
    ///
    /// Pure and deterministic; the result may be empty.
    pub fn segment(&self, lyrics: &str) -> Vec<String> {
        let normalized_newlines = lyrics.replace("\r\n", "\n");
        let mut seen = HashSet::new();

        VERSE_BOUNDARY
            .split(&normalized_newlines)
            .filter(|segment| token_count(segment) >= self.config.min_tokens)
            .map(str::trim)
            .filter(|segment| seen.insert(normalized_prefix(segment, self.config.prefix_tokens)))
            .map(str::to_string)
            .collect()
    }
}

/// Segment lyrics with the default thresholds.
pub fn segment_lyrics(lyrics: &str) -> Vec<String> {
    VerseSegmenter::default().segment(lyrics)
}

/// Number of whitespace-delimited tokens in `text`.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Deduplication key: lower-cased, punctuation stripped, first `n` tokens
/// joined by single spaces.
pub fn normalized_prefix(text: &str, n: usize) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped
        .split_whitespace()
        .take(n)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `count` distinct tokens starting at `w{start}`.
    fn words(start: usize, count: usize) -> String {
        (start..start + count)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    // =========================================================================
    // Token threshold
    // =========================================================================

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(segment_lyrics("").is_empty());
        assert!(segment_lyrics("\n\n\n").is_empty());
    }

    #[test]
    fn test_sixteen_tokens_dropped_seventeen_kept() {
        let short = words(0, 16);
        let long = words(100, 17);
        let lyrics = format!("{short}\n\n{long}");

        assert_eq!(segment_lyrics(&lyrics), vec![long]);
    }

    #[test]
    fn test_tokens_across_lines_count_together() {
        // A stanza of several short lines is one segment.
        let stanza = format!("{}\n{}\n{}", words(0, 6), words(6, 6), words(12, 6));
        let verses = segment_lyrics(&stanza);

        assert_eq!(verses.len(), 1);
        assert_eq!(token_count(&verses[0]), 18);
    }

    // =========================================================================
    // Boundaries
    // =========================================================================

    #[test]
    fn test_split_on_blank_line_with_spaces() {
        let a = words(0, 17);
        let b = words(100, 17);
        let lyrics = format!("{a}\n   \t\n{b}");

        assert_eq!(segment_lyrics(&lyrics), vec![a, b]);
    }

    #[test]
    fn test_split_on_section_tag_line() {
        let a = words(0, 17);
        let b = words(100, 17);
        let lyrics = format!("[Verse 1]\n{a}\n[Chorus: Guest]\n{b}");

        assert_eq!(segment_lyrics(&lyrics), vec![a, b]);
    }

    #[test]
    fn test_inline_brackets_do_not_split() {
        let line = format!("{} [ad-lib] {}", words(0, 8), words(8, 9));
        assert_eq!(segment_lyrics(&line), vec![line.clone()]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let a = words(0, 17);
        let b = words(100, 17);
        let lyrics = format!("[Intro]\r\n{a}\r\n\r\n{b}\r\n");

        assert_eq!(segment_lyrics(&lyrics), vec![a, b]);
    }

    #[test]
    fn test_segments_are_trimmed() {
        let a = words(0, 17);
        let lyrics = format!("\n\n   {a}   \n");

        assert_eq!(segment_lyrics(&lyrics), vec![a]);
    }

    // =========================================================================
    // Deduplication
    // =========================================================================

    #[test]
    fn test_repeated_chorus_kept_once_in_first_position() {
        let verse1 = words(0, 20);
        let chorus = words(100, 20);
        let verse2 = words(200, 20);
        let lyrics = format!(
            "[Verse 1]\n{verse1}\n[Chorus]\n{chorus}\n[Verse 2]\n{verse2}\n[Chorus]\n{chorus}"
        );

        assert_eq!(segment_lyrics(&lyrics), vec![verse1, chorus, verse2]);
    }

    #[test]
    fn test_duplicate_detection_ignores_case_and_punctuation() {
        let first = "Hello there, how are you today my good old friend it has been a long time number one";
        let second = "HELLO THERE! How are you today, my good old friend? It has been a long time number two";
        let lyrics = format!("{first}\n\n{second}");

        assert_eq!(segment_lyrics(&lyrics), vec![first.to_string()]);
    }

    #[test]
    fn test_difference_after_prefix_is_still_duplicate() {
        let a = format!("{} alpha", words(0, 16));
        let b = format!("{} beta", words(0, 16));
        let lyrics = format!("{a}\n\n{b}");

        assert_eq!(segment_lyrics(&lyrics), vec![a]);
    }

    #[test]
    fn test_difference_inside_prefix_is_distinct() {
        let a = format!("x {}", words(0, 16));
        let b = format!("y {}", words(0, 16));
        let lyrics = format!("{a}\n\n{b}");

        assert_eq!(segment_lyrics(&lyrics), vec![a, b]);
    }

    #[test]
    fn test_normalized_prefix() {
        assert_eq!(normalized_prefix("Hey!  You, THERE.", 16), "hey you there");
        assert_eq!(normalized_prefix("a b c d", 2), "a b");
        assert_eq!(normalized_prefix("don't stop", 5), "dont stop");
        assert_eq!(normalized_prefix("", 16), "");
    }

    // =========================================================================
    // Example lyrics
    // =========================================================================

    #[test]
    fn test_twelve_token_lines_fall_below_floor() {
        let lyrics = "[Intro]\nhello there how are you today my good old friend number one\n\nhello there how are you today my good old friend number two\n\n[Outro]\nshort line";

        assert!(segment_lyrics(lyrics).is_empty());
    }

    #[test]
    fn test_long_lines_sharing_prefix_yield_one_verse() {
        let lyrics = "[Intro]\nhello there how are you today my good old friend it has been a long time number one\n\nhello there how are you today my good old friend it has been a long time number two\n\n[Outro]\nshort line";

        assert_eq!(
            segment_lyrics(lyrics),
            vec!["hello there how are you today my good old friend it has been a long time number one"]
        );
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[test]
    fn test_output_invariants_hold() {
        let lyrics = format!(
            "[Verse]\n{}\n\n{}\n\n[Hook]\n{}\n\n{}\n\n{}",
            words(0, 30),
            words(0, 18),
            words(50, 5),
            words(60, 17),
            words(60, 25)
        );
        let config = SegmenterConfig::default();
        let verses = segment_lyrics(&lyrics);

        let mut prefixes = HashSet::new();
        for verse in &verses {
            assert!(token_count(verse) >= config.min_tokens);
            assert!(prefixes.insert(normalized_prefix(verse, config.prefix_tokens)));
        }
        assert_eq!(verses, vec![words(0, 30), words(60, 17)]);
    }

    #[test]
    fn test_deterministic() {
        let lyrics = format!("{}\n\n[Chorus]\n{}", words(0, 20), words(40, 20));
        assert_eq!(segment_lyrics(&lyrics), segment_lyrics(&lyrics));
    }

    #[test]
    fn test_custom_config() {
        let segmenter = VerseSegmenter::new(SegmenterConfig {
            min_tokens: 3,
            prefix_tokens: 2,
        });
        let verses = segmenter.segment("a b c\n\na b d\n\nx y\n\nc d e");

        assert_eq!(verses, vec!["a b c", "c d e"]);
        assert_eq!(segmenter.config().min_tokens, 3);
    }
}
