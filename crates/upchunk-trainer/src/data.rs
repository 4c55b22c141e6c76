//! Data loading for sentence-per-line plain text.
//!
//! Tokens are whitespace separated. Stopping punctuation closes the current
//! segment and is dropped from the token stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use upchunk_core::{StopSegmentCorpus, Term, Vocabulary};

/// Tokens that end a segment.
pub const STOPPING_PUNCTUATION: &[&str] = &[
    ".", "?", "!", ";", ",", "--", "\u{3002}", "\u{3001}", "\u{FF0C}",
];

pub fn is_stopping_punctuation(token: &str) -> bool {
    STOPPING_PUNCTUATION.contains(&token)
}

/// How raw text is turned into a stop-segmented corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Drop stopping punctuation without splitting segments.
    pub no_seg: bool,
    /// Read at most this many sentences.
    pub max_sentences: Option<usize>,
}

/// Read one sentence per line. Blank lines become empty sentences so the
/// output stays line-aligned with the input; `#` lines are skipped.
pub fn read_stop_segment_corpus<R: BufRead>(
    reader: R,
    vocab: &mut Vocabulary,
    options: &ReaderOptions,
) -> std::io::Result<StopSegmentCorpus> {
    let mut sentences = Vec::new();

    for line in reader.lines() {
        if options.max_sentences.is_some_and(|max| sentences.len() >= max) {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        sentences.push(segment_line(line, vocab, options.no_seg));
    }

    Ok(StopSegmentCorpus::new(sentences))
}

/// Load a corpus file, coding its tokens into `vocab`.
pub fn load_stop_segment_corpus<P: AsRef<Path>>(
    path: P,
    vocab: &mut Vocabulary,
    options: &ReaderOptions,
) -> std::io::Result<StopSegmentCorpus> {
    let file = File::open(path)?;
    read_stop_segment_corpus(BufReader::new(file), vocab, options)
}

fn segment_line(line: &str, vocab: &mut Vocabulary, no_seg: bool) -> Vec<Vec<Term>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for token in line.split_whitespace() {
        if is_stopping_punctuation(token) {
            if !no_seg && !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(vocab.code(token));
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TEXT: &str = "the quick brown fox jumped over the lazy dog .\n\
                        on sunday , the grizzly bear sleeps .\n\
                        # comment\n\
                        \n\
                        wait -- what ? ?\n";

    #[test]
    fn test_reads_segments() {
        let mut vocab = Vocabulary::new();
        let corpus =
            read_stop_segment_corpus(Cursor::new(TEXT), &mut vocab, &ReaderOptions::default())
                .unwrap();
        assert_eq!(corpus.num_sentences(), 4);
        assert_eq!(corpus.sentences()[0].len(), 1);
        assert_eq!(corpus.sentences()[0][0].len(), 9);
        assert_eq!(corpus.sentences()[1].len(), 2);
        assert!(corpus.sentences()[2].is_empty());
        assert_eq!(corpus.sentences()[3].len(), 2);
        assert_eq!(vocab.get("the"), Some(2));
        assert!(vocab.get(".").is_none());
    }

    #[test]
    fn test_no_seg_keeps_one_segment() {
        let mut vocab = Vocabulary::new();
        let options = ReaderOptions {
            no_seg: true,
            ..Default::default()
        };
        let corpus = read_stop_segment_corpus(Cursor::new(TEXT), &mut vocab, &options).unwrap();
        assert_eq!(corpus.sentences()[1].len(), 1);
        assert_eq!(corpus.sentences()[1][0].len(), 6);
    }

    #[test]
    fn test_sentence_limit() {
        let mut vocab = Vocabulary::new();
        let options = ReaderOptions {
            max_sentences: Some(1),
            ..Default::default()
        };
        let corpus = read_stop_segment_corpus(Cursor::new(TEXT), &mut vocab, &options).unwrap();
        assert_eq!(corpus.num_sentences(), 1);
    }

    #[test]
    fn test_chinese_punctuation() {
        assert!(is_stopping_punctuation("\u{3002}"));
        assert!(is_stopping_punctuation("--"));
        assert!(!is_stopping_punctuation("-"));
    }
}
