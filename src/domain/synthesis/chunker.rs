//! Splits text into provider-sized chunks.
//!
//! Chunks are cut at sentence boundaries when possible, at word boundaries
//! when a single sentence is too long, and inside a word only when the word
//! alone exceeds the limit. Chunk content never carries leading or trailing
//! whitespace; the whitespace between two chunks is left in the source text
//! so that [`reassemble`] can restore it exactly.

use super::error::ChunkingError;
use super::model::TextChunk;
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Sentence-ending punctuation (with optional closing quotes/brackets)
/// followed by whitespace, or any run of whitespace containing a line break.
fn sentence_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[.!?…]+["'”’)\]]*\s+|\s*\n\s*"#).expect("sentence pattern is valid")
    })
}

fn word() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+").expect("word pattern is valid"))
}

/// Split `text` into chunks of at most `max_chars` characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<TextChunk>, ChunkingError> {
    chunk_tail(text, 0, max_chars, 0)
}

/// Split the part of `text` starting at byte `from` into chunks of at most
/// `max_chars` characters, numbering them from `first_index`.
///
/// Spans in the returned chunks are relative to the whole `text`, so a tail
/// re-chunked after a provider switch still reassembles with the chunks
/// that were already consumed.
pub fn chunk_tail(
    text: &str,
    from: usize,
    max_chars: usize,
    first_index: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::InvalidLimit);
    }
    if from > text.len() || !text.is_char_boundary(from) {
        return Err(ChunkingError::OutOfBounds(from));
    }
    if text[from..].trim().is_empty() {
        return Err(ChunkingError::EmptyText);
    }

    let mut packer = Packer::new(text, max_chars);

    for sentence in sentence_spans(text, from) {
        if char_len(text, &sentence) <= max_chars {
            packer.push(sentence);
            continue;
        }

        // Oversized sentence: it gets chunks of its own, split between words
        packer.flush();
        for word in word_spans(text, &sentence) {
            if char_len(text, &word) <= max_chars {
                packer.push(word);
            } else {
                for piece in hard_split(text, &word, max_chars) {
                    packer.push(piece);
                }
            }
        }
        packer.flush();
    }

    Ok(packer.finish(first_index))
}

/// Rebuild the source text from its chunks, re-inserting the original
/// whitespace between them. Returns `None` if the chunks do not describe a
/// whitespace-only partition of `text`.
pub fn reassemble(text: &str, chunks: &[TextChunk]) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for chunk in chunks {
        let gap = text.get(cursor..chunk.span.start)?;
        if !gap.trim().is_empty() || text.get(chunk.span.clone())? != chunk.content {
            return None;
        }
        out.push_str(gap);
        out.push_str(&chunk.content);
        cursor = chunk.span.end;
    }

    let tail = text.get(cursor..)?;
    if !tail.trim().is_empty() {
        return None;
    }
    out.push_str(tail);
    Some(out)
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

/// Sentence spans with surrounding whitespace trimmed away
fn sentence_spans(text: &str, from: usize) -> Vec<Range<usize>> {
    let region = &text[from..];
    let mut spans = Vec::new();
    let mut last = 0;

    let ends = sentence_break()
        .find_iter(region)
        .map(|m| m.end())
        .chain(std::iter::once(region.len()));

    for end in ends {
        if end <= last {
            continue;
        }
        let piece = &region[last..end];
        let start = last + (piece.len() - piece.trim_start().len());
        let stop = last + piece.trim_end().len();
        if start < stop {
            spans.push(from + start..from + stop);
        }
        last = end;
    }

    spans
}

fn word_spans(text: &str, sentence: &Range<usize>) -> Vec<Range<usize>> {
    word()
        .find_iter(&text[sentence.clone()])
        .map(|m| sentence.start + m.start()..sentence.start + m.end())
        .collect()
}

/// Last resort for a single word longer than the limit
fn hard_split(text: &str, span: &Range<usize>, max_chars: usize) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = span.start;
    let mut count = 0;

    for (offset, _) in text[span.clone()].char_indices() {
        if count == max_chars {
            pieces.push(start..span.start + offset);
            start = span.start + offset;
            count = 0;
        }
        count += 1;
    }
    if start < span.end {
        pieces.push(start..span.end);
    }

    pieces
}

/// Greedily merges consecutive spans while the merged text, including the
/// whitespace between spans, stays within the limit.
struct Packer<'a> {
    text: &'a str,
    max_chars: usize,
    current: Option<(Range<usize>, usize)>,
    done: Vec<Range<usize>>,
}

impl<'a> Packer<'a> {
    fn new(text: &'a str, max_chars: usize) -> Self {
        Self {
            text,
            max_chars,
            current: None,
            done: Vec::new(),
        }
    }

    fn push(&mut self, span: Range<usize>) {
        let span_chars = char_len(self.text, &span);

        if let Some((current, current_chars)) = self.current.as_mut() {
            let gap_chars = self.text[current.end..span.start].chars().count();
            let merged = *current_chars + gap_chars + span_chars;
            if merged <= self.max_chars {
                current.end = span.end;
                *current_chars = merged;
                return;
            }
            self.flush();
        }

        self.current = Some((span, span_chars));
    }

    fn flush(&mut self) {
        if let Some((span, _)) = self.current.take() {
            self.done.push(span);
        }
    }

    fn finish(mut self, first_index: usize) -> Vec<TextChunk> {
        self.flush();
        let text = self.text;
        self.done
            .into_iter()
            .enumerate()
            .map(|(offset, span)| TextChunk {
                index: first_index + offset,
                content: text[span.clone()].to_string(),
                span,
            })
            .collect()
    }
}
