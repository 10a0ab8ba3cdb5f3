use serde::Serialize;

use crate::engine::{ByteRange, EngineResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentencePair {
    pub source: String,
    pub translated: String,
}

/// Text covered by `range` in the UTF-8 encoding of `text`.
///
/// Out-of-bounds offsets are clamped to the encoding. A range cutting a
/// code point yields U+FFFD for the partial sequence.
pub fn sentence_from_byte_range(text: &str, range: ByteRange) -> String {
    let bytes = text.as_bytes();
    let end = range.end.min(bytes.len());
    let begin = range.begin.min(end);
    String::from_utf8_lossy(&bytes[begin..end]).into_owned()
}

pub fn source_sentences(response: &EngineResponse) -> Vec<String> {
    response.source_sentences[..response.sentence_count()]
        .iter()
        .map(|range| sentence_from_byte_range(&response.original_text, *range))
        .collect()
}

pub fn translated_sentences(response: &EngineResponse) -> Vec<String> {
    response.translated_sentences[..response.sentence_count()]
        .iter()
        .map(|range| sentence_from_byte_range(&response.translated_text, *range))
        .collect()
}

pub fn aligned_sentences(response: &EngineResponse) -> Vec<SentencePair> {
    source_sentences(response)
        .into_iter()
        .zip(translated_sentences(response))
        .map(|(source, translated)| SentencePair { source, translated })
        .collect()
}
