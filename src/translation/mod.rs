mod sentences;

use tracing::{debug, info};

pub use sentences::{
    SentencePair, aligned_sentences, sentence_from_byte_range, source_sentences,
    translated_sentences,
};

use crate::{
    engine::{ResponseOptions, TranslationService},
    error::ServiceError,
    model::{LanguagePair, ModelManager},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationOutput {
    pub paragraphs: Vec<String>,
    /// Sentence alignment of the final hop, one entry per output paragraph.
    pub sentences: Vec<Vec<SentencePair>>,
}

pub struct Translator<'a> {
    pub service: &'a dyn TranslationService,
    pub models: &'a ModelManager,
    pub options: &'a ResponseOptions,
}

impl Translator<'_> {
    /// Translates `paragraphs`, pivoting through English when neither side
    /// is English. Blank paragraphs are dropped and the rest trimmed.
    pub fn translate(
        &self,
        pair: &LanguagePair,
        paragraphs: &[String],
    ) -> Result<TranslationOutput, ServiceError> {
        let hops = pair.hops();
        if hops.len() > 1 {
            info!(%pair, via = ?hops.iter().map(LanguagePair::key).collect::<Vec<_>>(), "translating via pivot");
        } else {
            info!(%pair, "translating");
        }

        let mut output = TranslationOutput {
            paragraphs: paragraphs.to_vec(),
            sentences: Vec::new(),
        };
        for hop in &hops {
            output = self.translate_hop(hop, &output.paragraphs)?;
        }
        Ok(output)
    }

    fn translate_hop(
        &self,
        pair: &LanguagePair,
        paragraphs: &[String],
    ) -> Result<TranslationOutput, ServiceError> {
        let model = self.models.get(pair)?;
        let input = prepare_input(paragraphs);
        debug!(%pair, input_size = input.len(), "sending batch to engine");

        let responses = self
            .service
            .translate(model.handle(), &input, self.options)
            .map_err(|e| ServiceError::Translation(format!("{pair}: {e}")))?;

        let mut output = TranslationOutput::default();
        for response in &responses {
            output.paragraphs.push(response.translated_text.clone());
            output.sentences.push(aligned_sentences(response));
        }
        debug!(
            %pair,
            sentences = output.sentences.iter().map(Vec::len).sum::<usize>(),
            "batch translated"
        );
        Ok(output)
    }
}

/// Non-blank paragraphs, trimmed.
fn prepare_input(paragraphs: &[String]) -> Vec<String> {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whitespace-separated word count, for throughput logging.
pub fn count_words(paragraphs: &[String]) -> usize {
    paragraphs.iter().map(|p| p.split_whitespace().count()).sum()
}
