//! Tokenizer loading and question/context encoding.
//!
//! A model directory carries either a serialized `tokenizer.json` or a BERT
//! `vocab.txt`. The latter is assembled into the standard BERT pipeline:
//! normalizer, whitespace/punctuation pre-tokenizer, WordPiece model,
//! `[CLS] a [SEP] b [SEP]` post-processor and `##` decoder.

use std::path::Path;

use serde::Deserialize;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{
    AddedToken, Encoding, PaddingParams, Tokenizer, TruncationDirection, TruncationParams,
    TruncationStrategy,
};

use crate::error::{QaError, Result};

pub const TOKENIZER_JSON: &str = "tokenizer.json";
pub const VOCAB_TXT: &str = "vocab.txt";
pub const TOKENIZER_CONFIG: &str = "tokenizer_config.json";

const SPECIAL_TOKENS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

#[derive(Debug, Default, Deserialize)]
struct TokenizerConfigHints {
    do_lower_case: Option<bool>,
}

/// Load the tokenizer found in `model_dir`
pub fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let json_path = model_dir.join(TOKENIZER_JSON);
    if json_path.exists() {
        tracing::debug!("Loading tokenizer from {}", json_path.display());
        return Tokenizer::from_file(&json_path).map_err(|e| {
            QaError::Load(format!("Failed to load tokenizer from {}: {}", json_path.display(), e))
        });
    }

    let vocab_path = model_dir.join(VOCAB_TXT);
    if vocab_path.exists() {
        let lowercase = read_lowercase_hint(model_dir);
        tracing::debug!(
            "Building WordPiece tokenizer from {} (lowercase: {})",
            vocab_path.display(),
            lowercase
        );
        return wordpiece_tokenizer(&vocab_path, lowercase);
    }

    Err(QaError::Load(format!(
        "No {} or {} in {}",
        TOKENIZER_JSON,
        VOCAB_TXT,
        model_dir.display()
    )))
}

fn read_lowercase_hint(model_dir: &Path) -> bool {
    std::fs::read_to_string(model_dir.join(TOKENIZER_CONFIG))
        .ok()
        .and_then(|raw| serde_json::from_str::<TokenizerConfigHints>(&raw).ok())
        .and_then(|hints| hints.do_lower_case)
        .unwrap_or(true)
}

/// Assemble a BERT WordPiece tokenizer from a `vocab.txt` file
pub fn wordpiece_tokenizer(vocab_path: &Path, lowercase: bool) -> Result<Tokenizer> {
    let vocab = vocab_path
        .to_str()
        .ok_or_else(|| QaError::Load(format!("Non UTF-8 vocab path: {}", vocab_path.display())))?;

    let model = WordPiece::from_file(vocab)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| QaError::Load(format!("Failed to read vocabulary {}: {}", vocab, e)))?;

    let mut tokenizer = Tokenizer::new(model);
    let cls = special_id(&tokenizer, "[CLS]")?;
    let sep = special_id(&tokenizer, "[SEP]")?;

    tokenizer
        .with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)))
        .with_pre_tokenizer(Some(BertPreTokenizer))
        .with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), sep),
            ("[CLS]".to_string(), cls),
        )))
        .with_decoder(Some(WordPieceDecoder::default()));

    let specials: Vec<AddedToken> = SPECIAL_TOKENS
        .iter()
        .filter(|token| tokenizer.token_to_id(token).is_some())
        .map(|token| AddedToken::from(token.to_string(), true))
        .collect();
    tokenizer.add_special_tokens(&specials);

    Ok(tokenizer)
}

fn special_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| QaError::Load(format!("Vocabulary has no {} token", token)))
}

/// Bound encodings to `max_len` tokens and disable padding.
///
/// Longest-first truncation trims whichever of question or context is longer,
/// so an over-long pair never fails to encode.
pub fn configure_window(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            direction: TruncationDirection::Right,
            max_length: max_len,
            strategy: TruncationStrategy::LongestFirst,
            stride: 0,
        }))
        .map_err(|e| QaError::Load(format!("Invalid truncation settings: {}", e)))?;
    tokenizer.with_padding(None::<PaddingParams>);
    Ok(())
}

/// Encode `[CLS] question [SEP] context [SEP]`
pub fn encode_pair(tokenizer: &Tokenizer, question: &str, context: &str) -> Result<Encoding> {
    tokenizer
        .encode((question, context), true)
        .map_err(|e| QaError::Inference(format!("Tokenization failed: {}", e)))
}

/// Mask of tokens that belong to the context (second) sequence
pub fn context_mask(encoding: &Encoding) -> Vec<bool> {
    encoding
        .get_sequence_ids()
        .into_iter()
        .map(|seq| seq == Some(1))
        .collect()
}

/// Spacing around punctuation and contractions undone after decoding
const CLEANUP_RULES: [(&str, &str); 10] = [
    (" .", "."),
    (" ?", "?"),
    (" !", "!"),
    (" ,", ","),
    (" ' ", "'"),
    (" n't", "n't"),
    (" 'm", "'m"),
    (" 's", "'s"),
    (" 've", "'ve"),
    (" 're", "'re"),
];

/// Re-join punctuation the WordPiece decoder leaves space-separated.
///
/// The decoder cleans each token on its own, so patterns spanning tokens
/// (`eiffel ' s`) survive; this pass runs over the whole string.
pub fn clean_up_tokenization(text: &str) -> String {
    CLEANUP_RULES
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Decode a token id slice, dropping special markers
pub fn decode_span(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    tokenizer
        .decode(ids, true)
        .map(|text| clean_up_tokenization(text.trim()))
        .map_err(|e| QaError::Inference(format!("Decoding failed: {}", e)))
}
