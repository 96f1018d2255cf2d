//! Shared fixtures: a tiny WordPiece vocabulary, a keyword-driven scorer
//! standing in for the BERT network, and an in-memory model registry.

#![allow(dead_code)]

use async_trait::async_trait;
use qaserve_core::config::{ConfigArgs, ServiceConfig};
use qaserve_core::runtime::tokenizer::{wordpiece_tokenizer, VOCAB_TXT};
use qaserve_core::runtime::{DeviceKind, LoadOptions, SpanConfig, SpanLogits, SpanStrategy};
use qaserve_core::{ModelLocation, ModelRegistry, QaError, QaModel, SpanScorer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokenizers::{Encoding, Tokenizer};

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "who", "built", "the", "tower", "?", "was",
    "by", "gustave", "eiffel", "'", "s", "company", "in", "paris", ".", "what", "city",
];

pub const EIFFEL_CONTEXT: &str = "The tower was built by Gustave Eiffel's company in Paris.";
pub const EIFFEL_QUESTION: &str = "Who built the tower?";

/// Write the fixture vocabulary into `dir`
pub fn write_vocab(dir: &Path) -> PathBuf {
    let path = dir.join(VOCAB_TXT);
    std::fs::write(&path, VOCAB.join("\n")).unwrap();
    path
}

pub fn test_tokenizer(dir: &Path) -> Tokenizer {
    wordpiece_tokenizer(&write_vocab(dir), true).unwrap()
}

/// Scores the first context occurrence of `start_word` as the span start and
/// the next context occurrence of `end_word` as the span end.
pub struct KeywordScorer {
    start_word: String,
    end_word: String,
    pub calls: Arc<AtomicUsize>,
    pub longest_input: Arc<AtomicUsize>,
}

impl KeywordScorer {
    pub fn new(start_word: &str, end_word: &str) -> Self {
        Self {
            start_word: start_word.to_string(),
            end_word: end_word.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            longest_input: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SpanScorer for KeywordScorer {
    fn span_logits(&self, encoding: &Encoding) -> qaserve_core::Result<SpanLogits> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tokens = encoding.get_tokens();
        self.longest_input.fetch_max(tokens.len(), Ordering::SeqCst);

        let sequence_ids = encoding.get_sequence_ids();
        let in_context = |i: usize| sequence_ids[i] == Some(1);

        let mut start = vec![0.0; tokens.len()];
        let mut end = vec![0.0; tokens.len()];

        let start_pos = (0..tokens.len()).find(|&i| in_context(i) && tokens[i] == self.start_word);
        if let Some(pos) = start_pos {
            start[pos] = 10.0;
        }
        let end_from = start_pos.unwrap_or(0);
        let end_pos = (end_from..tokens.len())
            .find(|&i| in_context(i) && tokens[i] == self.end_word)
            .or_else(|| (0..tokens.len()).find(|&i| in_context(i) && tokens[i] == self.end_word));
        if let Some(pos) = end_pos {
            end[pos] = 10.0;
        }

        Ok(SpanLogits { start, end })
    }
}

/// How a [`FailingScorer`] misbehaves
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Return an inference error
    Error,
    /// Return one logit fewer than there are tokens
    WrongLength,
}

/// Fails its first `failures` calls, then scores like the wrapped [`KeywordScorer`]
pub struct FailingScorer {
    inner: KeywordScorer,
    failure: Failure,
    remaining: AtomicUsize,
}

impl FailingScorer {
    pub fn new(inner: KeywordScorer, failure: Failure, failures: usize) -> Self {
        Self {
            inner,
            failure,
            remaining: AtomicUsize::new(failures),
        }
    }
}

impl SpanScorer for FailingScorer {
    fn span_logits(&self, encoding: &Encoding) -> qaserve_core::Result<SpanLogits> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !failing {
            return self.inner.span_logits(encoding);
        }

        match self.failure {
            Failure::Error => Err(QaError::Inference("device lost".to_string())),
            Failure::WrongLength => {
                let mut logits = self.inner.span_logits(encoding)?;
                logits.start.pop();
                logits.end.pop();
                Ok(logits)
            }
        }
    }
}

/// Sleeps before scoring like the wrapped [`KeywordScorer`]
pub struct SlowScorer {
    inner: KeywordScorer,
    delay: Duration,
}

impl SlowScorer {
    pub fn new(inner: KeywordScorer, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl SpanScorer for SlowScorer {
    fn span_logits(&self, encoding: &Encoding) -> qaserve_core::Result<SpanLogits> {
        std::thread::sleep(self.delay);
        self.inner.span_logits(encoding)
    }
}

pub fn load_options(strategy: SpanStrategy, max_seq_len: usize) -> LoadOptions {
    LoadOptions {
        use_gpu: false,
        max_seq_len,
        span: SpanConfig {
            strategy,
            max_answer_len: 30,
        },
    }
}

/// Assemble a model over the fixture vocabulary and `scorer`
pub fn test_model(dir: &Path, scorer: impl SpanScorer + 'static, options: &LoadOptions) -> QaModel {
    QaModel::from_parts(
        "test/keyword-qa",
        ModelLocation::local(dir),
        test_tokenizer(dir),
        Box::new(scorer),
        DeviceKind::Cpu,
        options,
    )
    .unwrap()
}

/// Configuration with a token supplied through the environment lookup
pub fn test_config() -> ServiceConfig {
    ServiceConfig::load_with_env(&ConfigArgs::default(), |key| {
        (key == "auth_token").then(|| "test-token".to_string())
    })
    .unwrap()
}

/// Registry serving files out of a local directory
pub struct FakeRegistry {
    source: TempDir,
    failing: HashSet<String>,
    pub fetches: AtomicUsize,
}

impl FakeRegistry {
    /// Registry whose repositories all hold `files`
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let source = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(source.path().join(name), contents).unwrap();
        }
        Self {
            source,
            failing: HashSet::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Registry holding a complete BERT checkpoint layout
    pub fn bert_checkpoint() -> Self {
        let vocab = VOCAB.join("\n");
        Self::with_files(&[
            ("config.json", &br#"{"model_type": "bert"}"#[..]),
            ("vocab.txt", vocab.as_bytes()),
            ("model.safetensors", &b"weights"[..]),
        ])
    }

    /// Make fetching `filename` fail
    pub fn failing_on(mut self, filename: &str) -> Self {
        self.failing.insert(filename.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelRegistry for FakeRegistry {
    async fn fetch_file(&self, repo_id: &str, filename: &str) -> qaserve_core::Result<PathBuf> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let path = self.source.path().join(filename);
        if self.failing.contains(filename) {
            return Err(QaError::Download(format!("{}: connection reset", filename)));
        }
        if !path.is_file() {
            return Err(QaError::Download(format!("{} has no {}", repo_id, filename)));
        }
        Ok(path)
    }
}
