use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::data::WordEntry;
use crate::error::{DrillError, Result};

/// The speech endpoint rejects longer requests, so text is sent in pieces.
const MAX_CHUNK_CHARS: usize = 100;

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// MP3 bytes for one spoken prompt. Cloning shares the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip(Arc<[u8]>);

impl AudioClip {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Joins clips back to back. MP3 frames are self-delimiting, so players
    /// treat the result as one stream.
    pub fn concat<'a>(clips: impl IntoIterator<Item = &'a AudioClip>) -> Self {
        let mut joined = Vec::new();
        for clip in clips {
            joined.extend_from_slice(clip.bytes());
        }
        Self::new(joined)
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioClip({} bytes)", self.0.len())
    }
}

/// Turns English text into spoken audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub endpoint: String,
    pub language: String,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.google.com/translate_tts".to_string(),
            language: "en".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the Google Translate text-to-speech endpoint.
#[derive(Clone)]
pub struct TranslateTts {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl TranslateTts {
    pub fn new(config: SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn chunk_url(&self, chunk: &str, idx: usize, total: usize) -> String {
        format!(
            "{endpoint}?ie=UTF-8&client=tw-ob&tl={lang}&total={total}&idx={idx}&textlen={len}&q={q}",
            endpoint = self.config.endpoint,
            lang = utf8_percent_encode(&self.config.language, NON_ALPHANUMERIC),
            len = chunk.chars().count(),
            q = utf8_percent_encode(chunk, NON_ALPHANUMERIC),
        )
    }

    async fn fetch_chunk(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DrillError::SynthesisFailed(err.to_string()))?
            .error_for_status()
            .map_err(|err| DrillError::SynthesisFailed(err.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| DrillError::SynthesisFailed(err.to_string()))?;
        if bytes.is_empty() {
            return Err(DrillError::SynthesisFailed(
                "speech endpoint returned no audio".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }
}

impl Default for TranslateTts {
    fn default() -> Self {
        Self::new(SpeechConfig::default())
    }
}

#[async_trait]
impl Synthesizer for TranslateTts {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(DrillError::SynthesisFailed("nothing to speak".to_string()));
        }
        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, idx, total);
            audio.extend(self.fetch_chunk(&url).await?);
        }
        debug!(chars = text.len(), chunks = total, bytes = audio.len(), "synthesized speech");
        Ok(AudioClip::new(audio))
    }
}

/// Splits `text` at whitespace into pieces of at most `max_chars` characters.
/// A single word longer than the limit is cut mid-word.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();
        while word_chars.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word_chars.split_off(max_chars);
            chunks.push(word_chars.into_iter().collect());
            word_chars = rest;
        }
        let len = word_chars.len();
        if len == 0 {
            continue;
        }
        let needed = if current.is_empty() { len } else { len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word_chars);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Reads a range aloud as "Number 1, specialize. Number 2, ...".
///
/// Unlike drill generation this is all or nothing: one failed entry fails the
/// whole narration.
pub async fn narrate(synth: &dyn Synthesizer, entries: &[&WordEntry]) -> Result<AudioClip> {
    let mut clips = Vec::with_capacity(entries.len());
    for entry in entries {
        let line = format!("Number {}, {}", entry.sid, entry.word);
        clips.push(synth.synthesize(&line).await?);
    }
    Ok(AudioClip::concat(&clips))
}
