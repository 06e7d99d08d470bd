//! In-crate fakes for the provider capabilities.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::rag::ChatModel;
use async_trait::async_trait;
use std::sync::Mutex;

/// Deterministic bag-of-words embedder.
///
/// Each lowercase word is hashed into one of `dimensions` buckets, so texts that
/// share words score higher under cosine similarity.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Chat model that answers with the system instruction it was given.
///
/// Since the instruction embeds the retrieved context, tests can inspect exactly
/// what was retrieved.
#[derive(Default)]
pub struct EchoChat {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatModel for EchoChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(system.to_string())
    }
}
