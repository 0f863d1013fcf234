//! Text embedding.
//!
//! [`HashEmbedder`] is a deterministic feature-hashing embedder: character
//! n-grams are hashed with FNV-1a into a fixed number of signed buckets and
//! the result is L2-normalized. It needs no model files, and single-character
//! grams keep it useful for CJK text.

use anyhow::{Result, bail};
use serde::Serialize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Identity of an embedder, stored alongside indexed vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedderInfo {
    pub name: String,
    pub dimension: usize,
}

/// Anything that turns text into a fixed-length vector.
pub trait Embedder {
    fn info(&self) -> EmbedderInfo;

    /// # Errors
    ///
    /// Implementation-specific inference failure.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// # Errors
    ///
    /// The first failure among `texts`.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// FNV-1a character n-gram hashing embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEmbedder {
    dimension: usize,
    ngram_range: (usize, usize),
}

impl HashEmbedder {
    /// Embedder with `dimension` buckets (at least 1) over 1..=3-grams.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            ngram_range: (1, 3),
        }
    }

    /// Use n-grams of length `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < min <= max`.
    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Result<Self> {
        if min == 0 || min > max {
            bail!("invalid n-gram range {min}..={max}");
        }
        self.ngram_range = (min, max);
        Ok(self)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl Embedder for HashEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: format!("fnv1a-hash-{}", self.dimension),
            dimension: self.dimension,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        let chars: Vec<char> = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if chars.is_empty() {
            return Ok(vector);
        }

        let mut gram = String::new();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            for window in chars.windows(n) {
                gram.clear();
                gram.extend(window);
                let h = fnv1a(gram.as_bytes());
                let bucket = (h % self.dimension as u64) as usize;
                let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embedding_is_unit_length() {
        let emb = HashEmbedder::new(64);
        let v = emb.embed("高血压患者的降压目标").expect("embed");
        assert_eq!(v.len(), 64);
        assert!((dot(&v, &v).sqrt() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn deterministic_and_case_insensitive() {
        let emb = HashEmbedder::new(64);
        assert_eq!(emb.embed("Aspirin").expect("a"), emb.embed("aspirin").expect("b"));
    }

    #[test]
    fn blank_input_is_zero_vector() {
        let emb = HashEmbedder::new(32);
        assert!(emb.embed("  \n").expect("embed").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn related_chinese_text_scores_higher() {
        let emb = HashEmbedder::new(384);
        let q = emb.embed("阿司匹林禁忌症").expect("q");
        let related = emb.embed("阿司匹林的禁忌症包括活动性消化道溃疡").expect("r");
        let unrelated = emb.embed("糖尿病患者的饮食管理").expect("u");
        assert!(dot(&q, &related) > dot(&q, &unrelated));
    }

    #[test]
    fn batch_matches_single() {
        let emb = HashEmbedder::default();
        let batch = emb.embed_batch(&["甲", "乙"]).expect("batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], emb.embed("乙").expect("single"));
        assert_eq!(emb.dimension(), 384);
    }

    #[test]
    fn ngram_range_is_validated() {
        assert!(HashEmbedder::new(8).with_ngram_range(0, 2).is_err());
        assert!(HashEmbedder::new(8).with_ngram_range(3, 2).is_err());
        assert!(HashEmbedder::new(8).with_ngram_range(2, 4).is_ok());
    }

    #[test]
    fn zero_dimension_is_raised_to_one() {
        assert_eq!(HashEmbedder::new(0).dimension(), 1);
    }

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_ne!(fnv1a(b"a"), fnv1a(b"b"));
    }
}
