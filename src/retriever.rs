//! Retrieval on top of the vector index: ranked search, threshold filtering,
//! and bounded context assembly.

use tracing::{debug, error, info};

use crate::document::SearchResult;
use crate::embedding::cosine_distance;
use crate::error::Result;
use crate::index::VectorIndex;

/// Fallback distance threshold when estimation has nothing to work with:
/// the distance equivalent of a 0.7 cosine-similarity cutoff.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Minimum leftover budget for which a truncated context block is still
/// worth emitting.
const TRUNCATION_FLOOR: usize = 100;

/// A read-only view over a [`VectorIndex`] that adds retrieval policy:
/// per-hit logging, distance-threshold filtering, and context assembly.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
}

impl<'a> Retriever<'a> {
    /// Wrap an index.
    pub fn new(index: &'a VectorIndex) -> Self {
        Self { index }
    }

    /// Retrieve the `k` nearest chunks, logging rank, score, and source for
    /// each hit.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        debug!(k, query = %truncate_for_log(query), "similarity search");
        let results = self.index.search(query, k).await?;
        for (rank, result) in results.iter().enumerate() {
            debug!(
                rank = rank + 1,
                score = result.score,
                source = %result.chunk.metadata.source,
                "retrieved chunk"
            );
        }
        Ok(results)
    }

    /// Retrieve with a distance cutoff: fetch `2k` candidates, keep those
    /// with `score <= threshold`, truncate to `k`.
    ///
    /// Over-fetching compensates for filtering removing candidates while
    /// still bounding the result count near `k`.
    pub async fn search_with_threshold(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        let mut results = self.search(query, k * 2).await?;
        results.retain(|r| r.score <= threshold);
        results.truncate(k);
        info!(kept = results.len(), threshold, "filtered results by distance threshold");
        Ok(results)
    }

    /// Retrieve `k` chunks and assemble them into a context string bounded
    /// by `max_context_length` characters.
    pub async fn assemble_context(
        &self,
        query: &str,
        k: usize,
        max_context_length: usize,
    ) -> Result<String> {
        let results = self.search(query, k).await?;
        let context = assemble_blocks(&results, max_context_length);
        info!(
            context_length = context.len(),
            results = results.len(),
            "assembled retrieval context"
        );
        Ok(context)
    }

    /// Suggest a distance threshold for this query: the given percentile of
    /// the cosine-distance distribution between the query and the samples.
    ///
    /// Best-effort diagnostic: returns [`DEFAULT_THRESHOLD`] when `samples`
    /// is empty or on any embedding error, never a hard failure.
    pub async fn estimate_threshold(
        &self,
        query: &str,
        samples: &[String],
        percentile: f64,
    ) -> f32 {
        if samples.is_empty() {
            return DEFAULT_THRESHOLD;
        }
        match self.try_estimate(query, samples, percentile).await {
            Ok(threshold) => threshold,
            Err(e) => {
                error!(error = %e, "threshold estimation failed");
                DEFAULT_THRESHOLD
            }
        }
    }

    async fn try_estimate(&self, query: &str, samples: &[String], percentile: f64) -> Result<f32> {
        let embedder = self.index.embedder();
        let query_vector = embedder.embed(query).await?;

        let mut distances = Vec::with_capacity(samples.len());
        for sample in samples {
            let sample_vector = embedder.embed(sample).await?;
            distances.push(cosine_distance(&query_vector, &sample_vector));
        }
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let position = (percentile.clamp(0.0, 100.0) / 100.0) * (distances.len() - 1) as f64;
        Ok(distances[position.round() as usize])
    }
}

/// Concatenate retrieval results as labeled blocks within a character budget.
///
/// Blocks take the form `[Source: <name>]\n<text>\n` and are joined by a
/// newline, in ranked order. Assembly stops at the first block that would
/// blow the budget; if more than 100 characters of budget remain at that
/// point, the block is truncated to fit and marked with `...`. The result
/// never exceeds `max_context_length`.
pub fn assemble_blocks(results: &[SearchResult], max_context_length: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0usize;

    for result in results {
        let block = format!(
            "[Source: {}]\n{}\n",
            result.chunk.metadata.source,
            result.chunk.text.trim()
        );
        let separator = usize::from(!parts.is_empty());

        if total + separator + block.len() > max_context_length {
            let remaining = max_context_length.saturating_sub(total + separator);
            if remaining > TRUNCATION_FLOOR {
                let cut = floor_char_boundary(&block, remaining - 3);
                parts.push(format!("{}...", &block[..cut]));
            }
            break;
        }

        total += separator + block.len();
        parts.push(block);
    }

    parts.join("\n")
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn truncate_for_log(query: &str) -> &str {
    let end = query.len().min(50);
    &query[..floor_char_boundary(query, end)]
}
