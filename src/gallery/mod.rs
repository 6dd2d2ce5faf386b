use crate::media::InlinePayload;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod store;

// `source` always points at the original upload, never at another
// generated image, so repeated enhancements share one lineage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedImage {
    pub id: String,
    pub created_at: i64,
    pub image: InlinePayload,
    pub source: InlinePayload,
}

static SEQ: AtomicU64 = AtomicU64::new(0);

impl EnhancedImage {
    // The counter keeps ids distinct when two records land in the same
    // millisecond.
    pub fn new(image: InlinePayload, source: InlinePayload) -> Self {
        let created_at = chrono::Utc::now().timestamp_millis();
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("img_{created_at}_{seq:04}"),
            created_at,
            image,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(tag: &str) -> InlinePayload {
        InlinePayload::from_bytes("image/png", tag.as_bytes())
    }

    #[test]
    fn fresh_ids_are_pairwise_distinct() {
        let ids: Vec<String> = (0..50)
            .map(|_| EnhancedImage::new(payload("out"), payload("in")).id)
            .collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn record_keeps_the_source_it_was_built_from() {
        let source = payload("original upload");
        let record = EnhancedImage::new(payload("generated"), source.clone());
        assert_eq!(record.source, source);
    }
}
