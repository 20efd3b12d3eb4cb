use crate::config::StorageConfig;
use crate::services::stream_registry::StreamLease;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream};
use serde::Deserialize;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

/// Client preference for partial media responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityHint {
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

impl QualityHint {
    pub fn pinned(self) -> Option<QualityTier> {
        match self {
            Self::Auto => None,
            Self::Low => Some(QualityTier::Low),
            Self::Medium => Some(QualityTier::Medium),
            Self::High => Some(QualityTier::High),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub high_bps: u64,
    pub medium_bps: u64,
}

/// Classifies observed throughput. A zero interval carries no signal and
/// maps to `Medium`.
pub fn classify(bytes: u64, elapsed: Duration, thresholds: QualityThresholds) -> QualityTier {
    if elapsed.is_zero() {
        return QualityTier::Medium;
    }
    let bps = bytes as f64 * 8.0 / elapsed.as_secs_f64();
    if bps > thresholds.high_bps as f64 {
        QualityTier::High
    } else if bps > thresholds.medium_bps as f64 {
        QualityTier::Medium
    } else {
        QualityTier::Low
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkSizes {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ChunkSizes {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            low: config.min_chunk_size.max(1),
            medium: config.default_chunk_size.max(1),
            high: config.max_chunk_size.max(1),
        }
    }

    pub fn for_tier(&self, tier: QualityTier) -> usize {
        match tier {
            QualityTier::Low => self.low,
            QualityTier::Medium => self.medium,
            QualityTier::High => self.high,
        }
    }
}

/// Chooses the size of the next chunk a producer reads.
#[derive(Debug, Clone)]
pub enum ChunkPacer {
    Fixed(usize),
    Adaptive {
        sizes: ChunkSizes,
        thresholds: QualityThresholds,
        tier: QualityTier,
    },
}

impl ChunkPacer {
    pub fn fixed(size: usize) -> Self {
        Self::Fixed(size.max(1))
    }

    pub fn adaptive(config: &StorageConfig) -> Self {
        Self::Adaptive {
            sizes: ChunkSizes::from_config(config),
            thresholds: QualityThresholds {
                high_bps: config.quality_high_bps,
                medium_bps: config.quality_medium_bps,
            },
            tier: QualityTier::Medium,
        }
    }

    pub fn next_chunk_size(&self) -> usize {
        match self {
            Self::Fixed(size) => *size,
            Self::Adaptive { sizes, tier, .. } => sizes.for_tier(*tier),
        }
    }

    /// Feeds the throughput of the previous chunk back into the pacer.
    pub fn observe(&mut self, bytes: u64, elapsed: Duration) {
        if let Self::Adaptive {
            thresholds, tier, ..
        } = self
        {
            let next = classify(bytes, elapsed, *thresholds);
            if next != *tier {
                tracing::debug!("Stream quality {:?} -> {:?}", tier, next);
                *tier = next;
            }
        }
    }

    pub fn tier(&self) -> Option<QualityTier> {
        match self {
            Self::Fixed(_) => None,
            Self::Adaptive { tier, .. } => Some(*tier),
        }
    }
}

struct ReadState {
    file: File,
    start: u64,
    remaining: u64,
    positioned: bool,
    failed: bool,
    pacer: ChunkPacer,
    last_yield: Option<(Instant, u64)>,
}

/// Lazy, forward-only producer of exactly `length` bytes starting at `start`.
///
/// A file that ends early yields `UnexpectedEof` and terminates the stream.
/// The optional lease is released when the producer is dropped.
pub struct ChunkProducer {
    inner: BoxStream<'static, io::Result<Bytes>>,
    _lease: Option<StreamLease>,
}

impl ChunkProducer {
    pub fn new(file: File, start: u64, length: u64, pacer: ChunkPacer) -> Self {
        let state = ReadState {
            file,
            start,
            remaining: length,
            positioned: false,
            failed: false,
            pacer,
            last_yield: None,
        };

        let inner = stream::unfold(state, |mut st| async move {
            if st.remaining == 0 || st.failed {
                return None;
            }

            if !st.positioned {
                if let Err(e) = st.file.seek(SeekFrom::Start(st.start)).await {
                    st.failed = true;
                    return Some((Err(e), st));
                }
                st.positioned = true;
            }

            if let Some((at, bytes)) = st.last_yield.take() {
                st.pacer.observe(bytes, at.elapsed());
            }

            let want = (st.pacer.next_chunk_size() as u64).min(st.remaining) as usize;
            let mut buf = vec![0u8; want];
            match st.file.read_exact(&mut buf).await {
                Ok(_) => {
                    st.remaining -= want as u64;
                    st.last_yield = Some((Instant::now(), want as u64));
                    Some((Ok(Bytes::from(buf)), st))
                }
                Err(e) => {
                    tracing::warn!(
                        "Stream truncated with {} bytes outstanding: {}",
                        st.remaining,
                        e
                    );
                    st.failed = true;
                    Some((Err(e), st))
                }
            }
        });

        Self {
            inner: Box::pin(inner),
            _lease: None,
        }
    }

    pub fn with_lease(mut self, lease: StreamLease) -> Self {
        self._lease = Some(lease);
        self
    }
}

impl Stream for ChunkProducer {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    const THRESHOLDS: QualityThresholds = QualityThresholds {
        high_bps: 5_000_000,
        medium_bps: 2_000_000,
    };

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn file_with(bytes: &[u8]) -> (tempfile::NamedTempFile, File) {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), bytes).unwrap();
        let file = File::open(temp.path()).await.unwrap();
        (temp, file)
    }

    #[test]
    fn test_classify() {
        let second = Duration::from_secs(1);
        assert_eq!(classify(1_000_000, second, THRESHOLDS), QualityTier::High);
        assert_eq!(classify(500_000, second, THRESHOLDS), QualityTier::Medium);
        assert_eq!(classify(100_000, second, THRESHOLDS), QualityTier::Low);
        assert_eq!(classify(100, Duration::ZERO, THRESHOLDS), QualityTier::Medium);
    }

    #[test]
    fn test_adaptive_pacer_follows_throughput() {
        let config = StorageConfig::default();
        let mut pacer = ChunkPacer::adaptive(&config);
        assert_eq!(pacer.next_chunk_size(), config.default_chunk_size);

        pacer.observe(10_000_000, Duration::from_secs(1));
        assert_eq!(pacer.next_chunk_size(), config.max_chunk_size);

        pacer.observe(10_000, Duration::from_secs(1));
        assert_eq!(pacer.next_chunk_size(), config.min_chunk_size);
    }

    #[test]
    fn test_fixed_pacer_ignores_throughput() {
        let mut pacer = ChunkPacer::fixed(4096);
        pacer.observe(10_000_000, Duration::from_secs(1));
        assert_eq!(pacer.next_chunk_size(), 4096);
        assert_eq!(pacer.tier(), None);
    }

    #[tokio::test]
    async fn test_full_read_reproduces_bytes() {
        let data = sample(10_000);
        let (_temp, file) = file_with(&data).await;

        let chunks: Vec<Bytes> = ChunkProducer::new(file, 0, data.len() as u64, ChunkPacer::fixed(3000))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![3000, 3000, 3000, 1000]
        );
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_partial_read_is_exact() {
        let data = sample(1000);
        let (_temp, file) = file_with(&data).await;

        let chunks: Vec<Bytes> = ChunkProducer::new(file, 100, 100, ChunkPacer::fixed(64))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.concat(), &data[100..200]);
    }

    #[tokio::test]
    async fn test_truncated_file_ends_with_error() {
        let data = sample(1000);
        let (temp, file) = file_with(&data).await;

        let mut producer = ChunkProducer::new(file, 0, 1000, ChunkPacer::fixed(100));
        assert_eq!(producer.next().await.unwrap().unwrap().len(), 100);

        std::fs::OpenOptions::new()
            .write(true)
            .open(temp.path())
            .unwrap()
            .set_len(150)
            .unwrap();

        let err = producer.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(producer.next().await.is_none());
    }
}
