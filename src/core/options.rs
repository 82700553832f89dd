//! Options for mapping jobs and external fetches

use std::sync::Arc;
use std::time::Duration;

/// Default number of query keys per thematic request
pub const DEFAULT_CHUNK_SIZE: usize = 25;

/// Default NVDB object type for thematic queries (speed limits)
pub const DEFAULT_OBJECT_TYPE: u32 = 105;

/// Progress callback function type, receives (completed, total) query chunks
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Retry behaviour for transient fetch failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// How external fetches are executed
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Per-request timeout; expiry counts as a transient fetch error
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Maximum number of link sequences fetched at the same time
    pub max_concurrent: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_concurrent: default_concurrency(),
        }
    }
}

/// Concurrent link-sequence fetches: twice the CPU count, capped at 16
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 2).clamp(1, 16)
}

/// Options for a mapping job
#[derive(Clone)]
pub struct MappingOptions {
    /// Fail an interval on ambiguous boundary matches instead of warning
    pub strict: bool,

    /// Number of query keys per thematic request
    pub chunk_size: usize,

    /// NVDB object type to fetch for the mapped route
    pub object_type: u32,

    pub fetch: FetchPolicy,

    /// Optional progress callback over thematic query chunks
    pub progress: Option<ProgressCallback>,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            strict: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            object_type: DEFAULT_OBJECT_TYPE,
            fetch: FetchPolicy::default(),
            progress: None,
        }
    }
}

impl std::fmt::Debug for MappingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingOptions")
            .field("strict", &self.strict)
            .field("chunk_size", &self.chunk_size)
            .field("object_type", &self.object_type)
            .field("fetch", &self.fetch)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
