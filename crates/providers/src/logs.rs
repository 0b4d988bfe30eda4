//! Paginated log queries.

use crate::{BlockTag, ChainProvider, FilteredLog, LogFilter, ProviderError, ProviderResult};
use tracing::debug;

/// Bounds a single `getLogs` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQueryConfig {
    /// The maximum number of blocks covered by one request.
    pub max_block_range: u64,
}

impl Default for LogQueryConfig {
    /// Ten thousand blocks, the limit most public endpoints enforce.
    fn default() -> Self {
        Self { max_block_range: 10_000 }
    }
}

/// Fetches every log matching `filter`, in chain order.
///
/// The range is split into windows of at most `max_block_range` blocks. A window the provider
/// rejects with [ProviderError::LogRangeTooLarge] is bisected until it is accepted; a single
/// block range that is still rejected fails the query.
pub async fn fetch_logs<P: ChainProvider>(
    provider: &P,
    filter: &LogFilter,
    config: &LogQueryConfig,
) -> ProviderResult<Vec<FilteredLog>> {
    let to_block = match filter.to_block {
        BlockTag::Number(number) => number,
        BlockTag::Latest => provider.block_number().await?,
    };
    if filter.from_block > to_block {
        return Ok(Vec::new());
    }

    let step = config.max_block_range.max(1);
    let mut pending = Vec::new();
    let mut start = filter.from_block;
    loop {
        let end = start.saturating_add(step - 1).min(to_block);
        pending.push((start, end));
        if end == to_block {
            break;
        }
        start = end + 1;
    }
    // Windows are popped from the back.
    pending.reverse();

    let mut logs = Vec::new();
    while let Some((from, to)) = pending.pop() {
        match provider.get_logs(&filter.with_range(from, to)).await {
            Ok(batch) => logs.extend(batch),
            Err(ProviderError::LogRangeTooLarge { .. }) if from < to => {
                let mid = from + (to - from) / 2;
                debug!(target: "provider", from, to, mid, "Bisecting rejected log range");
                pending.push((mid + 1, to));
                pending.push((from, mid));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(logs)
}
