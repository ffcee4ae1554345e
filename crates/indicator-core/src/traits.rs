use crate::{IndicatorError, Record};
use async_trait::async_trait;

/// A data source that yields flat records for the pipeline. The core
/// does not care how the records were produced (HTTP scrape, cached
/// file, test fixture).
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Provider identifier used in logs.
    fn name(&self) -> &'static str;

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError>;
}
