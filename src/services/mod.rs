//! Services Layer
//!
//! Series handling shared by the command layer and the job orchestrator.
//!
//! # Architecture
//!
//! ```text
//! CLI --> Commands --> Services --> DuckDB
//!                  └─> Jobs ─────┘
//! ```
//!
//! # Services
//!
//! - `ingest_service` - Upload parsing, hour normalisation, resampling
//! - `TimeSeriesStore` - One hourly series with continuity and upsert guarantees
//! - `ReadinessEvaluator` - Whether the stores can support a forecast window
//! - `SnapshotBuilder` - Training table for a window
//! - `SyncService` - Weather feed ingestion

pub mod ingest_service;
pub mod series_service;
pub mod readiness_service;
pub mod snapshot_service;
pub mod sync_service;

// Re-export commonly used types and services
pub use ingest_service::{IngestRow, RawTable, RowTime, UploadColumns};
pub use series_service::{
    IngestReport, MissingValues, ReadinessWindow, SeriesKind, SeriesPoint, SeriesStores,
    SeriesSummary, TimeSeriesStore,
};
pub use readiness_service::{ReadinessEvaluator, ReadinessReport, SeriesReadiness};
pub use snapshot_service::{SnapshotBuilder, SnapshotRow, SnapshotTable, SNAPSHOT_FILE};
pub use sync_service::{CommandFeed, FeedRow, SyncService, WeatherFeed};
