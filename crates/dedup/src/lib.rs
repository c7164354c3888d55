//! # Insight Dedup
//!
//! Deterministic deduplication for conversation threads and the analytics rows derived from
//! them.
//!
//! Two independent algorithms share one notion of "the best record of a group":
//!
//! - **Clustering** finds near-duplicate threads that carry no common key, by tag and title
//!   similarity inside app/domain buckets.
//! - **Rollup** collapses analytics rows that already carry a group key, with a size-capped
//!   fallback key, and reports the collisions it refused to merge.
//!
//! ## Architecture
//!
//! ```text
//! ThreadRecord[]
//!     │
//!     ├──> Normalization (tags, apps, tokens)
//!     │
//!     ├──> Bucketing (app:<app> | domain:<domain> | unknown)
//!     │
//!     └──> Greedy Clustering (per bucket)
//!          ├─> Signal gate + weighted Jaccard vs. centroid
//!          ├─> Immutable centroid fold on accept
//!          └─> Size filter, CL-xxxxx ids, canonical = winner
//!
//! ThreadBody[] ──> Metrics (CDI, CWID, maturity, load) ──> AnalyticsRow[]
//!     │
//!     ├──> Rollup (cluster_id → primary_home_file ≤ guardrail → missing:<id>)
//!     │
//!     └──> Collisions (fallback prevented, explicit multi-home)
//! ```
//!
//! Both sides pick winners with [`winner_cmp`]: workload index, load score, last activity,
//! then identifier.
//!
//! ## Example
//!
//! ```rust
//! use insight_dedup::{ClusterConfig, ThreadClusterer, ThreadRecord};
//!
//! let clusterer = ThreadClusterer::new(ClusterConfig::default()).unwrap();
//! let records = vec![
//!     ThreadRecord::new("t1", "Vendor onboarding").apps(["notion"]).tags(["vendor onboarding"]),
//!     ThreadRecord::new("t2", "Vendor onboarding v2").apps(["notion"]).tags(["vendor onboarding"]),
//! ];
//!
//! let output = clusterer.cluster(&records).unwrap();
//! // Below the default minimum size of 3
//! assert!(output.clusters.is_empty());
//! assert_eq!(output.unclustered.len(), 2);
//! ```

mod bucket;
mod cluster;
mod collisions;
mod config;
mod error;
mod metrics;
pub mod normalize;
pub mod ranking;
mod rollup;
mod similarity;
mod types;

pub use bucket::BucketKey;
pub use cluster::{cluster_bucket, format_cluster_id, DraftCluster, ThreadClusterer};
pub use collisions::{detect_collisions, explicit_multi_home, fallback_prevented};
pub use config::{BucketPolicy, ClusterConfig, DedupConfig, RollupConfig};
pub use error::{DedupError, Result};
pub use metrics::{density, score_thread, score_threads, ThreadBody, ThreadMetrics};
pub use ranking::{pick_winner, sort_winner_first, winner_cmp, Ranked};
pub use rollup::{roll_up, RowRollup, MISSING_KEY_PREFIX};
pub use similarity::{Centroid, Similarity, ThreadFeatures, MAX_SCORE};
pub use types::{
    AnalyticsRow, ClusterAssignment, ClusterSummary, ClusteringOutput, CollisionRecord,
    DedupeKeyType, RollupGroup, RollupOutput, ThreadRecord,
};
