use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ranking::{parse_timestamp, Ranked};

/// A normalized conversation thread, input to clustering.
///
/// Every field defaults, missing or `null`, so that a malformed record still takes part in
/// the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub thread_uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub last_active_at: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub apps: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub domain: Option<String>,
}

impl ThreadRecord {
    pub fn new(thread_uid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            thread_uid: thread_uid.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn last_active_at(mut self, at: impl Into<String>) -> Self {
        self.last_active_at = Some(at.into());
        self
    }

    pub fn apps<S: Into<String>>(mut self, apps: impl IntoIterator<Item = S>) -> Self {
        self.apps = apps.into_iter().map(Into::into).collect();
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// One cluster as handed to persistence and rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub canonical_uid: String,
    pub uids: Vec<String>,
    pub bucket: String,
    /// App, domain or `unknown` the bucket was keyed on
    pub focus: String,
    pub apps: Vec<String>,
    pub tags: Vec<String>,
    pub size: usize,
}

/// Group key written back onto a clustered thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub thread_uid: String,
    pub cluster_id: String,
    /// Similarity to the canonical member, two decimals; 0 for the canonical itself
    pub duplicate_confidence: f64,
}

/// Result of one clustering run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutput {
    pub clusters: Vec<ClusterSummary>,
    pub assignments: Vec<ClusterAssignment>,
    pub unclustered: Vec<String>,
}

/// An enriched analytics row, input to rollup. Missing or `null` scalars read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsRow {
    #[serde(deserialize_with = "null_as_default")]
    pub thread_uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Explicit group key
    pub cluster_id: Option<String>,
    /// Fallback group key
    pub primary_home_file: Option<String>,
    /// Density score
    #[serde(rename = "CDI", alias = "cdi", deserialize_with = "null_as_default")]
    pub cdi: f64,
    /// Workload index
    pub cwid: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub maturity_score: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub load_score: f64,
    pub last_active_at: Option<String>,
}

impl AnalyticsRow {
    /// Explicit key, trimmed; `None` when absent or blank
    pub fn explicit_key(&self) -> Option<&str> {
        non_blank(self.cluster_id.as_deref())
    }

    /// Fallback key, trimmed; `None` when absent or blank
    pub fn fallback_key(&self) -> Option<&str> {
        non_blank(self.primary_home_file.as_deref())
    }
}

impl Ranked for AnalyticsRow {
    fn rank_id(&self) -> &str {
        &self.thread_uid
    }

    fn workload_index(&self) -> Option<f64> {
        self.cwid
    }

    fn load_score(&self) -> f64 {
        self.load_score
    }

    fn last_active(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_active_at.as_deref())
    }
}

/// Which key a rollup group was formed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DedupeKeyType {
    #[serde(rename = "cluster_id")]
    Explicit,
    #[serde(rename = "primary_home_file")]
    Fallback,
    #[serde(rename = "none")]
    None,
}

impl DedupeKeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            DedupeKeyType::Explicit => "cluster_id",
            DedupeKeyType::Fallback => "primary_home_file",
            DedupeKeyType::None => "none",
        }
    }
}

/// One deduplicated group of analytics rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupGroup {
    pub dedupe_key_type: DedupeKeyType,
    pub dedupe_key: String,
    pub winner: AnalyticsRow,
    /// Members in winner order; the first is the winner
    pub member_uids: Vec<String>,
    pub dupe_count: usize,
    pub load_sum: f64,
    pub load_max: f64,
}

/// Advisory diagnostics; never feeds back into grouping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionRecord {
    /// A fallback key shared by more rows than the guardrail allows
    FallbackPrevented {
        primary_home_file: String,
        dupe_count: usize,
        sample_titles: Vec<String>,
    },
    /// An explicit key whose rows point at more than one fallback key
    ExplicitMultiHome {
        cluster_id: String,
        primary_home_files: Vec<String>,
        dupe_count: usize,
    },
}

/// Result of one rollup run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupOutput {
    pub rollups: Vec<RollupGroup>,
    pub collisions: Vec<CollisionRecord>,
}

/// Reads an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_thread_record_deserializes_with_defaults() {
        let record: ThreadRecord = serde_json::from_value(json!({ "title": "Orphan" })).unwrap();
        assert_eq!(record.thread_uid, "");
        assert!(record.apps.is_empty());
        assert_eq!(record.last_active_at, None);
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let record: ThreadRecord = serde_json::from_value(json!({
            "thread_uid": "t1",
            "title": null,
            "apps": null,
            "tags": null,
            "domain": null
        }))
        .unwrap();
        assert_eq!(record, ThreadRecord::new("t1", ""));

        let row: AnalyticsRow = serde_json::from_value(json!({
            "thread_uid": "t2",
            "title": null,
            "CDI": null,
            "maturity_score": null,
            "load_score": null
        }))
        .unwrap();
        assert_eq!(row.title, "");
        assert_eq!(row.cdi, 0.0);
        assert_eq!(row.maturity_score, 0);
        assert_eq!(row.load_score, 0.0);
    }

    #[test]
    fn analytics_row_reads_artifact_column_names() {
        let row: AnalyticsRow = serde_json::from_value(json!({
            "thread_uid": "t1",
            "CDI": 12.5,
            "cwid": null,
            "cluster_id": "  ",
            "primary_home_file": " docs/infra/INDEX.md "
        }))
        .unwrap();
        assert_eq!(row.cdi, 12.5);
        assert_eq!(row.explicit_key(), None);
        assert_eq!(row.fallback_key(), Some("docs/infra/INDEX.md"));
    }

    #[test]
    fn dedupe_key_type_serializes_to_column_names() {
        assert_eq!(
            serde_json::to_value(DedupeKeyType::Explicit).unwrap(),
            json!("cluster_id")
        );
        assert_eq!(DedupeKeyType::Fallback.as_str(), "primary_home_file");
        assert_eq!(serde_json::to_value(DedupeKeyType::None).unwrap(), json!("none"));
    }

    #[test]
    fn collision_record_is_tagged_by_kind() {
        let record = CollisionRecord::FallbackPrevented {
            primary_home_file: "docs/a.md".to_string(),
            dupe_count: 4,
            sample_titles: vec![],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "fallback_prevented");
        assert_eq!(value["dupe_count"], 4);
    }
}
