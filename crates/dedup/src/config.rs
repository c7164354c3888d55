use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};

const WEIGHT_EPSILON: f64 = 1e-6;

/// Full configuration for one clustering + rollup run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupConfig {
    /// Fuzzy clustering of thread records
    pub cluster: ClusterConfig,

    /// Key-based rollup of analytics rows
    pub rollup: RollupConfig,
}

impl DedupConfig {
    /// Parse a TOML document and validate it. Missing sections fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.rollup.validate()
    }
}

/// Similarity policy for one kind of bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketPolicy {
    /// Minimum score needed to join an existing cluster
    pub accept_threshold: f64,

    /// Title Jaccard needed to open the gate with a single shared tag word
    pub title_gate: f64,

    /// Tag Jaccard that opens the gate on its own
    pub tag_jaccard_floor: f64,

    /// Weight of tag similarity in the score
    pub tag_weight: f64,

    /// Weight of title similarity in the score
    pub title_weight: f64,
}

impl BucketPolicy {
    /// Policy for `app:` buckets. Records sharing an app are already related, so it is looser.
    pub fn app() -> Self {
        Self {
            accept_threshold: 0.40,
            title_gate: 0.55,
            tag_jaccard_floor: 0.50,
            tag_weight: 0.65,
            title_weight: 0.35,
        }
    }

    /// Policy for `domain:` and `unknown` buckets
    pub fn domain() -> Self {
        Self {
            accept_threshold: 0.45,
            title_gate: 0.82,
            tag_jaccard_floor: 0.60,
            tag_weight: 0.75,
            title_weight: 0.25,
        }
    }

    fn validate(&self, tier: &str) -> Result<()> {
        let fields = [
            ("accept_threshold", self.accept_threshold),
            ("title_gate", self.title_gate),
            ("tag_jaccard_floor", self.tag_jaccard_floor),
            ("tag_weight", self.tag_weight),
            ("title_weight", self.title_weight),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DedupError::invalid_config(
                    format!("cluster.{tier}.{name}"),
                    format!("must be within [0, 1], got {value}"),
                ));
            }
        }

        // A zero floor or threshold would let records with no shared signal merge.
        for (name, value) in [
            ("accept_threshold", self.accept_threshold),
            ("tag_jaccard_floor", self.tag_jaccard_floor),
        ] {
            if value == 0.0 {
                return Err(DedupError::invalid_config(
                    format!("cluster.{tier}.{name}"),
                    "must be > 0",
                ));
            }
        }

        let weight_sum = self.tag_weight + self.title_weight;
        if (weight_sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(DedupError::invalid_config(
                format!("cluster.{tier}"),
                format!("tag_weight + title_weight must equal 1, got {weight_sum}"),
            ));
        }

        Ok(())
    }
}

/// Configuration for greedy similarity clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Clusters smaller than this are discarded
    pub min_cluster_size: usize,

    /// Maximum cleaned tags kept per record
    pub max_tags: usize,

    /// Maximum apps listed on a cluster summary
    pub union_apps_cap: usize,

    /// Maximum tags listed on a cluster summary
    pub union_tags_cap: usize,

    /// Policy for `app:` buckets
    pub app: BucketPolicy,

    /// Policy for `domain:` and `unknown` buckets
    pub domain: BucketPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            max_tags: 15,
            union_apps_cap: 8,
            union_tags_cap: 25,
            app: BucketPolicy::app(),
            domain: BucketPolicy::domain(),
        }
    }
}

impl ClusterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(DedupError::invalid_config(
                "cluster.min_cluster_size",
                format!("must be >= 2, got {}", self.min_cluster_size),
            ));
        }

        for (name, value) in [
            ("max_tags", self.max_tags),
            ("union_apps_cap", self.union_apps_cap),
            ("union_tags_cap", self.union_tags_cap),
        ] {
            if value == 0 {
                return Err(DedupError::invalid_config(
                    format!("cluster.{name}"),
                    "must be > 0",
                ));
            }
        }

        self.app.validate("app")?;
        self.domain.validate("domain")?;

        if self.domain.accept_threshold < self.app.accept_threshold {
            return Err(DedupError::invalid_config(
                "cluster.domain.accept_threshold",
                format!(
                    "domain buckets cannot be looser than app buckets ({} < {})",
                    self.domain.accept_threshold, self.app.accept_threshold
                ),
            ));
        }

        Ok(())
    }
}

/// Configuration for key-based rollup and collision reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollupConfig {
    /// Largest group a fallback key may form; bigger groups stay unmerged
    pub fallback_guardrail_max: usize,

    /// Sample titles attached to a fallback collision
    pub collision_sample_titles: usize,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            fallback_guardrail_max: 3,
            collision_sample_titles: 3,
        }
    }
}

impl RollupConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fallback_guardrail_max < 2 {
            return Err(DedupError::invalid_config(
                "rollup.fallback_guardrail_max",
                format!("must be >= 2, got {}", self.fallback_guardrail_max),
            ));
        }

        if self.collision_sample_titles == 0 {
            return Err(DedupError::invalid_config(
                "rollup.collision_sample_titles",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
