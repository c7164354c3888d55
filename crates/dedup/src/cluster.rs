use std::collections::HashMap;

use crate::bucket::{partition, BucketKey};
use crate::config::{BucketPolicy, ClusterConfig};
use crate::error::{DedupError, Result};
use crate::normalize::union_capped;
use crate::ranking::{pick_winner, sort_winner_first};
use crate::similarity::{Centroid, ThreadFeatures};
use crate::types::{ClusterAssignment, ClusterSummary, ClusteringOutput, ThreadRecord};

/// A cluster while its bucket is still being processed
#[derive(Debug, Clone)]
pub struct DraftCluster<'a> {
    /// Indices into the feature slice, in acceptance order
    pub members: Vec<usize>,
    pub centroid: Centroid<'a>,
}

impl<'a> DraftCluster<'a> {
    fn seed(idx: usize, member: &'a ThreadFeatures) -> Self {
        Self {
            members: vec![idx],
            centroid: Centroid::seed(member),
        }
    }
}

/// Greedy single pass over one bucket.
///
/// Each record joins the cluster whose centroid scores highest, provided that score reaches
/// the policy threshold; otherwise it starts a new cluster. On equal scores the older cluster
/// wins. Nothing is discarded here.
pub fn cluster_bucket<'a>(
    policy: &BucketPolicy,
    features: &'a [ThreadFeatures],
    members: &[usize],
) -> Vec<DraftCluster<'a>> {
    let mut drafts: Vec<DraftCluster<'a>> = Vec::new();

    for &idx in members {
        let member = &features[idx];

        let mut best: Option<(usize, f64)> = None;
        for (pos, draft) in drafts.iter().enumerate() {
            let score = draft.centroid.similarity(policy, member).score;
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((pos, score));
            }
        }

        match best {
            Some((pos, score)) if score >= policy.accept_threshold => {
                let draft = &mut drafts[pos];
                draft.centroid = draft.centroid.absorb(member);
                draft.members.push(idx);
            }
            _ => drafts.push(DraftCluster::seed(idx, member)),
        }
    }

    drafts
}

/// Buckets records, clusters each bucket, drops small clusters and numbers the rest.
pub struct ThreadClusterer {
    config: ClusterConfig,
}

impl ThreadClusterer {
    /// Fails on an invalid config, before any record is looked at
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster a record population.
    ///
    /// Records are processed newest first (shared winner order), so the result does not depend
    /// on input order. The exception is records with an empty `thread_uid` that tie on every
    /// other key: those keep their relative input order. Cluster ids are handed out after every bucket is done: biggest first,
    /// then by bucket and cluster creation order.
    pub fn cluster(&self, records: &[ThreadRecord]) -> Result<ClusteringOutput> {
        let mut features: Vec<ThreadFeatures> = records
            .iter()
            .map(|record| ThreadFeatures::from_record(record, self.config.max_tags))
            .collect();
        ensure_unique_ids(&features)?;

        let bad_timestamps = features.iter().filter(|f| f.has_bad_timestamp()).count();
        if bad_timestamps > 0 {
            log::warn!(
                "{} thread(s) have unparsable last_active_at; ranking them as oldest",
                bad_timestamps
            );
        }

        sort_winner_first(&mut features);
        let buckets = partition(features.iter().map(|f| &f.bucket).enumerate());

        let mut kept: Vec<(&BucketKey, DraftCluster<'_>)> = Vec::new();
        for (key, members) in &buckets {
            let drafts = cluster_bucket(key.policy(&self.config), &features, members);
            let total = drafts.len();
            let before = kept.len();
            kept.extend(
                drafts
                    .into_iter()
                    .filter(|draft| draft.members.len() >= self.config.min_cluster_size)
                    .map(|draft| (key, draft)),
            );
            log::debug!(
                "bucket {}: {} records -> {} clusters, {} kept",
                key,
                members.len(),
                total,
                kept.len() - before
            );
        }

        // Stable sort: equal sizes keep bucket order, then cluster creation order.
        kept.sort_by(|a, b| b.1.members.len().cmp(&a.1.members.len()));

        let mut output = ClusteringOutput::default();
        let mut clustered = vec![false; features.len()];

        for (seq, (key, draft)) in kept.iter().enumerate() {
            let cluster_id = format_cluster_id(seq + 1);
            let members: Vec<&ThreadFeatures> =
                draft.members.iter().map(|&i| &features[i]).collect();

            let Some(canonical) = pick_winner(members.iter().copied()) else {
                continue;
            };
            let canonical_seed = Centroid::seed(canonical);
            let policy = key.policy(&self.config);

            for (&idx, member) in draft.members.iter().zip(&members) {
                clustered[idx] = true;
                let duplicate_confidence = if std::ptr::eq(*member, canonical) {
                    0.0
                } else {
                    round2(canonical_seed.similarity(policy, member).score)
                };
                output.assignments.push(ClusterAssignment {
                    thread_uid: member.thread_uid.clone(),
                    cluster_id: cluster_id.clone(),
                    duplicate_confidence,
                });
            }

            output.clusters.push(ClusterSummary {
                cluster_id,
                canonical_uid: canonical.thread_uid.clone(),
                uids: members.iter().map(|m| m.thread_uid.clone()).collect(),
                bucket: key.to_string(),
                focus: key.focus().to_string(),
                apps: union_capped(
                    members.iter().map(|m| m.apps.as_slice()),
                    self.config.union_apps_cap,
                ),
                tags: union_capped(
                    members.iter().map(|m| m.tags.as_slice()),
                    self.config.union_tags_cap,
                ),
                size: members.len(),
            });
        }

        output.unclustered = features
            .iter()
            .enumerate()
            .filter(|(idx, _)| !clustered[*idx])
            .map(|(_, f)| f.thread_uid.clone())
            .collect();

        log::info!(
            "Built {} clusters (min_size={}) from {} threads in {} buckets; {} unclustered",
            output.clusters.len(),
            self.config.min_cluster_size,
            features.len(),
            buckets.len(),
            output.unclustered.len()
        );

        Ok(output)
    }
}

/// `CL-00001` style identifier
pub fn format_cluster_id(seq: usize) -> String {
    format!("CL-{seq:05}")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ensure_unique_ids(features: &[ThreadFeatures]) -> Result<()> {
    let mut seen: HashMap<&str, &BucketKey> = HashMap::new();
    for f in features.iter().filter(|f| !f.thread_uid.is_empty()) {
        if let Some(first) = seen.insert(f.thread_uid.as_str(), &f.bucket) {
            return Err(DedupError::duplicate_identifier(
                f.thread_uid.clone(),
                format!("thread records (buckets {first} and {})", f.bucket),
            ));
        }
    }
    Ok(())
}
