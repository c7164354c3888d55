//! Advisory diagnostics over an analytics row population.
//!
//! Computed from the rows themselves rather than from rollup groups, so rows the guardrail kept
//! apart are still seen. Nothing here changes grouping.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::RollupConfig;
use crate::error::Result;
use crate::ranking::winner_cmp;
use crate::types::{AnalyticsRow, CollisionRecord};

/// Both collision checks, fallback-prevented first.
///
/// Fallback-prevented records are ordered by row count descending, then key; multi-home
/// records by key.
pub fn detect_collisions(rows: &[AnalyticsRow], config: &RollupConfig) -> Result<Vec<CollisionRecord>> {
    config.validate()?;

    let mut collisions = fallback_prevented(rows, config);
    let prevented = collisions.len();
    collisions.extend(explicit_multi_home(rows));

    if !collisions.is_empty() {
        log::info!(
            "Found {} collisions ({} fallback prevented, {} multi-home)",
            collisions.len(),
            prevented,
            collisions.len() - prevented
        );
    }

    Ok(collisions)
}

/// Fallback keys carried by more rows than `fallback_guardrail_max`
pub fn fallback_prevented(rows: &[AnalyticsRow], config: &RollupConfig) -> Vec<CollisionRecord> {
    let mut by_key: BTreeMap<&str, Vec<&AnalyticsRow>> = BTreeMap::new();
    for row in rows {
        if let Some(key) = row.fallback_key() {
            by_key.entry(key).or_default().push(row);
        }
    }

    let mut prevented: Vec<(&str, Vec<&AnalyticsRow>)> = by_key
        .into_iter()
        .filter(|(_, members)| members.len() > config.fallback_guardrail_max)
        .collect();
    // BTreeMap already yields keys ascending; the stable sort keeps that for equal counts.
    prevented.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    prevented
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|a, b| winner_cmp(*a, *b));
            CollisionRecord::FallbackPrevented {
                primary_home_file: key.to_string(),
                dupe_count: members.len(),
                sample_titles: members
                    .iter()
                    .take(config.collision_sample_titles)
                    .map(|r| r.title.clone())
                    .collect(),
            }
        })
        .collect()
}

/// Explicit keys whose rows declare more than one distinct fallback key
pub fn explicit_multi_home(rows: &[AnalyticsRow]) -> Vec<CollisionRecord> {
    let mut by_key: BTreeMap<&str, (BTreeSet<&str>, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(key) = row.explicit_key() {
            let (homes, count) = by_key.entry(key).or_default();
            *count += 1;
            if let Some(home) = row.fallback_key() {
                homes.insert(home);
            }
        }
    }

    by_key
        .into_iter()
        .filter(|(_, (homes, _))| homes.len() > 1)
        .map(|(key, (homes, count))| CollisionRecord::ExplicitMultiHome {
            cluster_id: key.to_string(),
            primary_home_files: homes.into_iter().map(str::to_string).collect(),
            dupe_count: count,
        })
        .collect()
}
