//! Key-based rollup of analytics rows.
//!
//! Each row lands in exactly one group:
//!
//! 1. explicit key (`cluster_id`) when present,
//! 2. else the fallback key (`primary_home_file`) when between 2 and `fallback_guardrail_max`
//!    rows share it across the whole population,
//! 3. else a singleton keyed `missing:<thread_uid>`.
//!
//! Fallback keys shared by more rows than the guardrail allows are left unmerged and show up
//! in the collision report instead.

use std::collections::{HashMap, HashSet};

use crate::collisions::detect_collisions;
use crate::config::RollupConfig;
use crate::error::{DedupError, Result};
use crate::ranking::winner_cmp;
use crate::types::{AnalyticsRow, DedupeKeyType, RollupGroup, RollupOutput};

/// Prefix of the key given to rows that group with nothing
pub const MISSING_KEY_PREFIX: &str = "missing:";

/// Groups analytics rows and reports collisions
pub struct RowRollup {
    config: RollupConfig,
}

impl RowRollup {
    /// Fails on an invalid config, before any row is looked at
    pub fn new(config: RollupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Groups plus collision diagnostics for one population
    pub fn run(&self, rows: &[AnalyticsRow]) -> Result<RollupOutput> {
        let rollups = self.group(rows)?;
        let collisions = detect_collisions(rows, &self.config)?;
        Ok(RollupOutput {
            rollups,
            collisions,
        })
    }

    /// Group rows.
    ///
    /// Groups come out ordered by their winners, members by the shared winner order, so the
    /// result does not depend on input order. Rows with an empty `thread_uid` that tie on every
    /// other key are the exception: they keep their relative input order.
    pub fn group(&self, rows: &[AnalyticsRow]) -> Result<Vec<RollupGroup>> {
        ensure_unique_ids(rows)?;

        let fallback_counts = fallback_counts(rows);
        let guardrail = self.config.fallback_guardrail_max;
        for (key, count) in &fallback_counts {
            if *count > guardrail {
                log::warn!(
                    "primary_home_file '{}' is shared by {} rows (guardrail {}); not merging",
                    key,
                    count,
                    guardrail
                );
            }
        }

        // Stable: rows that tie completely keep input order.
        let mut ranked: Vec<&AnalyticsRow> = rows.iter().collect();
        ranked.sort_by(|a, b| winner_cmp(*a, *b));

        let mut slots: HashMap<(DedupeKeyType, &str), usize> = HashMap::new();
        let mut members: Vec<(DedupeKeyType, String, Vec<&AnalyticsRow>)> = Vec::new();

        for row in ranked {
            let key = self.key_for(row, &fallback_counts);
            match key {
                Some((key_type, key)) => match slots.get(&(key_type, key)) {
                    Some(&slot) => members[slot].2.push(row),
                    None => {
                        slots.insert((key_type, key), members.len());
                        members.push((key_type, key.to_string(), vec![row]));
                    }
                },
                None => members.push((
                    DedupeKeyType::None,
                    format!("{MISSING_KEY_PREFIX}{}", row.thread_uid.trim()),
                    vec![row],
                )),
            }
        }

        let groups: Vec<RollupGroup> = members
            .into_iter()
            .filter_map(|(key_type, key, rows)| build_group(key_type, key, &rows))
            .collect();

        log::info!(
            "Rolled up {} rows into {} groups ({} explicit, {} fallback)",
            rows.len(),
            groups.len(),
            groups
                .iter()
                .filter(|g| g.dedupe_key_type == DedupeKeyType::Explicit)
                .count(),
            groups
                .iter()
                .filter(|g| g.dedupe_key_type == DedupeKeyType::Fallback)
                .count()
        );

        Ok(groups)
    }

    /// `None` means the row stays on its own
    fn key_for<'a>(
        &self,
        row: &'a AnalyticsRow,
        fallback_counts: &HashMap<&str, usize>,
    ) -> Option<(DedupeKeyType, &'a str)> {
        if let Some(key) = row.explicit_key() {
            return Some((DedupeKeyType::Explicit, key));
        }

        let key = row.fallback_key()?;
        let count = fallback_counts.get(key).copied().unwrap_or(0);
        (2..=self.config.fallback_guardrail_max)
            .contains(&count)
            .then_some((DedupeKeyType::Fallback, key))
    }
}

/// Number of rows carrying each fallback key, explicit-keyed rows included
fn fallback_counts(rows: &[AnalyticsRow]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for key in rows.iter().filter_map(AnalyticsRow::fallback_key) {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn build_group(key_type: DedupeKeyType, key: String, rows: &[&AnalyticsRow]) -> Option<RollupGroup> {
    let winner = rows.first()?;

    let loads: Vec<f64> = rows
        .iter()
        .map(|r| r.load_score)
        .filter(|load| load.is_finite())
        .collect();
    let load_sum: f64 = loads.iter().sum();
    let load_max = loads.iter().copied().reduce(f64::max).unwrap_or(0.0);

    if rows.len() > 1 {
        log::debug!(
            "{} '{}': {} rows, winner {}",
            key_type.as_str(),
            key,
            rows.len(),
            winner.thread_uid
        );
    }

    Some(RollupGroup {
        dedupe_key_type: key_type,
        dedupe_key: key,
        winner: (*winner).clone(),
        member_uids: rows.iter().map(|r| r.thread_uid.clone()).collect(),
        dupe_count: rows.len(),
        load_sum,
        load_max,
    })
}

fn ensure_unique_ids(rows: &[AnalyticsRow]) -> Result<()> {
    let mut seen = HashSet::new();
    for row in rows {
        let id = row.thread_uid.trim();
        if !id.is_empty() && !seen.insert(id) {
            return Err(DedupError::duplicate_identifier(id, "analytics rows"));
        }
    }
    Ok(())
}

/// Convenience wrapper: validate `config` and run one rollup
pub fn roll_up(rows: &[AnalyticsRow], config: &RollupConfig) -> Result<RollupOutput> {
    RowRollup::new(config.clone())?.run(rows)
}
