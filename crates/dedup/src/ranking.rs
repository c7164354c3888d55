//! The single "pick one of N duplicates" order.
//!
//! Sorting by [`winner_cmp`] puts the winner first:
//!
//! 1. workload index, descending (absent ranks lowest)
//! 2. load score, descending
//! 3. last activity, descending (absent or unparsable ranks lowest)
//! 4. identifier, ascending
//!
//! Non-finite scalars rank as the minimum. With distinct identifiers this is a strict total
//! order, so every group has exactly one winner.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Anything that takes part in winner selection
pub trait Ranked {
    /// Stable identifier, the final tie-break
    fn rank_id(&self) -> &str;

    /// Workload index; `None` ranks below every value
    fn workload_index(&self) -> Option<f64> {
        None
    }

    /// Load score
    fn load_score(&self) -> f64 {
        0.0
    }

    /// Last activity; `None` ranks below every instant
    fn last_active(&self) -> Option<DateTime<Utc>>;
}

/// `Less` when `a` beats `b`.
pub fn winner_cmp<T: Ranked + ?Sized>(a: &T, b: &T) -> Ordering {
    cmp_optional_scalar(b.workload_index(), a.workload_index())
        .then_with(|| finite_or_min(b.load_score()).total_cmp(&finite_or_min(a.load_score())))
        .then_with(|| b.last_active().cmp(&a.last_active()))
        .then_with(|| a.rank_id().cmp(b.rank_id()))
}

/// Sort in place, winner first. Stable, so equal elements keep their input order.
pub fn sort_winner_first<T: Ranked>(items: &mut [T]) {
    items.sort_by(winner_cmp);
}

/// The winner of `items`, or `None` when empty. Equal elements resolve to the first one.
pub fn pick_winner<'a, T, I>(items: I) -> Option<&'a T>
where
    T: Ranked + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items.into_iter().min_by(|a, b| winner_cmp(*a, *b))
}

/// Parse an activity timestamp. Accepts RFC 3339, naive date-times (taken as UTC) and bare
/// dates. Anything else is `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn finite_or_min(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::NEG_INFINITY
    }
}

fn cmp_optional_scalar(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.filter(|v| v.is_finite());
    let b = b.filter(|v| v.is_finite());
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
