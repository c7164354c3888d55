use std::collections::HashMap;
use std::fmt;

use crate::config::{BucketPolicy, ClusterConfig};

/// Coarse partition that bounds which records are ever compared
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    App(String),
    Domain(String),
    Unknown,
}

impl BucketKey {
    /// `app:<first app>`, else `domain:<domain>`, else `unknown`.
    /// `apps` is expected to be normalized already.
    pub fn assign(apps: &[String], domain: Option<&str>) -> Self {
        if let Some(app) = apps.first() {
            return Self::App(app.clone());
        }
        match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => Self::Domain(domain.to_string()),
            None => Self::Unknown,
        }
    }

    /// The app or domain the bucket is keyed on
    pub fn focus(&self) -> &str {
        match self {
            Self::App(app) => app,
            Self::Domain(domain) => domain,
            Self::Unknown => "unknown",
        }
    }

    /// App buckets get the app tier, everything else the stricter domain tier
    pub fn policy<'a>(&self, config: &'a ClusterConfig) -> &'a BucketPolicy {
        match self {
            Self::App(_) => &config.app,
            Self::Domain(_) | Self::Unknown => &config.domain,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(app) => write!(f, "app:{app}"),
            Self::Domain(domain) => write!(f, "domain:{domain}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Group item indices by bucket. Buckets come out in the order their first member is met,
/// members keep their relative order.
pub fn partition<'a, I>(keys: I) -> Vec<(BucketKey, Vec<usize>)>
where
    I: IntoIterator<Item = (usize, &'a BucketKey)>,
{
    let mut position: HashMap<&BucketKey, usize> = HashMap::new();
    let mut buckets: Vec<(BucketKey, Vec<usize>)> = Vec::new();

    for (idx, key) in keys {
        let slot = *position.entry(key).or_insert_with(|| {
            buckets.push((key.clone(), Vec::new()));
            buckets.len() - 1
        });
        buckets[slot].1.push(idx);
    }

    buckets
}
