use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::bucket::BucketKey;
use crate::config::BucketPolicy;
use crate::normalize::{clean_tags, jaccard, normalize_apps, overlap, tag_words, tokenize};
use crate::ranking::{parse_timestamp, winner_cmp, Ranked};
use crate::types::ThreadRecord;

/// Highest score a gated comparison can produce. 1.0 is kept for exact identity, which the
/// clusterer never reports.
pub const MAX_SCORE: f64 = 0.99;

/// Comparable view of one thread record
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadFeatures {
    pub thread_uid: String,
    pub title: String,
    pub raw_last_active: Option<String>,
    pub last_active: Option<DateTime<Utc>>,
    pub apps: Vec<String>,
    pub tags: Vec<String>,
    pub tag_words: BTreeSet<String>,
    pub title_tokens: BTreeSet<String>,
    pub bucket: BucketKey,
}

impl ThreadFeatures {
    pub fn from_record(record: &ThreadRecord, max_tags: usize) -> Self {
        let apps = normalize_apps(&record.apps);
        let tags = clean_tags(&record.tags, max_tags);
        let bucket = BucketKey::assign(&apps, record.domain.as_deref());
        Self {
            thread_uid: record.thread_uid.trim().to_string(),
            title: record.title.clone(),
            raw_last_active: record.last_active_at.clone(),
            last_active: parse_timestamp(record.last_active_at.as_deref()),
            tag_words: tag_words(&tags),
            title_tokens: tokenize(&record.title),
            apps,
            tags,
            bucket,
        }
    }

    /// A timestamp was given but could not be parsed
    pub fn has_bad_timestamp(&self) -> bool {
        self.last_active.is_none()
            && self
                .raw_last_active
                .as_deref()
                .is_some_and(|raw| !raw.trim().is_empty())
    }
}

impl Ranked for ThreadFeatures {
    fn rank_id(&self) -> &str {
        &self.thread_uid
    }

    fn last_active(&self) -> Option<DateTime<Utc>> {
        self.last_active
    }
}

/// Outcome of comparing a candidate with a centroid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub tag_sim: f64,
    pub title_sim: f64,
    pub shared_tag_words: usize,
    pub gate_passed: bool,
}

impl Similarity {
    /// Score two feature sets under `policy`. The score is 0 unless the signal gate opens:
    /// two shared tag words, or one shared tag word with a strong title match, or a tag
    /// Jaccard at or above the tier floor.
    pub fn between(
        policy: &BucketPolicy,
        tags_a: &BTreeSet<String>,
        title_a: &BTreeSet<String>,
        tags_b: &BTreeSet<String>,
        title_b: &BTreeSet<String>,
    ) -> Self {
        let tag_sim = jaccard(tags_a, tags_b);
        let title_sim = jaccard(title_a, title_b);
        let shared_tag_words = overlap(tags_a, tags_b);

        let gate_passed = shared_tag_words >= 2
            || (title_sim >= policy.title_gate && shared_tag_words >= 1)
            || tag_sim >= policy.tag_jaccard_floor;

        let score = if gate_passed {
            (policy.tag_weight * tag_sim + policy.title_weight * title_sim).min(MAX_SCORE)
        } else {
            0.0
        };

        Self {
            score,
            tag_sim,
            title_sim,
            shared_tag_words,
            gate_passed,
        }
    }
}

/// Running representative of a cluster.
///
/// Each accepted member produces a new centroid through [`Centroid::absorb`]. Tag words only
/// ever grow, so a cluster gets easier to join as it grows and can drift away from its first
/// topic. The threshold stays fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Centroid<'a> {
    display: &'a ThreadFeatures,
    tag_words: BTreeSet<String>,
}

impl<'a> Centroid<'a> {
    pub fn seed(member: &'a ThreadFeatures) -> Self {
        Self {
            display: member,
            tag_words: member.tag_words.clone(),
        }
    }

    /// Centroid after `member` joins: tag words widen to the union, the display member is the
    /// winner of the old display and `member`.
    #[must_use]
    pub fn absorb(&self, member: &'a ThreadFeatures) -> Self {
        let display = if winner_cmp(member, self.display).is_lt() {
            member
        } else {
            self.display
        };
        let tag_words = self.tag_words.union(&member.tag_words).cloned().collect();
        Self { display, tag_words }
    }

    pub fn display(&self) -> &'a ThreadFeatures {
        self.display
    }

    pub fn tag_words(&self) -> &BTreeSet<String> {
        &self.tag_words
    }

    pub fn title_tokens(&self) -> &BTreeSet<String> {
        &self.display.title_tokens
    }

    pub fn similarity(&self, policy: &BucketPolicy, candidate: &ThreadFeatures) -> Similarity {
        Similarity::between(
            policy,
            &candidate.tag_words,
            &candidate.title_tokens,
            &self.tag_words,
            self.title_tokens(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(uid: &str, title: &str, at: &str, tags: &[&str]) -> ThreadFeatures {
        let record = ThreadRecord::new(uid, title)
            .last_active_at(at)
            .apps(["github"])
            .tags(tags.iter().copied());
        ThreadFeatures::from_record(&record, 15)
    }

    #[test]
    fn from_record_normalizes_everything() {
        let record = ThreadRecord::new(" t1 ", "Deploy the CRM")
            .apps([" github", "github", ""])
            .tags(["Deploy Pipeline", "div", "deploy pipeline", "CRM"]);
        let f = ThreadFeatures::from_record(&record, 15);
        assert_eq!(f.thread_uid, "t1");
        assert_eq!(f.apps, vec!["github"]);
        assert_eq!(f.tags, vec!["deploy pipeline", "crm"]);
        assert_eq!(f.bucket.to_string(), "app:github");
        assert!(f.tag_words.contains("pipeline"));
        assert!(f.title_tokens.contains("deploy"));
        assert!(!f.has_bad_timestamp());
    }

    #[test]
    fn bad_timestamp_is_flagged_not_fatal() {
        let f = features("t1", "x", "not a date", &[]);
        assert!(f.has_bad_timestamp());
        assert_eq!(f.last_active, None);
    }

    #[test]
    fn gate_blocks_title_only_matches() {
        let policy = BucketPolicy::app();
        let a = features("a", "Quarterly sales deck review", "2025-01-01", &["sales"]);
        let b = features("b", "Quarterly sales deck review", "2025-01-02", &["hiring"]);
        let sim = Centroid::seed(&b).similarity(&policy, &a);
        assert_eq!(sim.title_sim, 1.0);
        assert!(!sim.gate_passed);
        assert_eq!(sim.score, 0.0);
    }

    #[test]
    fn gate_opens_on_two_shared_tag_words() {
        let policy = BucketPolicy::app();
        let a = features("a", "one", "2025-01-01", &["crm sync", "vendor"]);
        let b = features("b", "two", "2025-01-02", &["crm sync", "schedule"]);
        let sim = Centroid::seed(&b).similarity(&policy, &a);
        assert_eq!(sim.shared_tag_words, 2);
        assert!(sim.gate_passed);
        // tag words {crm, sync, vendor} vs {crm, sync, schedule}: 2/4
        assert!((sim.score - 0.65 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn gate_opens_on_title_plus_one_tag_word() {
        let policy = BucketPolicy::app();
        let a = features("a", "Dealer onboarding checklist", "2025-01-01", &["onboarding"]);
        let b = features(
            "b",
            "Dealer onboarding checklist v2",
            "2025-01-02",
            &["onboarding", "training", "payroll"],
        );
        let sim = Centroid::seed(&b).similarity(&policy, &a);
        assert_eq!(sim.shared_tag_words, 1);
        assert!(sim.tag_sim < policy.tag_jaccard_floor);
        assert_eq!(sim.title_sim, 1.0);
        assert!(sim.gate_passed);
        assert!(sim.score > 0.0);
    }

    #[test]
    fn gate_opens_on_tag_jaccard_floor_alone() {
        let policy = BucketPolicy::app();
        let a = features("a", "Morning notes", "2025-01-01", &["alpha"]);
        let b = features("b", "Evening review", "2025-01-02", &["alpha"]);
        let sim = Centroid::seed(&b).similarity(&policy, &a);
        assert_eq!(sim.shared_tag_words, 1);
        assert_eq!(sim.title_sim, 0.0);
        assert_eq!(sim.tag_sim, 1.0);
        assert!(sim.gate_passed);
        assert_eq!(sim.score, policy.tag_weight);

        // One shared word out of three stays below the 0.5 floor.
        let c = features("c", "Evening review", "2025-01-03", &["alpha", "bravo"]);
        let d = features("d", "Morning notes", "2025-01-04", &["alpha", "charlie"]);
        let sim = Centroid::seed(&d).similarity(&policy, &c);
        assert_eq!(sim.shared_tag_words, 1);
        assert!(!sim.gate_passed);
        assert_eq!(sim.score, 0.0);
    }

    #[test]
    fn score_is_capped_below_identity() {
        let policy = BucketPolicy::app();
        let a = features("a", "same title here", "2025-01-01", &["alpha", "beta"]);
        let b = features("b", "same title here", "2025-01-02", &["alpha", "beta"]);
        assert_eq!(Centroid::seed(&b).similarity(&policy, &a).score, MAX_SCORE);
    }

    #[test]
    fn absorb_widens_tags_and_tracks_newest_display() {
        let old = features("a", "older", "2025-01-01", &["alpha"]);
        let new = features("b", "newer", "2025-03-01", &["beta"]);
        let seed = Centroid::seed(&old);
        let grown = seed.absorb(&new);

        assert_eq!(seed.tag_words().len(), 1, "seed stays untouched");
        assert_eq!(grown.tag_words().len(), 2);
        assert_eq!(grown.display().thread_uid, "b");
        assert!(grown.title_tokens().contains("newer"));

        let older_again = features("c", "oldest", "2024-01-01", &["gamma"]);
        assert_eq!(grown.absorb(&older_again).display().thread_uid, "b");
    }
}
