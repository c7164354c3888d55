//! Per-thread ranking scalars derived from the thread body.
//!
//! None of these scores drive grouping directly; they only feed the winner order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{null_as_default, AnalyticsRow};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("code fence pattern is valid"));

static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9]+(?:['’][A-Za-z0-9]+)*").expect("word pattern is valid")
});

static CONSTRAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:must|should|avoid|don['’]t|do not|unless|only if|verify|validate|rollback|guardrail|edge case)\b",
    )
    .expect("constraint pattern is valid")
});

static NUMBERED_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.[ \t]+").expect("numbered step pattern is valid"));

static TABLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\|.*\|\s*$").expect("table line pattern is valid"));

const EMDASH: char = '—';

const MATURITY_MARKERS: &[&str] = &[
    "checklist",
    "sop",
    "next steps",
    "acceptance criteria",
    "rollback",
    "verify",
];

const MARKER_POINTS: u32 = 10;
const NUMBERED_STEPS_MIN: usize = 3;
const NUMBERED_STEPS_POINTS: u32 = 20;
const TABLE_LINES_MIN: usize = 2;
const TABLE_POINTS: u32 = 10;
const MATURITY_MAX: u32 = 100;

/// Turns at which cognitive load doubles
const LOAD_TURN_SCALE: f64 = 50.0;

/// Thread body plus the enrichment keys, input to scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadBody {
    #[serde(deserialize_with = "null_as_default")]
    pub thread_uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Markdown body
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    /// Message count, when known
    pub turns_total: Option<u32>,
    pub last_active_at: Option<String>,
    pub cluster_id: Option<String>,
    pub primary_home_file: Option<String>,
}

/// Raw counts and derived scores for one body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetrics {
    pub word_count: usize,
    pub emdash_count: usize,
    pub constraint_count: usize,
    /// Constraint density per thousand words
    pub cdi: f64,
    pub cwid: Option<f64>,
    pub maturity_score: u32,
    pub load_score: f64,
}

impl ThreadMetrics {
    /// Score a markdown body. Fenced code blocks are ignored throughout.
    pub fn compute(body: &str, turns_total: Option<u32>) -> Self {
        let prose = strip_code_fences(body);

        let word_count = count_words(&prose);
        let emdash_count = prose.matches(EMDASH).count();
        let constraint_count = CONSTRAINT.find_iter(&prose).count();

        let cdi = density(word_count, emdash_count, constraint_count);
        let cwid = turns_total.map(|turns| f64::from(turns) * cdi);
        let turns = f64::from(turns_total.unwrap_or(0));
        let load_score =
            word_count as f64 * (1.0 + cdi / 1000.0) * (1.0 + turns / LOAD_TURN_SCALE);

        Self {
            word_count,
            emdash_count,
            constraint_count,
            cdi,
            cwid,
            maturity_score: maturity(&prose),
            load_score,
        }
    }
}

/// Score one thread and carry its enrichment keys into an analytics row.
pub fn score_thread(thread: &ThreadBody) -> AnalyticsRow {
    let metrics = ThreadMetrics::compute(&thread.body, thread.turns_total);
    log::debug!(
        "{}: words={} cdi={:.1} maturity={}",
        thread.thread_uid,
        metrics.word_count,
        metrics.cdi,
        metrics.maturity_score
    );

    AnalyticsRow {
        thread_uid: thread.thread_uid.clone(),
        title: thread.title.clone(),
        cluster_id: thread.cluster_id.clone(),
        primary_home_file: thread.primary_home_file.clone(),
        cdi: metrics.cdi,
        cwid: metrics.cwid,
        maturity_score: metrics.maturity_score,
        load_score: metrics.load_score,
        last_active_at: thread.last_active_at.clone(),
    }
}

/// Score many threads, keeping input order
pub fn score_threads(threads: &[ThreadBody]) -> Vec<AnalyticsRow> {
    let rows: Vec<AnalyticsRow> = threads.iter().map(score_thread).collect();
    log::info!("Scored {} threads", rows.len());
    rows
}

/// `(emdashes + constraints)` per thousand words; empty bodies count as one word
pub fn density(word_count: usize, emdash_count: usize, constraint_count: usize) -> f64 {
    let signals = (emdash_count + constraint_count) as f64;
    signals / word_count.max(1) as f64 * 1000.0
}

fn strip_code_fences(body: &str) -> String {
    CODE_FENCE.replace_all(body, "").into_owned()
}

fn count_words(text: &str) -> usize {
    WORD.find_iter(&text.replace('\u{a0}', " ")).count()
}

fn maturity(prose: &str) -> u32 {
    let lower = prose.to_lowercase();
    let mut score: u32 = MATURITY_MARKERS
        .iter()
        .filter(|marker| lower.contains(*marker))
        .map(|_| MARKER_POINTS)
        .sum();

    if NUMBERED_STEP.find_iter(prose).count() >= NUMBERED_STEPS_MIN {
        score += NUMBERED_STEPS_POINTS;
    }
    if TABLE_LINE.find_iter(prose).count() >= TABLE_LINES_MIN {
        score += TABLE_POINTS;
    }

    score.min(MATURITY_MAX)
}
