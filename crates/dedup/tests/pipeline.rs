use insight_dedup::{
    roll_up, score_threads, ClusterConfig, CollisionRecord, DedupConfig, DedupeKeyType,
    ThreadBody, ThreadClusterer, ThreadRecord,
};
use pretty_assertions::assert_eq;

fn body(uid: &str, text: &str, turns: Option<u32>) -> ThreadBody {
    ThreadBody {
        thread_uid: uid.to_string(),
        title: format!("Thread {uid}"),
        body: text.to_string(),
        turns_total: turns,
        last_active_at: Some("2025-03-01T12:00:00Z".to_string()),
        ..Default::default()
    }
}

#[test]
fn scored_rows_roll_up_and_report_collisions() {
    let plain = "We talked about the schedule for next week and agreed on a time slot.";
    let dense = "You must verify the rollback — do not skip it — and validate totals.";

    let mut bodies = vec![
        ThreadBody {
            cluster_id: Some("CL-ROLLUP-1".to_string()),
            ..body("low", plain, Some(10))
        },
        ThreadBody {
            cluster_id: Some("CL-ROLLUP-1".to_string()),
            ..body("high", dense, Some(10))
        },
    ];
    for n in 1..=4 {
        bodies.push(ThreadBody {
            primary_home_file: Some("docs/generic/INDEX.md".to_string()),
            ..body(&format!("g{n}"), plain, None)
        });
    }

    let rows = score_threads(&bodies);
    let high = rows.iter().find(|r| r.thread_uid == "high").unwrap();
    let low = rows.iter().find(|r| r.thread_uid == "low").unwrap();
    assert!(high.cdi > low.cdi);

    let output = roll_up(&rows, &DedupConfig::default().rollup).unwrap();

    let explicit: Vec<_> = output
        .rollups
        .iter()
        .filter(|g| g.dedupe_key_type == DedupeKeyType::Explicit)
        .collect();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].dedupe_key, "CL-ROLLUP-1");
    assert_eq!(explicit[0].winner.thread_uid, "high");
    assert_eq!(explicit[0].dupe_count, 2);

    let generic: Vec<_> = output
        .rollups
        .iter()
        .filter(|g| g.member_uids.iter().any(|uid| uid.starts_with('g')))
        .collect();
    assert_eq!(generic.len(), 4);
    assert!(generic.iter().all(|g| g.dedupe_key_type == DedupeKeyType::None));

    assert_eq!(output.collisions.len(), 1);
    match &output.collisions[0] {
        CollisionRecord::FallbackPrevented {
            primary_home_file,
            dupe_count,
            sample_titles,
        } => {
            assert_eq!(primary_home_file, "docs/generic/INDEX.md");
            assert_eq!(*dupe_count, 4);
            assert_eq!(sample_titles, &vec!["Thread g1", "Thread g2", "Thread g3"]);
        }
        other => panic!("unexpected collision {other:?}"),
    }
}

#[test]
fn cluster_ids_flow_into_rollup() {
    let records: Vec<ThreadRecord> = (1..=3)
        .map(|n| {
            ThreadRecord::new(format!("t{n}"), "Dealer inventory pricing review")
                .last_active_at(format!("2025-01-0{n}"))
                .apps(["sheets"])
                .tags(["inventory pricing", "dealer"])
        })
        .chain([ThreadRecord::new("solo", "Birthday gift ideas").tags(["gifts"])])
        .collect();

    let clustering = ThreadClusterer::new(ClusterConfig::default())
        .unwrap()
        .cluster(&records)
        .unwrap();
    assert_eq!(clustering.clusters.len(), 1);
    assert_eq!(clustering.clusters[0].canonical_uid, "t3");
    assert_eq!(clustering.unclustered, vec!["solo"]);

    // Enrichment writes the cluster id back onto each member.
    let bodies: Vec<ThreadBody> = records
        .iter()
        .map(|record| ThreadBody {
            thread_uid: record.thread_uid.clone(),
            title: record.title.clone(),
            body: "Short note.".to_string(),
            last_active_at: record.last_active_at.clone(),
            cluster_id: clustering
                .assignments
                .iter()
                .find(|a| a.thread_uid == record.thread_uid)
                .map(|a| a.cluster_id.clone()),
            ..Default::default()
        })
        .collect();

    let output = roll_up(&score_threads(&bodies), &DedupConfig::default().rollup).unwrap();
    assert_eq!(output.rollups.len(), 2);
    assert_eq!(output.rollups[0].dedupe_key, "CL-00001");
    // Equal bodies: the most recent member wins, same as the cluster canonical.
    assert_eq!(output.rollups[0].winner.thread_uid, clustering.clusters[0].canonical_uid);
    assert_eq!(output.rollups[1].dedupe_key, "missing:solo");
    assert!(output.collisions.is_empty());
}

#[test]
fn config_file_drives_both_algorithms() {
    let config = DedupConfig::from_toml_str(
        r#"
        [cluster]
        min_cluster_size = 2

        [rollup]
        fallback_guardrail_max = 5
        collision_sample_titles = 1
        "#,
    )
    .unwrap();

    let records = vec![
        ThreadRecord::new("a", "Payroll export").apps(["gusto"]).tags(["payroll export"]),
        ThreadRecord::new("b", "Payroll export").apps(["gusto"]).tags(["payroll export"]),
    ];
    let clustering = ThreadClusterer::new(config.cluster.clone())
        .unwrap()
        .cluster(&records)
        .unwrap();
    assert_eq!(clustering.clusters.len(), 1);

    let bodies: Vec<_> = (1..=4)
        .map(|n| ThreadBody {
            primary_home_file: Some("docs/payroll.md".to_string()),
            ..body(&format!("p{n}"), "notes", None)
        })
        .collect();
    let output = roll_up(&score_threads(&bodies), &config.rollup).unwrap();
    assert_eq!(output.rollups.len(), 1);
    assert_eq!(output.rollups[0].dedupe_key_type, DedupeKeyType::Fallback);
    assert_eq!(output.rollups[0].dupe_count, 4);
}
