//! Offline/online behaviour of the sync coordinator

use std::sync::Arc;
use std::time::Duration;

use sigsync::*;

fn name(s: &str) -> TemplateName {
    TemplateName::new(s).unwrap()
}

fn quick_config() -> SyncConfig {
    SyncConfig::default()
        .with_probe_attempts(1, Duration::ZERO)
        .with_ready_timeout(Duration::from_millis(50))
}

/// Coordinator whose remote is down at startup
async fn started_offline() -> (
    Arc<MemoryRemoteStore>,
    Arc<SyncCoordinator<MemoryKeyValueStore>>,
) {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_online(false);
    let coordinator = SyncCoordinator::create(
        MemoryKeyValueStore::new(),
        RemoteReadiness::ready(remote.clone()),
        quick_config(),
    )
    .await
    .unwrap();
    assert_eq!(coordinator.connectivity(), Connectivity::Offline);
    (remote, coordinator)
}

async fn go_online(remote: &MemoryRemoteStore, coordinator: &SyncCoordinator<MemoryKeyValueStore>) {
    remote.set_online(true);
    assert_eq!(
        coordinator.refresh_connectivity().await,
        Connectivity::Online
    );
}

#[tokio::test]
async fn test_offline_saves_are_loadable_from_local_cache() {
    let (remote, coordinator) = started_offline().await;
    let names = ["a", "b", "c", "b"];

    for (i, n) in names.iter().enumerate() {
        let outcome = coordinator
            .save_template(name(n), format!("<p>{}</p>", i), None, vec![])
            .await;
        assert!(outcome.is_success());
        assert!(!outcome.is_synced());
    }

    for n in ["a", "b", "c"] {
        let outcome = coordinator.load_template(&name(n)).await;
        assert!(matches!(outcome, Outcome::LocalOnly(_)), "{} not local", n);
    }
    assert_eq!(
        coordinator.load_template(&name("b")).await.data().unwrap().content,
        "<p>3</p>"
    );
    assert!(remote.rows().is_empty());
}

#[tokio::test]
async fn test_offline_saves_reach_remote_in_order_after_flush() {
    let (remote, coordinator) = started_offline().await;
    for (n, content) in [("A", "a1"), ("B", "b1"), ("C", "c1")] {
        coordinator.save_template(name(n), content, None, vec![]).await;
    }
    assert_eq!(coordinator.pending().await.len(), 3);

    go_online(&remote, &coordinator).await;
    let report = coordinator.flush_outbox().await.unwrap();

    assert_eq!(report.applied, 3);
    assert!(coordinator.pending().await.is_empty());
    assert_eq!(
        remote.applied(),
        vec![
            AppliedOp::Upsert { name: "A".into(), content: "a1".into() },
            AppliedOp::Upsert { name: "B".into(), content: "b1".into() },
            AppliedOp::Upsert { name: "C".into(), content: "c1".into() },
        ]
    );
}

#[tokio::test]
async fn test_second_flush_is_a_no_op() {
    let (remote, coordinator) = started_offline().await;
    coordinator.save_template(name("A"), "a1", None, vec![]).await;
    go_online(&remote, &coordinator).await;

    coordinator.flush_outbox().await.unwrap();
    let writes_after_first = remote.applied().len();

    let report = coordinator.flush_outbox().await.unwrap();
    assert!(report.ran);
    assert_eq!(report.applied, 0);
    assert!(coordinator.pending().await.is_empty());
    assert_eq!(remote.applied().len(), writes_after_first);
}

#[tokio::test]
async fn test_saving_same_name_twice_keeps_one_record_everywhere() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let coordinator = SyncCoordinator::create(
        MemoryKeyValueStore::new(),
        RemoteReadiness::ready(remote.clone()),
        quick_config(),
    )
    .await
    .unwrap();

    coordinator.save_template(name("sig"), "first", None, vec![]).await;
    let second = coordinator.save_template(name("sig"), "second", None, vec![]).await;
    assert!(second.is_synced());

    let remote_rows = remote.rows();
    assert_eq!(remote_rows.len(), 1);
    assert_eq!(remote_rows[0].content, "second");

    remote.set_online(false);
    coordinator.refresh_connectivity().await;
    let local = coordinator.load_all_templates().await;
    assert!(matches!(local, Outcome::LocalOnly(_)));
    let local = local.into_data().unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].content, "second");
}

#[tokio::test]
async fn test_failed_head_entry_stays_queued_while_later_entry_succeeds() {
    let (remote, coordinator) = started_offline().await;
    coordinator.save_template(name("one"), "1", None, vec![]).await;
    coordinator.save_template(name("two"), "2", None, vec![]).await;
    coordinator.save_template(name("three"), "3", None, vec![]).await;

    remote.fail_for("one", RemoteError::Backend("503 from gateway".into()));
    remote.fail_for("three", RemoteError::Backend("503 from gateway".into()));
    go_online(&remote, &coordinator).await;

    let report = coordinator.flush_outbox().await.unwrap();
    assert_eq!(
        report.outcomes().iter().map(|o| matches!(o, EntryOutcome::Applied(_))).collect::<Vec<_>>(),
        [false, true, false]
    );

    let pending: Vec<_> = coordinator
        .pending()
        .await
        .into_iter()
        .map(|e| e.operation.name().as_str().to_string())
        .collect();
    assert_eq!(pending, ["one", "three"]);
    assert_eq!(remote.row("two").unwrap().content, "2");

    remote.clear_failure("one");
    remote.clear_failure("three");
    coordinator.flush_outbox().await.unwrap();
    assert!(coordinator.pending().await.is_empty());
    let names: Vec<_> = remote.rows().into_iter().map(|r| r.name.to_string()).collect();
    assert_eq!(names, ["one", "three", "two"]);
}

#[tokio::test]
async fn test_failed_entry_blocks_later_writes_to_the_same_name() {
    let (remote, coordinator) = started_offline().await;
    coordinator.save_template(name("sig"), "old", None, vec![]).await;
    coordinator.save_template(name("sig"), "new", None, vec![]).await;

    remote.fail_for("sig", RemoteError::Backend("500".into()));
    go_online(&remote, &coordinator).await;
    coordinator.flush_outbox().await.unwrap();
    assert_eq!(coordinator.pending().await.len(), 2);
    assert!(remote.row("sig").is_none());

    remote.clear_failure("sig");
    coordinator.flush_outbox().await.unwrap();
    assert_eq!(remote.row("sig").unwrap().content, "new");
}

#[tokio::test]
async fn test_offline_save_then_flush_scenario() {
    let (remote, coordinator) = started_offline().await;

    let saved = coordinator.save_template(name("sig1"), "<b>hi</b>", None, vec![]).await;
    assert!(saved.is_success());
    assert_eq!(saved.status(Action::Save), "Saved locally only");

    let loaded = coordinator.load_template(&name("sig1")).await;
    let report = Report::new(Action::Load, loaded);
    assert!(report.success);
    let data = report.data.unwrap();
    assert_eq!(data.name.as_str(), "sig1");
    assert_eq!(data.content, "<b>hi</b>");
    assert_eq!(data.category, DEFAULT_CATEGORY);

    let pending = coordinator.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation.action(), "save");
    assert_eq!(pending[0].operation.name().as_str(), "sig1");

    go_online(&remote, &coordinator).await;
    coordinator.flush_outbox().await.unwrap();
    assert!(coordinator.pending().await.is_empty());
    assert_eq!(remote.row("sig1").unwrap().content, "<b>hi</b>");
}

#[tokio::test]
async fn test_deleting_unknown_name_is_harmless() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let coordinator = SyncCoordinator::create(
        MemoryKeyValueStore::new(),
        RemoteReadiness::ready(remote.clone()),
        quick_config(),
    )
    .await
    .unwrap();

    let outcome = coordinator.delete_template(&name("never-saved")).await;
    assert_eq!(outcome, Outcome::Synced(()));
    assert!(coordinator.pending().await.is_empty());
    assert_eq!(
        remote.applied(),
        vec![AppliedOp::Delete { name: "never-saved".into() }]
    );
}

#[tokio::test]
async fn test_load_reports_not_found_only_when_absent_everywhere() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.seed(TemplateRecord::builder("remote-only").content("r").build().unwrap());
    let coordinator = SyncCoordinator::create(
        MemoryKeyValueStore::new(),
        RemoteReadiness::ready(remote.clone()),
        quick_config(),
    )
    .await
    .unwrap();

    let found = coordinator.load_template(&name("remote-only")).await;
    assert!(found.is_synced());

    // The remote copy was cached, so it survives going offline
    remote.set_online(false);
    coordinator.refresh_connectivity().await;
    assert!(matches!(
        coordinator.load_template(&name("remote-only")).await,
        Outcome::LocalOnly(_)
    ));

    assert_eq!(
        coordinator.load_template(&name("nowhere")).await,
        Outcome::Failed(FailureReason::NotFound)
    );
}

#[tokio::test]
async fn test_offline_operations_reconnect_in_the_background() {
    let (remote, coordinator) = started_offline().await;
    let mut connectivity = coordinator.subscribe();
    coordinator.save_template(name("a"), "1", None, vec![]).await;

    remote.set_online(true);
    // Reported offline right away; the reconnect happens behind it
    let outcome = coordinator.save_template(name("b"), "2", None, vec![]).await;
    assert!(matches!(outcome, Outcome::LocalOnly(_)));

    tokio::time::timeout(
        Duration::from_secs(1),
        connectivity.wait_for(|c| c.is_online()),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(coordinator.pending().await.is_empty());
    assert_eq!(
        remote.applied(),
        vec![
            AppliedOp::Upsert { name: "a".into(), content: "1".into() },
            AppliedOp::Upsert { name: "b".into(), content: "2".into() },
        ]
    );
}

#[tokio::test]
async fn test_offline_delete_is_replayed() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let coordinator = SyncCoordinator::create(
        MemoryKeyValueStore::new(),
        RemoteReadiness::ready(remote.clone()),
        quick_config(),
    )
    .await
    .unwrap();
    coordinator.save_template(name("old"), "x", None, vec![]).await;

    remote.set_online(false);
    coordinator.refresh_connectivity().await;
    let outcome = coordinator.delete_template(&name("old")).await;
    assert_eq!(outcome, Outcome::LocalOnly(()));
    assert_eq!(
        outcome.status(Action::Delete),
        "Deleted locally"
    );
    assert!(remote.row("old").is_some());

    go_online(&remote, &coordinator).await;
    coordinator.flush_outbox().await.unwrap();
    assert!(remote.row("old").is_none());
}
