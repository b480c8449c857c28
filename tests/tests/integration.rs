use hotmod_engine::{HotImportError, HotImporter, ModuleKind, NotifyFsWatch, ReloadEvent};
use hotmod_kernel::{HotImportConfig, RawEventKind, ReloadOutcome, ReloadPhase};
use hotmod_rhai::RhaiModuleLoader;
use hotmod_testing::{
    CountingLoader, ManualFsWatch, ModuleDir, assert_invokes, next_discard, next_terminal,
    sources,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(5);

fn manual(dir: &ModuleDir) -> (Arc<ManualFsWatch>, Arc<CountingLoader>, HotImporter) {
    let watch = ManualFsWatch::new();
    let loader = CountingLoader::new();
    let importer = dir.importer_with(loader.clone(), watch.clone());
    (watch, loader, importer)
}

#[tokio::test]
async fn test_handle_identity_is_stable() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let (watch, _loader, importer) = manual(&dir);
    let mut events = importer.subscribe();

    let first = importer.hot_import("answer.rhai").await.unwrap();
    let second = importer.hot_import(&path).await.unwrap();
    let third = importer
        .hot_import_from("./answer", dir.root())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));

    dir.write("answer.rhai", sources::ANSWER_17);
    assert!(watch.emit_change(&path));
    next_terminal(&mut events, &path, SETTLE).await.unwrap();

    let after = importer.hot_import("answer.rhai").await.unwrap();
    assert!(Arc::ptr_eq(&first, &after));
    assert_invokes!(first, 17);
    assert_eq!(watch.watches_started(), 1);
}

#[tokio::test]
async fn test_live_update_through_filesystem_watch() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let config = dir.config().with_debounce_ms(50);
    let importer = HotImporter::new(config, Arc::new(RhaiModuleLoader::default()))
        .with_fs_watch(Arc::new(NotifyFsWatch));
    let mut events = importer.subscribe();

    let handle = importer.hot_import("answer.rhai").await.unwrap();
    assert_invokes!(handle, 42);
    assert!(importer.is_hot(&path));

    dir.write("answer.rhai", sources::ANSWER_17);
    let event = next_terminal(&mut events, &path, SETTLE)
        .await
        .expect("reload after edit");
    assert!(matches!(event, ReloadEvent::Committed { .. }));

    assert_invokes!(handle, 17);
    let again = importer.hot_import("answer.rhai").await.unwrap();
    assert!(Arc::ptr_eq(&handle, &again));
}

#[tokio::test]
async fn test_bad_reload_rolls_back_and_recovers() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let (watch, loader, importer) = manual(&dir);
    let mut events = importer.subscribe();
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    dir.write("answer.rhai", sources::BROKEN);
    watch.emit_change(&path);
    let event = next_terminal(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(event, ReloadEvent::RolledBack { .. }));

    assert_invokes!(handle, 42);
    assert_eq!(loader.reinstatements(), 1);
    assert!(matches!(
        importer.last_outcome(&path),
        Some(ReloadOutcome::RolledBack { .. })
    ));

    // a module throwing during evaluation rolls back the same way
    dir.write("answer.rhai", sources::THROWS);
    watch.emit_change(&path);
    let event = next_terminal(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(event, ReloadEvent::RolledBack { .. }));
    assert_invokes!(handle, 42);

    // fixing the file brings the watch back to life
    dir.write("answer.rhai", sources::ANSWER_17);
    watch.emit_change(&path);
    let event = next_terminal(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(event, ReloadEvent::Committed { .. }));
    assert_invokes!(handle, 17);
}

#[tokio::test]
async fn test_purge_drops_mutations() {
    let dir = ModuleDir::new();
    let path = dir.write("empty.rhai", sources::EMPTY_OBJECT);
    let (_watch, _loader, importer) = manual(&dir);

    let module = importer.import_file(&path).await.unwrap();
    module.set_member("key", json!("v"));

    // no purge: the cached record comes back with the mutation
    let cached = importer.import_file(&path).await.unwrap();
    assert_eq!(cached.member("key"), Some(json!("v")));

    let snapshot = importer.purge_cache(&path).unwrap();
    let fresh = importer.import_file(&path).await.unwrap();
    assert!(fresh.member("key").is_none());
    assert_eq!(fresh.value(), json!({}));

    // restoring the snapshot brings the mutated record back
    importer.purge_cache(&path).unwrap();
    importer.restore_cache(&path, snapshot).unwrap();
    let restored = importer.import_file(&path).await.unwrap();
    assert_eq!(restored.member("key"), Some(json!("v")));
}

#[tokio::test]
async fn test_purge_without_cache_is_an_error() {
    let dir = ModuleDir::new();
    let (_watch, _loader, importer) = manual(&dir);

    let err = importer.purge_cache("never-loaded.rhai").unwrap_err();
    assert!(matches!(err, HotImportError::CacheMiss(_)));
}

#[tokio::test]
async fn test_cold_path_suppresses_reloads() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let (watch, loader, importer) = manual(&dir);
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    importer.make_cold("answer.rhai").unwrap();
    assert!(!importer.is_hot(&path));
    assert!(!watch.is_watching(&path));

    dir.write("answer.rhai", sources::ANSWER_17);
    assert!(!watch.emit_change(&path));
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_invokes!(handle, 42);
    assert_eq!(loader.loads(), 1);

    // making it cold again is a no-op
    importer.make_cold("answer.rhai").unwrap();
}

#[tokio::test]
async fn test_cold_suppression_with_filesystem_watch() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let importer = dir.importer();
    let mut events = importer.subscribe();
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    importer.stop_watching(Some(Path::new("answer.rhai"))).unwrap();
    dir.write("answer.rhai", sources::ANSWER_17);

    assert!(
        next_terminal(&mut events, &path, Duration::from_millis(500))
            .await
            .is_none()
    );
    assert_invokes!(handle, 42);
}

#[tokio::test]
async fn test_construct_and_invoke_are_distinct() {
    let dir = ModuleDir::new();
    dir.write("greeter.rhai", sources::GREETER_V1);
    dir.write("settings.rhai", sources::SETTINGS);
    dir.write("add.rhai", sources::ADD);
    let (_watch, _loader, importer) = manual(&dir);

    let greeter = importer.hot_import("greeter.rhai").await.unwrap();
    assert_eq!(greeter.kind(), ModuleKind::Class);
    let mut instance = greeter.construct(vec![json!("bob")]).unwrap();
    assert_eq!(instance.get("name"), Some(&json!("bob")));
    assert_eq!(instance.call("greet", vec![]).unwrap(), json!("hello bob"));
    assert!(matches!(
        greeter.invoke(vec![]),
        Err(HotImportError::NotCallable(_))
    ));

    let settings = importer.hot_import("settings.rhai").await.unwrap();
    assert!(matches!(
        settings.invoke(vec![]),
        Err(HotImportError::NotCallable(_))
    ));

    let add = importer.hot_import("add.rhai").await.unwrap();
    assert_invokes!(add, [40, 2], 42);
    assert!(matches!(
        add.construct(vec![]),
        Err(HotImportError::NotConstructible(_))
    ));
}

#[tokio::test]
async fn test_instances_keep_their_version() {
    let dir = ModuleDir::new();
    let path = dir.write("greeter.rhai", sources::GREETER_V1);
    let (_watch, _loader, importer) = manual(&dir);
    let greeter = importer.hot_import("greeter.rhai").await.unwrap();

    let mut old = greeter.construct(vec![json!("ann")]).unwrap();

    dir.write("greeter.rhai", sources::GREETER_V2);
    assert!(importer.refresh(&path).await.unwrap().is_committed());

    let mut new = greeter.construct(vec![json!("ann")]).unwrap();
    assert_eq!(old.call("greet", vec![]).unwrap(), json!("hello ann"));
    assert_eq!(new.call("greet", vec![]).unwrap(), json!("goodbye ann"));
    assert!(new.version() > old.version());
    assert_eq!(greeter.member("version"), Some(json!(2)));
}

#[tokio::test]
async fn test_projection_leaves_stale_members() {
    let dir = ModuleDir::new();
    let path = dir.write("settings.rhai", sources::SETTINGS);
    let (_watch, _loader, importer) = manual(&dir);
    let settings = importer.hot_import("settings.rhai").await.unwrap();
    assert_eq!(settings.member("verbose"), Some(json!(false)));

    dir.write("settings.rhai", sources::SETTINGS_TRIMMED);
    importer.refresh(&path).await.unwrap();

    assert_eq!(settings.member("retries"), Some(json!(5)));
    // left over from the previous version
    assert_eq!(settings.member("verbose"), Some(json!(false)));
    // the record itself has no such member
    assert_eq!(settings.value(), json!({ "retries": 5 }));
}

#[tokio::test]
async fn test_concurrent_refreshes_coalesce() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let loader = CountingLoader::with_delay(Duration::from_millis(200));
    let importer = Arc::new(dir.importer_with(loader.clone(), ManualFsWatch::new()));
    let handle = importer.hot_import("answer.rhai").await.unwrap();
    assert_eq!(loader.loads(), 1);

    dir.write("answer.rhai", sources::ANSWER_17);
    let running = tokio::spawn({
        let importer = importer.clone();
        let path = path.clone();
        async move { importer.refresh(&path).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        importer.refresh(&path).await.unwrap(),
        ReloadOutcome::Coalesced
    );
    assert_eq!(
        importer.refresh(&path).await.unwrap(),
        ReloadOutcome::Coalesced
    );

    let outcome = tokio::time::timeout(SETTLE, running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(outcome.is_committed());
    assert_invokes!(handle, 17);
    // the import, the running attempt and exactly one queued attempt
    assert_eq!(loader.loads(), 3);
}

#[tokio::test]
async fn test_spurious_events_are_discarded() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let (watch, loader, importer) = manual(&dir);
    let mut events = importer.subscribe();
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    dir.write("answer.rhai", "");
    watch.emit_change(&path);
    let event = next_discard(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(
        event,
        ReloadEvent::ChangeDiscarded { ref reason, .. } if reason == "file is empty"
    ));

    dir.write("answer.rhai", sources::ANSWER_17);
    watch.emit(&path, RawEventKind::Renamed);
    next_discard(&mut events, &path, SETTLE).await.unwrap();

    assert_invokes!(handle, 42);
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_first_import_errors_are_returned() {
    let dir = ModuleDir::new();
    dir.write("broken.rhai", sources::BROKEN);
    dir.write("throws.rhai", sources::THROWS);
    let (watch, _loader, importer) = manual(&dir);

    assert!(importer.hot_import("broken.rhai").await.unwrap_err().is_load());
    assert!(importer.hot_import("throws.rhai").await.unwrap_err().is_load());
    assert!(importer.hot_import("missing.rhai").await.unwrap_err().is_load());
    assert_eq!(watch.watches_started(), 0);

    let unrooted = HotImporter::new(
        HotImportConfig::default(),
        Arc::new(RhaiModuleLoader::default()),
    );
    assert!(matches!(
        unrooted.hot_import("answer.rhai").await,
        Err(HotImportError::PathResolution { .. })
    ));
}

#[tokio::test]
async fn test_importers_do_not_share_state() {
    let dir = ModuleDir::new();
    dir.write("answer.rhai", sources::ANSWER_42);
    let (_w1, _l1, first) = manual(&dir);
    let (_w2, _l2, second) = manual(&dir);

    let a = first.hot_import("answer.rhai").await.unwrap();
    let b = second.hot_import("answer.rhai").await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    first.shutdown();
    assert!(first.hot_paths().is_empty());
    assert_eq!(second.hot_paths().len(), 1);
    // handles survive shutdown
    assert_invokes!(a, 42);
}

#[tokio::test]
async fn test_truncation_inside_debounce_window_is_discarded() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let watch = ManualFsWatch::new();
    let loader = CountingLoader::new();
    let config = dir.config().with_debounce_ms(100);
    let importer = HotImporter::new(config, loader.clone()).with_fs_watch(watch.clone());
    let mut events = importer.subscribe();
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    dir.write("answer.rhai", sources::ANSWER_17);
    watch.emit_change(&path);
    tokio::time::sleep(Duration::from_millis(20)).await;
    dir.write("answer.rhai", "");
    watch.emit_change(&path);

    let event = next_discard(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(
        event,
        ReloadEvent::ChangeDiscarded { ref reason, .. } if reason == "file is empty"
    ));

    assert_eq!(handle.kind(), ModuleKind::Function);
    assert_invokes!(handle, 42);
    assert_eq!(loader.loads(), 1);

    // the next complete write goes through
    dir.write("answer.rhai", sources::ANSWER_17);
    watch.emit_change(&path);
    let event = next_terminal(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(event, ReloadEvent::Committed { .. }));
    assert_invokes!(handle, 17);
}

#[tokio::test]
async fn test_reload_in_flight_completes_after_make_cold() {
    let dir = ModuleDir::new();
    let path = dir.write("answer.rhai", sources::ANSWER_42);
    let watch = ManualFsWatch::new();
    let loader = CountingLoader::with_delay(Duration::from_millis(200));
    let importer = dir.importer_with(loader.clone(), watch.clone());
    let mut events = importer.subscribe();
    let handle = importer.hot_import("answer.rhai").await.unwrap();

    dir.write("answer.rhai", sources::ANSWER_17);
    assert!(watch.emit_change(&path));

    tokio::time::timeout(SETTLE, async {
        while importer.phase(&path) != ReloadPhase::Reloading {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    importer.make_cold("answer.rhai").unwrap();
    assert!(!importer.is_hot(&path));
    assert!(!watch.is_watching(&path));

    let event = next_terminal(&mut events, &path, SETTLE).await.unwrap();
    assert!(matches!(event, ReloadEvent::Committed { .. }));
    assert_invokes!(handle, 17);
    assert!(!importer.is_hot(&path));
    assert_eq!(importer.phase(&path), ReloadPhase::Idle);
}
