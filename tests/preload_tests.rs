mod common;

use common::{count, init_logging, kinds, record_events, TestSource};
use macroquad_preloader::{
    deferred_loader, Asset, AssetError, AssetsManager, LoadContext, PreloadSettings,
    ProgressEventKind, ResourceRecord, Upload, UploadFn, IMAGE,
};
use pollster::block_on;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn registering_twice_keeps_the_first_loader() {
    let manager = AssetsManager::with_source(TestSource::new().file("a.txt", "first"));
    let before = manager.loader_types().len();

    assert!(manager.register_loader_type("Text", None));
    let sync: UploadFn = Rc::new(|_: LoadContext, _: ResourceRecord| Upload::Immediate(None));
    assert!(!manager.register_loader_type("Text", Some(sync)));
    // built-ins are protected the same way
    assert!(!manager.register_loader_type(IMAGE, None));
    assert_eq!(manager.loader_types().len(), before + 1);

    manager.add_file("Text", "a", "a.txt", vec![]).expect("add");
    block_on(manager.preload()).expect("default byte loader still in place");
    let asset = manager.get_file("Text", "a").expect("registered").expect("loaded");
    assert_eq!(asset.as_bytes(), Some(&b"first"[..]));
}

#[test]
fn unknown_types_and_blank_input_are_rejected() {
    let manager = AssetsManager::with_source(TestSource::new());
    assert!(matches!(
        manager.add_file("Spine", "hero", "hero.json", vec![]),
        Err(AssetError::UnregisteredLoader { .. })
    ));
    assert!(matches!(manager.add_image("", "a.png"), Err(AssetError::InvalidInput(_))));
    assert!(matches!(manager.add_image("a", " "), Err(AssetError::InvalidInput(_))));
    assert!(manager.get_file("Spine", "hero").is_err());
    assert!(manager.is_file_in_queue("Spine", "hero").is_err());
    assert_eq!(manager.files_waiting_for_upload(), 0);
}

#[test]
fn duplicate_keys_keep_the_first_url() {
    let source = TestSource::new().image("one.png", 2, 2).image("two.png", 3, 3);
    let manager = AssetsManager::with_source(source);
    assert!(manager.add_image("hero", "one.png").expect("add"));
    assert!(!manager.add_image("hero", "two.png").expect("duplicate is not an error"));
    assert_eq!(manager.files_waiting_for_upload(), 1);
    assert!(manager.is_image_in_queue("hero"));

    block_on(manager.preload()).expect("preload");
    assert!(!manager.is_image_in_queue("hero"));
    assert_eq!(manager.get_image("hero").map(|i| i.width), Some(2));
}

#[test]
fn empty_preload_emits_loadstart_and_load_only() {
    let manager = AssetsManager::with_source(TestSource::new());
    let events = record_events(&manager);

    block_on(manager.preload()).expect("nothing to do");

    let events = events.borrow();
    assert_eq!(kinds(&events), vec![ProgressEventKind::LoadStart, ProgressEventKind::Load]);
    assert_eq!(events[0].total, 0);
    assert_eq!(events[1].loaded, 0);
}

#[test]
fn every_settled_file_counts_once() {
    init_logging();
    let source = TestSource::new()
        .image("a.png", 1, 1)
        .image("b.png", 1, 1)
        .file("click.ogg", "ogg");
    let manager = AssetsManager::with_source(source);
    manager.add_image("a", "a.png").expect("add");
    manager.add_image("b", "b.png").expect("add");
    manager.add_image("missing", "nope.png").expect("add");
    manager.add_audio("click", "click.ogg").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("recoverable failures do not abort");

    let events = events.borrow();
    assert_eq!(events[0].kind, ProgressEventKind::LoadStart);
    assert_eq!(events[0].total, 4);
    assert_eq!(count(&events, ProgressEventKind::Progress), 4);
    assert_eq!(count(&events, ProgressEventKind::Error), 1);

    let progress: Vec<usize> = events
        .iter()
        .filter(|e| e.kind == ProgressEventKind::Progress)
        .map(|e| e.loaded)
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4]);

    let last = events.last().expect("load event");
    assert_eq!(last.kind, ProgressEventKind::Load);
    assert_eq!(last.loaded, 4);
    assert_eq!(last.total, 0);
    assert_eq!(manager.files_waiting_for_upload(), 0);
}

#[test]
fn failed_fetch_is_reported_and_leaves_no_value() {
    let manager = AssetsManager::with_source(TestSource::new().image("hero.png", 4, 4));
    manager.add_image("ghost", "ghost.png").expect("add");
    manager.add_image("hero", "hero.png").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload");

    let events = events.borrow();
    let error = events
        .iter()
        .find(|e| e.kind == ProgressEventKind::Error)
        .and_then(|e| e.error.clone())
        .expect("error event carries the error");
    assert!(matches!(&*error, AssetError::Fetch { url, .. } if url == "ghost.png"));

    assert!(manager.get_image("ghost").is_none());
    assert!(!manager.is_image_in_queue("ghost"));
    assert!(manager.get_image("hero").is_some());
}

#[test]
fn undecodable_image_is_recoverable() {
    let manager = AssetsManager::with_source(TestSource::new().file("broken.png", "garbage"));
    manager.add_image("broken", "broken.png").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload");
    assert_eq!(count(&events.borrow(), ProgressEventKind::Error), 1);
    assert!(manager.get_image("broken").is_none());
}

#[test]
fn self_feeding_loader_stops_after_five_passes() {
    let manager = AssetsManager::with_source(TestSource::new());
    let calls = Rc::new(Cell::new(0u32));
    let counter = calls.clone();
    manager.register_loader_type(
        "Chain",
        Some(deferred_loader(move |ctx: LoadContext, record: ResourceRecord| {
            counter.set(counter.get() + 1);
            async move {
                let next = format!("{}+", record.key);
                ctx.add_file("Chain", &next, "chain://next", vec![])?;
                Ok::<Option<Asset>, AssetError>(None)
            }
        })),
    );
    manager.add_file("Chain", "step", "chain://start", vec![]).expect("add");

    let err = block_on(manager.preload()).expect_err("never settles");
    assert!(matches!(err, AssetError::RecursionLimit { passes: 5, pending: 1 }));
    assert!(err.is_critical());
    assert_eq!(calls.get(), 5);
}

#[test]
fn pass_budget_comes_from_settings() {
    let settings = PreloadSettings::from_json_str(r#"{"max_upload_passes": 2}"#).expect("settings");
    let manager = AssetsManager::with_source(TestSource::new())
        .with_settings(settings)
        .expect("valid");
    manager.register_loader_type(
        "Chain",
        Some(deferred_loader(|ctx: LoadContext, record: ResourceRecord| async move {
            ctx.add_file("Chain", &format!("{}+", record.key), "chain://next", vec![])?;
            Ok::<Option<Asset>, AssetError>(None)
        })),
    );
    manager.add_file("Chain", "step", "chain://start", vec![]).expect("add");

    let err = block_on(manager.preload()).expect_err("budget of two");
    assert!(matches!(err, AssetError::RecursionLimit { passes: 2, .. }));

    let zero = PreloadSettings {
        max_upload_passes: 0,
        ..PreloadSettings::default()
    };
    assert!(AssetsManager::with_source(TestSource::new()).with_settings(zero).is_err());
}

#[test]
fn immediate_upload_violates_the_contract() {
    let manager = AssetsManager::with_source(TestSource::new());
    let sync: UploadFn = Rc::new(|_: LoadContext, _: ResourceRecord| {
        Upload::Immediate(Some(Asset::Bytes(b"now".to_vec())))
    });
    manager.register_loader_type("Sync", Some(sync));
    manager.add_file("Sync", "eager", "eager.bin", vec![]).expect("add");
    let events = record_events(&manager);

    let err = block_on(manager.preload()).expect_err("contract violation");
    assert!(matches!(
        &err,
        AssetError::InvalidLoaderContract { type_name, key } if type_name == "Sync" && key == "eager"
    ));
    assert!(err.to_string().contains("must return a deferred upload"));
    assert!(manager.get_file("Sync", "eager").expect("registered").is_none());
    assert_eq!(
        kinds(&events.borrow()),
        vec![ProgressEventKind::LoadStart, ProgressEventKind::Load]
    );
}

#[test]
fn contract_violation_still_settles_its_pass() {
    let manager = AssetsManager::with_source(TestSource::new().image("ok.png", 1, 1));
    let sync: UploadFn = Rc::new(|_: LoadContext, _: ResourceRecord| {
        Upload::Immediate(Some(Asset::Bytes(b"now".to_vec())))
    });
    manager.register_loader_type("Sync", Some(sync));
    manager.add_file("Sync", "eager", "eager.bin", vec![]).expect("add");
    manager.add_image("ok", "ok.png").expect("add");
    let events = record_events(&manager);

    let err = block_on(manager.preload()).expect_err("contract violation");
    assert!(matches!(err, AssetError::InvalidLoaderContract { ref key, .. } if key == "eager"));

    // the well-behaved upload of the same pass completed and was counted
    assert_eq!(manager.get_image("ok").map(|i| i.width), Some(1));
    assert_eq!(manager.files_waiting_for_upload(), 0);
    let events = events.borrow();
    assert_eq!(count(&events, ProgressEventKind::Progress), 1);
    assert_eq!(
        kinds(&events),
        vec![
            ProgressEventKind::LoadStart,
            ProgressEventKind::Progress,
            ProgressEventKind::Load
        ]
    );
}

#[test]
fn replacement_loader_does_not_touch_queued_files() {
    let manager = AssetsManager::with_source(TestSource::new().file("a.txt", "first"));
    assert!(manager.register_loader_type("Text", None));
    manager.add_file("Text", "a", "a.txt", vec![]).expect("add");

    let calls = Rc::new(Cell::new(0u32));
    let counter = calls.clone();
    let replacement = deferred_loader(move |_: LoadContext, _: ResourceRecord| {
        counter.set(counter.get() + 1);
        async move { Ok::<Option<Asset>, AssetError>(Some(Asset::Bytes(b"second".to_vec()))) }
    });
    assert!(!manager.register_loader_type("Text", Some(replacement)));

    block_on(manager.preload()).expect("preload");

    let asset = manager.get_file("Text", "a").expect("registered").expect("loaded");
    assert_eq!(asset.as_bytes(), Some(&b"first"[..]));
    assert_eq!(calls.get(), 0);
}

#[test]
fn empty_result_is_stored_as_nothing() {
    let manager = AssetsManager::with_source(TestSource::new());
    manager.register_loader_type(
        "Nothing",
        Some(deferred_loader(|_: LoadContext, _: ResourceRecord| async {
            Ok::<Option<Asset>, AssetError>(None)
        })),
    );
    manager.register_loader_type(
        "Empty",
        Some(deferred_loader(|_: LoadContext, _: ResourceRecord| async {
            Ok::<Option<Asset>, AssetError>(Some(Asset::Bytes(Vec::new())))
        })),
    );
    manager.add_file("Nothing", "n", "n.bin", vec![]).expect("add");
    manager.add_file("Empty", "e", "e.bin", vec![]).expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload");
    assert!(manager.get_file("Nothing", "n").expect("registered").is_none());
    assert!(!manager.is_file_in_queue("Nothing", "n").expect("registered"));
    let empty = manager.get_file("Empty", "e").expect("registered").expect("stored");
    assert_eq!(empty.as_bytes(), Some(&[][..]));
    assert_eq!(count(&events.borrow(), ProgressEventKind::Progress), 2);
    assert_eq!(count(&events.borrow(), ProgressEventKind::Error), 0);
}

#[test]
fn critical_error_from_a_loader_aborts_preload() {
    let manager = AssetsManager::with_source(TestSource::new().image("ok.png", 1, 1));
    manager.register_loader_type(
        "Bad",
        Some(deferred_loader(|ctx: LoadContext, _: ResourceRecord| async move {
            ctx.add_file("NotRegistered", "k", "u", vec![])?;
            Ok::<Option<Asset>, AssetError>(None)
        })),
    );
    manager.add_file("Bad", "bad", "bad.bin", vec![]).expect("add");
    manager.add_image("ok", "ok.png").expect("add");

    let err = block_on(manager.preload()).expect_err("critical");
    assert!(matches!(err, AssetError::UnregisteredLoader { .. }));
    // the rest of the pass still settled before the error surfaced
    assert!(manager.get_image("ok").is_some());
}

#[test]
fn removed_listener_is_not_called() {
    let manager = AssetsManager::with_source(TestSource::new().image("a.png", 1, 1));
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    let id = manager.add_event_listener(ProgressEventKind::Progress, move |_| h.set(h.get() + 1));
    assert!(manager.remove_event_listener(id));
    manager.add_image("a", "a.png").expect("add");
    block_on(manager.preload()).expect("preload");
    assert_eq!(hits.get(), 0);
}

#[test]
fn event_names_parse_into_kinds() {
    let kind: ProgressEventKind = "progress".parse().expect("known");
    assert_eq!(kind, ProgressEventKind::Progress);
    assert!("done".parse::<ProgressEventKind>().is_err());
}

#[test]
fn audio_goes_through_the_source() {
    let source = TestSource::new().file("sfx/jump.ogg", "ogg bytes");
    let manager = AssetsManager::with_source(source.clone());
    manager.add_audio("jump", "sfx/jump.ogg").expect("add");
    block_on(manager.preload()).expect("preload");
    assert_eq!(source.fetched(), vec!["sfx/jump.ogg".to_owned()]);
    let stored = manager.get_file("Audio", "jump").expect("registered").expect("loaded");
    assert_eq!(stored.as_bytes(), Some(&b"ogg bytes"[..]));
}
