//! Full integration tests exercising update cycles and observers together.

use hotswap_konfig::prelude::*;
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn counting_key_observer() -> (Arc<AtomicUsize>, Arc<impl KeyObserver>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);
    let observer = Arc::new(move |_key: &str| -> Result<()> {
        counter_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (counter, observer)
}

/// Route the crate's tracing output through the test harness.
/// Set `RUST_LOG=hotswap_konfig=debug` to see update cycles.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn backed_manager() -> (Arc<MapBacking>, Manager) {
    init_tracing();
    let backing = Arc::new(MapBacking::new());
    backing.set("aInt", 12);
    backing.set("aBool", true);
    backing.set("aString", "text");

    let manager = Manager::builder()
        .with_source(MapSource::backed("live", Arc::clone(&backing)))
        .with_source(MapSource::new("defaults").with_value("aDefault", 7))
        .build()
        .unwrap();
    (backing, manager)
}

/// Rewrite a file and push its modification time forward so the change is
/// visible even on coarse-grained filesystems.
fn rewrite(path: &std::path::Path, contents: &str, bump: u64) {
    fs::write(path, contents).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(bump))
        .unwrap();
}

#[test]
fn test_update_cycle() {
    let (backing, manager) = backed_manager();
    let a_int = manager.int_("aInt");
    assert_eq!(a_int.v().unwrap(), 12);

    // Nothing reported an update
    assert!(!manager.update_now().unwrap());

    backing.set("aInt", 99);
    assert!(manager.update_now().unwrap());
    assert_eq!(a_int.v().unwrap(), 99);

    // Idempotent once applied
    assert!(!manager.update_now().unwrap());
    assert_eq!(manager.int_("aDefault").v().unwrap(), 7);
}

#[test]
fn test_observer_fires_only_for_changed_keys() {
    let (backing, manager) = backed_manager();

    let (bool_count, bool_observer) = counting_key_observer();
    let (string_count, string_observer) = counting_key_observer();
    let _bool_sub = manager.bool("aBool").register(&bool_observer);
    let _string_sub = manager.string("aString").register(&string_observer);

    backing.set("aBool", false);
    assert!(manager.update_now().unwrap());

    assert_eq!(bool_count.load(Ordering::SeqCst), 1);
    assert_eq!(string_count.load(Ordering::SeqCst), 0);
    assert!(!manager.bool("aBool").v().unwrap());
}

#[test]
fn test_key_observers_run_before_everything_observers() {
    let (backing, manager) = backed_manager();
    let order = Arc::new(Mutex::new(Vec::new()));

    let order_clone = Arc::clone(&order);
    let key_observer = Arc::new(move |key: &str| -> Result<()> {
        order_clone.lock().push(key.to_string());
        Ok(())
    });
    let order_clone = Arc::clone(&order);
    let everything = Arc::new(move || -> Result<()> {
        order_clone.lock().push("*".to_string());
        Ok(())
    });

    let _all = manager.register(&everything);
    let _b = manager.bool("aBool").register(&key_observer);
    let _a = manager.int_("aInt").register(&key_observer);

    backing.set("aInt", 1);
    backing.set("aBool", false);
    manager.update_now().unwrap();

    assert_eq!(*order.lock(), vec!["aBool", "aInt", "*"]);
}

#[test]
fn test_observer_sees_new_snapshot() {
    let (backing, manager) = backed_manager();
    let handle = manager.int_("aInt");
    let seen = Arc::new(Mutex::new(None));

    let seen_clone = Arc::clone(&seen);
    let handle_clone = handle.clone();
    let observer = Arc::new(move |_key: &str| -> Result<()> {
        *seen_clone.lock() = Some(handle_clone.v()?);
        Ok(())
    });
    let _subscription = handle.register(&observer);

    backing.set("aInt", 42);
    manager.update_now().unwrap();
    assert_eq!(*seen.lock(), Some(42));
}

#[test]
fn test_dropped_observer_is_not_called() {
    let (backing, manager) = backed_manager();
    let (count, observer) = counting_key_observer();
    let _subscription = manager.int_("aInt").register(&observer);
    assert_eq!(manager.observer_count(), 1);

    drop(observer);
    backing.set("aInt", 1);
    manager.update_now().unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(manager.observer_count(), 0);
}

#[test]
fn test_observer_error_propagates_after_swap() {
    let (backing, manager) = backed_manager();
    let failing = Arc::new(|_key: &str| -> Result<()> {
        Err(ConfigError::Other("observer failed".to_string()))
    });
    let _subscription = manager.int_("aInt").register(&failing);

    backing.set("aInt", 5);
    let err = manager.update_now().unwrap_err();
    assert!(matches!(err, ConfigError::Other(_)));

    // The swap already happened
    assert_eq!(manager.int_("aInt").v().unwrap(), 5);
    assert!(!manager.update_now().unwrap());
}

#[test]
fn test_reentrant_update_is_illegal() {
    let (backing, manager) = backed_manager();
    let inner = manager.clone();
    let nested = Arc::new(Mutex::new(None));

    let nested_clone = Arc::clone(&nested);
    let observer = Arc::new(move || -> Result<()> {
        *nested_clone.lock() = Some(inner.update_now());
        Ok(())
    });
    let _subscription = manager.register(&observer);

    backing.set("aString", "changed");
    assert!(manager.update_now().unwrap());

    let nested = nested.lock().take().unwrap();
    assert!(matches!(nested, Err(ConfigError::IllegalState(_))));
}

#[test]
fn test_file_reload() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "server": { "port": 8080, "host": "localhost" } }"#).unwrap();

    let manager = Manager::builder()
        .with_file(&path)
        .with_source(MapSource::new("defaults").with_value("server.timeout", 30))
        .build()
        .unwrap();

    let port = manager.int_("server.port");
    let (host_count, host_observer) = counting_key_observer();
    let _subscription = manager.string("server.host").register(&host_observer);

    assert_eq!(port.v().unwrap(), 8080);
    assert!(!manager.update_now().unwrap());

    rewrite(
        &path,
        r#"{ "server": { "port": 9090, "host": "localhost" } }"#,
        10,
    );
    assert!(manager.update_now().unwrap());
    assert_eq!(port.v().unwrap(), 9090);
    assert_eq!(host_count.load(Ordering::SeqCst), 0);
    assert_eq!(manager.int_("server.timeout").v().unwrap(), 30);
}

#[test]
fn test_file_removed_keeps_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "port": 8080 }"#).unwrap();

    let manager = Manager::builder().with_file(&path).build().unwrap();
    let before = manager.snapshot();

    fs::remove_file(&path).unwrap();
    let err = manager.update_now().unwrap_err();
    assert!(matches!(err, ConfigError::SourceUnavailable { .. }));

    assert!(Arc::ptr_eq(&before, &manager.snapshot()));
    assert_eq!(manager.int_("port").v().unwrap(), 8080);
}

#[test]
fn test_removed_key_becomes_missing() {
    let (backing, manager) = backed_manager();
    let (count, observer) = counting_key_observer();
    let handle = manager.string("aString");
    let _subscription = handle.register(&observer);

    backing.remove("aString");
    assert!(manager.update_now().unwrap());

    assert!(handle.v().unwrap_err().is_missing_key());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_reads_during_updates() {
    let (backing, manager) = backed_manager();
    let handle = manager.int_("aInt");
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..4 {
            let handle = handle.clone();
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    // Every read observes one complete snapshot
                    let value = handle.v().unwrap();
                    assert!(value == 12 || (1000..1100).contains(&value));
                }
            });
        }

        for i in 1000..1100 {
            backing.set("aInt", i);
            manager.update_now().unwrap();
        }
        done.store(true, Ordering::Relaxed);
    });

    assert_eq!(handle.v().unwrap(), 1099);
}

#[test]
fn test_concurrent_update_calls() {
    let (backing, manager) = backed_manager();
    backing.set("aInt", 1);

    let outcomes: Vec<Result<bool>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| manager.update_now()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    // Overlapping calls are rejected, never queued
    for outcome in &outcomes {
        match outcome {
            Ok(_) | Err(ConfigError::IllegalState(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(outcomes.iter().filter(|o| matches!(o, Ok(true))).count(), 1);
    assert_eq!(manager.int_("aInt").v().unwrap(), 1);
}

#[test]
fn test_observer_on_table_valued_key() {
    let (backing, manager) = backed_manager();
    backing.set("limits", serde_json::json!({ "cpu": 2, "mem": 512 }));
    manager.update_now().unwrap();

    let limits = manager.map::<i64>("limits");
    let (table_count, table_observer) = counting_key_observer();
    let (mem_count, mem_observer) = counting_key_observer();
    let _table_sub = limits.register(&table_observer);
    let _mem_sub = manager.long_("limits.mem").register(&mem_observer);

    backing.set("limits", serde_json::json!({ "cpu": 4, "mem": 512 }));
    assert!(manager.update_now().unwrap());

    assert_eq!(limits.v().unwrap().get("cpu"), Some(&4));
    assert_eq!(table_count.load(Ordering::SeqCst), 1);
    assert_eq!(mem_count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_reordered_set_is_not_a_change() {
    let (backing, manager) = backed_manager();
    backing.set("tags", RawValue::set_of(["a".into(), "b".into()]));
    manager.update_now().unwrap();

    let (count, observer) = counting_key_observer();
    let _subscription = manager.set::<String>("tags").register(&observer);

    backing.set("tags", RawValue::set_of(["b".into(), "a".into()]));
    assert!(!manager.update_now().unwrap());
    assert_eq!(count.load(Ordering::SeqCst), 0);

    backing.set("tags", RawValue::set_of(["b".into(), "c".into()]));
    assert!(manager.update_now().unwrap());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_nan_value_is_stable_across_updates() {
    let (backing, manager) = backed_manager();
    backing.set("ratio", f64::NAN);
    manager.update_now().unwrap();

    let (count, observer) = counting_key_observer();
    let _subscription = manager.double_("ratio").register(&observer);

    backing.set("aInt", 13);
    assert!(manager.update_now().unwrap());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
