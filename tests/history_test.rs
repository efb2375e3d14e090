//! 履歴ストアのテスト（ファイル保存）

use pic_a_fruit::history::{
    HistoryStore, KEY_IS_FIRST_TIME, KEY_PREFIX, KEY_SCAN_HISTORY, KEY_SETTINGS, MAX_HISTORY,
};
use pic_a_fruit::{Condition, FileStore, KeyValueStore, ScanResult, Settings};
use tempfile::tempdir;

fn scan(id: i64, label: &str, confidence: f64) -> ScanResult {
    ScanResult {
        id,
        timestamp: id,
        ..ScanResult::from_prediction(label, confidence)
    }
}

fn open(dir: &std::path::Path) -> HistoryStore<FileStore> {
    HistoryStore::new(FileStore::open(dir).expect("ストアを開けません"))
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");
    {
        let history = open(dir.path());
        history.save_result(scan(1, "fresh_apple", 0.93)).unwrap();
        history.save_result(scan(2, "rotten_banana", 0.81)).unwrap();
    }

    let history = open(dir.path());
    let items = history.history();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].fruit, "Banana");
    assert_eq!(items[0].result, Condition::Rotten);
    assert_eq!(items[1].confidence, 93);
}

#[test]
fn test_history_cap_with_file_store() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());

    for id in 0..60 {
        history.save_result(scan(id, "unripe_orange", 0.6)).unwrap();
    }

    let items = history.history();
    assert_eq!(items.len(), MAX_HISTORY);
    assert_eq!(items[0].id, 59);
    assert_eq!(items.last().unwrap().id, 10);
}

#[test]
fn test_stored_format_is_camel_case_json_array() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());
    history.save_result(scan(5, "fresh_apple", 0.93)).unwrap();

    let raw = history.store().get_item(KEY_SCAN_HISTORY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value.is_array());
    assert_eq!(value[0]["originalLabel"], "fresh_apple");
    assert_eq!(value[0]["result"], "ripe");
}

#[test]
fn test_corrupt_store_file_degrades_to_defaults() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());
    std::fs::write(history.store().path(), "garbage").unwrap();

    assert!(history.history().is_empty());
    assert!(history.is_first_run());
    assert_eq!(history.settings(), Settings::default());
    assert_eq!(history.storage_info().total_size_bytes, 0);

    // JSON構文が壊れている場合のみ、書き込みでファイルが作り直される
    history.save_result(scan(1, "fresh_apple", 0.9)).unwrap();
    assert_eq!(history.history().len(), 1);
}

#[test]
fn test_unreadable_entry_does_not_wipe_other_keys() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());
    history.mark_onboarding_complete().unwrap();
    let settings = Settings {
        notifications: false,
        auto_save: false,
        theme: None,
    };
    history.save_settings(&settings).unwrap();

    // 文字列以外の値を持つエントリを外部から書き込む
    let path = history.store().path().to_path_buf();
    let mut raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    raw.insert("pic_a_fruit_extra".to_string(), serde_json::json!(1));
    std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

    let err = history.save_result(scan(1, "fresh_apple", 0.9)).unwrap_err();
    assert_eq!(err.kind(), pic_a_fruit::ErrorKind::StorageWrite);

    let after: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(after[KEY_IS_FIRST_TIME], "false");
    let stored: Settings = serde_json::from_str(after[KEY_SETTINGS].as_str().unwrap()).unwrap();
    assert_eq!(stored, settings);
    assert!(after.get(KEY_SCAN_HISTORY).is_none());
}

#[test]
fn test_write_failure_propagates() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());

    // 一時ファイルの位置にディレクトリを置いて書き込みを失敗させる
    std::fs::create_dir_all(history.store().path().with_extension("json.tmp")).unwrap();

    let err = history.save_result(scan(1, "fresh_apple", 0.9)).unwrap_err();
    assert_eq!(err.kind(), pic_a_fruit::ErrorKind::StorageWrite);
}

#[test]
fn test_settings_roundtrip_exact() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());
    let settings = Settings {
        notifications: false,
        auto_save: true,
        theme: None,
    };
    history.save_settings(&settings).unwrap();

    let reopened = open(dir.path());
    assert_eq!(reopened.settings(), settings);
}

#[test]
fn test_first_run_and_reset() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());

    assert!(history.is_first_run());
    history.mark_onboarding_complete().unwrap();
    for _ in 0..3 {
        assert!(!history.is_first_run());
    }

    history.save_result(scan(1, "fresh_apple", 0.9)).unwrap();
    history.clear_all_data().unwrap();

    assert!(history.is_first_run());
    assert!(history.history().is_empty());
    assert!(history.storage_info().keys.is_empty());
}

#[test]
fn test_storage_info_lists_app_keys() {
    let dir = tempdir().expect("Failed to create temp dir");
    let history = open(dir.path());
    history.store().set_item("unrelated", "value").unwrap();
    history.save_result(scan(1, "fresh_apple", 0.9)).unwrap();
    history.mark_onboarding_complete().unwrap();

    let info = history.storage_info();
    assert_eq!(info.keys.len(), 2);
    assert!(info.keys.iter().all(|k| k.starts_with(KEY_PREFIX)));

    let history_len = history.store().get_item(KEY_SCAN_HISTORY).unwrap().unwrap().len();
    assert_eq!(info.total_size_bytes, history_len + "false".len());
}
