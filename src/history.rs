//! スキャン履歴・設定・初回起動フラグの保存
//!
//! - 読み込み系は失敗しても安全な既定値を返す（ログのみ）
//! - 書き込み系はエラーを呼び出し元に返す
//! - 読み込み→変更→書き込みはロックで直列化

use crate::error::{PicAFruitError, Result};
use crate::storage::KeyValueStore;
use crate::types::{Condition, HistoryStats, ScanResult, Settings, StorageInfo};
use std::sync::{Mutex, MutexGuard};

/// 履歴の最大件数
pub const MAX_HISTORY: usize = 50;

/// このアプリのキー接頭辞
pub const KEY_PREFIX: &str = "pic_a_fruit_";
pub const KEY_SCAN_HISTORY: &str = "pic_a_fruit_scan_history";
pub const KEY_IS_FIRST_TIME: &str = "pic_a_fruit_is_first_time";
pub const KEY_SETTINGS: &str = "pic_a_fruit_settings";

/// 履歴の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// 果物名・状態の部分一致（大文字小文字を区別しない）
    pub search: Option<String>,
    pub condition: Option<Condition>,
}

impl HistoryFilter {
    pub fn matches(&self, item: &ScanResult) -> bool {
        if let Some(query) = self.search.as_deref().map(str::trim) {
            if !query.is_empty() {
                let query = query.to_lowercase();
                let hit = item.fruit.to_lowercase().contains(&query)
                    || item.result.as_str().contains(&query);
                if !hit {
                    return false;
                }
            }
        }

        match self.condition {
            Some(condition) => item.result == condition,
            None => true,
        }
    }
}

pub struct HistoryStore<S: KeyValueStore> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PicAFruitError::StorageWrite("履歴ロックが破損しています".into()))
    }

    fn write_history(&self, history: &[ScanResult]) -> Result<()> {
        let json = serde_json::to_string(history)
            .map_err(|e| PicAFruitError::StorageWrite(e.to_string()))?;
        self.store.set_item(KEY_SCAN_HISTORY, &json).map_err(|e| {
            log::error!("履歴の保存に失敗: {}", e);
            into_write_error(e)
        })
    }

    // =========================================================================
    // 履歴
    // =========================================================================

    /// 先頭に追加し、最大件数を超えた古いものを削除
    pub fn save_result(&self, result: ScanResult) -> Result<()> {
        let _guard = self.lock()?;
        let mut history = self.history();
        history.insert(0, result);
        history.truncate(MAX_HISTORY);
        self.write_history(&history)?;
        log::info!("スキャン結果を保存しました（{}件）", history.len());
        Ok(())
    }

    /// 新しい順の履歴。未保存・破損時は空
    pub fn history(&self) -> Vec<ScanResult> {
        let json = match self.store.get_item(KEY_SCAN_HISTORY) {
            Ok(Some(json)) => json,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("履歴の読み込みに失敗: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ScanResult>>(&json) {
            Ok(history) => history,
            Err(e) => {
                log::warn!("履歴データが不正なため破棄します: {} (payload: {})", e, json);
                Vec::new()
            }
        }
    }

    pub fn find(&self, id: i64) -> Option<ScanResult> {
        self.history().into_iter().find(|r| r.id == id)
    }

    pub fn filter(&self, filter: &HistoryFilter) -> Vec<ScanResult> {
        self.history()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect()
    }

    /// 1件削除。該当なしならfalse
    pub fn delete_result(&self, id: i64) -> Result<bool> {
        let _guard = self.lock()?;
        let mut history = self.history();
        let before = history.len();
        history.retain(|r| r.id != id);
        if history.len() == before {
            return Ok(false);
        }
        self.write_history(&history)?;
        log::info!("スキャン結果を削除しました: {}", id);
        Ok(true)
    }

    pub fn clear_history(&self) -> Result<()> {
        let _guard = self.lock()?;
        self.store
            .remove_item(KEY_SCAN_HISTORY)
            .map_err(into_write_error)?;
        log::info!("履歴を削除しました");
        Ok(())
    }

    pub fn stats(&self) -> HistoryStats {
        let history = self.history();
        let mut stats = HistoryStats {
            total_scans: history.len(),
            ..Default::default()
        };

        for item in &history {
            *stats.by_condition.entry(item.result).or_insert(0) += 1;
            *stats.by_fruit.entry(item.fruit.clone()).or_insert(0) += 1;
        }

        stats.avg_confidence = if history.is_empty() {
            0.0
        } else {
            history.iter().map(|r| r.confidence as f64).sum::<f64>() / history.len() as f64
        };

        stats
    }

    // =========================================================================
    // 初回起動フラグ
    // =========================================================================

    /// フラグがなければ初回。読み込み失敗時も初回扱い
    pub fn is_first_run(&self) -> bool {
        match self.store.get_item(KEY_IS_FIRST_TIME) {
            Ok(value) => value.is_none(),
            Err(e) => {
                log::warn!("初回起動フラグの読み込みに失敗: {}", e);
                true
            }
        }
    }

    pub fn mark_onboarding_complete(&self) -> Result<()> {
        self.store
            .set_item(KEY_IS_FIRST_TIME, "false")
            .map_err(into_write_error)
    }

    // =========================================================================
    // 設定
    // =========================================================================

    /// 保存済み設定。未保存・読み込み失敗時は既定値
    pub fn settings(&self) -> Settings {
        match self.store.get_item(KEY_SETTINGS) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("設定データが不正なため既定値を使用します: {}", e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("設定の読み込みに失敗: {}", e);
                Settings::default()
            }
        }
    }

    /// 設定を丸ごと上書き（マージしない）
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)
            .map_err(|e| PicAFruitError::StorageWrite(e.to_string()))?;
        self.store
            .set_item(KEY_SETTINGS, &json)
            .map_err(into_write_error)?;
        log::info!("設定を保存しました");
        Ok(())
    }

    /// 現在の設定を読み、変更して保存
    pub fn update_settings<F>(&self, f: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.lock()?;
        let mut settings = self.settings();
        f(&mut settings);
        self.save_settings(&settings)?;
        Ok(settings)
    }

    // =========================================================================
    // 全体
    // =========================================================================

    /// 履歴・初回フラグ・設定をまとめて削除
    pub fn clear_all_data(&self) -> Result<()> {
        let _guard = self.lock()?;
        self.store
            .multi_remove(&[KEY_SCAN_HISTORY, KEY_IS_FIRST_TIME, KEY_SETTINGS])
            .map_err(into_write_error)?;
        log::info!("全データを削除しました");
        Ok(())
    }

    /// アプリのキー一覧と値の合計サイズ(bytes)
    pub fn storage_info(&self) -> StorageInfo {
        let keys: Vec<String> = match self.store.all_keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(KEY_PREFIX)).collect(),
            Err(e) => {
                log::warn!("キー一覧の取得に失敗: {}", e);
                return StorageInfo::default();
            }
        };

        let mut total_size_bytes = 0;
        for key in &keys {
            match self.store.get_item(key) {
                Ok(Some(value)) => total_size_bytes += value.len(),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("値の取得に失敗: {}: {}", key, e);
                    return StorageInfo::default();
                }
            }
        }

        StorageInfo {
            keys,
            total_size_bytes,
        }
    }
}

/// 書き込み失敗はすべてStorageWriteにそろえる
fn into_write_error(e: PicAFruitError) -> PicAFruitError {
    match e {
        PicAFruitError::StorageWrite(_) => e,
        other => PicAFruitError::StorageWrite(other.to_string()),
    }
}

/// サイズを読みやすい表記に（"0 Bytes", "1.5 KB", ...）
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
