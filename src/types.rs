//! スキャン結果・設定の型定義
//!
//! 保存形式はJSON（キーはcamelCase）。

use crate::labels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 果物の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Ripe,
    Rotten,
    Unripe,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Ripe, Condition::Rotten, Condition::Unripe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Ripe => "ripe",
            Condition::Rotten => "rotten",
            Condition::Unripe => "unripe",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ripe" => Ok(Condition::Ripe),
            "rotten" => Ok(Condition::Rotten),
            "unripe" => Ok(Condition::Unripe),
            _ => Err(format!("Unknown condition: {}. Use ripe, rotten, or unripe", s)),
        }
    }
}

/// 1回の判定結果（履歴に保存される単位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// 作成時刻(epoch ms)。timestampと同値
    pub id: i64,
    pub fruit: String,
    pub result: Condition,
    pub confidence: i64,
    /// 表示用の日付
    pub date: String,
    /// 果物アイコン
    pub image: String,
    pub original_label: String,
    pub timestamp: i64,
}

impl ScanResult {
    /// サーバーのラベルと確率[0,1]から結果を生成
    pub fn from_prediction(label: &str, probability: f64) -> Self {
        let now = chrono::Local::now();
        let millis = now.timestamp_millis();
        let fruit = labels::fruit_for(label);

        Self {
            id: millis,
            fruit: fruit.name.to_string(),
            result: labels::condition_for(label),
            confidence: to_percent(probability),
            date: now.format("%d %b %Y").to_string(),
            image: fruit.icon.to_string(),
            original_label: label.to_string(),
            timestamp: millis,
        }
    }

    /// 状態がラベルから判定できず、既定値(ripe)になったか
    pub fn condition_inferred(&self) -> bool {
        labels::parse_condition(&self.original_label).is_none()
    }
}

/// 確率[0,1]を百分率に丸める（範囲外の値はそのまま）
pub fn to_percent(probability: f64) -> i64 {
    (probability * 100.0).round() as i64
}

/// アプリ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub notifications: bool,
    pub auto_save: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: true,
            auto_save: true,
            theme: None,
        }
    }
}

/// ストレージ使用状況（診断表示用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageInfo {
    pub keys: Vec<String>,
    pub total_size_bytes: usize,
}

/// 履歴の集計
#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    pub total_scans: usize,
    pub by_condition: BTreeMap<Condition, usize>,
    pub by_fruit: BTreeMap<String, usize>,
    pub avg_confidence: f64,
}
