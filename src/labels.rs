//! 分類ラベルの変換
//!
//! サーバーが返す生ラベル（例: "fresh_apple"）を、表示用の果物名・アイコンと
//! 状態(Condition)に変換する。判定はすべて小文字化した部分一致。

use crate::types::Condition;

/// 果物の表示情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FruitInfo {
    pub keyword: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

/// 既知の果物（上から順に照合）
pub static KNOWN_FRUITS: &[FruitInfo] = &[
    FruitInfo { keyword: "apple", name: "Apple", icon: "🍎" },
    FruitInfo { keyword: "banana", name: "Banana", icon: "🍌" },
    FruitInfo { keyword: "orange", name: "Orange", icon: "🍊" },
    FruitInfo { keyword: "rambutan", name: "Rambutan", icon: "🔴" },
];

/// どれにも一致しない場合
pub const GENERIC_FRUIT: FruitInfo = FruitInfo {
    keyword: "",
    name: "Fruit",
    icon: "🍇",
};

/// 状態トークン（上から順に照合）
const CONDITION_TOKENS: &[(&str, Condition)] = &[
    ("fresh", Condition::Ripe),
    ("rotten", Condition::Rotten),
    ("unripe", Condition::Unripe),
];

/// ラベルから果物を判定。不明なら汎用の"Fruit"
pub fn fruit_for(label: &str) -> FruitInfo {
    let lower = label.to_lowercase();
    KNOWN_FRUITS
        .iter()
        .find(|f| lower.contains(f.keyword))
        .copied()
        .unwrap_or(GENERIC_FRUIT)
}

/// ラベルから状態を判定。トークンがなければNone
pub fn parse_condition(label: &str) -> Option<Condition> {
    let lower = label.to_lowercase();
    CONDITION_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|(_, condition)| *condition)
}

/// ラベルから状態を判定。トークンがなければripe扱い
pub fn condition_for(label: &str) -> Condition {
    parse_condition(label).unwrap_or(Condition::Ripe)
}
