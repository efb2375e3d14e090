use crate::types::Condition;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pic-a-fruit")]
#[command(about = "果物の熟度判定クライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 判定サーバーのURL（設定ファイル・環境変数より優先）
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を送信して熟度を判定
    Scan {
        /// JPEG画像のパス
        #[arg(required = true)]
        image: PathBuf,

        /// 自動保存の設定に関わらず履歴に保存しない
        #[arg(long)]
        no_save: bool,
    },

    /// サーバーへの疎通確認
    Ping,

    /// サーバー情報を表示
    ServerInfo,

    /// 履歴を表示
    History {
        /// 果物名・状態で検索
        #[arg(short, long)]
        search: Option<String>,

        /// 状態で絞り込み (ripe/rotten/unripe)
        #[arg(short, long)]
        condition: Option<Condition>,

        /// 最大表示件数
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// 履歴の1件を表示
    Show {
        id: i64,
    },

    /// 履歴の1件を削除
    Delete {
        id: i64,
    },

    /// 履歴をすべて削除
    Clear,

    /// 履歴の統計とストレージ使用量
    Stats,

    /// 設定を表示/変更
    Settings {
        /// 通知 (true/false)
        #[arg(long)]
        notifications: Option<bool>,

        /// 判定結果の自動保存 (true/false)
        #[arg(long)]
        auto_save: Option<bool>,

        /// テーマ
        #[arg(long)]
        theme: Option<String>,
    },

    /// 初回起動（オンボーディング）状態
    Onboarding {
        /// オンボーディング完了として記録
        #[arg(long)]
        complete: bool,
    },

    /// 全データを削除（履歴・設定・初回フラグ）
    Reset,

    /// 接続設定を表示/編集
    Config {
        /// サーバーURLを保存
        #[arg(long)]
        set_base_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
