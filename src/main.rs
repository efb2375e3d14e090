use anyhow::Context;
use clap::Parser;
use pic_a_fruit::{cli, config, history, storage, types, PredictionClient};
use cli::{Cli, Commands};
use config::Config;
use history::{format_size, HistoryFilter, HistoryStore};
use storage::FileStore;
use types::ScanResult;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = Config::load().context("設定の読み込みに失敗しました")?;
    if let Some(url) = cli.base_url.as_deref() {
        config = config.with_base_url(url)?;
    }

    let data_dir = config.data_dir()?;
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("データディレクトリを開けません: {}", data_dir.display()))?;
    let history = HistoryStore::new(store);

    match cli.command {
        Commands::Scan { image, no_save } => {
            println!("🍎 pic-a-fruit - 熟度判定\n");

            let client = PredictionClient::new(&config)?;
            println!("[1/2] 画像を送信中... ({})", client.base_url());
            let result = client.predict(&image).await?;
            println!("✔ 判定完了\n");
            print_result(&result);

            let settings = history.settings();
            if settings.auto_save && !no_save {
                println!("\n[2/2] 履歴に保存中...");
                history.save_result(result)?;
                println!("✔ 保存しました");
            }
        }

        Commands::Ping => {
            let client = PredictionClient::new(&config)?;
            if client.test_connection().await {
                println!("✔ サーバーに接続できました: {}", client.base_url());
            } else {
                println!("✘ サーバーに接続できません: {}", client.base_url());
            }
        }

        Commands::ServerInfo => {
            let client = PredictionClient::new(&config)?;
            let info = client.server_info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::History { search, condition, limit } => {
            let filter = HistoryFilter { search, condition };
            let items = history.filter(&filter);
            let shown = limit.unwrap_or(items.len()).min(items.len());

            if items.is_empty() {
                println!("履歴がありません");
            }
            for item in items.iter().take(shown) {
                println!(
                    "{} {} {:<10} {:<7} {:>3}%  {}",
                    item.id, item.image, item.fruit, item.result, item.confidence, item.date
                );
            }
            println!("\n{}件", items.len());
        }

        Commands::Show { id } => match history.find(id) {
            Some(result) => print_result(&result),
            None => println!("見つかりません: {}", id),
        },

        Commands::Delete { id } => {
            if history.delete_result(id)? {
                println!("✔ 削除しました: {}", id);
            } else {
                println!("見つかりません: {}", id);
            }
        }

        Commands::Clear => {
            history.clear_history()?;
            println!("✔ 履歴を削除しました");
        }

        Commands::Stats => {
            let stats = history.stats();
            let info = history.storage_info();

            println!("統計:");
            println!("  スキャン数: {}", stats.total_scans);
            for condition in types::Condition::ALL {
                let count = stats.by_condition.get(&condition).copied().unwrap_or(0);
                println!("  {}: {}", condition, count);
            }
            for (fruit, count) in &stats.by_fruit {
                println!("  {}: {}", fruit, count);
            }
            println!("  平均信頼度: {:.1}%", stats.avg_confidence);
            println!("ストレージ:");
            println!("  キー: {}", info.keys.join(", "));
            println!("  サイズ: {}", format_size(info.total_size_bytes));
        }

        Commands::Settings { notifications, auto_save, theme } => {
            let settings = if notifications.is_some() || auto_save.is_some() || theme.is_some() {
                let updated = history.update_settings(|s| {
                    if let Some(v) = notifications {
                        s.notifications = v;
                    }
                    if let Some(v) = auto_save {
                        s.auto_save = v;
                    }
                    if theme.is_some() {
                        s.theme = theme;
                    }
                })?;
                println!("✔ 設定を保存しました");
                updated
            } else {
                history.settings()
            };

            println!("設定:");
            println!("  通知: {}", settings.notifications);
            println!("  自動保存: {}", settings.auto_save);
            if let Some(theme) = &settings.theme {
                println!("  テーマ: {}", theme);
            }
        }

        Commands::Onboarding { complete } => {
            if complete {
                history.mark_onboarding_complete()?;
                println!("✔ オンボーディング完了を記録しました");
            } else if history.is_first_run() {
                println!("初回起動です（オンボーディング未完了）");
            } else {
                println!("オンボーディング完了済みです");
            }
        }

        Commands::Reset => {
            history.clear_all_data()?;
            println!("✔ 全データを削除しました");
        }

        Commands::Config { set_base_url, show } => {
            if let Some(url) = set_base_url {
                let saved = Config::set_base_url(&url)?;
                println!("✔ サーバーURLを設定しました: {}", saved.base_url);
                let env_url = std::env::var(config::ENV_BASE_URL).unwrap_or_default();
                if !env_url.trim().is_empty() {
                    println!(
                        "  ※ {} が設定されているため、現在はそちらが優先されます",
                        config::ENV_BASE_URL
                    );
                }
            }

            if show {
                println!("設定:");
                println!("  サーバーURL: {}", config.base_url);
                println!("  タイムアウト: {}ms", config.timeout_ms);
                println!("  ヘルスチェック: {}ms", config.health_timeout_ms);
                println!("  データ: {}", data_dir.display());
            }
        }
    }

    Ok(())
}

fn print_result(result: &ScanResult) {
    println!("{} {}", result.image, result.fruit);
    println!("  状態: {}", result.result);
    println!("  信頼度: {}%", result.confidence);
    println!("  日付: {}", result.date);
    println!("  ラベル: {}", result.original_label);
    if result.condition_inferred() {
        println!("  ※ ラベルに状態が含まれないため ripe として扱っています");
    }
}
