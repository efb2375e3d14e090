use crate::error::{PicAFruitError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "PIC_A_FRUIT_BASE_URL";
pub const ENV_DATA_DIR: &str = "PIC_A_FRUIT_DATA_DIR";

/// 省略したフィールドは既定値で補う
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    /// 判定リクエストのタイムアウト
    pub timeout_ms: u64,
    /// ヘルスチェックのタイムアウト
    pub health_timeout_ms: u64,
    /// 履歴・設定の保存先（省略時はOS標準のデータディレクトリ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 設定ファイルの内容のみ（環境変数は反映しない）。ファイルがなければ既定値
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default_config());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Config>(&content)?)
    }

    /// 環境変数を優先
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// ~/.config/pic-a-fruit/config.json に保存
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 設定ファイルの場所
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PicAFruitError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("pic-a-fruit").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_ms: 30_000,
            health_timeout_ms: 5_000,
            data_dir: None,
        }
    }

    /// base_urlを検証し、末尾のスラッシュを除去
    pub fn validate(&mut self) -> Result<()> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(PicAFruitError::Config(format!(
                "base_urlはhttp://またはhttps://で始まる必要があります: {}",
                self.base_url
            )));
        }
        self.base_url = trimmed.to_string();

        if self.timeout_ms == 0 || self.health_timeout_ms == 0 {
            return Err(PicAFruitError::Config("タイムアウトは1ms以上を指定してください".into()));
        }
        Ok(())
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        self.base_url = url.to_string();
        self.validate()?;
        Ok(self)
    }

    /// 設定ファイルのbase_urlだけを書き換える。
    /// 環境変数・コマンドライン引数による上書きは保存しない
    pub fn set_base_url(url: &str) -> Result<Self> {
        Self::set_base_url_in(&Self::config_path()?, url)
    }

    pub fn set_base_url_in(path: &Path, url: &str) -> Result<Self> {
        let config = Self::load_from(path)?.with_base_url(url)?;
        config.save_to(path)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    /// 履歴ストアのディレクトリ
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| PicAFruitError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("pic-a-fruit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = Config::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let config = Config::default().with_base_url("http://10.0.2.2:8000/").unwrap();
        assert_eq!(config.base_url, "http://10.0.2.2:8000");
    }

    #[test]
    fn test_with_base_url_rejects_missing_scheme() {
        let err = Config::default().with_base_url("localhost:8000").unwrap_err();
        assert!(matches!(err, PicAFruitError::Config(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config {
            timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/pic-a-fruit-test")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/pic-a-fruit-test"));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"base_url":"http://192.168.1.5:8000"}"#).unwrap();
        assert_eq!(config.base_url, "http://192.168.1.5:8000");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_set_base_url_keeps_other_file_fields() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("pic-a-fruit").join("config.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"base_url":"http://localhost:8000","timeout_ms":12000}"#).unwrap();

        let saved = Config::set_base_url_in(&path, "http://10.0.2.2:8000/").unwrap();
        assert_eq!(saved.base_url, "http://10.0.2.2:8000");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("data_dir"));
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.base_url, "http://10.0.2.2:8000");
        assert_eq!(reloaded.timeout_ms, 12_000);
        assert!(reloaded.data_dir.is_none());
    }

    #[test]
    fn test_set_base_url_rejects_invalid_url_without_writing() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");

        assert!(Config::set_base_url_in(&path, "ftp://example.com").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_config_json_roundtrip_without_data_dir() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(!json.contains("data_dir"));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.base_url, "http://localhost:8000");
    }
}
