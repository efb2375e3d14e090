//! キー・バリューストア
//!
//! 文字列キーに文字列値（JSON）を保存する最小限のストア。
//! - FileStore: データディレクトリ内の1つのJSONファイル
//! - MemoryStore: プロセス内（テスト・組み込み用）

use crate::error::{PicAFruitError, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STORE_FILE_NAME: &str = "storage.json";

/// 文字列キー・値の永続ストア
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
    /// 複数キーを一括削除
    fn multi_remove(&self, keys: &[&str]) -> Result<()>;
    fn all_keys(&self) -> Result<Vec<String>>;
}

// =============================================================================
// FileStore
// =============================================================================

/// storage.jsonの読み込み失敗
enum LoadError {
    /// JSON構文が壊れている
    Corrupt(serde_json::Error),
    /// 権限・I/Oエラー、または値が文字列でない
    Unreadable(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Corrupt(e) => write!(f, "{}", e),
            LoadError::Unreadable(msg) => f.write_str(msg),
        }
    }
}

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// ディレクトリ内のstorage.jsonを開く（ファイルは最初の書き込みで作成）
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(STORE_FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        self.read_entries()
            .map_err(|e| PicAFruitError::StorageRead(format!("{}: {}", self.path.display(), e)))
    }

    fn read_entries(&self) -> std::result::Result<BTreeMap<String, String>, LoadError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path).map_err(|e| LoadError::Unreadable(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            if e.is_syntax() || e.is_eof() {
                LoadError::Corrupt(e)
            } else {
                LoadError::Unreadable(e.to_string())
            }
        })
    }

    /// 一時ファイルに書いてからrename
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, entries)?;
            writer.flush()?;
            std::fs::rename(&tmp_path, &self.path)
        };
        write().map_err(|e| PicAFruitError::StorageWrite(format!("{}: {}", self.path.display(), e)))
    }

    /// JSONとして壊れたファイルだけ空として作り直す。
    /// それ以外の読み込み失敗では既存のキーを残すため書き込みを中止する
    fn load_for_write(&self) -> Result<BTreeMap<String, String>> {
        match self.read_entries() {
            Ok(entries) => Ok(entries),
            Err(LoadError::Corrupt(e)) => {
                log::warn!(
                    "ストアファイルが壊れているため再作成します: {}: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
            Err(LoadError::Unreadable(msg)) => Err(PicAFruitError::StorageWrite(format!(
                "{}: 既存の内容を読み込めません: {}",
                self.path.display(),
                msg
            ))),
        }
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PicAFruitError::StorageWrite("ストアのロックが破損しています".into()))?;
        let mut entries = self.load_for_write()?;
        f(&mut entries);
        self.persist(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }

    fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        self.modify(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }

    fn all_keys(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PicAFruitError::StorageWrite("ストアのロックが破損しています".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries()?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    fn all_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }
}
