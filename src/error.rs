use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicAFruitError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("サーバーに接続できません。サーバーが起動しているか、ネットワークを確認してください: {0}")]
    Connectivity(String),

    #[error("サーバーエラー: {0}")]
    ServerRejected(String),

    #[error("レスポンスの処理に失敗しました: {0}")]
    MalformedResponse(String),

    #[error("画像読み込みエラー: {0}")]
    ImageRead(String),

    #[error("ストレージ読み込みエラー: {0}")]
    StorageRead(String),

    #[error("ストレージ書き込みエラー: {0}")]
    StorageWrite(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

/// エラー種別（メッセージ文字列ではなくこちらで分岐する）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connectivity,
    ServerRejected,
    MalformedResponse,
    ImageRead,
    StorageRead,
    StorageWrite,
    Io,
}

impl PicAFruitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PicAFruitError::Config(_) => ErrorKind::Config,
            PicAFruitError::Connectivity(_) => ErrorKind::Connectivity,
            PicAFruitError::ServerRejected(_) => ErrorKind::ServerRejected,
            PicAFruitError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            PicAFruitError::ImageRead(_) => ErrorKind::ImageRead,
            PicAFruitError::StorageRead(_) => ErrorKind::StorageRead,
            PicAFruitError::StorageWrite(_) => ErrorKind::StorageWrite,
            // ストレージ層は自前でStorageRead/StorageWriteに変換するため、
            // 生のJSONエラーは設定ファイル由来
            PicAFruitError::JsonParse(_) => ErrorKind::Config,
            PicAFruitError::Io(_) => ErrorKind::Io,
        }
    }

    /// 再実行で回復しうるエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connectivity)
    }
}

pub type Result<T> = std::result::Result<T, PicAFruitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PicAFruitError::Connectivity("refused".into()).kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(
            PicAFruitError::ServerRejected("bad".into()).kind(),
            ErrorKind::ServerRejected
        );
        assert_eq!(
            PicAFruitError::MalformedResponse("x".into()).kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            PicAFruitError::StorageWrite("disk full".into()).kind(),
            ErrorKind::StorageWrite
        );
    }

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(PicAFruitError::Connectivity("timeout".into()).is_retryable());
        assert!(!PicAFruitError::ServerRejected("bad".into()).is_retryable());
        assert!(!PicAFruitError::MalformedResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_error_display_config() {
        let error = PicAFruitError::Config("base_urlが不正です".to_string());
        assert_eq!(format!("{}", error), "設定エラー: base_urlが不正です");
    }
}
