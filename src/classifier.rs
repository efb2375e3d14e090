//! 判定サーバー連携モジュール
//!
//! - POST {base_url}/predict: 画像をmultipartで送信し、ラベルと確率を受け取る
//! - GET  {base_url}/health: 疎通確認
//! - GET  {base_url}/: サーバー情報（診断用）
//!
//! レスポンスの解釈は`interpret_prediction`に分離してあり、通信なしで検証できる。

use crate::config::Config;
use crate::error::{PicAFruitError, Result};
use crate::types::ScanResult;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const GENERIC_SERVER_ERROR: &str = "Server error occurred";
const GENERIC_PREDICTION_ERROR: &str = "Prediction failed";

/// /predict のレスポンス
#[derive(Debug, Clone, Deserialize)]
struct PredictionResponse {
    status: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    demo_mode: Option<bool>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 非2xx時のレスポンス（FastAPI形式のdetailを含む）
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// サーバーの判定結果（変換前）
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// 0.0〜1.0
    pub confidence: f64,
    pub demo_mode: bool,
    pub model_version: Option<String>,
}

impl Prediction {
    pub fn into_scan_result(self) -> ScanResult {
        ScanResult::from_prediction(&self.label, self.confidence)
    }
}

/// HTTPステータスとボディから判定結果を取り出す
pub fn interpret_prediction(status: u16, body: &str) -> Result<Prediction> {
    if !(200..300).contains(&status) {
        return Err(PicAFruitError::ServerRejected(server_error_detail(body)));
    }

    let response: PredictionResponse = serde_json::from_str(body)
        .map_err(|e| PicAFruitError::MalformedResponse(format!("JSON解析に失敗: {}", e)))?;

    if response.status == "error" {
        let message = response
            .message
            .filter(|m| !m.is_empty())
            .or(response.error.filter(|e| !e.is_empty()))
            .unwrap_or_else(|| GENERIC_PREDICTION_ERROR.to_string());
        return Err(PicAFruitError::ServerRejected(message));
    }

    if response.status != "success" {
        return Err(PicAFruitError::MalformedResponse(format!(
            "不明なstatus: {}",
            response.status
        )));
    }

    match (response.label, response.confidence) {
        (Some(label), Some(confidence)) => Ok(Prediction {
            label,
            confidence,
            demo_mode: response.demo_mode.unwrap_or(false),
            model_version: response.model_version,
        }),
        _ => Err(PicAFruitError::MalformedResponse(
            "labelまたはconfidenceがありません".into(),
        )),
    }
}

/// エラーボディからdetail → messageの順でメッセージを取り出す
fn server_error_detail(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return GENERIC_SERVER_ERROR.to_string();
    };

    // バリデーションエラーなど構造化されたdetailはJSON文字列のまま
    let detail = match parsed.detail {
        Some(serde_json::Value::String(detail)) => Some(detail),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    detail
        .filter(|d| !d.is_empty())
        .or(parsed.message.filter(|m| !m.is_empty()))
        .unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string())
}

/// アップロード時のファイル名
fn upload_file_name() -> String {
    format!("fruit_{}.jpg", chrono::Utc::now().timestamp_millis())
}

pub struct PredictionClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl PredictionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PicAFruitError::Config(format!("HTTPクライアントの作成に失敗: {}", e)))?;

        log::debug!("API Base URL: {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 疎通確認。失敗はすべてfalse
    pub async fn test_connection(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        log::debug!("接続確認: {}", url);

        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                log::debug!("接続成功: {}", response.status());
                true
            }
            Ok(response) => {
                log::warn!("接続確認でエラー応答: {}", response.status());
                false
            }
            Err(e) => {
                log::warn!("接続確認に失敗: {}", e);
                false
            }
        }
    }

    /// 画像を送信して判定結果を得る
    pub async fn predict(&self, image: &Path) -> Result<ScanResult> {
        let prediction = self.predict_raw(image).await?;
        let result = prediction.into_scan_result();
        log::debug!("判定結果: {:?}", result);
        Ok(result)
    }

    /// 変換前の判定結果
    pub async fn predict_raw(&self, image: &Path) -> Result<Prediction> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| PicAFruitError::ImageRead(format!("{}: {}", image.display(), e)))?;

        log::debug!("画像を送信中: {} ({} bytes)", image.display(), bytes.len());

        let part = Part::bytes(bytes)
            .file_name(upload_file_name())
            .mime_str("image/jpeg")
            .map_err(|e| PicAFruitError::ImageRead(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = format!("{}/predict", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PicAFruitError::Connectivity(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PicAFruitError::Connectivity(e.to_string()))?;

        log::debug!("判定レスポンス ({}): {}", status, body);

        let prediction = interpret_prediction(status, &body)?;
        if prediction.demo_mode {
            log::warn!("サーバーはデモモードで応答しています");
        }
        Ok(prediction)
    }

    /// サーバー情報（形式は不定）
    pub async fn server_info(&self) -> Result<serde_json::Value> {
        let url = format!("{}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PicAFruitError::Connectivity(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PicAFruitError::Connectivity(e.to_string()))?;

        if !status.is_success() {
            return Err(PicAFruitError::ServerRejected(server_error_detail(&body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| PicAFruitError::MalformedResponse(format!("JSON解析に失敗: {}", e)))
    }
}
