//! ランドマークストリームとバックエンド HTTP API のワイヤ型
//!
//! ランドマーク型以外には依存せず、振る舞いは持たない

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pose::LandmarkFrame;

// --- ストリーム（バックエンド → クライアント、JSON テキスト） ---

/// 受信メッセージ1件。フィールドはすべて省略可
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// エンコード済み画像: `data:image/jpeg;base64,...` または base64 そのまま
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub landmarks: Option<LandmarkFrame>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl StreamFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// ランドマーク。存在して空でないときだけ
    pub fn non_empty_landmarks(&self) -> Option<&LandmarkFrame> {
        self.landmarks.as_ref().filter(|lm| !lm.is_empty())
    }
}

// --- POST /recognize ---

#[derive(Debug, Clone, Serialize)]
pub struct RecognizeRequest {
    pub landmarks: LandmarkFrame,
    pub timestamp: Option<f64>,
}

/// 「何も認識されなかった」を表すジェスチャー名
pub const NO_GESTURE: &str = "none";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub gesture: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub action: Option<ActionResult>,
}

impl RecognizeResponse {
    /// 認識されたジェスチャー。"none" やフィールド欠落なら `None`
    pub fn recognized(&self) -> Option<&str> {
        self.gesture.as_deref().filter(|g| *g != NO_GESTURE)
    }
}

/// バックエンドがジェスチャーに対して実行した動作の結果
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- /settings/gestures ---

/// `GET /settings/gestures`。順序はバックエンドのまま
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingsResponse {
    #[serde(default)]
    pub mappings: Map<String, Value>,
}

/// `GET /settings/gestures/{gesture}`
#[derive(Debug, Clone, Deserialize)]
pub struct MappingLookupResponse {
    pub gesture: String,
    pub mapping: MappingRecord,
}

/// バックエンドに保存された形のマッピング
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `POST /settings/gestures` と `PUT /settings/gestures/{gesture}` のボディ
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingRequest {
    pub gesture: String,
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingChangeResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gesture: Option<String>,
}

// --- /record ---

/// `POST /record/sequence` のボディ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceSubmission {
    pub label: String,
    pub sequence: Vec<LandmarkFrame>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub report: AnalysisReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub avg_deviation: f64,
    pub max_deviation: f64,
    pub min_deviation: f64,
    #[serde(default)]
    pub progress_note: String,
    /// フレームごとの偏差
    #[serde(default)]
    pub details: Vec<f64>,
    #[serde(default)]
    pub recognized_gestures: Vec<RecognizedGesture>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedGesture {
    pub gesture: String,
    pub frame: i64,
}

/// `GET /record/sequences/{label}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SequenceListing {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub sequences: Vec<SequenceSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SequenceSummary {
    pub filename: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub avg_deviation: Option<f64>,
}

// --- その他 ---

/// `GET /health`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// FastAPI 形式のエラーボディ。`detail` は文字列か検証エラーの配列
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        }
    }
}
