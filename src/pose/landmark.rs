use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 身体ポーズのランドマーク ID の接頭辞（`pose_0` .. `pose_32`）
pub const POSE_PREFIX: &str = "pose_";

/// ポーズインデックスからランドマーク ID を作る（例: `pose_11`）
pub fn pose_id(index: usize) -> String {
    format!("{POSE_PREFIX}{index}")
}

/// 追跡中の身体の1点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// 正規化 X (0.0..=1.0)
    pub x: f32,
    /// 正規化 Y (0.0..=1.0)
    pub y: f32,
    /// 可視度 (0.0..=1.0)。省略時は完全に可視
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    /// 閾値を厳密に超えるとき
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }

    /// 指定サイズのキャンバス上のピクセル位置
    pub fn to_pixel(&self, width: usize, height: usize) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

/// ある瞬間に観測した全ランドマーク（ID がキー）
///
/// 受信したエントリをそのまま保持する（`z` などの追加フィールドや手のグループも）
/// バックエンドへそのまま転送するため
/// 型付きアクセスは点として読めるエントリだけを見る
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    entries: Map<String, Value>,
}

impl LandmarkFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// 点エントリを追加または置換
    pub fn insert(&mut self, id: impl Into<String>, landmark: Landmark) {
        let value = serde_json::json!({
            "x": landmark.x,
            "y": landmark.y,
            "visibility": landmark.visibility,
        });
        self.entries.insert(id.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 点かどうかに関係なく全エントリ数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<Landmark> {
        self.entries.get(id).and_then(as_landmark)
    }

    pub fn pose(&self, index: usize) -> Option<Landmark> {
        self.get(&pose_id(index))
    }

    /// ランドマークとして読めるエントリを受信順に
    pub fn points(&self) -> impl Iterator<Item = (&str, Landmark)> + '_ {
        self.entries
            .iter()
            .filter_map(|(id, value)| as_landmark(value).map(|lm| (id.as_str(), lm)))
    }
}

impl FromIterator<(String, Landmark)> for LandmarkFrame {
    fn from_iter<I: IntoIterator<Item = (String, Landmark)>>(iter: I) -> Self {
        let mut frame = Self::new();
        for (id, landmark) in iter {
            frame.insert(id, landmark);
        }
        frame
    }
}

fn as_landmark(value: &Value) -> Option<Landmark> {
    Landmark::deserialize(value).ok()
}
