//! フレームごとの映像とスケルトンオーバーレイの描画

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbImage;
use tracing::{debug, warn};

use crate::connection::FrameSubscriber;
use crate::pose::LandmarkFrame;
use crate::protocol::StreamFrame;
use crate::render::skeleton::{
    DEFAULT_MARKER_RADIUS, LANDMARK_COLOR, SKELETON_COLOR, SKELETON_CONNECTIONS, VISIBILITY_THRESHOLD,
};
use crate::render::surface::{PixelBuffer, Surface};

/// 1回のオーバーレイ描画で描いたもの
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub lines: usize,
    pub markers: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub marker_radius: i32,
    pub line_width: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            marker_radius: DEFAULT_MARKER_RADIUS,
            line_width: 2,
        }
    }
}

/// `surface` をクリアして `landmarks` のスケルトンを描く
///
/// 接続線は両端が存在し可視のときだけ描く
/// マーカーは接続の有無に関係なく可視ランドマークすべてに描く
pub fn draw_skeleton<S: Surface>(
    surface: &mut S,
    landmarks: Option<&LandmarkFrame>,
    style: OverlayStyle,
) -> OverlayStats {
    surface.clear();
    let mut stats = OverlayStats::default();

    let landmarks = match landmarks {
        Some(lm) if !lm.is_empty() => lm,
        _ => return stats,
    };
    let (w, h) = (surface.width(), surface.height());

    for &(a, b) in SKELETON_CONNECTIONS.iter() {
        let (start, end) = match (landmarks.pose(a), landmarks.pose(b)) {
            (Some(start), Some(end)) => (start, end),
            _ => continue,
        };
        if start.is_visible(VISIBILITY_THRESHOLD) && end.is_visible(VISIBILITY_THRESHOLD) {
            surface.draw_line(start.to_pixel(w, h), end.to_pixel(w, h), style.line_width, SKELETON_COLOR);
            stats.lines += 1;
        }
    }

    for (_, lm) in landmarks.points() {
        if lm.is_visible(VISIBILITY_THRESHOLD) {
            surface.fill_circle(lm.to_pixel(w, h), style.marker_radius, LANDMARK_COLOR);
            stats.markers += 1;
        }
    }

    stats
}

/// フレーム画像をデコード（`data:` URL または base64 そのまま）
pub fn decode_frame_image(encoded: &str) -> Result<RgbImage> {
    let payload = match encoded.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = BASE64.decode(payload.trim()).context("invalid base64 frame")?;
    let image = image::load_from_memory(&bytes).context("undecodable frame image")?;
    Ok(image.to_rgb8())
}

/// 届いたフレームを描画する。映像は非同期、オーバーレイは即時
///
/// 2枚の面以外にフレーム間の状態は持たない
/// デコードは完了順に反映するため、遅れた古い画像が新しい画像を上書きすることがある
pub struct FrameRenderer<O: Surface = PixelBuffer> {
    video: Rc<RefCell<PixelBuffer>>,
    overlay: O,
    style: OverlayStyle,
    last_overlay: OverlayStats,
}

impl FrameRenderer<PixelBuffer> {
    pub fn new(width: usize, height: usize, style: OverlayStyle) -> Self {
        Self::with_overlay(PixelBuffer::new(width, height), PixelBuffer::new(width, height), style)
    }
}

impl<O: Surface> FrameRenderer<O> {
    pub fn with_overlay(video: PixelBuffer, overlay: O, style: OverlayStyle) -> Self {
        Self {
            video: Rc::new(RefCell::new(video)),
            overlay,
            style,
            last_overlay: OverlayStats::default(),
        }
    }

    pub fn video(&self) -> Rc<RefCell<PixelBuffer>> {
        Rc::clone(&self.video)
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn last_overlay(&self) -> OverlayStats {
        self.last_overlay
    }

    pub fn draw_overlay(&mut self, landmarks: Option<&LandmarkFrame>) -> OverlayStats {
        self.last_overlay = draw_skeleton(&mut self.overlay, landmarks, self.style);
        self.last_overlay
    }

    /// ブロッキングプールでデコードし、映像面に引き伸ばす
    /// `LocalSet` 内で呼ぶこと
    pub fn spawn_video_draw(&self, encoded: String) {
        let video = Rc::clone(&self.video);
        tokio::task::spawn_local(async move {
            let decoded = tokio::task::spawn_blocking(move || decode_frame_image(&encoded)).await;
            match decoded {
                Ok(Ok(image)) => video.borrow_mut().draw_image_stretched(&image),
                Ok(Err(e)) => warn!("[render] frame decode failed: {e:#}"),
                Err(e) => warn!("[render] decode task failed: {e}"),
            }
        });
    }
}

impl<O: Surface> FrameSubscriber for FrameRenderer<O> {
    fn on_frame(&mut self, frame: &StreamFrame) {
        if let Some(encoded) = &frame.frame {
            self.spawn_video_draw(encoded.clone());
        }
        let stats = self.draw_overlay(frame.landmarks.as_ref());
        debug!(lines = stats.lines, markers = stats.markers, "[render] overlay");
    }
}
