use anyhow::Result;
use minifb::{Key, Window, WindowOptions};

use crate::render::surface::{PixelBuffer, Surface};

/// 映像にオーバーレイを重ねて表示するデスクトップウィンドウ
pub struct MinifbRenderer {
    window: Window,
    composed: PixelBuffer,
}

impl MinifbRenderer {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            composed: PixelBuffer::new(width, height),
        })
    }

    /// ウィンドウが閉じられたか Escape が押されたら false
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// 2層を合成してウィンドウに送る。イベント処理も兼ねるので毎 tick 呼ぶこと
    pub fn present(&mut self, video: &PixelBuffer, overlay: &PixelBuffer) -> Result<()> {
        self.composed.clone_from(video);
        self.composed.compose(overlay);
        let (w, h) = (self.composed.width(), self.composed.height());
        self.window.update_with_buffer(self.composed.pixels(), w, h)?;
        Ok(())
    }
}
