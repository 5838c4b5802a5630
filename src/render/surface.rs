use image::RgbImage;

/// 図形を描画できる面
pub trait Surface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// 全面を透明にする
    fn clear(&mut self);

    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), width: i32, color: u32);

    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32);
}

/// 何も描かれていないピクセルの値
pub const TRANSPARENT: u32 = 0xFF00_0000;

/// ソフトウェア描画用の 0RGB ピクセルバッファ
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height],
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// `image` をバッファ全体に引き伸ばす（最近傍）。アスペクト比は保たない
    pub fn draw_image_stretched(&mut self, image: &RgbImage) {
        let (src_w, src_h) = (image.width() as usize, image.height() as usize);
        if src_w == 0 || src_h == 0 {
            return;
        }
        for y in 0..self.height {
            let sy = y * src_h / self.height;
            for x in 0..self.width {
                let sx = x * src_w / self.width;
                let [r, g, b] = image.get_pixel(sx as u32, sy as u32).0;
                self.pixels[y * self.width + x] = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            }
        }
    }

    /// `top` の描画済みピクセルを上に重ねる
    pub fn compose(&mut self, top: &PixelBuffer) {
        for (dst, &src) in self.pixels.iter_mut().zip(top.pixels.iter()) {
            if src != TRANSPARENT {
                *dst = src;
            }
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let p = self.pixels[y as usize * self.width + x as usize];
            if p == TRANSPARENT {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([(p >> 16) as u8, (p >> 8) as u8, p as u8])
            }
        })
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    fn stamp(&mut self, x: i32, y: i32, width: i32, color: u32) {
        if width <= 1 {
            self.set_pixel(x, y, color);
            return;
        }
        let half = width / 2;
        for dy in -half..=half {
            for dx in -half..=half {
                self.set_pixel(x + dx, y + dy, color);
            }
        }
    }
}

impl Surface for PixelBuffer {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(TRANSPARENT);
    }

    /// 描画範囲に切り詰めてから Bresenham で線を描画
    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), width: i32, color: u32) {
        let margin = (width.max(1) / 2) as f64;
        let min = (-margin, -margin);
        let max = (self.width as f64 - 1.0 + margin, self.height as f64 - 1.0 + margin);
        let Some(((x0, y0), (x1, y1))) = clip_segment(from, to, min, max) else {
            return;
        };

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.stamp(x, y, width, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 塗りつぶし円。キャンバスと重なる範囲だけを走査する
    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (cx, cy) = (center.0 as i64, center.1 as i64);
        let r = radius.max(0) as i64;
        let (x_lo, x_hi) = ((cx - r).max(0), (cx + r).min(self.width as i64 - 1));
        let (y_lo, y_hi) = ((cy - r).max(0), (cy + r).min(self.height as i64 - 1));
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= r * r {
                    self.pixels[y as usize * self.width + x as usize] = color;
                }
            }
        }
    }
}

const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BELOW: u8 = 4;
const ABOVE: u8 = 8;

fn outcode(x: f64, y: f64, min: (f64, f64), max: (f64, f64)) -> u8 {
    let mut code = INSIDE;
    if x < min.0 {
        code |= LEFT;
    } else if x > max.0 {
        code |= RIGHT;
    }
    if y < min.1 {
        code |= BELOW;
    } else if y > max.1 {
        code |= ABOVE;
    }
    code
}

/// Cohen–Sutherland による線分クリッピング。矩形と交わらなければ `None`。
fn clip_segment(
    from: (i32, i32),
    to: (i32, i32),
    min: (f64, f64),
    max: (f64, f64),
) -> Option<((i32, i32), (i32, i32))> {
    let (mut x0, mut y0) = (from.0 as f64, from.1 as f64);
    let (mut x1, mut y1) = (to.0 as f64, to.1 as f64);
    loop {
        let c0 = outcode(x0, y0, min, max);
        let c1 = outcode(x1, y1, min, max);
        if c0 | c1 == INSIDE {
            let p0 = (x0.round() as i32, y0.round() as i32);
            let p1 = (x1.round() as i32, y1.round() as i32);
            return Some((p0, p1));
        }
        if c0 & c1 != INSIDE {
            return None;
        }
        let c = if c0 != INSIDE { c0 } else { c1 };
        let (x, y) = if c & ABOVE != 0 {
            (x0 + (x1 - x0) * (max.1 - y0) / (y1 - y0), max.1)
        } else if c & BELOW != 0 {
            (x0 + (x1 - x0) * (min.1 - y0) / (y1 - y0), min.1)
        } else if c & RIGHT != 0 {
            (max.0, y0 + (y1 - y0) * (max.0 - x0) / (x1 - x0))
        } else {
            (min.0, y0 + (y1 - y0) * (min.0 - x0) / (x1 - x0))
        };
        if c == c0 {
            x0 = x;
            y0 = y;
        } else {
            x1 = x;
            y1 = y;
        }
    }
}
