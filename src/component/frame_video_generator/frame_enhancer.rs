//! 影格對比強化
//!
//! 轉到 Lab 色彩空間，只對亮度通道做限制對比自適應直方圖均衡（CLAHE），
//! 再轉回 RGB。每張影格獨立處理，沒有跨影格狀態。

use image::RgbImage;
use std::sync::OnceLock;

pub const DEFAULT_CLIP_LIMIT: f32 = 3.0;
pub const DEFAULT_TILE_GRID: (u32, u32) = (8, 8);

const BINS: usize = 256;

// D65 白點
const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const LAB_EPSILON: f32 = 0.008_856;
const LAB_KAPPA: f32 = 903.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEnhancer {
    clip_limit: f32,
    tiles_x: usize,
    tiles_y: usize,
}

impl Default for FrameEnhancer {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_LIMIT, DEFAULT_TILE_GRID)
    }
}

impl FrameEnhancer {
    /// `clip_limit <= 0` 表示不限制（一般的自適應直方圖均衡）
    #[must_use]
    pub fn new(clip_limit: f32, tile_grid: (u32, u32)) -> Self {
        Self {
            clip_limit,
            tiles_x: tile_grid.0.max(1) as usize,
            tiles_y: tile_grid.1.max(1) as usize,
        }
    }

    #[must_use]
    pub fn enhance(&self, frame: &RgbImage) -> RgbImage {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return frame.clone();
        }

        let pixel_count = width as usize * height as usize;
        let mut luminance = Vec::with_capacity(pixel_count);
        let mut chroma = Vec::with_capacity(pixel_count);
        for pixel in frame.pixels() {
            let [l, a, b] = rgb_to_lab(pixel.0);
            luminance.push(l);
            chroma.push([a, b]);
        }

        let equalized = self.equalize(&luminance, width as usize, height as usize);

        let mut output = RgbImage::new(width, height);
        for ((pixel, l), [a, b]) in output.pixels_mut().zip(equalized).zip(chroma) {
            pixel.0 = lab_to_rgb([l, a, b]);
        }
        output
    }

    fn equalize(&self, plane: &[u8], width: usize, height: usize) -> Vec<u8> {
        // 影像尺寸不能整除時，區塊延伸到影像外並以鏡射取樣
        let tile_w = width.div_ceil(self.tiles_x);
        let tile_h = height.div_ceil(self.tiles_y);
        let tile_area = tile_w * tile_h;

        let clip = if self.clip_limit > 0.0 {
            ((self.clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
        } else {
            usize::MAX
        };
        let lut_scale = 255.0 / tile_area as f32;

        let mut luts = vec![[0u8; BINS]; self.tiles_x * self.tiles_y];
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let mut hist = [0usize; BINS];
                for y in ty * tile_h..(ty + 1) * tile_h {
                    let row = reflect_101(y, height) * width;
                    for x in tx * tile_w..(tx + 1) * tile_w {
                        hist[plane[row + reflect_101(x, width)] as usize] += 1;
                    }
                }
                clip_histogram(&mut hist, clip);

                let lut = &mut luts[ty * self.tiles_x + tx];
                let mut sum = 0usize;
                for (value, count) in lut.iter_mut().zip(hist) {
                    sum += count;
                    *value = (sum as f32 * lut_scale).round().min(255.0) as u8;
                }
            }
        }

        let columns: Vec<_> = (0..width)
            .map(|x| interpolation_weights(x, tile_w, self.tiles_x))
            .collect();

        let mut output = vec![0u8; plane.len()];
        for y in 0..height {
            let (ty1, ty2, ya) = interpolation_weights(y, tile_h, self.tiles_y);
            let top = &luts[ty1 * self.tiles_x..(ty1 + 1) * self.tiles_x];
            let bottom = &luts[ty2 * self.tiles_x..(ty2 + 1) * self.tiles_x];

            for (x, &(tx1, tx2, xa)) in columns.iter().enumerate() {
                let value = plane[y * width + x] as usize;
                let upper = f32::from(top[tx1][value]) * (1.0 - xa) + f32::from(top[tx2][value]) * xa;
                let lower =
                    f32::from(bottom[tx1][value]) * (1.0 - xa) + f32::from(bottom[tx2][value]) * xa;
                output[y * width + x] = (upper * (1.0 - ya) + lower * ya).round().clamp(0.0, 255.0) as u8;
            }
        }
        output
    }
}

/// 超出上限的計數平均分給所有欄位，餘數以固定間隔補上
fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut excess = 0;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS;
    let residual = excess % BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        for count in hist.iter_mut().step_by(step).take(residual) {
            *count += 1;
        }
    }
}

/// 相鄰兩個區塊的索引與第二個區塊的權重
fn interpolation_weights(position: usize, tile_size: usize, tiles: usize) -> (usize, usize, f32) {
    let scaled = position as f32 / tile_size as f32 - 0.5;
    let first = scaled.floor();
    let weight = scaled - first;
    let first = first as isize;
    let second = (first + 1).min(tiles as isize - 1);
    (first.max(0) as usize, second.max(0) as usize, weight)
}

/// 以不重複邊緣像素的方式鏡射（gfedcb|abcdefgh|gfedcba）
fn reflect_101(index: usize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let folded = index % period;
    if folded < len { folded } else { period - folded }
}

fn srgb_to_linear_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 256];
        for (i, value) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *value = if c <= 0.040_45 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let encoded = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inverse(f: f32) -> f32 {
    let cubed = f * f * f;
    if cubed > LAB_EPSILON {
        cubed
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

/// 未量化的 Lab：L 為 0..=100
fn rgb_to_lab_f32([r, g, b]: [u8; 3]) -> [f32; 3] {
    let table = srgb_to_linear_table();
    let (r, g, b) = (table[r as usize], table[g as usize], table[b as usize]);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        LAB_KAPPA * y
    };

    [l, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_f32_to_rgb([l, a, b]: [f32; 3]) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let y = if l > LAB_KAPPA * LAB_EPSILON {
        fy * fy * fy
    } else {
        l / LAB_KAPPA
    };
    let x = lab_f_inverse(fy + a / 500.0) * WHITE_X;
    let z = lab_f_inverse(fy - b / 200.0) * WHITE_Z;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
    let b = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(b)]
}

/// 8 位元 Lab：L 縮放到 0..=255，a、b 平移 128
fn rgb_to_lab(rgb: [u8; 3]) -> [u8; 3] {
    let [l, a, b] = rgb_to_lab_f32(rgb);
    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        (a + 128.0).round().clamp(0.0, 255.0) as u8,
        (b + 128.0).round().clamp(0.0, 255.0) as u8,
    ]
}

fn lab_to_rgb([l, a, b]: [u8; 3]) -> [u8; 3] {
    lab_f32_to_rgb([
        f32::from(l) * 100.0 / 255.0,
        f32::from(a) - 128.0,
        f32::from(b) - 128.0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gray_gradient(width: u32, height: u32, low: u8, high: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let span = f32::from(high - low);
            let v = low + (x as f32 / (width - 1) as f32 * span).round() as u8;
            Rgb([v, v, v])
        })
    }

    fn channel_range(image: &RgbImage) -> u8 {
        let values: Vec<u8> = image.pixels().map(|p| p.0[0]).collect();
        values.iter().max().unwrap() - values.iter().min().unwrap()
    }

    #[test]
    fn test_keeps_dimensions() {
        let frame = RgbImage::from_fn(37, 21, |x, y| Rgb([(x * 5) as u8, (y * 9) as u8, 77]));
        let enhanced = FrameEnhancer::default().enhance(&frame);
        assert_eq!(enhanced.dimensions(), (37, 21));
    }

    #[test]
    fn test_is_deterministic() {
        let frame = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, (y * 4) as u8, ((x + y) * 2) as u8]));
        let enhancer = FrameEnhancer::default();
        assert_eq!(enhancer.enhance(&frame), enhancer.enhance(&frame));
    }

    #[test]
    fn test_uniform_frame_stays_uniform() {
        let frame = RgbImage::from_pixel(40, 30, Rgb([90, 90, 90]));
        let enhanced = FrameEnhancer::default().enhance(&frame);
        let first = *enhanced.get_pixel(0, 0);
        assert!(enhanced.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_gray_input_stays_gray() {
        let frame = gray_gradient(128, 64, 20, 230);
        let enhanced = FrameEnhancer::default().enhance(&frame);
        for p in enhanced.pixels() {
            let [r, g, b] = p.0;
            assert!(r.abs_diff(g) <= 2 && g.abs_diff(b) <= 2, "{:?}", p.0);
        }
    }

    #[test]
    fn test_low_contrast_is_stretched() {
        let frame = gray_gradient(256, 256, 100, 140);
        let enhanced = FrameEnhancer::default().enhance(&frame);
        assert!(channel_range(&enhanced) > channel_range(&frame));
    }

    #[test]
    fn test_tiny_frame_smaller_than_grid() {
        let frame = RgbImage::from_pixel(3, 2, Rgb([10, 200, 30]));
        let enhanced = FrameEnhancer::default().enhance(&frame);
        assert_eq!(enhanced.dimensions(), (3, 2));
    }

    #[test]
    fn test_clip_histogram_preserves_total() {
        let mut hist = [0usize; BINS];
        hist[10] = 1000;
        hist[200] = 37;
        clip_histogram(&mut hist, 12);
        assert_eq!(hist.iter().sum::<usize>(), 1037);
        assert!(hist.iter().all(|&c| c <= 12 + 1037 / BINS + 1));
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(7, 1), 0);
    }

    #[test]
    fn test_lab_conversion_is_inverse_before_quantization() {
        // 8 位元量化在暗且飽和的顏色誤差較大，這裡只驗證轉換公式本身
        for r in (0..=255u8).step_by(17) {
            for g in (0..=255u8).step_by(17) {
                for b in (0..=255u8).step_by(17) {
                    let rgb = [r, g, b];
                    let back = lab_f32_to_rgb(rgb_to_lab_f32(rgb));
                    for (original, converted) in rgb.iter().zip(back) {
                        assert!(original.abs_diff(converted) <= 1, "{rgb:?} -> {back:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_lab_quantization_ranges() {
        assert_eq!(rgb_to_lab([0, 0, 0])[0], 0);
        assert_eq!(rgb_to_lab([255, 255, 255])[0], 255);
        let [_, a, b] = rgb_to_lab([128, 128, 128]);
        assert!(a.abs_diff(128) <= 1 && b.abs_diff(128) <= 1);
    }
}
