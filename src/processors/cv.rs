//! 8-bit grayscale operations with OpenCV semantics.
//!
//! The classifier was trained on images prepared with `cv2.equalizeHist`,
//! `cv2.GaussianBlur(ksize, 0)` and `cv2.resize(INTER_LINEAR)`. These helpers
//! reproduce their arithmetic: the equalization LUT is anchored at the first
//! occupied bin, blurring uses OpenCV's kernel table with reflect-101 borders,
//! and resizing samples bilinearly at half-pixel centers without smoothing.

use image::GrayImage;

/// Histogram equalization as done by `cv2.equalizeHist`.
///
/// The darkest occupied level maps to 0 and the brightest to 255. A
/// single-level image is returned unchanged.
pub fn equalize_hist(gray: &GrayImage) -> GrayImage {
    let hist = &imageproc::stats::histogram(gray).channels[0];
    let total: u64 = hist.iter().map(|&n| n as u64).sum();
    let Some(first) = hist.iter().position(|&n| n > 0) else {
        return gray.clone();
    };
    let first_count = hist[first] as u64;
    if first_count == total {
        return gray.clone();
    }

    let scale = 255.0f32 / (total - first_count) as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for level in first + 1..256 {
        cumulative += hist[level] as u64;
        lut[level] = (cumulative as f32 * scale).round_ties_even().clamp(0.0, 255.0) as u8;
    }

    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
    out
}

/// Gaussian kernel of odd size `ksize` for sigma 0, as `cv2.getGaussianKernel`
/// builds it.
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    match ksize {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => {
            let sigma = 0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8;
            let center = (ksize / 2) as f64;
            let weights: Vec<f64> = (0..ksize)
                .map(|i| {
                    let x = i as f64 - center;
                    (-(x * x) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f64 = weights.iter().sum();
            weights.into_iter().map(|w| (w / sum) as f32).collect()
        }
    }
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = i.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Separable blur with `kernel` in both directions and reflect-101 borders.
///
/// The horizontal pass is kept in floating point and only the final value is
/// rounded, which matches OpenCV's exact fixed-point path for the small
/// kernels.
pub fn gaussian_blur(gray: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let radius = (kernel.len() / 2) as isize;
    let src = gray.as_raw();

    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    weight * row[sx] as f32
                })
                .sum();
        }
    }

    let mut out = GrayImage::new(gray.width(), gray.height());
    for y in 0..h {
        for x in 0..w {
            let v: f32 = kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    weight * horizontal[sy * w + x]
                })
                .sum();
            out.put_pixel(x as u32, y as u32, image::Luma([round_u8(v)]));
        }
    }
    out
}

fn round_u8(v: f32) -> u8 {
    (v + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// Source coordinate and weight of the right neighbour for each destination
/// index, following `cv2.resize` with `INTER_LINEAR`.
fn linear_taps(src_len: u32, dst_len: u32) -> Vec<(usize, f32)> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let f = (d as f64 + 0.5) * scale - 0.5;
            let mut s = f.floor();
            let mut frac = f - s;
            if s < 0.0 {
                s = 0.0;
                frac = 0.0;
            }
            if s >= (src_len - 1) as f64 {
                s = (src_len - 1) as f64;
                frac = 0.0;
            }
            (s as usize, frac as f32)
        })
        .collect()
}

/// Bilinear resize with half-pixel centers and replicated borders, without
/// the area smoothing applied by `image`'s filters when shrinking.
pub fn resize_linear(gray: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = gray.dimensions();
    let xs = linear_taps(src_w, width);
    let ys = linear_taps(src_h, height);
    let last_x = src_w as usize - 1;
    let last_y = src_h as usize - 1;
    let at = |x: usize, y: usize| gray.get_pixel(x as u32, y as u32)[0] as f32;

    let mut out = GrayImage::new(width, height);
    for (dy, &(sy, fy)) in ys.iter().enumerate() {
        let sy1 = (sy + 1).min(last_y);
        for (dx, &(sx, fx)) in xs.iter().enumerate() {
            let sx1 = (sx + 1).min(last_x);
            let top = at(sx, sy) * (1.0 - fx) + at(sx1, sy) * fx;
            let bottom = at(sx, sy1) * (1.0 - fx) + at(sx1, sy1) * fx;
            let v = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(dx as u32, dy as u32, image::Luma([round_u8(v)]));
        }
    }
    out
}
