//! Raster cleanup applied to rendered pages before OCR.
//!
//! Pipeline: grayscale, median denoise, tiled contrast equalization,
//! adaptive binarization, despeckle, then deskew.
//! Quarter-turn orientation is corrected separately since it needs the
//! OCR engine's orientation detection.

use image::{imageops, DynamicImage, GrayImage, Luma};

/// Radius of the median filter window (3x3).
const MEDIAN_RADIUS: u32 = 1;

/// Contrast equalization tile grid (per axis).
const CLAHE_TILES: u32 = 8;

/// Histogram clip limit, as a multiple of the mean bin height.
const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Half-width of the adaptive threshold neighborhood.
const THRESHOLD_RADIUS: u32 = 15;

/// Offset subtracted from the local mean before thresholding.
const THRESHOLD_OFFSET: f32 = 10.0;

/// Below this angle, deskew is skipped.
const MIN_SKEW_DEG: f32 = 0.5;

/// Widest tilt the deskew sweep considers.
const MAX_SKEW_DEG: f32 = 5.0;

/// Pages with less ink than this fraction are not deskewed.
const MIN_INK_RATIO: f32 = 0.02;

/// Only every n-th column of ink feeds the skew projection.
const INK_SAMPLE_STEP: u32 = 2;

const INK_THRESHOLD: u8 = 128;

const WHITE: Luma<u8> = Luma([255u8]);
const INK: Luma<u8> = Luma([0u8]);

/// Full cleanup for one rendered page.
pub fn prepare_for_ocr(page: &DynamicImage) -> GrayImage {
    let gray = page.to_luma8();
    let denoised = median_filter(&gray, MEDIAN_RADIUS);
    let equalized = equalize_tiled(&denoised, CLAHE_TILES, CLAHE_CLIP_LIMIT);
    let binary = adaptive_threshold(&equalized, THRESHOLD_RADIUS, THRESHOLD_OFFSET);
    let clean = despeckle(&binary);

    match detect_skew_angle(&clean) {
        Some(angle) => {
            tracing::debug!(angle, "Deskewing page");
            rotate_about_center(&clean, angle)
        }
        None => clean,
    }
}

/// Median filter over a `(2r+1)²` window, clamping at the borders.
pub fn median_filter(img: &GrayImage, radius: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || radius == 0 {
        return img.clone();
    }

    let mut out = GrayImage::new(w, h);
    let mut window = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
    for y in 0..h {
        for x in 0..w {
            window.clear();
            for ny in y.saturating_sub(radius)..(y + radius + 1).min(h) {
                for nx in x.saturating_sub(radius)..(x + radius + 1).min(w) {
                    window.push(img.get_pixel(nx, ny).0[0]);
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[window.len() / 2]]));
        }
    }
    out
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles × tiles` grid. Each tile gets a clipped
/// histogram and its own lookup table; pixels are mapped by bilinear
/// interpolation between the four nearest tile tables.
pub fn equalize_tiled(img: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let tiles = tiles.max(1);
    if w < tiles || h < tiles {
        return img.clone();
    }

    let tile_w = w.div_ceil(tiles);
    let tile_h = h.div_ceil(tiles);

    let mut luts = vec![[0u8; 256]; (tiles * tiles) as usize];
    for ty in 0..tiles {
        for tx in 0..tiles {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x1.saturating_sub(x0)) * (y1.saturating_sub(y0));
            luts[(ty * tiles + tx) as usize] = clipped_equalization(&mut hist, area, clip_limit);
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        // Position relative to tile centers.
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = fy.floor().clamp(0.0, (tiles - 1) as f32) as u32;
        let ty1 = (ty0 + 1).min(tiles - 1);
        let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

        for x in 0..w {
            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = fx.floor().clamp(0.0, (tiles - 1) as f32) as u32;
            let tx1 = (tx0 + 1).min(tiles - 1);
            let wx = (fx - tx0 as f32).clamp(0.0, 1.0);

            let v = img.get_pixel(x, y).0[0] as usize;
            let at = |tx: u32, ty: u32| luts[(ty * tiles + tx) as usize][v] as f32;

            let top = at(tx0, ty0) * (1.0 - wx) + at(tx1, ty0) * wx;
            let bottom = at(tx0, ty1) * (1.0 - wx) + at(tx1, ty1) * wx;
            let mapped = top * (1.0 - wy) + bottom * wy;
            out.put_pixel(x, y, Luma([mapped.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Clip a histogram, spread the excess evenly, and return the CDF lookup table.
fn clipped_equalization(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * area as f32 / 256.0).ceil() as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let bonus = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += bonus + u32::from(i < remainder);
    }

    let mut cumulative = 0u32;
    for (i, slot) in lut.iter_mut().enumerate() {
        cumulative += hist[i];
        *slot = ((cumulative as f32 * 255.0) / area as f32).round().min(255.0) as u8;
    }
    lut
}

/// Binarize against the local mean: a pixel is white when brighter than
/// `mean - offset` of its `(2r+1)²` neighborhood, black otherwise.
pub fn adaptive_threshold(img: &GrayImage, radius: u32, offset: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }

    // Summed-area table with a zero row and column.
    let stride = (w + 1) as usize;
    let mut integral = vec![0u64; stride * (h + 1) as usize];
    for y in 0..h as usize {
        let mut row_sum = 0u64;
        for x in 0..w as usize {
            row_sum += img.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let y0 = y.saturating_sub(radius) as usize;
        let y1 = (y + radius + 1).min(h) as usize;
        for x in 0..w {
            let x0 = x.saturating_sub(radius) as usize;
            let x1 = (x + radius + 1).min(w) as usize;
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as f32;
            let mean = sum as f32 / count;
            let v = img.get_pixel(x, y).0[0] as f32;
            let px = if v > mean - offset { 255 } else { 0 };
            out.put_pixel(x, y, Luma([px]));
        }
    }
    out
}

/// Flip isolated pixels on a binary page: a dark speck with no dark
/// neighbor turns white and a pinhole with no white neighbor turns dark.
/// One-pixel strokes keep their neighbors, so glyphs survive.
pub fn despeckle(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    for y in 0..h {
        for x in 0..w {
            let own = is_ink(img.get_pixel(x, y).0[0]);
            let mut has_neighbors = false;
            let mut same = false;
            for ny in y.saturating_sub(1)..(y + 2).min(h) {
                for nx in x.saturating_sub(1)..(x + 2).min(w) {
                    if (nx, ny) == (x, y) {
                        continue;
                    }
                    has_neighbors = true;
                    same |= is_ink(img.get_pixel(nx, ny).0[0]) == own;
                }
            }
            if has_neighbors && !same {
                out.put_pixel(x, y, if own { WHITE } else { INK });
            }
        }
    }
    out
}

fn is_ink(v: u8) -> bool {
    v < INK_THRESHOLD
}

/// Text-line tilt in degrees, within ±5. Positive means lines descend to
/// the right; `rotate_about_center` with the same angle levels them.
///
/// Ink pixels are projected onto the normal of each candidate baseline and
/// the angle concentrating them into the fewest bins wins. A whole-degree
/// pass picks the neighborhood, a tenth-degree pass refines it. `None` for
/// tiny or near-blank pages (under 2% ink) and for tilts too small to correct.
pub fn detect_skew_angle(img: &GrayImage) -> Option<f32> {
    let (w, h) = img.dimensions();
    if w < 50 || h < 50 {
        return None;
    }

    let mut ink_total = 0usize;
    let mut sampled = Vec::new();
    for (x, y, p) in img.enumerate_pixels() {
        if is_ink(p.0[0]) {
            ink_total += 1;
            if x % INK_SAMPLE_STEP == 0 {
                sampled.push((x as f32, y as f32));
            }
        }
    }
    if (ink_total as f32) < MIN_INK_RATIO * (w as f32 * h as f32) {
        return None;
    }

    let bins = (h + 2 * w) as usize;
    let sharpest = |candidates: &mut dyn Iterator<Item = f32>| {
        candidates
            .map(|angle| (angle, baseline_concentration(&sampled, w, bins, angle)))
            .fold((0.0f32, 0u64), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0
    };

    let coarse = sharpest(&mut (-5..=5).map(|d| d as f32));
    let fine = sharpest(
        &mut (-9..=9)
            .map(|t| coarse + t as f32 / 10.0)
            .filter(|a| a.abs() <= MAX_SKEW_DEG),
    );

    if fine.abs() < MIN_SKEW_DEG {
        None
    } else {
        Some(fine)
    }
}

/// Sum of squared bin counts after projecting each point onto the normal of
/// a baseline tilted by `angle_deg`. Peaks when text lines fall in few bins.
fn baseline_concentration(
    points: &[(f32, f32)],
    width: u32,
    bins: usize,
    angle_deg: f32,
) -> u64 {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let offset = width as f32;
    let mut counts = vec![0u64; bins];
    for &(x, y) in points {
        let r = y * cos - x * sin + offset;
        if r >= 0.0 {
            if let Some(bin) = counts.get_mut(r as usize) {
                *bin += 1;
            }
        }
    }
    counts.iter().map(|c| c * c).sum()
}

/// Rotate by `degrees` (counter-clockwise positive) around the image center,
/// keeping the canvas size. Uncovered pixels become white.
pub fn rotate_about_center(img: &GrayImage, degrees: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::from_pixel(w, h, WHITE);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;

    for y in 0..h {
        for x in 0..w {
            // Inverse mapping: find the source pixel for each destination.
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let sx = cos * dx - sin * dy + cx;
            let sy = sin * dx + cos * dy + cy;
            if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
                out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

/// Apply a clockwise quarter-turn correction reported by orientation detection.
/// Values other than 90, 180 and 270 leave the image unchanged.
pub fn rotate_quarter(img: &GrayImage, clockwise_degrees: u32) -> GrayImage {
    match clockwise_degrees {
        90 => imageops::rotate90(img),
        180 => imageops::rotate180(img),
        270 => imageops::rotate270(img),
        _ => img.clone(),
    }
}
