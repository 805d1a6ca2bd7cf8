//! Face alignment via 4-DOF similarity transform.
//!
//! Warps a detected face to a canonical 160×160 RGB crop using the five
//! reference landmarks and least-squares estimation, so that the eye line
//! is horizontal and the inter-eye distance is fixed across all crops.

use crate::types::{AlignedFace, ALIGNED_CHANNELS, ALIGNED_SIZE};

/// Reference landmark positions on the 160×160 canvas
/// [left_eye, right_eye, nose, left_mouth, right_mouth].
const REFERENCE_LANDMARKS_160: [(f32, f32); 5] = [
    (54.7066, 73.8519),
    (105.0454, 73.5734),
    (80.0360, 102.4809),
    (59.3561, 131.9507),
    (101.0427, 131.7201),
];

/// Estimate a 2×3 similarity transform (4-DOF: scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Overdetermined system A * [a, b, tx, ty]^T = B.
    // Each point pair (sx, sy) -> (dx, dy) contributes two rows:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16]; // 4x4, row-major
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];

        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb);
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);

    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    // Augmented matrix [A | b] as 4x5
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..4 {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0]; // degenerate landmarks: identity-ish
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    x
}

/// Apply a 2×3 similarity warp to an interleaved RGB frame, producing a
/// square RGB output of side `out_size`.
///
/// Uses bilinear interpolation per channel. Out-of-bounds pixels are black.
fn warp_affine_rgb(
    frame: &[u8],
    src_width: usize,
    src_height: usize,
    matrix: &[f32; 6],
    out_size: usize,
) -> Vec<u8> {
    let (a, _neg_b, tx) = (matrix[0], matrix[1], matrix[2]);
    let (b, _a2, ty) = (matrix[3], matrix[4], matrix[5]);

    // Invert the 2x2 part: M = [[a, -b], [b, a]], det = a^2 + b^2
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return vec![0u8; out_size * out_size * ALIGNED_CHANNELS];
    }
    let inv_det = 1.0 / det;
    let ia = a * inv_det;
    let ib = b * inv_det;

    let mut output = vec![0u8; out_size * out_size * ALIGNED_CHANNELS];

    for oy in 0..out_size {
        for ox in 0..out_size {
            // Map output pixel back to source: src = M_inv * (dst - t)
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let x1 = x0 + 1;
            let y1 = y0 + 1;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let sample = |x: i32, y: i32, c: usize| -> f32 {
                if x >= 0 && x < src_width as i32 && y >= 0 && y < src_height as i32 {
                    frame[(y as usize * src_width + x as usize) * ALIGNED_CHANNELS + c] as f32
                } else {
                    0.0
                }
            };

            for c in 0..ALIGNED_CHANNELS {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y1, c) * (1.0 - fx) * fy
                    + sample(x1, y1, c) * fx * fy;

                output[(oy * out_size + ox) * ALIGNED_CHANNELS + c] =
                    val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

/// Align a detected face to the canonical 160×160 RGB crop.
///
/// Takes the full-color frame (interleaved RGB) and five detected facial
/// landmarks in frame coordinates, computes the similarity transform to the
/// reference positions, and warps the face region into a crop suitable for
/// embedding extraction. Detection runs on luminance, but alignment keeps
/// the color planes intact.
pub fn align_face(
    frame: &[u8],
    width: u32,
    height: u32,
    landmarks: &[(f32, f32); 5],
) -> AlignedFace {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_160);
    let pixels = warp_affine_rgb(frame, width as usize, height as usize, &matrix, ALIGNED_SIZE);
    AlignedFace::new(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        // When src == dst, transform should be identity-like (a≈1, b≈0)
        let pts = REFERENCE_LANDMARKS_160;
        let m = estimate_similarity_transform(&pts, &pts);

        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!(m[3].abs() < 1e-4, "b = {}", m[3]);
        assert!((m[4] - 1.0).abs() < 1e-4, "a2 = {}", m[4]);
        assert!(m[5].abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn test_scaled_transform() {
        // Source landmarks at 2x scale → transform should have a ≈ 0.5
        let src: [(f32, f32); 5] = [
            (109.4132, 147.7038),
            (210.0908, 147.1468),
            (160.0720, 204.9618),
            (118.7122, 263.9014),
            (202.0854, 263.4402),
        ];
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_160);

        assert!((m[0] - 0.5).abs() < 0.05, "a = {}, expected ~0.5", m[0]);
    }

    #[test]
    fn test_warp_output_size() {
        let frame = vec![128u8; 640 * 480 * 3];
        let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0]; // identity
        let out = warp_affine_rgb(&frame, 640, 480, &m, ALIGNED_SIZE);
        assert_eq!(out.len(), ALIGNED_SIZE * ALIGNED_SIZE * 3);
    }

    #[test]
    fn test_align_face_output_size() {
        let frame = vec![128u8; 640 * 480 * 3];
        let landmarks = REFERENCE_LANDMARKS_160;
        let aligned = align_face(&frame, 640, 480, &landmarks);
        assert_eq!(aligned.pixels.len(), ALIGNED_SIZE * ALIGNED_SIZE * 3);
    }

    #[test]
    fn test_warp_preserves_channels() {
        // A pure-red frame stays pure red under an identity warp inside bounds.
        let w = 200usize;
        let h = 200usize;
        let mut frame = vec![0u8; w * h * 3];
        for px in frame.chunks_exact_mut(3) {
            px[0] = 200;
        }
        let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let out = warp_affine_rgb(&frame, w, h, &m, ALIGNED_SIZE);
        for px in out.chunks_exact(3) {
            assert_eq!(px[0], 200);
            assert_eq!(px[1], 0);
            assert_eq!(px[2], 0);
        }
    }

    #[test]
    fn test_landmark_roundtrip() {
        // Place a bright patch at a landmark position, verify it lands near
        // the reference position after alignment.
        let w = 300usize;
        let h = 300usize;
        let mut frame = vec![0u8; w * h * 3];

        let src_landmarks: [(f32, f32); 5] = [
            (110.0, 90.0),
            (170.0, 90.0),
            (140.0, 125.0),
            (118.0, 160.0),
            (162.0, 160.0),
        ];

        // Paint a 5x5 bright patch at the left eye (survives bilinear interpolation)
        let lx = src_landmarks[0].0 as usize;
        let ly = src_landmarks[0].1 as usize;
        for dy in 0..5 {
            for dx in 0..5 {
                let px = lx.wrapping_sub(2) + dx;
                let py = ly.wrapping_sub(2) + dy;
                if px < w && py < h {
                    let off = (py * w + px) * 3;
                    frame[off] = 255;
                    frame[off + 1] = 255;
                    frame[off + 2] = 255;
                }
            }
        }

        let aligned = align_face(&frame, w as u32, h as u32, &src_landmarks);

        let ref_x = REFERENCE_LANDMARKS_160[0].0.round() as usize;
        let ref_y = REFERENCE_LANDMARKS_160[0].1.round() as usize;

        let mut max_val = 0u8;
        for dy in 0..3 {
            for dx in 0..3 {
                let x = ref_x.wrapping_sub(1) + dx;
                let y = ref_y.wrapping_sub(1) + dy;
                if x < ALIGNED_SIZE && y < ALIGNED_SIZE {
                    max_val = max_val.max(aligned.pixels[(y * ALIGNED_SIZE + x) * 3]);
                }
            }
        }
        assert!(
            max_val > 100,
            "Expected bright patch near reference left eye ({ref_x}, {ref_y}), max={max_val}"
        );
    }

    #[test]
    fn test_eye_line_horizontal() {
        // The reference eye positions must sit on a (nearly) horizontal line.
        let dy = REFERENCE_LANDMARKS_160[0].1 - REFERENCE_LANDMARKS_160[1].1;
        assert!(dy.abs() < 0.5, "eye line not horizontal: dy = {dy}");
    }
}
