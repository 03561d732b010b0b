//! Quantization helpers for replicated state: positions ride in 60 of 64
//! bits, orientations in 32 via smallest-three.

use crate::math::{Quat, Vec3};

/// Positions are valid in [-256, +256) per axis at 1/1024 resolution.
const POSITION_BOUND: f32 = 256.0;
const POSITION_SCALE: f32 = 1024.0;
const POSITION_BITS: u32 = 20;

/// The largest magnitude a non-maximal unit quaternion component can have.
const ORIENTATION_BOUND: f32 = 0.707_107;
const ORIENTATION_SCALE: f32 = 1023.0;

fn quantize_axis(value: f32) -> u64 {
    let limit = (1u64 << POSITION_BITS) - 1;
    let clamped = value.max(-POSITION_BOUND).min(POSITION_BOUND);
    let scaled = ((clamped + POSITION_BOUND) * POSITION_SCALE).round() as u64;
    scaled.min(limit)
}

fn dequantize_axis(value: u64) -> f32 {
    value as f32 / POSITION_SCALE - POSITION_BOUND
}

/// Packs a position into 20 bits per axis.
pub fn compress_position(position: Vec3) -> u64 {
    let x = quantize_axis(position.x);
    let y = quantize_axis(position.y);
    let z = quantize_axis(position.z);
    (x << 40) | (y << 20) | z
}

pub fn decompress_position(compressed: u64) -> Vec3 {
    let mask = (1u64 << POSITION_BITS) - 1;
    Vec3::new(
        dequantize_axis((compressed >> 40) & mask),
        dequantize_axis((compressed >> 20) & mask),
        dequantize_axis(compressed & mask),
    )
}

/// Smallest-three quantization: 2 bits name the largest component, the
/// remaining three ride in 10 bits each.
pub fn compress_orientation(orientation: Quat) -> u32 {
    let q = orientation.normalize();
    let components = [q.x, q.y, q.z, q.w];

    let mut largest = 0;
    for i in 1..4 {
        if components[i].abs() > components[largest].abs() {
            largest = i;
        }
    }
    // q and -q are the same rotation; flip so the dropped component is
    // non-negative
    let sign = if components[largest] < 0.0 { -1.0 } else { 1.0 };

    let mut packed = largest as u32;
    let mut shift = 2;
    for (i, &component) in components.iter().enumerate() {
        if i == largest {
            continue;
        }
        let normalized = ((component * sign / ORIENTATION_BOUND).max(-1.0).min(1.0) + 1.0) * 0.5;
        let quantized = (normalized * ORIENTATION_SCALE).round() as u32;
        packed |= quantized << shift;
        shift += 10;
    }
    packed
}

pub fn decompress_orientation(compressed: u32) -> Quat {
    let largest = (compressed & 0x3) as usize;

    let mut components = [0.0f32; 4];
    let mut sum = 0.0f32;
    let mut shift = 2;
    for (i, component) in components.iter_mut().enumerate() {
        if i == largest {
            continue;
        }
        let quantized = (compressed >> shift) & 0x3FF;
        let value = (quantized as f32 / ORIENTATION_SCALE * 2.0 - 1.0) * ORIENTATION_BOUND;
        *component = value;
        sum += value * value;
        shift += 10;
    }
    components[largest] = (1.0 - sum).max(0.0).sqrt();

    Quat::new(components[0], components[1], components[2], components[3]).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, tolerance: f32) {
        assert!((a - b).abs() <= tolerance, "{} !~ {}", a, b);
    }

    #[test]
    fn test_compress_position() {
        let input = Vec3::new(10.0, 100.0, 200.5);
        let output = decompress_position(compress_position(input));
        assert_close(input.x, output.x, 0.001);
        assert_close(input.y, output.y, 0.001);
        assert_close(input.z, output.z, 0.001);
    }

    #[test]
    fn test_compress_position_negative() {
        let input = Vec3::new(-200.25, -0.125, 0.0);
        let output = decompress_position(compress_position(input));
        assert_close(input.x, output.x, 0.001);
        assert_close(input.y, output.y, 0.001);
        assert_close(input.z, output.z, 0.001);
    }

    #[test]
    fn test_compress_orientation_identity() {
        let input = Quat::new(0.0, 0.0, 0.0, 1.0);
        let output = decompress_orientation(compress_orientation(input));
        assert_close(input.w, output.w, 0.001);
        assert_close(input.x, output.x, 0.001);
        assert_close(input.y, output.y, 0.001);
        assert_close(input.z, output.z, 0.001);
    }

    #[test]
    fn test_compress_orientation_arbitrary() {
        let input = Quat::new(0.5, 1.5, -2.0, 3.0).normalize();
        let output = decompress_orientation(compress_orientation(input));
        // q and -q are the same rotation
        let cosine = input.dot(output).abs();
        assert!(cosine > 0.999, "rotation drifted: cos = {}", cosine);
    }
}
