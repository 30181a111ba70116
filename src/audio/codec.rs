//! Wire-format audio codec.
//!
//! The backend exchanges raw little-endian 16-bit PCM, mono, at the wire
//! sample rate. Everything here is a pure function: no internal state, one
//! allocation per call, so the conversions can be unit tested in isolation.

/// Quantize normalized float samples to 16-bit PCM.
///
/// Samples are clamped to `[-1.0, 1.0]`, then scaled by 32768 on the negative
/// side and 32767 on the non-negative side, truncating toward zero.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let s = sample.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Convert 16-bit PCM samples back to normalized floats (divide by 32768).
pub fn dequantize(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Downsample by nearest-neighbor decimation: output sample `i` is taken from
/// source index `floor(i * from_rate / to_rate)`.
///
/// Lossy but deterministic, which is all the capture path needs. If the
/// source rate is at or below the target rate the input is returned as-is.
pub fn downsample_nearest(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate <= to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio).round() as usize;

    (0..new_len)
        .map(|i| {
            let src_idx = (i as f64 * ratio) as usize;
            samples[src_idx.min(samples.len() - 1)]
        })
        .collect()
}

/// Resample by linear interpolation between neighboring source samples.
///
/// Used on the playback path, where interpolation quality is audible in a way
/// it is not on capture.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;

    (0..new_len)
        .map(|i| {
            let src_idx = i as f64 * ratio;
            let idx = src_idx as usize;
            let frac = (src_idx - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Encode native-rate float samples into a wire frame: nearest-neighbor
/// downsample to the wire rate, quantize to PCM16, pack little-endian.
pub fn encode_frame(native: &[f32], native_rate: u32, wire_rate: u32) -> Vec<u8> {
    let downsampled = downsample_nearest(native, native_rate, wire_rate);
    quantize(&downsampled)
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

/// Decode a wire frame into float samples at the playback device's rate.
///
/// Odd trailing bytes are ignored; message boundaries are buffer boundaries
/// so a well-formed frame is always an even number of bytes.
pub fn decode_frame(bytes: &[u8], wire_rate: u32, device_rate: u32) -> Vec<f32> {
    let pcm: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let floats = dequantize(&pcm);
    if device_rate == wire_rate {
        floats
    } else {
        resample_linear(&floats, wire_rate, device_rate)
    }
}

/// Duration in seconds of a wire frame of `byte_len` bytes at `wire_rate`.
pub fn frame_duration_secs(byte_len: usize, wire_rate: u32) -> f64 {
    (byte_len / 2) as f64 / wire_rate as f64
}
