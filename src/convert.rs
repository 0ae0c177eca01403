//! 样本转换模块
//!
//! 整数PCM与归一化f32之间的转换，以及交错/去交错布局变换。
//! 归一化常量统一为 `(1 << (bit_depth - 1)) - 1`：读取除以K，
//! 写入乘以K后四舍五入并钳制到样本范围。全库只此一处定义。

/// 指定位深的归一化常量K
#[inline]
pub fn normalization_scale(bit_depth: u16) -> f32 {
    ((1i64 << (bit_depth - 1)) - 1) as f32
}

/// 整数样本 → 归一化f32
#[inline]
pub fn int_to_f32(value: i32, bit_depth: u16) -> f32 {
    value as f32 / normalization_scale(bit_depth)
}

/// 归一化f32 → 整数样本（四舍五入并钳制到位深范围）
#[inline]
pub fn f32_to_int(value: f32, bit_depth: u16) -> i32 {
    let lo = -(1i64 << (bit_depth - 1));
    let hi = (1i64 << (bit_depth - 1)) - 1;
    let scaled = (value * normalization_scale(bit_depth)).round() as i64;
    scaled.clamp(lo, hi) as i32
}

/// 往返精度容差：`1 / 2^(bit_depth / 2)`
///
/// 量化误差上界远小于此值，用于测试与调用方校验。
#[inline]
pub fn round_trip_tolerance(bit_depth: u16) -> f32 {
    1.0 / (1u64 << (bit_depth / 2)) as f32
}

/// 去交错声道 → 交错布局
///
/// 输出索引为 `frame * num_channels + channel`。所有声道长度必须一致。
pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let num_channels = channels.len();
    if num_channels == 0 {
        return Vec::new();
    }
    let num_frames = channels[0].len();
    debug_assert!(channels.iter().all(|c| c.len() == num_frames));

    let mut out = vec![0.0f32; num_frames * num_channels];
    for (ch, samples) in channels.iter().enumerate() {
        for (frame, &value) in samples.iter().enumerate() {
            out[frame * num_channels + ch] = value;
        }
    }
    out
}

/// 交错布局 → 去交错声道
///
/// 读取索引为 `frame * num_channels + channel`。
pub fn deinterleave(interleaved: &[f32], num_channels: usize) -> Vec<Vec<f32>> {
    if num_channels == 0 {
        return Vec::new();
    }
    let num_frames = interleaved.len() / num_channels;
    let mut out = vec![Vec::with_capacity(num_frames); num_channels];
    for frame in 0..num_frames {
        for (ch, channel) in out.iter_mut().enumerate() {
            channel.push(interleaved[frame * num_channels + ch]);
        }
    }
    out
}

/// 整数样本按小端序追加到字节缓冲（1/2/3/4字节宽度）
///
/// 8位PCM为偏移二进制（+128存储为无符号）。
#[cfg(feature = "wavpack")]
pub(crate) fn pack_sample_le(value: i32, bytes_per_sample: usize, out: &mut Vec<u8>) {
    match bytes_per_sample {
        1 => out.push((value + 128) as u8),
        2 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        3 => out.extend_from_slice(&value.to_le_bytes()[..3]),
        _ => out.extend_from_slice(&value.to_le_bytes()),
    }
}
