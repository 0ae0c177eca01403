//! WavPack桥接集成测试
//!
//! 依赖系统安装的 wavpack/wvunpack 命令行工具；未安装时各测试
//! 直接返回（与可选外部工具的既有测试约定一致）。

#![cfg(feature = "wavpack")]

use macinmeter_audio_io::convert::round_trip_tolerance;
use macinmeter_audio_io::{
    AudioDataFormat, AudioReader, AudioType, AudioWriter, ReadCallbacks, StorageType, TypeHint,
    WriteCallbacks, wavpack_cli_available,
};
use std::path::Path;

fn skip_without_cli() -> bool {
    if wavpack_cli_available() {
        false
    } else {
        eprintln!("wavpack/wvunpack not installed, skipping / 未安装WavPack命令行工具，跳过");
        true
    }
}

/// 双声道正弦信号，可指定幅度（浮点模式用非归一化幅度）
fn sine(num_frames: u64, amplitude: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(num_frames as usize * 2);
    for n in 0..num_frames {
        let v = (n as f32 * 0.01).sin() * amplitude;
        out.push(v);
        out.push(v * 0.5);
    }
    out
}

fn write_wv(path: &Path, format: AudioDataFormat, samples: &[f32]) {
    let writer = AudioWriter::create(path, AudioType::WavPack, format).unwrap();
    let channels = format.num_channels as usize;
    let mut abort = || false;
    let mut next_chunk = |buf: &mut [f32], frame: u64| {
        let start = frame as usize * channels;
        buf.copy_from_slice(&samples[start..start + buf.len()]);
    };
    writer
        .write(
            &mut WriteCallbacks {
                should_abort: &mut abort,
                get_next_chunk: &mut next_chunk,
            },
            1024,
        )
        .unwrap();
}

fn read_all(reader: &mut AudioReader) -> Vec<f32> {
    let mut out = Vec::new();
    let mut abort = || false;
    let mut collect = |_frame: u64, samples: &[f32]| out.extend_from_slice(samples);
    reader
        .read_frames(
            &mut ReadCallbacks {
                should_abort: &mut abort,
                return_chunk: &mut collect,
            },
            2048,
        )
        .unwrap();
    out
}

fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[test]
fn test_wavpack_int_round_trip_across_bit_depths() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    for &bits in &[8u16, 16, 24] {
        let format = AudioDataFormat::typed(2, 4410, 44100, bits, StorageType::Int);
        let samples = sine(4410, 0.8);
        let path = dir.path().join(format!("rt_{bits}.wv"));

        write_wv(&path, format, &samples);

        let mut reader = AudioReader::open(&path, TypeHint::Only(AudioType::WavPack));
        let header = reader.read_header().unwrap();
        assert_eq!(header.num_frames, 4410);
        assert_eq!(header.num_channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bit_depth, bits);

        let decoded = read_all(&mut reader);
        let diff = max_abs_diff(&samples, &decoded);
        let tolerance = round_trip_tolerance(bits);
        assert!(diff < tolerance, "{bits}位: 误差{diff}超出容差{tolerance}");
    }
}

#[test]
fn test_wavpack_unnormalized_float_round_trip() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // 非归一化浮点：幅度42000的样本原样直通，无损往返
    let format = AudioDataFormat::typed(2, 44100, 44100, 32, StorageType::Float);
    let samples = sine(44100, 42000.0);
    let path = dir.path().join("float.wv");

    write_wv(&path, format, &samples);

    let mut reader = AudioReader::open(&path, TypeHint::Only(AudioType::WavPack));
    let header = reader.read_header().unwrap();
    assert_eq!(header.storage_type, StorageType::Float);

    let decoded = read_all(&mut reader);
    assert!(max_abs_diff(&samples, &decoded) <= 1e-6);
}

#[test]
fn test_wavpack_probed_without_hint() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 1000, 44100, 16, StorageType::Int);
    let path = dir.path().join("probe.wv");
    write_wv(&path, format, &sine(1000, 0.5));

    let mut reader = AudioReader::open(&path, TypeHint::Any);
    reader.read_header().unwrap();
    assert_eq!(reader.audio_type().unwrap(), AudioType::WavPack);
}

#[test]
fn test_wavpack_memory_source_spools_to_temp_file() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 1000, 44100, 16, StorageType::Int);
    let samples = sine(1000, 0.6);
    let path = dir.path().join("mem.wv");
    write_wv(&path, format, &samples);

    let bytes = std::fs::read(&path).unwrap();
    let mut reader = AudioReader::from_memory(bytes, TypeHint::Only(AudioType::WavPack));
    let decoded = read_all(&mut reader);
    assert!(max_abs_diff(&samples, &decoded) < round_trip_tolerance(16));
}

#[test]
fn test_wavpack_stream_seek_respawns_at_frame() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 2000, 44100, 16, StorageType::Int);
    let samples = sine(2000, 0.7);
    let path = dir.path().join("seek.wv");
    write_wv(&path, format, &samples);

    let mut reader = AudioReader::open(&path, TypeHint::Only(AudioType::WavPack));
    let all = read_all(&mut reader);

    let mut streamer = reader.streamer().unwrap();
    streamer.seek(1000).unwrap();
    let mut buf = vec![0.0f32; 100 * 2];
    assert_eq!(streamer.read_frames(&mut buf).unwrap(), 100);
    streamer.close().unwrap();

    assert!(max_abs_diff(&buf, &all[1000 * 2..1100 * 2]) <= 1e-6);
}

#[test]
fn test_wavpack_abort_still_finalizes_container() {
    if skip_without_cli() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 10000, 44100, 16, StorageType::Int);
    let samples = sine(10000, 0.5);
    let path = dir.path().join("abort.wv");

    let writer = AudioWriter::create(&path, AudioType::WavPack, format).unwrap();
    let pulled = std::cell::Cell::new(0u32);
    let mut abort = || pulled.get() >= 2;
    let mut next_chunk = |buf: &mut [f32], frame: u64| {
        let start = frame as usize * 2;
        buf.copy_from_slice(&samples[start..start + buf.len()]);
        pulled.set(pulled.get() + 1);
    };
    writer
        .write(
            &mut WriteCallbacks {
                should_abort: &mut abort,
                get_next_chunk: &mut next_chunk,
            },
            1000,
        )
        .unwrap();

    // 容器记录的是实际写入的2000帧
    let mut reader = AudioReader::open(&path, TypeHint::Only(AudioType::WavPack));
    assert_eq!(reader.read_header().unwrap().num_frames, 2000);
}
