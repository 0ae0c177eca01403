//! 写入-读取往返对比测试
//!
//! 以确定性噪声写入再读回，逐样本对比误差是否落在
//! `1 / 2^(bit_depth / 2)` 容差内。

use macinmeter_audio_io::convert::round_trip_tolerance;
use macinmeter_audio_io::{
    AudioDataFormat, AudioReader, AudioResult, AudioType, AudioWriter, ReadCallbacks, StorageType,
    TypeHint, WriteCallbacks,
};
use std::path::Path;

/// 确定性伪随机样本（xorshift），幅度±0.9
fn noise(num_frames: u64, channels: u16, seed: u32) -> Vec<f32> {
    let mut state = seed | 1;
    let mut out = Vec::with_capacity(num_frames as usize * channels as usize);
    for _ in 0..num_frames * channels as u64 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.push((state as f32 / u32::MAX as f32 * 2.0 - 1.0) * 0.9);
    }
    out
}

fn write_samples(
    path: &Path,
    audio_type: AudioType,
    format: AudioDataFormat,
    samples: &[f32],
) -> AudioResult<()> {
    let writer = AudioWriter::create(path, audio_type, format)?;
    let channels = format.num_channels as usize;
    let mut abort = || false;
    let mut next_chunk = |buf: &mut [f32], frame: u64| {
        let start = frame as usize * channels;
        buf.copy_from_slice(&samples[start..start + buf.len()]);
    };
    writer.write(
        &mut WriteCallbacks {
            should_abort: &mut abort,
            get_next_chunk: &mut next_chunk,
        },
        256,
    )
}

fn read_all(reader: &mut AudioReader) -> AudioResult<Vec<f32>> {
    let mut out = Vec::new();
    let mut abort = || false;
    let mut collect = |_frame: u64, samples: &[f32]| out.extend_from_slice(samples);
    reader.read_frames(
        &mut ReadCallbacks {
            should_abort: &mut abort,
            return_chunk: &mut collect,
        },
        512,
    )?;
    Ok(out)
}

fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "样本数不一致");
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[test]
fn test_wav_round_trip_across_bit_depths() {
    let dir = tempfile::tempdir().unwrap();
    for &bits in &[8u16, 16, 24, 32] {
        let format = AudioDataFormat::typed(2, 1000, 44100, bits, StorageType::Int);
        let samples = noise(1000, 2, 0x1234 + bits as u32);
        let path = dir.path().join(format!("rt_{bits}.wav"));

        write_samples(&path, AudioType::Wav, format, &samples).unwrap();

        let mut reader = AudioReader::open(&path, TypeHint::Any);
        let header = reader.read_header().unwrap();
        assert_eq!(header.num_frames, 1000);
        assert_eq!(header.num_channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bit_depth, bits);
        assert_eq!(header.frame_size, 4);

        let decoded = read_all(&mut reader).unwrap();
        let diff = max_abs_diff(&samples, &decoded);
        let tolerance = round_trip_tolerance(bits);
        assert!(diff < tolerance, "{bits}位: 误差{diff}超出容差{tolerance}");
    }
}

#[test]
fn test_wav_float32_round_trip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 500, 48000, 32, StorageType::NormalizedFloat);
    let samples = noise(500, 2, 7);
    let path = dir.path().join("float.wav");

    write_samples(&path, AudioType::Wav, format, &samples).unwrap();

    let mut reader = AudioReader::open(&path, TypeHint::Any);
    let header = reader.read_header().unwrap();
    assert_eq!(header.storage_type, StorageType::Float);

    let decoded = read_all(&mut reader).unwrap();
    assert_eq!(max_abs_diff(&samples, &decoded), 0.0);
}

#[test]
fn test_wav_round_trip_via_memory_source() {
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(1, 300, 22050, 16, StorageType::Int);
    let samples = noise(300, 1, 42);
    let path = dir.path().join("mem.wav");
    write_samples(&path, AudioType::Wav, format, &samples).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let mut reader = AudioReader::from_memory(bytes, TypeHint::Any);
    let decoded = read_all(&mut reader).unwrap();
    assert!(max_abs_diff(&samples, &decoded) < round_trip_tolerance(16));
}

/// 用户写入流：收集到内存再用内存源读回
struct VecWriteStream {
    data: Vec<u8>,
    pos: usize,
}

impl macinmeter_audio_io::WriteStream for VecWriteStream {
    fn seek(&mut self, origin: macinmeter_audio_io::SeekOrigin, offset: i64) -> bool {
        let base = match origin {
            macinmeter_audio_io::SeekOrigin::Start => 0i64,
            macinmeter_audio_io::SeekOrigin::Current => self.pos as i64,
        };
        let target = base + offset;
        if target < 0 {
            return false;
        }
        self.pos = target as usize;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        true
    }

    fn write_bytes(&mut self, buf: &[u8]) -> usize {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        buf.len()
    }
}

#[test]
fn test_wav_write_to_user_stream() {
    use std::sync::{Arc, Mutex};

    // 通过共享缓冲观察用户流收到的字节
    #[derive(Clone)]
    struct Shared(Arc<Mutex<VecWriteStream>>);
    impl macinmeter_audio_io::WriteStream for Shared {
        fn seek(&mut self, origin: macinmeter_audio_io::SeekOrigin, offset: i64) -> bool {
            self.0.lock().unwrap().seek(origin, offset)
        }
        fn write_bytes(&mut self, buf: &[u8]) -> usize {
            self.0.lock().unwrap().write_bytes(buf)
        }
    }

    let shared = Shared(Arc::new(Mutex::new(VecWriteStream {
        data: Vec::new(),
        pos: 0,
    })));
    let format = AudioDataFormat::typed(2, 200, 44100, 16, StorageType::Int);
    let samples = noise(200, 2, 99);

    let writer = AudioWriter::to_stream(Box::new(shared.clone()), AudioType::Wav, format).unwrap();
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
            64,
        )
        .unwrap();

    let bytes = shared.0.lock().unwrap().data.clone();
    let mut reader = AudioReader::from_memory(bytes, TypeHint::Any);
    let decoded = read_all(&mut reader).unwrap();
    assert!(max_abs_diff(&samples, &decoded) < round_trip_tolerance(16));
}

#[test]
fn test_writer_abort_still_finalizes_container() {
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 1000, 44100, 16, StorageType::Int);
    let samples = noise(1000, 2, 5);
    let path = dir.path().join("aborted.wav");

    let writer = AudioWriter::create(&path, AudioType::Wav, format).unwrap();
    let channels = format.num_channels as usize;
    let pulled = std::cell::Cell::new(0u32);
    let mut abort = || pulled.get() >= 1; // 写完第一块后中止
    let mut next_chunk = |buf: &mut [f32], frame: u64| {
        let start = frame as usize * channels;
        buf.copy_from_slice(&samples[start..start + buf.len()]);
        pulled.set(pulled.get() + 1);
    };
    writer
        .write(
            &mut WriteCallbacks {
                should_abort: &mut abort,
                get_next_chunk: &mut next_chunk,
            },
            100,
        )
        .unwrap();

    // 重新打开：帧数以容器记录为准
    let mut reader = AudioReader::open(&path, TypeHint::Any);
    let header = reader.read_header().unwrap();
    assert_eq!(header.num_frames, 100);
    let decoded = read_all(&mut reader).unwrap();
    assert_eq!(decoded.len(), 200);
}

#[test]
fn test_no_writer_for_decode_only_formats() {
    let dir = tempfile::tempdir().unwrap();
    let format = AudioDataFormat::typed(2, 100, 44100, 16, StorageType::Int);
    for audio_type in [AudioType::Flac, AudioType::Mp3, AudioType::Binary] {
        let err = AudioWriter::create(dir.path().join("x"), audio_type, format)
            .map(|_| ())
            .unwrap_err();
        assert!(
            matches!(err, macinmeter_audio_io::AudioError::UnsupportedOperation(_)),
            "{audio_type}应无写入器"
        );
    }
}

#[test]
fn test_writer_rejects_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    // 位深20不被支持
    let format = AudioDataFormat::typed(2, 100, 44100, 20, StorageType::Int);
    assert!(AudioWriter::create(dir.path().join("bad.wav"), AudioType::Wav, format).is_err());
    // 浮点存储要求32位
    let format = AudioDataFormat::typed(2, 100, 44100, 16, StorageType::Float);
    assert!(AudioWriter::create(dir.path().join("bad2.wav"), AudioType::Wav, format).is_err());
    // 声道数为0
    let format = AudioDataFormat::typed(0, 100, 44100, 16, StorageType::Int);
    assert!(AudioWriter::create(dir.path().join("bad3.wav"), AudioType::Wav, format).is_err());
}
