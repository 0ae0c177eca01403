//! 通用读取管线
//!
//! 各格式处理器共享的三件套：
//! 1. 分块回调读取循环（已知/未知长度两种终止策略）
//! 2. hound WAV样本泵（WAV处理器与WavPack桥接的WAV管道共用）
//! 3. symphonia流式解码状态机（FLAC/MP3共用）

use crate::error::{AudioError, AudioResult};
use crate::reader::ReadCallbacks;

/// 分块回调读取循环
///
/// `read_fn` 将至多 `want` 帧填入缓冲并返回实际帧数。已知总帧数时
/// 短读即错误；未知长度（`num_frames == 0`）时短读表示数据结束。
/// 每块回调前检查 `should_abort`，中止为正常返回而非错误。
pub(crate) fn frame_reader_loop<F>(
    callbacks: &mut ReadCallbacks<'_>,
    num_frames: u64,
    num_channels: usize,
    chunk_size: u32,
    mut read_fn: F,
) -> AudioResult<()>
where
    F: FnMut(&mut [f32]) -> AudioResult<usize>,
{
    let chunk_frames = chunk_size.max(1) as usize;
    let known_length = num_frames > 0;
    let mut buf = vec![0.0f32; chunk_frames * num_channels];
    let mut frame: u64 = 0;

    loop {
        if (callbacks.should_abort)() {
            tracing::debug!(frame, "读取在第{frame}帧处被调用方中止");
            return Ok(());
        }

        let want = if known_length {
            let remaining = num_frames - frame;
            if remaining == 0 {
                break;
            }
            remaining.min(chunk_frames as u64) as usize
        } else {
            chunk_frames
        };

        let got = read_fn(&mut buf[..want * num_channels])?;
        if known_length && got < want {
            return Err(AudioError::DecodingError(format!(
                "Read error / 读取错误: 第{frame}帧处期望{want}帧，实际{got}帧"
            )));
        }
        if got == 0 {
            break;
        }

        (callbacks.return_chunk)(frame, &buf[..got * num_channels]);
        frame += got as u64;

        if !known_length && got < chunk_frames {
            break;
        }
    }

    Ok(())
}

// ==================== hound样本泵 ====================

/// 从hound读取器拉取交错f32样本
///
/// 整数PCM按 `(1 << (bits-1)) - 1` 归一化（8位为偏移二进制），
/// 浮点WAV原样直通（保留未归一化值）。返回填满的整帧数。
#[cfg(any(feature = "wav", feature = "wavpack"))]
pub(crate) fn read_hound_frames<R: std::io::Read>(
    reader: &mut hound::WavReader<R>,
    out: &mut [f32],
) -> AudioResult<usize> {
    use crate::convert::int_to_f32;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    // 只消费整帧，避免把半帧留在迭代器里造成后续错位
    let whole = out.len() / channels * channels;
    let out = &mut out[..whole];
    let mut filled = 0usize;

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => {
            let mut samples = reader.samples::<f32>();
            while filled < out.len() {
                match samples.next() {
                    Some(sample) => {
                        out[filled] = sample?;
                        filled += 1;
                    }
                    None => break,
                }
            }
        }
        (hound::SampleFormat::Int, 8) => {
            let mut samples = reader.samples::<i8>();
            while filled < out.len() {
                match samples.next() {
                    Some(sample) => {
                        out[filled] = int_to_f32(sample? as i32, 8);
                        filled += 1;
                    }
                    None => break,
                }
            }
        }
        (hound::SampleFormat::Int, 16) => {
            let mut samples = reader.samples::<i16>();
            while filled < out.len() {
                match samples.next() {
                    Some(sample) => {
                        out[filled] = int_to_f32(sample? as i32, 16);
                        filled += 1;
                    }
                    None => break,
                }
            }
        }
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let mut samples = reader.samples::<i32>();
            while filled < out.len() {
                match samples.next() {
                    Some(sample) => {
                        out[filled] = int_to_f32(sample?, bits);
                        filled += 1;
                    }
                    None => break,
                }
            }
        }
        (hound::SampleFormat::Int, bits) => {
            return Err(AudioError::FormatError(format!(
                "不支持的WAV位深度: {bits}位"
            )));
        }
    }

    Ok(filled / channels)
}

// ==================== symphonia流式解码 ====================

#[cfg(any(feature = "flac", feature = "mp3"))]
pub(crate) use symphonia_stream::{SymphoniaKind, SymphoniaStream};

#[cfg(any(feature = "flac", feature = "mp3"))]
mod symphonia_stream {
    use super::*;
    use crate::error::{decoding_error, format_error};
    use crate::format::{AudioDataFormat, StorageType};
    use crate::source::SourceIo;
    use symphonia::core::audio::{AudioBufferRef, Signal};
    use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
    use symphonia::core::io::MediaSourceStream;
    use tracing::{debug, warn};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum SymphoniaKind {
        #[cfg(feature = "flac")]
        Flac,
        #[cfg(feature = "mp3")]
        Mp3,
    }

    impl SymphoniaKind {
        fn name(&self) -> &'static str {
            match self {
                #[cfg(feature = "flac")]
                SymphoniaKind::Flac => "FLAC",
                #[cfg(feature = "mp3")]
                SymphoniaKind::Mp3 => "MP3",
            }
        }
    }

    /// symphonia解码状态机
    ///
    /// 持有格式读取器与解码器，维护未消费的解码残余样本。
    /// seek采用精确模式，落点早于目标帧时解码丢弃补齐。
    pub(crate) struct SymphoniaStream {
        reader: Box<dyn FormatReader>,
        decoder: Box<dyn Decoder>,
        track_id: u32,
        format: AudioDataFormat,
        pending: Vec<f32>,
        pending_pos: usize,
        eof: bool,
    }

    impl SymphoniaStream {
        /// 探测头部并构建解码器
        ///
        /// 格式不匹配时返回可恢复的 `FormatError`，供分发层回退。
        pub(crate) fn open(kind: SymphoniaKind, io: SourceIo) -> AudioResult<Self> {
            let mss = MediaSourceStream::new(Box::new(io), Default::default());
            let fmt_opts = FormatOptions::default();

            let reader: Box<dyn FormatReader> = match kind {
                #[cfg(feature = "flac")]
                SymphoniaKind::Flac => Box::new(
                    symphonia::default::formats::FlacReader::try_new(mss, &fmt_opts)
                        .map_err(|e| format_error("FLAC头部探测失败", e))?,
                ),
                #[cfg(feature = "mp3")]
                SymphoniaKind::Mp3 => Box::new(
                    symphonia::default::formats::MpaReader::try_new(mss, &fmt_opts)
                        .map_err(|e| format_error("MP3头部探测失败", e))?,
                ),
            };

            let track = reader
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or_else(|| AudioError::FormatError("未找到音频轨道".to_string()))?;
            let track_id = track.id;
            let codec_params = track.codec_params.clone();

            let decoder = symphonia::default::get_codecs()
                .make(&codec_params, &DecoderOptions::default())
                .map_err(|e| format_error("创建解码器失败", e))?;

            let channels = codec_params
                .channels
                .map(|ch| ch.count())
                .ok_or_else(|| AudioError::FormatError("无法获取声道数信息".to_string()))?;
            let sample_rate = codec_params.sample_rate.unwrap_or(44100);
            // MP3等格式不携带位深，按解码精度记为16位
            let bit_depth = codec_params.bits_per_sample.map(|b| b as u16).unwrap_or(16);
            let num_frames = codec_params.n_frames.unwrap_or(0);

            debug!(
                kind = kind.name(),
                channels, sample_rate, bit_depth, num_frames, "symphonia头部探测成功"
            );

            Ok(Self {
                reader,
                decoder,
                track_id,
                format: AudioDataFormat::typed(
                    channels as u16,
                    num_frames,
                    sample_rate,
                    bit_depth,
                    StorageType::Default,
                ),
                pending: Vec::new(),
                pending_pos: 0,
                eof: false,
            })
        }

        pub(crate) fn format(&self) -> AudioDataFormat {
            self.format
        }

        /// 读取至多 `out.len() / channels` 帧，返回实际帧数
        ///
        /// 返回值小于请求数表示流结束。损坏的音频包跳过并继续。
        pub(crate) fn read(&mut self, out: &mut [f32]) -> AudioResult<usize> {
            let channels = self.format.channels_usize();
            // 只交付整帧
            let want = out.len() / channels * channels;
            let mut filled = 0usize;

            loop {
                while self.pending_pos < self.pending.len() && filled < want {
                    out[filled] = self.pending[self.pending_pos];
                    self.pending_pos += 1;
                    filled += 1;
                }
                if filled == want || self.eof {
                    break;
                }

                let packet = match self.reader.next_packet() {
                    Ok(packet) => packet,
                    Err(SymphoniaError::IoError(ref e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        self.eof = true;
                        continue;
                    }
                    Err(SymphoniaError::ResetRequired) => {
                        self.decoder.reset();
                        continue;
                    }
                    Err(e) => return Err(decoding_error("读取音频包失败", e)),
                };
                if packet.track_id() != self.track_id {
                    continue;
                }

                match self.decoder.decode(&packet) {
                    Ok(audio_buf) => {
                        self.pending.clear();
                        self.pending_pos = 0;
                        convert_buffer_to_interleaved(&audio_buf, &mut self.pending);
                    }
                    Err(SymphoniaError::DecodeError(e)) => {
                        warn!("跳过损坏的音频包: {e}");
                        continue;
                    }
                    Err(SymphoniaError::ResetRequired) => {
                        self.decoder.reset();
                        continue;
                    }
                    Err(SymphoniaError::IoError(ref e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        self.eof = true;
                        continue;
                    }
                    Err(e) => return Err(decoding_error("解码失败", e)),
                }
            }

            Ok(filled / channels)
        }

        /// 精确seek到指定帧
        pub(crate) fn seek(&mut self, frame: u64) -> AudioResult<()> {
            let seeked = self
                .reader
                .seek(
                    SeekMode::Accurate,
                    SeekTo::TimeStamp {
                        ts: frame,
                        track_id: self.track_id,
                    },
                )
                .map_err(|e| decoding_error("seek失败", e))?;
            self.decoder.reset();
            self.pending.clear();
            self.pending_pos = 0;
            self.eof = false;

            // 落点早于目标帧时解码丢弃补齐
            let mut to_discard = frame.saturating_sub(seeked.actual_ts);
            let channels = self.format.channels_usize();
            let mut scratch = vec![0.0f32; 1024 * channels];
            while to_discard > 0 {
                let chunk = (to_discard as usize).min(1024);
                let got = self.read(&mut scratch[..chunk * channels])?;
                if got == 0 {
                    break;
                }
                to_discard -= got as u64;
            }
            Ok(())
        }
    }

    /// 解码缓冲转交错f32
    ///
    /// symphonia解码输出按缓冲样本类型满量程，逐类型折算到 [-1.0, 1.0]。
    fn convert_buffer_to_interleaved(audio_buf: &AudioBufferRef, samples: &mut Vec<f32>) {
        macro_rules! interleave_as {
            ($buf:expr, $convert:expr) => {{
                let buf = $buf;
                let channels = buf.spec().channels.count();
                let frames = buf.frames();
                samples.reserve(channels * frames);
                for frame in 0..frames {
                    for ch in 0..channels {
                        #[allow(clippy::redundant_closure_call)]
                        samples.push($convert(buf.chan(ch)[frame]));
                    }
                }
            }};
        }

        match audio_buf {
            AudioBufferRef::F32(buf) => interleave_as!(buf, |s: f32| s),
            AudioBufferRef::F64(buf) => interleave_as!(buf, |s: f64| s as f32),
            AudioBufferRef::S8(buf) => interleave_as!(buf, |s: i8| s as f32 / 128.0),
            AudioBufferRef::S16(buf) => interleave_as!(buf, |s: i16| s as f32 / 32768.0),
            AudioBufferRef::S24(buf) => {
                interleave_as!(buf, |s: symphonia::core::sample::i24| s.inner() as f32
                    / 8388608.0)
            }
            AudioBufferRef::S32(buf) => {
                interleave_as!(buf, |s: i32| (s as f64 / 2147483648.0) as f32)
            }
            AudioBufferRef::U8(buf) => interleave_as!(buf, |s: u8| (s as f32 - 128.0) / 128.0),
            AudioBufferRef::U16(buf) => {
                interleave_as!(buf, |s: u16| (s as f32 - 32768.0) / 32768.0)
            }
            AudioBufferRef::U24(buf) => {
                interleave_as!(buf, |s: symphonia::core::sample::u24| (s.inner() as f32
                    - 8388608.0)
                    / 8388608.0)
            }
            AudioBufferRef::U32(buf) => {
                interleave_as!(buf, |s: u32| ((s as f64 - 2147483648.0) / 2147483648.0) as f32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_loop(
        num_frames: u64,
        channels: usize,
        chunk_size: u32,
        data: Vec<f32>,
    ) -> AudioResult<Vec<(u64, usize)>> {
        let mut chunks = Vec::new();
        let mut cursor = 0usize;
        let mut abort = || false;
        let mut collect = |frame: u64, samples: &[f32]| {
            chunks.push((frame, samples.len() / channels));
        };
        let mut callbacks = ReadCallbacks {
            should_abort: &mut abort,
            return_chunk: &mut collect,
        };
        frame_reader_loop(&mut callbacks, num_frames, channels, chunk_size, |buf| {
            let n = buf.len().min(data.len() - cursor);
            buf[..n].copy_from_slice(&data[cursor..cursor + n]);
            cursor += n;
            Ok(n / channels)
        })?;
        Ok(chunks)
    }

    #[test]
    fn test_known_length_short_final_chunk() {
        let chunks = collecting_loop(10, 2, 4, vec![0.0; 20]).unwrap();
        assert_eq!(chunks, vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn test_unknown_length_terminates_on_short_read() {
        let chunks = collecting_loop(0, 1, 4, vec![0.0; 10]).unwrap();
        assert_eq!(chunks, vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn test_known_length_short_read_is_error() {
        let mut abort = || false;
        let mut collect = |_: u64, _: &[f32]| {};
        let mut callbacks = ReadCallbacks {
            should_abort: &mut abort,
            return_chunk: &mut collect,
        };
        // 声称100帧但只有12帧可读
        let mut remaining = 12usize;
        let result = frame_reader_loop(&mut callbacks, 100, 1, 8, |buf| {
            let n = buf.len().min(remaining);
            remaining -= n;
            Ok(n)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_abort_stops_before_next_chunk() {
        let mut delivered = 0usize;
        let mut abort_after = 2usize;
        let mut abort = move || {
            if abort_after == 0 {
                true
            } else {
                abort_after -= 1;
                false
            }
        };
        let mut collect = |_: u64, _: &[f32]| delivered += 1;
        let mut callbacks = ReadCallbacks {
            should_abort: &mut abort,
            return_chunk: &mut collect,
        };
        frame_reader_loop(&mut callbacks, 100, 1, 10, |buf| Ok(buf.len())).unwrap();
        assert_eq!(delivered, 2);
    }
}
