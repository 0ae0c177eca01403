//! WAV处理器
//!
//! 基于hound的WAV读写。读取侧整数PCM归一化为f32，浮点WAV原样直通；
//! 写入侧支持8/16/24/32位整数与32位浮点。

use crate::convert::f32_to_int;
use crate::error::{AudioError, AudioResult, format_error};
use crate::format::{AudioDataFormat, StorageType};
use crate::handlers::generic::{frame_reader_loop, read_hound_frames};
use crate::reader::ReadCallbacks;
use crate::source::{Source, SourceIo, WriteStreamIo};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// WAV读取处理器
pub(crate) struct WavHandler {
    source: Source,
    stream: Option<hound::WavReader<SourceIo>>,
}

impl WavHandler {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            stream: None,
        }
    }

    fn open_reader(&self) -> AudioResult<hound::WavReader<SourceIo>> {
        let reader = hound::WavReader::new(self.source.open()?)
            .map_err(|e| format_error("WAV头部探测失败", e))?;
        Ok(reader)
    }

    fn format_of(reader: &hound::WavReader<SourceIo>) -> AudioDataFormat {
        let spec = reader.spec();
        let storage_type = match spec.sample_format {
            hound::SampleFormat::Float => StorageType::Float,
            hound::SampleFormat::Int => StorageType::Default,
        };
        AudioDataFormat::typed(
            spec.channels,
            reader.len() as u64 / spec.channels as u64,
            spec.sample_rate,
            spec.bits_per_sample,
            storage_type,
        )
    }

    /// 探测头部；失败为可恢复错误，资源随读取器一并释放
    pub(crate) fn try_read_header(&mut self) -> AudioResult<AudioDataFormat> {
        let reader = self.open_reader()?;
        Ok(Self::format_of(&reader))
    }

    pub(crate) fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let mut reader = self.open_reader()?;
        frame_reader_loop(
            callbacks,
            format.num_frames,
            format.channels_usize(),
            chunk_size,
            |buf| read_hound_frames(&mut reader, buf),
        )
    }

    pub(crate) fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        if self.stream.is_some() {
            return Err(AudioError::StateError("流已打开".to_string()));
        }
        let reader = self.open_reader()?;
        let format = Self::format_of(&reader);
        self.stream = Some(reader);
        Ok(format)
    }

    pub(crate) fn stream_read(&mut self, out: &mut [f32]) -> AudioResult<usize> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?;
        read_hound_frames(reader, out)
    }

    pub(crate) fn stream_seek(&mut self, frame: u64) -> AudioResult<()> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?;
        let frame = u32::try_from(frame)
            .map_err(|_| AudioError::InvalidInput(format!("seek目标帧超出范围: {frame}")))?;
        reader.seek(frame)?;
        Ok(())
    }

    pub(crate) fn stream_close(&mut self) -> AudioResult<()> {
        if self.stream.take().is_none() {
            return Err(AudioError::StateError("流未打开，无法关闭".to_string()));
        }
        Ok(())
    }
}

// ==================== 写入侧 ====================

enum WavSink {
    File(hound::WavWriter<BufWriter<File>>),
    Stream(hound::WavWriter<WriteStreamIo>),
}

/// WAV写入处理器
pub(crate) struct WavWriteHandler {
    sink: WavSink,
    format: AudioDataFormat,
}

impl WavWriteHandler {
    fn spec_of(format: &AudioDataFormat) -> hound::WavSpec {
        let sample_format = match format.storage_type {
            StorageType::Float | StorageType::NormalizedFloat => hound::SampleFormat::Float,
            StorageType::Int | StorageType::Default => hound::SampleFormat::Int,
        };
        hound::WavSpec {
            channels: format.num_channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bit_depth,
            sample_format,
        }
    }

    pub(crate) fn create_file(path: &Path, format: AudioDataFormat) -> AudioResult<Self> {
        let writer = hound::WavWriter::create(path, Self::spec_of(&format))?;
        Ok(Self {
            sink: WavSink::File(writer),
            format,
        })
    }

    pub(crate) fn create_stream(sink: WriteStreamIo, format: AudioDataFormat) -> AudioResult<Self> {
        let writer = hound::WavWriter::new(sink, Self::spec_of(&format))?;
        Ok(Self {
            sink: WavSink::Stream(writer),
            format,
        })
    }

    /// 写入一块交错样本
    pub(crate) fn write_frames(&mut self, samples: &[f32]) -> AudioResult<()> {
        macro_rules! write_all {
            ($writer:expr) => {{
                let writer = $writer;
                match (self.format.storage_type, self.format.bit_depth) {
                    (StorageType::Float | StorageType::NormalizedFloat, _) => {
                        for &v in samples {
                            writer.write_sample(v)?;
                        }
                    }
                    (_, 8) => {
                        for &v in samples {
                            writer.write_sample(f32_to_int(v, 8) as i8)?;
                        }
                    }
                    (_, 16) => {
                        for &v in samples {
                            writer.write_sample(f32_to_int(v, 16) as i16)?;
                        }
                    }
                    (_, bits) => {
                        for &v in samples {
                            writer.write_sample(f32_to_int(v, bits))?;
                        }
                    }
                }
            }};
        }

        match &mut self.sink {
            WavSink::File(w) => write_all!(w),
            WavSink::Stream(w) => write_all!(w),
        }
        Ok(())
    }

    /// 终结容器头部；中止写入后也必须调用
    pub(crate) fn finalize(self) -> AudioResult<()> {
        match self.sink {
            WavSink::File(w) => w.finalize()?,
            WavSink::Stream(w) => w.finalize()?,
        }
        Ok(())
    }
}
