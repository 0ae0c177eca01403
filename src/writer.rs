//! 写入器门面
//!
//! 按块向写入处理器拉取交错f32样本。中止只停止拉取，容器仍会
//! 终结，重新打开被截断的文件时帧数以容器记录为准。

use crate::error::{AudioError, AudioResult};
use crate::format::{AudioDataFormat, AudioType};
use crate::source::{WriteStream, WriteStreamIo};
use std::path::Path;
use tracing::debug;

#[cfg(feature = "wav")]
use crate::handlers::wav::WavWriteHandler;
#[cfg(feature = "wavpack")]
use crate::handlers::wavpack::WavPackWriteHandler;

/// 分块写入回调
///
/// `get_next_chunk(buf, first_frame_index)` 须向缓冲填入交错f32；
/// 每块拉取前先询问 `should_abort`，返回true则停止拉取（容器照常终结）。
pub struct WriteCallbacks<'a> {
    pub should_abort: &'a mut dyn FnMut() -> bool,
    pub get_next_chunk: &'a mut dyn FnMut(&mut [f32], u64),
}

enum WriterSink {
    #[cfg(feature = "wav")]
    Wav(WavWriteHandler),
    #[cfg(feature = "wavpack")]
    WavPack(WavPackWriteHandler),
}

impl WriterSink {
    fn write_frames(&mut self, samples: &[f32]) -> AudioResult<()> {
        // 仅解码特性构建时本枚举无变体
        let _ = samples;
        match *self {
            #[cfg(feature = "wav")]
            WriterSink::Wav(ref mut h) => h.write_frames(samples),
            #[cfg(feature = "wavpack")]
            WriterSink::WavPack(ref mut h) => h.write_frames(samples),
        }
    }

    fn finalize(self) -> AudioResult<()> {
        match self {
            #[cfg(feature = "wav")]
            WriterSink::Wav(h) => h.finalize(),
            #[cfg(feature = "wavpack")]
            WriterSink::WavPack(h) => h.finalize(),
        }
    }
}

fn no_writer_error(audio_type: AudioType) -> AudioError {
    AudioError::UnsupportedOperation(format!(
        "Couldn't find a writer for this type / 找不到{audio_type}类型的写入器"
    ))
}

/// 格式无关的音频写入器
pub struct AudioWriter {
    sink: WriterSink,
    format: AudioDataFormat,
}

impl AudioWriter {
    /// 创建写入文件的写入器；格式参数在此即时校验
    pub fn create(
        path: impl AsRef<Path>,
        audio_type: AudioType,
        format: AudioDataFormat,
    ) -> AudioResult<Self> {
        format.validate_for_write()?;
        let sink = match audio_type {
            #[cfg(feature = "wav")]
            AudioType::Wav => WriterSink::Wav(WavWriteHandler::create_file(path.as_ref(), format)?),
            #[cfg(feature = "wavpack")]
            AudioType::WavPack => {
                WriterSink::WavPack(WavPackWriteHandler::create_file(path.as_ref(), format)?)
            }
            other => return Err(no_writer_error(other)),
        };
        Ok(Self { sink, format })
    }

    /// 创建写入用户流的写入器
    pub fn to_stream(
        stream: Box<dyn WriteStream>,
        audio_type: AudioType,
        format: AudioDataFormat,
    ) -> AudioResult<Self> {
        format.validate_for_write()?;
        let io = WriteStreamIo::new(stream);
        let sink = match audio_type {
            #[cfg(feature = "wav")]
            AudioType::Wav => WriterSink::Wav(WavWriteHandler::create_stream(io, format)?),
            #[cfg(feature = "wavpack")]
            AudioType::WavPack => {
                WriterSink::WavPack(WavPackWriteHandler::create_stream(io, format)?)
            }
            other => return Err(no_writer_error(other)),
        };
        Ok(Self { sink, format })
    }

    pub fn format(&self) -> AudioDataFormat {
        self.format
    }

    /// 按块拉取并写入 `format.num_frames` 帧，随后终结容器
    ///
    /// 写入错误时也尽力终结容器，原始错误优先返回。
    pub fn write(self, callbacks: &mut WriteCallbacks<'_>, chunk_size: u32) -> AudioResult<()> {
        let AudioWriter { mut sink, format } = self;
        let channels = format.channels_usize();
        let chunk_frames = chunk_size.max(1) as usize;
        let mut buf = vec![0.0f32; chunk_frames * channels];
        let mut frame: u64 = 0;
        let mut aborted = false;

        while frame < format.num_frames {
            if (callbacks.should_abort)() {
                aborted = true;
                break;
            }
            let want = (format.num_frames - frame).min(chunk_frames as u64) as usize;
            (callbacks.get_next_chunk)(&mut buf[..want * channels], frame);
            if let Err(e) = sink.write_frames(&buf[..want * channels]) {
                let _ = sink.finalize();
                return Err(e);
            }
            frame += want as u64;
        }

        if aborted {
            debug!(frame, "写入在第{frame}帧处被调用方中止，容器照常终结");
        }
        sink.finalize()
    }
}
