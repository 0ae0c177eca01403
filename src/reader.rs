//! 读取器门面
//!
//! 懒探测 + 首次成功即提交：头部在第一次需要时按尝试顺序探测，
//! 提交后所有读取都走选中的处理器。二进制提示走独立的字节路径。

use crate::error::{AudioError, AudioResult, header_not_read};
use crate::format::{AudioDataFormat, AudioType, TypeHint};
use crate::handlers::HandlerRegistry;
use crate::handlers::binary::BinaryHandler;
use crate::source::{ReadStream, Source};
use crate::streamer::AudioStreamer;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 分块读取回调
///
/// `return_chunk(first_frame_index, samples)` 收到交错f32样本；
/// 块的帧下标从0起严格递增、无间隙无重叠，末块可以不满。
/// 每块回调前先询问 `should_abort`，返回true则干净停止（非错误）。
pub struct ReadCallbacks<'a> {
    pub should_abort: &'a mut dyn FnMut() -> bool,
    pub return_chunk: &'a mut dyn FnMut(u64, &[f32]),
}

/// 二进制数据的分块读取回调（原始字节）
pub struct RawReadCallbacks<'a> {
    pub should_abort: &'a mut dyn FnMut() -> bool,
    pub return_chunk: &'a mut dyn FnMut(u64, &[u8]),
}

enum ReaderKind {
    Binary(BinaryHandler),
    Typed {
        registry: HandlerRegistry,
        hint: TypeHint,
        active: Option<usize>,
    },
}

/// 格式无关的音频读取器
pub struct AudioReader {
    kind: ReaderKind,
    format: Option<AudioDataFormat>,
    streaming: bool,
}

impl AudioReader {
    fn with_source(source: Source, hint: TypeHint) -> Self {
        let kind = match hint {
            TypeHint::Binary => ReaderKind::Binary(BinaryHandler::new(source)),
            _ => ReaderKind::Typed {
                registry: HandlerRegistry::new(&source),
                hint,
                active: None,
            },
        };
        Self {
            kind,
            format: None,
            streaming: false,
        }
    }

    /// 从文件路径创建读取器（构造不做I/O，探测延迟到首次读取）
    pub fn open(path: impl Into<PathBuf>, hint: TypeHint) -> Self {
        Self::with_source(Source::File(path.into()), hint)
    }

    /// 从内存字节创建读取器
    pub fn from_memory(bytes: impl Into<Arc<[u8]>>, hint: TypeHint) -> Self {
        Self::with_source(Source::Memory(bytes.into()), hint)
    }

    /// 从用户自定义流创建读取器（流必须支持回绕）
    pub fn from_stream(stream: Box<dyn ReadStream>, hint: TypeHint) -> Self {
        Self::with_source(Source::Stream(Arc::new(Mutex::new(stream))), hint)
    }

    /// 设置二进制帧大小（仅二进制读取器；默认1字节）
    pub fn set_binary_frame_size(&mut self, frame_size: u32) -> AudioResult<()> {
        match &mut self.kind {
            ReaderKind::Binary(h) => {
                h.set_frame_size(frame_size)?;
                self.format = None;
                Ok(())
            }
            ReaderKind::Typed { .. } => Err(AudioError::InvalidInput(
                "帧大小仅对二进制读取器有意义".to_string(),
            )),
        }
    }

    /// 读取头部：按尝试顺序探测，首个成功的格式被提交并缓存
    ///
    /// 重复调用直接返回缓存结果。全部探测失败返回格式无法识别。
    pub fn read_header(&mut self) -> AudioResult<AudioDataFormat> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        match &mut self.kind {
            ReaderKind::Binary(h) => {
                let format = h.read_header()?;
                self.format = Some(format);
                Ok(format)
            }
            ReaderKind::Typed {
                registry,
                hint,
                active,
            } => {
                for index in registry.attempt_order(*hint) {
                    let audio_type = registry.handler_type(index);
                    debug!(%audio_type, "尝试探测格式");
                    match registry.handler_mut(index).try_read_header() {
                        Ok(format) => {
                            debug!(%audio_type, ?format, "探测成功，提交该格式");
                            *active = Some(index);
                            self.format = Some(format);
                            return Ok(format);
                        }
                        Err(e) => {
                            debug!(%audio_type, error = %e, "探测失败，尝试下一格式");
                        }
                    }
                }
                Err(AudioError::FormatError(
                    "File format not recognized / 无法识别的文件格式".to_string(),
                ))
            }
        }
    }

    // ========== 格式信息访问（头部读取之前返回状态错误） ==========

    pub fn format(&self) -> AudioResult<AudioDataFormat> {
        self.format.ok_or_else(header_not_read)
    }

    /// 已提交的音频类型
    pub fn audio_type(&self) -> AudioResult<AudioType> {
        if self.format.is_none() {
            return Err(header_not_read());
        }
        match &self.kind {
            ReaderKind::Binary(_) => Ok(AudioType::Binary),
            ReaderKind::Typed {
                registry, active, ..
            } => active
                .map(|index| registry.handler_type(index))
                .ok_or_else(header_not_read),
        }
    }

    pub fn num_frames(&self) -> AudioResult<u64> {
        Ok(self.format()?.num_frames)
    }

    pub fn num_channels(&self) -> AudioResult<u16> {
        Ok(self.format()?.num_channels)
    }

    pub fn sample_rate(&self) -> AudioResult<u32> {
        Ok(self.format()?.sample_rate)
    }

    pub fn bit_depth(&self) -> AudioResult<u16> {
        Ok(self.format()?.bit_depth)
    }

    pub fn frame_size(&self) -> AudioResult<u32> {
        Ok(self.format()?.frame_size)
    }

    // ========== 整体分块读取 ==========

    /// 分块读取全部帧（交错f32）
    ///
    /// 未读头部时先隐式执行 [`read_header`](Self::read_header)。
    pub fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let format = self.read_header()?;
        match &mut self.kind {
            ReaderKind::Binary(_) => Err(AudioError::InvalidInput(
                "二进制数据请使用read_raw_frames".to_string(),
            )),
            ReaderKind::Typed {
                registry, active, ..
            } => match *active {
                Some(index) => registry
                    .handler_mut(index)
                    .read_frames(callbacks, &format, chunk_size),
                None => Err(header_not_read()),
            },
        }
    }

    /// 分块读取全部帧（原始字节，仅二进制读取器）
    pub fn read_raw_frames(
        &mut self,
        callbacks: &mut RawReadCallbacks<'_>,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let format = self.read_header()?;
        match &mut self.kind {
            ReaderKind::Binary(h) => h.read_raw_frames(callbacks, &format, chunk_size),
            ReaderKind::Typed { .. } => Err(AudioError::InvalidInput(
                "类型化音频请使用read_frames".to_string(),
            )),
        }
    }

    // ========== 流式会话 ==========

    /// 打开流式会话（必要时先探测提交）；重复打开是状态错误
    pub fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        if self.streaming {
            return Err(AudioError::StateError("流已打开".to_string()));
        }
        self.read_header()?;
        let format = match &mut self.kind {
            ReaderKind::Binary(h) => h.stream_open()?,
            ReaderKind::Typed {
                registry, active, ..
            } => match *active {
                Some(index) => registry.handler_mut(index).stream_open()?,
                None => return Err(header_not_read()),
            },
        };
        self.format = Some(format);
        self.streaming = true;
        Ok(format)
    }

    /// 从打开的流读取交错f32，返回帧数；小于请求数表示流结束
    pub fn stream_read(&mut self, out: &mut [f32]) -> AudioResult<u32> {
        if !self.streaming {
            return Err(AudioError::StateError("流未打开".to_string()));
        }
        match &mut self.kind {
            ReaderKind::Binary(_) => Err(AudioError::InvalidInput(
                "二进制数据请使用stream_read_raw".to_string(),
            )),
            ReaderKind::Typed {
                registry, active, ..
            } => match *active {
                Some(index) => Ok(registry.handler_mut(index).stream_read(out)? as u32),
                None => Err(header_not_read()),
            },
        }
    }

    /// 从打开的流读取原始字节（仅二进制），返回帧数
    pub fn stream_read_raw(&mut self, out: &mut [u8]) -> AudioResult<u32> {
        if !self.streaming {
            return Err(AudioError::StateError("流未打开".to_string()));
        }
        match &mut self.kind {
            ReaderKind::Binary(h) => Ok(h.stream_read(out)? as u32),
            ReaderKind::Typed { .. } => Err(AudioError::InvalidInput(
                "类型化音频请使用stream_read".to_string(),
            )),
        }
    }

    /// 流式seek到指定帧（二进制数据不支持）
    pub fn stream_seek(&mut self, frame: u64) -> AudioResult<()> {
        if !self.streaming {
            return Err(AudioError::StateError("流未打开".to_string()));
        }
        match &mut self.kind {
            ReaderKind::Binary(h) => h.stream_seek(frame),
            ReaderKind::Typed {
                registry, active, ..
            } => match *active {
                Some(index) => registry.handler_mut(index).stream_seek(frame),
                None => Err(header_not_read()),
            },
        }
    }

    /// 关闭流式会话；未打开或重复关闭是状态错误
    pub fn stream_close(&mut self) -> AudioResult<()> {
        if !self.streaming {
            return Err(AudioError::StateError("流未打开，无法关闭".to_string()));
        }
        let result = match &mut self.kind {
            ReaderKind::Binary(h) => h.stream_close(),
            ReaderKind::Typed {
                registry, active, ..
            } => match *active {
                Some(index) => registry.handler_mut(index).stream_close(),
                None => Err(header_not_read()),
            },
        };
        self.streaming = false;
        result
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// 打开流式会话并返回借用本读取器的会话对象
    pub fn streamer(&mut self) -> AudioResult<AudioStreamer<'_>> {
        self.stream_open()?;
        Ok(AudioStreamer::new(self))
    }
}
