//! 格式处理器与分发注册表
//!
//! 每个格式一个处理器，按cargo特性裁剪。探测顺序全库只有一张表：
//! 提示的格式优先，其后按 WAV > MP3 > FLAC > WavPack 的固定顺序，
//! 每个处理器至多尝试一次。

pub(crate) mod binary;
pub(crate) mod generic;

#[cfg(feature = "flac")]
pub(crate) mod flac;
#[cfg(feature = "mp3")]
pub(crate) mod mp3;
#[cfg(feature = "wav")]
pub(crate) mod wav;
#[cfg(feature = "wavpack")]
pub(crate) mod wavpack;

use crate::error::AudioResult;
use crate::format::{AudioDataFormat, AudioType, TypeHint};
use crate::reader::ReadCallbacks;
use crate::source::Source;

/// 类型化处理器的封闭分发枚举
pub(crate) enum TypedHandler {
    #[cfg(feature = "wav")]
    Wav(wav::WavHandler),
    #[cfg(feature = "mp3")]
    Mp3(mp3::Mp3Handler),
    #[cfg(feature = "flac")]
    Flac(flac::FlacHandler),
    #[cfg(feature = "wavpack")]
    WavPack(wavpack::WavPackHandler),
}

impl TypedHandler {
    pub(crate) fn audio_type(&self) -> AudioType {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(_) => AudioType::Wav,
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(_) => AudioType::Mp3,
            #[cfg(feature = "flac")]
            TypedHandler::Flac(_) => AudioType::Flac,
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(_) => AudioType::WavPack,
        }
    }

    pub(crate) fn try_read_header(&mut self) -> AudioResult<AudioDataFormat> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.try_read_header(),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.try_read_header(),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.try_read_header(),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.try_read_header(),
        }
    }

    pub(crate) fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.read_frames(callbacks, format, chunk_size),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.read_frames(callbacks, format, chunk_size),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.read_frames(callbacks, format, chunk_size),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.read_frames(callbacks, format, chunk_size),
        }
    }

    pub(crate) fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.stream_open(),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.stream_open(),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.stream_open(),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.stream_open(),
        }
    }

    pub(crate) fn stream_read(&mut self, out: &mut [f32]) -> AudioResult<usize> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.stream_read(out),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.stream_read(out),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.stream_read(out),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.stream_read(out),
        }
    }

    pub(crate) fn stream_seek(&mut self, frame: u64) -> AudioResult<()> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.stream_seek(frame),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.stream_seek(frame),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.stream_seek(frame),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.stream_seek(frame),
        }
    }

    pub(crate) fn stream_close(&mut self) -> AudioResult<()> {
        match self {
            #[cfg(feature = "wav")]
            TypedHandler::Wav(h) => h.stream_close(),
            #[cfg(feature = "mp3")]
            TypedHandler::Mp3(h) => h.stream_close(),
            #[cfg(feature = "flac")]
            TypedHandler::Flac(h) => h.stream_close(),
            #[cfg(feature = "wavpack")]
            TypedHandler::WavPack(h) => h.stream_close(),
        }
    }
}

/// 处理器注册表
///
/// 构造时按规范顺序装入全部已启用的处理器，`attempt_order`
/// 把类型提示折算成一次性的探测序列。
pub(crate) struct HandlerRegistry {
    handlers: Vec<TypedHandler>,
}

impl HandlerRegistry {
    pub(crate) fn new(source: &Source) -> Self {
        let _ = &source;
        let mut handlers = Vec::new();
        #[cfg(feature = "wav")]
        handlers.push(TypedHandler::Wav(wav::WavHandler::new(source.clone())));
        #[cfg(feature = "mp3")]
        handlers.push(TypedHandler::Mp3(mp3::Mp3Handler::new(source.clone())));
        #[cfg(feature = "flac")]
        handlers.push(TypedHandler::Flac(flac::FlacHandler::new(source.clone())));
        #[cfg(feature = "wavpack")]
        handlers.push(TypedHandler::WavPack(wavpack::WavPackHandler::new(
            source.clone(),
        )));
        Self { handlers }
    }

    fn index_of(&self, audio_type: AudioType) -> Option<usize> {
        self.handlers
            .iter()
            .position(|h| h.audio_type() == audio_type)
    }

    /// 类型提示 → 探测序列（处理器下标）
    pub(crate) fn attempt_order(&self, hint: TypeHint) -> Vec<usize> {
        match hint {
            TypeHint::Any | TypeHint::Binary => (0..self.handlers.len()).collect(),
            TypeHint::Only(t) => self.index_of(t).into_iter().collect(),
            TypeHint::TryFirst(t) => match self.index_of(t) {
                Some(first) => {
                    let mut order = vec![first];
                    order.extend((0..self.handlers.len()).filter(|&i| i != first));
                    order
                }
                None => (0..self.handlers.len()).collect(),
            },
        }
    }

    pub(crate) fn handler_mut(&mut self, index: usize) -> &mut TypedHandler {
        &mut self.handlers[index]
    }

    pub(crate) fn handler_type(&self, index: usize) -> AudioType {
        self.handlers[index].audio_type()
    }
}
