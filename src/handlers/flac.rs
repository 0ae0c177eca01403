//! FLAC处理器
//!
//! symphonia FlacReader 的薄封装，解码管线见 generic::SymphoniaStream。

use crate::error::{AudioError, AudioResult};
use crate::format::AudioDataFormat;
use crate::handlers::generic::{SymphoniaKind, SymphoniaStream, frame_reader_loop};
use crate::reader::ReadCallbacks;
use crate::source::Source;

pub(crate) struct FlacHandler {
    source: Source,
    stream: Option<SymphoniaStream>,
}

impl FlacHandler {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            stream: None,
        }
    }

    pub(crate) fn try_read_header(&mut self) -> AudioResult<AudioDataFormat> {
        let stream = SymphoniaStream::open(SymphoniaKind::Flac, self.source.open()?)?;
        Ok(stream.format())
    }

    pub(crate) fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let mut stream = SymphoniaStream::open(SymphoniaKind::Flac, self.source.open()?)?;
        frame_reader_loop(
            callbacks,
            format.num_frames,
            format.channels_usize(),
            chunk_size,
            |buf| stream.read(buf),
        )
    }

    pub(crate) fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        if self.stream.is_some() {
            return Err(AudioError::StateError("流已打开".to_string()));
        }
        let stream = SymphoniaStream::open(SymphoniaKind::Flac, self.source.open()?)?;
        let format = stream.format();
        self.stream = Some(stream);
        Ok(format)
    }

    pub(crate) fn stream_read(&mut self, out: &mut [f32]) -> AudioResult<usize> {
        self.stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?
            .read(out)
    }

    pub(crate) fn stream_seek(&mut self, frame: u64) -> AudioResult<()> {
        self.stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?
            .seek(frame)
    }

    pub(crate) fn stream_close(&mut self) -> AudioResult<()> {
        if self.stream.take().is_none() {
            return Err(AudioError::StateError("流未打开，无法关闭".to_string()));
        }
        Ok(())
    }
}
