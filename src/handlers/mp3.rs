//! MP3处理器
//!
//! symphonia MpaReader 的薄封装。MP3不携带位深元数据，按解码精度
//! 报告16位；symphonia未报告帧数时记为0，读取按未知长度策略处理。

use crate::error::{AudioError, AudioResult};
use crate::format::AudioDataFormat;
use crate::handlers::generic::{SymphoniaKind, SymphoniaStream, frame_reader_loop};
use crate::reader::ReadCallbacks;
use crate::source::Source;

pub(crate) struct Mp3Handler {
    source: Source,
    stream: Option<SymphoniaStream>,
}

impl Mp3Handler {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            stream: None,
        }
    }

    pub(crate) fn try_read_header(&mut self) -> AudioResult<AudioDataFormat> {
        let stream = SymphoniaStream::open(SymphoniaKind::Mp3, self.source.open()?)?;
        Ok(stream.format())
    }

    pub(crate) fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let mut stream = SymphoniaStream::open(SymphoniaKind::Mp3, self.source.open()?)?;
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
        let stream = SymphoniaStream::open(SymphoniaKind::Mp3, self.source.open()?)?;
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
