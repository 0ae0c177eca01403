//! 二进制处理器
//!
//! 按原始字节处理输入源：帧大小由调用方设定（默认1字节），
//! 帧数为字节长度向下取整，声道数/采样率/位深均为0。
//! 字节数据没有时间轴，流式seek不受支持。

use crate::error::{AudioError, AudioResult};
use crate::format::AudioDataFormat;
use crate::reader::RawReadCallbacks;
use crate::source::{Source, SourceIo};
use std::io::Read;

/// 二进制读取处理器
pub(crate) struct BinaryHandler {
    source: Source,
    frame_size: u32,
    stream: Option<SourceIo>,
}

impl BinaryHandler {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            frame_size: 1,
            stream: None,
        }
    }

    pub(crate) fn set_frame_size(&mut self, frame_size: u32) -> AudioResult<()> {
        if frame_size == 0 {
            return Err(AudioError::InvalidInput("帧大小不能为0".to_string()));
        }
        self.frame_size = frame_size;
        Ok(())
    }

    /// 头部信息由源字节长度导出；用户流长度未知时帧数记0
    pub(crate) fn read_header(&mut self) -> AudioResult<AudioDataFormat> {
        let byte_len = self.source.byte_len().unwrap_or(0);
        Ok(AudioDataFormat::binary(self.frame_size, byte_len))
    }

    pub(crate) fn read_raw_frames(
        &mut self,
        callbacks: &mut RawReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let frame_size = format.frame_size as usize;
        let chunk_frames = chunk_size.max(1) as usize;
        let known_length = format.num_frames > 0;
        let mut io = self.source.open()?;
        let mut buf = vec![0u8; chunk_frames * frame_size];
        let mut frame: u64 = 0;

        loop {
            if (callbacks.should_abort)() {
                tracing::debug!(frame, "二进制读取在第{frame}帧处被调用方中止");
                return Ok(());
            }

            let want = if known_length {
                let remaining = format.num_frames - frame;
                if remaining == 0 {
                    break;
                }
                remaining.min(chunk_frames as u64) as usize
            } else {
                chunk_frames
            };

            let bytes_read = read_full(&mut io, &mut buf[..want * frame_size])?;
            let got = bytes_read / frame_size;
            if known_length && got < want {
                return Err(AudioError::IoError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("第{frame}帧处期望{want}帧，实际{got}帧"),
                )));
            }
            if got == 0 {
                break;
            }

            (callbacks.return_chunk)(frame, &buf[..got * frame_size]);
            frame += got as u64;

            if !known_length && got < chunk_frames {
                break;
            }
        }

        Ok(())
    }

    pub(crate) fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        if self.stream.is_some() {
            return Err(AudioError::StateError("流已打开".to_string()));
        }
        let format = self.read_header()?;
        self.stream = Some(self.source.open()?);
        Ok(format)
    }

    /// 读取整帧字节，返回帧数；不足一帧的尾部字节被丢弃
    pub(crate) fn stream_read(&mut self, out: &mut [u8]) -> AudioResult<usize> {
        let frame_size = self.frame_size as usize;
        let io = self
            .stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?;
        let whole = out.len() / frame_size * frame_size;
        let bytes_read = read_full(io, &mut out[..whole])?;
        Ok(bytes_read / frame_size)
    }

    pub(crate) fn stream_seek(&mut self, _frame: u64) -> AudioResult<()> {
        Err(AudioError::UnsupportedOperation(
            "Can't seek binary data / 二进制数据不支持seek".to_string(),
        ))
    }

    pub(crate) fn stream_close(&mut self) -> AudioResult<()> {
        if self.stream.take().is_none() {
            return Err(AudioError::StateError("流未打开，无法关闭".to_string()));
        }
        Ok(())
    }
}

/// 尽量填满缓冲，仅在数据结束时返回不足
fn read_full(io: &mut SourceIo, buf: &mut [u8]) -> AudioResult<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match io.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AudioError::IoError(e)),
        }
    }
    Ok(filled)
}
