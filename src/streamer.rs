//! 流式会话
//!
//! 可变借用读取器的RAII会话对象：会话存续期间读取器无法他用，
//! 生命周期由借用检查器保证。显式 `close` 暴露关闭错误；
//! 忘记关闭时 `Drop` 兜底（错误静默丢弃）。

use crate::error::AudioResult;
use crate::format::AudioDataFormat;
use crate::reader::AudioReader;

pub struct AudioStreamer<'r> {
    reader: &'r mut AudioReader,
}

impl<'r> AudioStreamer<'r> {
    pub(crate) fn new(reader: &'r mut AudioReader) -> Self {
        Self { reader }
    }

    pub fn format(&self) -> AudioResult<AudioDataFormat> {
        self.reader.format()
    }

    /// 读取交错f32，返回帧数；小于 `out.len() / channels` 表示流结束
    pub fn read_frames(&mut self, out: &mut [f32]) -> AudioResult<u32> {
        self.reader.stream_read(out)
    }

    /// 读取原始字节（仅二进制读取器），返回帧数
    pub fn read_raw(&mut self, out: &mut [u8]) -> AudioResult<u32> {
        self.reader.stream_read_raw(out)
    }

    /// seek到指定帧（二进制数据不支持）
    pub fn seek(&mut self, frame: u64) -> AudioResult<()> {
        self.reader.stream_seek(frame)
    }

    /// 显式关闭会话并返回关闭结果
    pub fn close(self) -> AudioResult<()> {
        self.reader.stream_close()
    }
}

impl Drop for AudioStreamer<'_> {
    fn drop(&mut self) {
        if self.reader.is_streaming() {
            let _ = self.reader.stream_close();
        }
    }
}
