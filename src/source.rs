//! 输入源与输出目标适配模块
//!
//! 将文件路径、内存字节和用户自定义流统一适配为 `Read + Seek`，
//! 供各格式处理器复用。探测可能反复从头读取，因此适配器必须支持
//! 回绕（rewind）；用户流通过位置跟踪实现 `Current` 相对seek。

use crate::error::{AudioError, AudioResult};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// seek基准点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
}

/// 用户自定义读取流
///
/// `seek` 返回是否成功；`read_bytes` 返回实际读取的字节数，
/// 返回值小于缓冲区长度表示数据结束。
pub trait ReadStream: Send {
    fn seek(&mut self, origin: SeekOrigin, offset: i64) -> bool;
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize;
}

/// 用户自定义写入流
pub trait WriteStream: Send {
    fn seek(&mut self, origin: SeekOrigin, offset: i64) -> bool;
    fn write_bytes(&mut self, buf: &[u8]) -> usize;
}

/// 读取端输入源
///
/// 可克隆：每次探测/读取通过 [`Source::open`] 获得独立的读取游标，
/// 用户流在多次打开之间共享底层对象并回绕到起始位置。
#[derive(Clone)]
pub(crate) enum Source {
    File(PathBuf),
    Memory(Arc<[u8]>),
    Stream(Arc<Mutex<Box<dyn ReadStream>>>),
}

impl Source {
    /// 打开一个从头开始的读取游标
    pub(crate) fn open(&self) -> AudioResult<SourceIo> {
        match self {
            Source::File(path) => Ok(SourceIo::File(BufReader::new(File::open(path)?))),
            Source::Memory(bytes) => Ok(SourceIo::Memory(Cursor::new(bytes.clone()))),
            Source::Stream(inner) => {
                if !lock_stream(inner).seek(SeekOrigin::Start, 0) {
                    return Err(AudioError::IoError(io::Error::new(
                        io::ErrorKind::Other,
                        "用户流回绕失败",
                    )));
                }
                Ok(SourceIo::Stream(StreamIo {
                    inner: inner.clone(),
                    pos: 0,
                }))
            }
        }
    }

    /// 源的总字节数（用户流无法预知长度）
    pub(crate) fn byte_len(&self) -> Option<u64> {
        match self {
            Source::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            Source::Memory(bytes) => Some(bytes.len() as u64),
            Source::Stream(_) => None,
        }
    }

}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::File(path) => f.debug_tuple("File").field(path).finish(),
            Source::Memory(bytes) => f.debug_tuple("Memory").field(&bytes.len()).finish(),
            Source::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// 锁中毒时继续使用内部数据（流状态由调用侧的错误路径兜底）
fn lock_stream(inner: &Arc<Mutex<Box<dyn ReadStream>>>) -> MutexGuard<'_, Box<dyn ReadStream>> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// 统一的读取游标
pub(crate) enum SourceIo {
    File(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
    Stream(StreamIo),
}

/// 用户流的位置跟踪适配器
pub(crate) struct StreamIo {
    inner: Arc<Mutex<Box<dyn ReadStream>>>,
    pos: u64,
}

impl Read for SourceIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceIo::File(r) => r.read(buf),
            SourceIo::Memory(r) => r.read(buf),
            SourceIo::Stream(r) => {
                let n = lock_stream(&r.inner).read_bytes(buf);
                r.pos += n as u64;
                Ok(n)
            }
        }
    }
}

impl Seek for SourceIo {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceIo::File(r) => r.seek(pos),
            SourceIo::Memory(r) => r.seek(pos),
            SourceIo::Stream(r) => {
                let (origin, offset, new_pos) = match pos {
                    SeekFrom::Start(o) => (SeekOrigin::Start, o as i64, o as i64),
                    SeekFrom::Current(o) => (SeekOrigin::Current, o, r.pos as i64 + o),
                    SeekFrom::End(_) => {
                        return Err(io::Error::new(
                            io::ErrorKind::Unsupported,
                            "用户流不支持从末尾seek",
                        ));
                    }
                };
                if new_pos < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek到负偏移",
                    ));
                }
                if !lock_stream(&r.inner).seek(origin, offset) {
                    return Err(io::Error::new(io::ErrorKind::Other, "用户流seek失败"));
                }
                r.pos = new_pos as u64;
                Ok(r.pos)
            }
        }
    }
}

#[cfg(any(feature = "flac", feature = "mp3"))]
impl symphonia::core::io::MediaSource for SourceIo {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        match self {
            SourceIo::File(r) => r.get_ref().metadata().ok().map(|m| m.len()),
            SourceIo::Memory(r) => Some(r.get_ref().len() as u64),
            SourceIo::Stream(_) => None,
        }
    }
}

/// 用户写入流的 `Write + Seek` 适配器
pub(crate) struct WriteStreamIo {
    inner: Box<dyn WriteStream>,
    pos: u64,
}

impl WriteStreamIo {
    pub(crate) fn new(inner: Box<dyn WriteStream>) -> Self {
        Self { inner, pos: 0 }
    }
}

impl Write for WriteStreamIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write_bytes(buf);
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "用户流写入失败"));
        }
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for WriteStreamIo {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (origin, offset, new_pos) = match pos {
            SeekFrom::Start(o) => (SeekOrigin::Start, o as i64, o as i64),
            SeekFrom::Current(o) => (SeekOrigin::Current, o, self.pos as i64 + o),
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "用户流不支持从末尾seek",
                ));
            }
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek到负偏移"));
        }
        if !self.inner.seek(origin, offset) {
            return Err(io::Error::new(io::ErrorKind::Other, "用户流seek失败"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecStream {
        data: Vec<u8>,
        pos: usize,
    }

    impl ReadStream for VecStream {
        fn seek(&mut self, origin: SeekOrigin, offset: i64) -> bool {
            let base = match origin {
                SeekOrigin::Start => 0i64,
                SeekOrigin::Current => self.pos as i64,
            };
            let target = base + offset;
            if target < 0 || target as usize > self.data.len() {
                return false;
            }
            self.pos = target as usize;
            true
        }

        fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            n
        }
    }

    fn stream_source(data: Vec<u8>) -> Source {
        Source::Stream(Arc::new(Mutex::new(
            Box::new(VecStream { data, pos: 0 }) as Box<dyn ReadStream>
        )))
    }

    #[test]
    fn test_stream_io_read_and_seek() {
        let source = stream_source((0u8..16).collect());
        let mut io = source.open().unwrap();

        let mut buf = [0u8; 4];
        io.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        io.seek(SeekFrom::Current(4)).unwrap();
        io.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);

        io.seek(SeekFrom::Start(1)).unwrap();
        io.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_stream_reopen_rewinds() {
        let source = stream_source(vec![7, 8, 9]);
        let mut io = source.open().unwrap();
        let mut buf = [0u8; 2];
        io.read_exact(&mut buf).unwrap();
        drop(io);

        let mut io = source.open().unwrap();
        io.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [7, 8]);
    }

    #[test]
    fn test_memory_byte_len() {
        let source = Source::Memory(Arc::from(vec![0u8; 10].as_slice()));
        assert_eq!(source.byte_len(), Some(10));
        let source = stream_source(vec![0; 10]);
        assert_eq!(source.byte_len(), None);
    }

    #[test]
    fn test_end_seek_unsupported() {
        let source = stream_source(vec![0; 4]);
        let mut io = source.open().unwrap();
        assert!(io.seek(SeekFrom::End(0)).is_err());
    }
}
