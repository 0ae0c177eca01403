//! 统一错误处理框架
//!
//! 库内所有可失败操作的错误类型定义。探测失败（格式不匹配）属于
//! 可恢复错误，由分发层逐个吞掉；其余错误一律通过 `?` 向调用方传播。

use std::io;
use thiserror::Error;

/// 音频读写相关的统一错误类型
#[derive(Debug, Error)]
pub enum AudioError {
    /// 输入验证错误（非法参数、API误用）
    #[error("输入验证失败: {0}")]
    InvalidInput(String),

    /// 文件I/O错误
    #[error("文件I/O错误: {0}")]
    IoError(#[from] io::Error),

    /// 音频格式错误（格式无法识别、头部损坏等）
    #[error("音频格式错误: {0}")]
    FormatError(String),

    /// 解码/编码错误
    #[error("音频解码失败: {0}")]
    DecodingError(String),

    /// 状态错误（头部未读取、流未打开、重复打开/关闭等）
    #[error("状态错误: {0}")]
    StateError(String),

    /// 不支持的操作（二进制seek、缺失的写入器等）
    #[error("不支持的操作: {0}")]
    UnsupportedOperation(String),

    /// 资源访问错误（子进程桥接失败等）
    #[error("资源访问错误: {0}")]
    ResourceError(String),
}

#[cfg(any(feature = "wav", feature = "wavpack"))]
impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => AudioError::IoError(e),
            other => AudioError::DecodingError(format!("WAV解码错误: {other}")),
        }
    }
}

/// 音频读写操作的标准Result类型
pub type AudioResult<T> = Result<T, AudioError>;

// ==================== 错误构造Helper函数 ====================
// 消除重复的 .map_err(|e| AudioError::XXX(format!(...))) 模式

/// 创建格式错误的helper函数
#[inline]
pub fn format_error<E: std::fmt::Display>(context: &str, err: E) -> AudioError {
    AudioError::FormatError(format!("{context}: {err}"))
}

/// 创建解码错误的helper函数
#[inline]
pub fn decoding_error<E: std::fmt::Display>(context: &str, err: E) -> AudioError {
    AudioError::DecodingError(format!("{context}: {err}"))
}

/// 头部尚未读取时访问格式信息的标准错误
#[inline]
pub(crate) fn header_not_read() -> AudioError {
    AudioError::StateError(
        "Failed to get audio data format (The header has not been read yet) / 头部尚未读取"
            .to_string(),
    )
}
