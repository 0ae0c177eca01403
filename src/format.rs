//! 音频格式信息模块
//!
//! 定义音频类型、存储类型、数据格式与类型提示等核心数据结构。

use crate::error::{AudioError, AudioResult};

/// 类型化音频格式的帧元素大小（每声道一个f32样本）
pub const TYPED_FRAME_SIZE: u32 = 4;

/// 支持的音频类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioType {
    /// 原始字节数据（无容器结构）
    Binary,
    Wav,
    Flac,
    Mp3,
    WavPack,
}

impl AudioType {
    /// 该类型的惯用文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            AudioType::Binary => "bin",
            AudioType::Wav => "wav",
            AudioType::Flac => "flac",
            AudioType::Mp3 => "mp3",
            AudioType::WavPack => "wv",
        }
    }
}

impl std::fmt::Display for AudioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AudioType::Binary => "Binary",
            AudioType::Wav => "WAV",
            AudioType::Flac => "FLAC",
            AudioType::Mp3 => "MP3",
            AudioType::WavPack => "WavPack",
        };
        write!(f, "{name}")
    }
}

/// 样本存储方式
///
/// 读取侧由探测结果填充；写入侧由调用方指定，决定编码路径。
/// `NormalizedFloat` 表示 [-1.0, 1.0] 归一化浮点；`Float` 表示
/// 不做归一化的浮点直通（WavPack浮点模式）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    Default,
    Int,
    Float,
    NormalizedFloat,
}

/// 音频数据格式
///
/// 类型化格式的 `frame_size` 恒为4（f32）；二进制数据的 `frame_size`
/// 由调用方设定（默认1），且声道数/采样率/位深均为0。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioDataFormat {
    /// 单帧字节数
    pub frame_size: u32,
    pub num_channels: u16,
    pub num_frames: u64,
    pub sample_rate: u32,
    /// 源格式位深（8/16/24/32）
    pub bit_depth: u16,
    pub storage_type: StorageType,
}

impl AudioDataFormat {
    /// 创建类型化格式（frame_size固定为4）
    pub fn typed(
        num_channels: u16,
        num_frames: u64,
        sample_rate: u32,
        bit_depth: u16,
        storage_type: StorageType,
    ) -> Self {
        Self {
            frame_size: TYPED_FRAME_SIZE,
            num_channels,
            num_frames,
            sample_rate,
            bit_depth,
            storage_type,
        }
    }

    /// 创建二进制格式（字节长度向下取整为整帧）
    pub fn binary(frame_size: u32, byte_len: u64) -> Self {
        Self {
            frame_size,
            num_channels: 0,
            num_frames: if frame_size == 0 {
                0
            } else {
                byte_len / frame_size as u64
            },
            sample_rate: 0,
            bit_depth: 0,
            storage_type: StorageType::Default,
        }
    }

    /// 获取持续时长（秒）
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.num_frames as f64 / self.sample_rate as f64
        }
    }

    /// 获取声道数（usize类型），用于数组索引和循环边界
    pub fn channels_usize(&self) -> usize {
        self.num_channels as usize
    }

    /// 验证写入参数的有效性
    pub fn validate_for_write(&self) -> AudioResult<()> {
        if self.num_channels == 0 {
            return Err(AudioError::InvalidInput("声道数不能为0".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidInput("采样率不能为0".to_string()));
        }
        if ![8, 16, 24, 32].contains(&self.bit_depth) {
            return Err(AudioError::InvalidInput(format!(
                "不支持的位深度: {}位（仅支持 8/16/24/32）",
                self.bit_depth
            )));
        }
        if matches!(
            self.storage_type,
            StorageType::Float | StorageType::NormalizedFloat
        ) && self.bit_depth != 32
        {
            return Err(AudioError::InvalidInput(format!(
                "浮点存储要求32位位深，实际为{}位",
                self.bit_depth
            )));
        }
        Ok(())
    }
}

/// 读取时的类型提示
///
/// 控制格式探测的尝试顺序与范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    /// 按规范顺序尝试全部已启用的格式
    #[default]
    Any,
    /// 按原始字节处理，不做探测
    Binary,
    /// 优先尝试指定格式，失败后回退到规范顺序
    TryFirst(AudioType),
    /// 仅尝试指定格式
    Only(AudioType),
}
