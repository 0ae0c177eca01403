//! macinmeter-audio-io - 格式无关的音频样本读写库
//!
//! 以统一的f32交错样本视图读写 WAV / FLAC / MP3 / WavPack 音频与
//! 原始二进制数据。格式识别采用探测-提交策略：按提示优先、
//! 其后 WAV > MP3 > FLAC > WavPack 的固定顺序逐个试读头部，
//! 首个成功的格式接管全部后续读取。
//!
//! # 主要入口
//!
//! - [`AudioReader`]：文件/内存/用户流的分块回调读取与流式会话
//! - [`AudioWriter`]：WAV与WavPack写入（中止也会终结容器）
//! - [`convert`]：整数PCM与归一化f32转换、交错/去交错
//!
//! # 示例
//!
//! ```no_run
//! use macinmeter_audio_io::{AudioReader, AudioResult, TypeHint};
//!
//! fn total_energy(path: &str) -> AudioResult<f64> {
//!     let mut reader = AudioReader::open(path, TypeHint::Any);
//!     let mut energy = 0.0f64;
//!     let mut abort = || false;
//!     let mut collect = |_frame: u64, samples: &[f32]| {
//!         energy += samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
//!     };
//!     reader.read_frames(
//!         &mut macinmeter_audio_io::ReadCallbacks {
//!             should_abort: &mut abort,
//!             return_chunk: &mut collect,
//!         },
//!         4096,
//!     )?;
//!     Ok(energy)
//! }
//! ```

#[cfg(not(any(
    feature = "wav",
    feature = "flac",
    feature = "mp3",
    feature = "wavpack"
)))]
compile_error!("至少需要启用一个格式特性: wav / flac / mp3 / wavpack");

pub mod convert;

mod error;
mod format;
mod handlers;
mod reader;
mod source;
mod streamer;
mod writer;

pub use error::{AudioError, AudioResult};
pub use format::{AudioDataFormat, AudioType, StorageType, TYPED_FRAME_SIZE, TypeHint};
pub use reader::{AudioReader, RawReadCallbacks, ReadCallbacks};
pub use source::{ReadStream, SeekOrigin, WriteStream};
pub use streamer::AudioStreamer;
pub use writer::{AudioWriter, WriteCallbacks};

/// WavPack命令行工具（wavpack/wvunpack）是否可用
#[cfg(feature = "wavpack")]
pub fn wavpack_cli_available() -> bool {
    handlers::wavpack::is_available()
}
