//! WavPack桥接处理器
//!
//! 通过官方 wavpack/wvunpack 命令行工具的管道桥接实现WavPack读写：
//! 解码端 `wvunpack -q <in> -o -` 输出WAV流，由hound增量解析；
//! 编码端 `wavpack -q -y --raw-pcm=... - -o <out>` 从stdin接收原始PCM。
//! seek通过带 `--skip` 的重新启动实现。内存/用户流输入源先落盘为
//! 临时文件再交给子进程。所有退出路径（探测、错误、中止）都会回收子进程。

use crate::convert::{f32_to_int, pack_sample_le};
use crate::error::{AudioError, AudioResult, format_error};
use crate::format::{AudioDataFormat, StorageType};
use crate::handlers::generic::{frame_reader_loop, read_hound_frames};
use crate::reader::ReadCallbacks;
use crate::source::{Source, WriteStreamIo};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::debug;

/// WavPack安装指南（跨平台）
const WAVPACK_INSTALL_GUIDE: &str = r#"
The wavpack/wvunpack tools are required for WavPack support / 需要安装WavPack命令行工具以支持WavPack格式

Installation / 安装方法:
  macOS:   brew install wavpack
  Windows: https://www.wavpack.com/downloads.html
  Linux:
    - Ubuntu/Debian: sudo apt install wavpack
    - Fedora/RHEL:   sudo dnf install wavpack
    - Arch:          sudo pacman -S wavpack

Official site / 官方网站: https://www.wavpack.com/
"#;

/// 检测WavPack命令行工具是否可用
pub fn is_available() -> bool {
    find_tool("wavpack").is_some() && find_tool("wvunpack").is_some()
}

/// 查找WavPack可执行文件路径（跨平台）
fn find_tool(name: &str) -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let candidates = vec![
            PathBuf::from(format!("{name}.exe")), // PATH中
            PathBuf::from(format!(r"C:\Program Files\WavPack\{name}.exe")),
            std::env::current_exe()
                .ok()?
                .parent()?
                .join(format!("{name}.exe")),
        ];

        candidates.into_iter().find(|p| {
            Command::new(p)
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }

    #[cfg(not(target_os = "windows"))]
    {
        let path = PathBuf::from(name);
        if Command::new(&path)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            Some(path)
        } else {
            None
        }
    }
}

fn missing_tool_error() -> AudioError {
    AudioError::ResourceError(WAVPACK_INSTALL_GUIDE.to_string())
}

// ==================== 读取侧 ====================

/// 子进程输入文件：文件源直接复用，其余源落盘一次后复用
enum LocalInput {
    Direct(PathBuf),
    Spooled(tempfile::NamedTempFile),
}

impl LocalInput {
    fn path(&self) -> &Path {
        match self {
            LocalInput::Direct(path) => path,
            LocalInput::Spooled(tmp) => tmp.path(),
        }
    }
}

/// 解码子进程与其WAV输出解析器
struct WvStream {
    child: Child,
    reader: hound::WavReader<BufReader<ChildStdout>>,
}

impl Drop for WvStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// WavPack读取处理器
pub(crate) struct WavPackHandler {
    source: Source,
    local: Option<LocalInput>,
    stream: Option<WvStream>,
}

impl WavPackHandler {
    pub(crate) fn new(source: Source) -> Self {
        Self {
            source,
            local: None,
            stream: None,
        }
    }

    fn local_path(&mut self) -> AudioResult<PathBuf> {
        if self.local.is_none() {
            let local = match &self.source {
                Source::File(path) => LocalInput::Direct(path.clone()),
                _ => {
                    let mut io = self.source.open()?;
                    let mut tmp = tempfile::NamedTempFile::new()?;
                    std::io::copy(&mut io, tmp.as_file_mut())?;
                    debug!("输入源已落盘为临时文件供wvunpack使用");
                    LocalInput::Spooled(tmp)
                }
            };
            self.local = Some(local);
        }
        match &self.local {
            Some(local) => Ok(local.path().to_path_buf()),
            None => Err(AudioError::ResourceError("临时文件创建失败".to_string())),
        }
    }

    /// 启动wvunpack解码子进程，可选跳过前N帧
    fn spawn_unpack(path: &Path, skip: u64) -> AudioResult<WvStream> {
        let tool = find_tool("wvunpack").ok_or_else(missing_tool_error)?;

        let mut cmd = Command::new(tool);
        cmd.arg("-q");
        if skip > 0 {
            cmd.arg(format!("--skip={skip}"));
        }
        cmd.arg(path).args(["-o", "-"]);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AudioError::ResourceError(format!("无法启动wvunpack: {e}\n{WAVPACK_INSTALL_GUIDE}"))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AudioError::ResourceError("wvunpack标准输出不可用".to_string()))?;

        match hound::WavReader::new(BufReader::new(stdout)) {
            Ok(reader) => Ok(WvStream { child, reader }),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(format_error("WavPack头部探测失败（解码输出不是有效WAV）", e))
            }
        }
    }

    fn format_of(reader: &hound::WavReader<BufReader<ChildStdout>>) -> AudioDataFormat {
        let spec = reader.spec();
        let storage_type = match spec.sample_format {
            hound::SampleFormat::Float => StorageType::Float,
            hound::SampleFormat::Int => StorageType::Default,
        };
        AudioDataFormat::typed(
            spec.channels,
            reader.len() as u64 / spec.channels as u64,
            spec.sample_rate,
            spec.bits_per_sample,
            storage_type,
        )
    }

    pub(crate) fn try_read_header(&mut self) -> AudioResult<AudioDataFormat> {
        let path = self.local_path()?;
        let stream = Self::spawn_unpack(&path, 0)?;
        let format = Self::format_of(&stream.reader);
        drop(stream); // 子进程随之回收
        Ok(format)
    }

    pub(crate) fn read_frames(
        &mut self,
        callbacks: &mut ReadCallbacks<'_>,
        format: &AudioDataFormat,
        chunk_size: u32,
    ) -> AudioResult<()> {
        let path = self.local_path()?;
        let mut stream = Self::spawn_unpack(&path, 0)?;
        frame_reader_loop(
            callbacks,
            format.num_frames,
            format.channels_usize(),
            chunk_size,
            |buf| read_hound_frames(&mut stream.reader, buf),
        )
    }

    pub(crate) fn stream_open(&mut self) -> AudioResult<AudioDataFormat> {
        if self.stream.is_some() {
            return Err(AudioError::StateError("流已打开".to_string()));
        }
        let path = self.local_path()?;
        let stream = Self::spawn_unpack(&path, 0)?;
        let format = Self::format_of(&stream.reader);
        self.stream = Some(stream);
        Ok(format)
    }

    pub(crate) fn stream_read(&mut self, out: &mut [f32]) -> AudioResult<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AudioError::StateError("流未打开".to_string()))?;
        read_hound_frames(&mut stream.reader, out)
    }

    /// seek：回收当前子进程，带 `--skip` 重新启动
    pub(crate) fn stream_seek(&mut self, frame: u64) -> AudioResult<()> {
        if self.stream.take().is_none() {
            return Err(AudioError::StateError("流未打开".to_string()));
        }
        let path = self.local_path()?;
        self.stream = Some(Self::spawn_unpack(&path, frame)?);
        Ok(())
    }

    pub(crate) fn stream_close(&mut self) -> AudioResult<()> {
        if self.stream.take().is_none() {
            return Err(AudioError::StateError("流未打开，无法关闭".to_string()));
        }
        Ok(())
    }
}

// ==================== 写入侧 ====================

enum WvWriteDest {
    File,
    /// 先编码到临时.wv文件，终结时整体拷贝进用户流
    Stream {
        tmp: tempfile::NamedTempFile,
        out: WriteStreamIo,
    },
}

/// WavPack写入处理器
pub(crate) struct WavPackWriteHandler {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    dest: Option<WvWriteDest>,
    format: AudioDataFormat,
    byte_buf: Vec<u8>,
}

/// `--raw-pcm` 参数串：采样率,位深+s/u/f后缀,声道数（默认小端）
fn raw_pcm_spec(format: &AudioDataFormat) -> String {
    let suffix = match format.storage_type {
        StorageType::Float | StorageType::NormalizedFloat => "f",
        _ if format.bit_depth == 8 => "u",
        _ => "s",
    };
    format!(
        "--raw-pcm={},{}{},{}",
        format.sample_rate, format.bit_depth, suffix, format.num_channels
    )
}

impl WavPackWriteHandler {
    fn spawn_pack(out_path: &Path, format: &AudioDataFormat) -> AudioResult<(Child, ChildStdin)> {
        let tool = find_tool("wavpack").ok_or_else(missing_tool_error)?;

        let mut child = Command::new(tool)
            .args(["-q", "-y", &raw_pcm_spec(format), "-"])
            .arg("-o")
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AudioError::ResourceError(format!("无法启动wavpack: {e}\n{WAVPACK_INSTALL_GUIDE}"))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AudioError::ResourceError("wavpack标准输入不可用".to_string()))?;
        Ok((child, stdin))
    }

    pub(crate) fn create_file(path: &Path, format: AudioDataFormat) -> AudioResult<Self> {
        let (child, stdin) = Self::spawn_pack(path, &format)?;
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            dest: Some(WvWriteDest::File),
            format,
            byte_buf: Vec::new(),
        })
    }

    pub(crate) fn create_stream(out: WriteStreamIo, format: AudioDataFormat) -> AudioResult<Self> {
        let tmp = tempfile::Builder::new()
            .suffix(".wv")
            .tempfile()
            .map_err(AudioError::IoError)?;
        let (child, stdin) = Self::spawn_pack(tmp.path(), &format)?;
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            dest: Some(WvWriteDest::Stream { tmp, out }),
            format,
            byte_buf: Vec::new(),
        })
    }

    /// 写入一块交错样本（整数模式量化打包，浮点模式原样直通）
    pub(crate) fn write_frames(&mut self, samples: &[f32]) -> AudioResult<()> {
        self.byte_buf.clear();
        match self.format.storage_type {
            StorageType::Float | StorageType::NormalizedFloat => {
                for &v in samples {
                    self.byte_buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            _ => {
                let bytes_per_sample = (self.format.bit_depth / 8) as usize;
                for &v in samples {
                    pack_sample_le(
                        f32_to_int(v, self.format.bit_depth),
                        bytes_per_sample,
                        &mut self.byte_buf,
                    );
                }
            }
        }

        self.stdin
            .as_mut()
            .ok_or_else(|| AudioError::StateError("写入已终结".to_string()))?
            .write_all(&self.byte_buf)?;
        Ok(())
    }

    /// 终结编码：关闭stdin让子进程收尾写出头部；中止写入后也必须调用，
    /// 容器记录的是实际写入的帧数
    pub(crate) fn finalize(mut self) -> AudioResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(AudioError::ResourceError(format!(
                "wavpack编码进程退出异常: {status}"
            )));
        }

        if let Some(WvWriteDest::Stream { tmp, mut out }) = self.dest.take() {
            let mut encoded = std::fs::File::open(tmp.path())?;
            std::io::copy(&mut encoded, &mut out)?;
            out.flush()?;
        }
        Ok(())
    }
}

impl Drop for WavPackWriteHandler {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
