//! # 帧结构模块
//!
//! 一帧由固定大小的头部块和若干负载块组成：
//!
//! ```text
//! 头部 (32 字节): [major, minor, patch, len(4 字节大端序), 保留 (25 字节, 全 0)]
//! 负载: 每块 32 字节，最后一块可以更短
//! ```

use crate::chunk::ChunkCodec;
use crate::constants::{
    CHUNK_SIZE, HEADER_LENGTH_OFFSET, HEADER_RESERVED_OFFSET, HEADER_SIZE, VERSION_MAJOR,
    VERSION_MINOR, VERSION_PATCH,
};
use crate::error::{Result, StegError};
use std::fmt;
use std::io::{self, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const CURRENT: Version = Version {
        major: VERSION_MAJOR,
        minor: VERSION_MINOR,
        patch: VERSION_PATCH,
    };
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}.{:02}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: Version,
    pub payload_len: u32,
}

impl FrameHeader {
    pub fn new(payload_len: u32) -> Self {
        Self {
            version: Version::CURRENT,
            payload_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.version.major;
        out[1] = self.version.minor;
        out[2] = self.version.patch;
        out[HEADER_LENGTH_OFFSET..HEADER_RESERVED_OFFSET].copy_from_slice(&self.payload_len.to_be_bytes());
        out
    }

    /// 解析头部块。
    ///
    /// # Errors
    ///
    /// 长度不足或保留字节非零时返回 `StegError::Format`。
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(StegError::Format(format!(
                "header must be {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        if bytes[HEADER_RESERVED_OFFSET..].iter().any(|&b| b != 0) {
            return Err(StegError::Format(
                "the hidden header is not valid. The image may not contain hidden data, or the settings do not match the ones used to hide it".to_string(),
            ));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[HEADER_LENGTH_OFFSET..HEADER_RESERVED_OFFSET]);
        Ok(Self {
            version: Version {
                major: bytes[0],
                minor: bytes[1],
                patch: bytes[2],
            },
            payload_len: u32::from_be_bytes(len),
        })
    }
}

/// 一帧的读写统计。写入时只填 `payload_bytes` 与 `chunks`，纠错计数来自读取。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub payload_bytes: u64,
    pub chunks: u64,
    pub corrected_errors: u64,
    pub uncorrectable_chunks: u64,
}

/// 先写头部块，再把 `source` 按块写完。
///
/// # Errors
///
/// * 地址池耗尽时返回 `StegError::PoolExhausted`。
/// * 读取 `source` 失败，或其长度与头部声明不符时返回 `StegError::Io`。
pub fn write_frame<R: Read>(
    codec: &mut ChunkCodec,
    samples: &mut [u16],
    header: &FrameHeader,
    source: &mut R,
    source_name: &str,
) -> Result<FrameStats> {
    log::info!("Writing steg header...");
    codec.encode(samples, &header.to_bytes())?;

    log::info!("Writing file data...");
    let mut stats = FrameStats::default();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = fill_chunk(source, &mut buf).map_err(|e| StegError::io(source_name, e))?;
        if n == 0 {
            break;
        }
        if stats.payload_bytes + n as u64 > header.payload_len as u64 {
            return Err(short_source(source_name, "grew while it was being hidden"));
        }
        codec.encode(samples, &buf[..n])?;
        stats.payload_bytes += n as u64;
        stats.chunks += 1;
    }
    if stats.payload_bytes != header.payload_len as u64 {
        return Err(short_source(source_name, "shrank while it was being hidden"));
    }
    Ok(stats)
}

/// 读取头部块并解析。
///
/// # Errors
///
/// 地址池耗尽或头部格式无效时返回错误。
pub fn read_header(codec: &mut ChunkCodec, samples: &[u16]) -> Result<FrameHeader> {
    let chunk = codec.decode(samples, HEADER_SIZE)?;
    log::trace!("Encoded header: {:02x?}", chunk.bytes);
    FrameHeader::parse(&chunk.bytes)
}

/// 按头部声明的长度逐块读出负载并写入 `sink`。
///
/// # Errors
///
/// 地址池耗尽或写入 `sink` 失败时返回错误。
pub fn read_payload<W: Write>(
    codec: &mut ChunkCodec,
    samples: &[u16],
    header: &FrameHeader,
    sink: &mut W,
    sink_name: &str,
) -> Result<FrameStats> {
    let mut stats = FrameStats::default();
    let total = header.payload_len as u64;
    while stats.payload_bytes < total {
        let n = (total - stats.payload_bytes).min(CHUNK_SIZE as u64) as usize;
        let chunk = codec.decode(samples, n)?;
        sink.write_all(&chunk.bytes)
            .map_err(|e| StegError::io(sink_name, e))?;
        stats.payload_bytes += n as u64;
        stats.chunks += 1;
        stats.corrected_errors += chunk.corrected_errors as u64;
        stats.uncorrectable_chunks += u64::from(chunk.uncorrectable);
    }
    sink.flush().map_err(|e| StegError::io(sink_name, e))?;
    Ok(stats)
}

/// 尽量填满 `buf`，只有到达末尾时才会返回少于 `buf.len()` 的字节数。
fn fill_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn short_source(name: &str, what: &str) -> StegError {
    StegError::io(
        name,
        io::Error::new(io::ErrorKind::UnexpectedEof, format!("the payload {}", what)),
    )
}
