//! # 隐写核心流程
//!
//! `hide` 与 `dig` 按固定顺序组合各组件：
//! 通道映射 → 纠错码 → 容量规划 → 地址生成 → 帧 (头部 + 负载块)。
//! 两者都只在内存中的像素矩阵上工作，文件读写由 `handler` 负责。

use crate::addressor::Addressor;
use crate::capacity::CapacityPlanner;
use crate::chunk::{ChunkCodec, ecc_for_config};
use crate::config::StegConfig;
use crate::error::{Result, StegError};
use crate::frame::{self, FrameHeader, Version};
use crate::mapper::ChannelMapper;
use crate::pixels::PixelStore;
use std::io::{Read, Write};

/// 隐藏操作的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideReport {
    pub payload_bytes: u64,
    pub bits_written: u64,
    pub usable_bits: u64,
}

/// 提取操作的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigReport {
    pub header: FrameHeader,
    pub corrected_errors: u64,
    pub uncorrectable_chunks: u64,
}

/// 将 `payload` 的 `payload_len` 字节隐藏到像素矩阵中。
///
/// 失败时像素矩阵可能已被部分修改，调用方应将其丢弃。
///
/// # Errors
///
/// * 配置无效或负载超过 4 GiB 时返回 `StegError::Config`。
/// * 容量不足时返回 `StegError::InsufficientCapacity` 或 `StegError::PoolExhausted`。
/// * 读取负载失败时返回 `StegError::Io`。
pub fn hide<R: Read>(
    store: &mut PixelStore,
    payload: &mut R,
    payload_len: u64,
    config: &StegConfig,
    payload_name: &str,
) -> Result<HideReport> {
    let length = u32::try_from(payload_len).map_err(|_| {
        StegError::Config(format!(
            "the payload is {} bytes, but at most {} bytes can be described by the header",
            payload_len,
            u32::MAX
        ))
    })?;

    let mapper = ChannelMapper::new(store.format(), config)?;
    let ecc = ecc_for_config(config)?;
    let planner = CapacityPlanner::new(&mapper, store.samples(), store.pixel_count(), ecc.as_ref());
    log::debug!("Maximum writable bits: {}", planner.usable_bits());
    log::debug!("Input file size: {} B", payload_len);
    planner.check(payload_len)?;

    let addressor = Addressor::new(config.algorithm, config.seed, planner.total_addressable_bits());
    log::debug!("Addressing {} bits with the {} algorithm", addressor.total(), config.algorithm);
    let mut codec = ChunkCodec::new(addressor, mapper, ecc);

    log::info!("Encoding the file into the image...");
    let header = FrameHeader::new(length);
    let stats = frame::write_frame(&mut codec, store.samples_mut(), &header, payload, payload_name)?;

    Ok(HideReport {
        payload_bytes: stats.payload_bytes,
        bits_written: codec.bits_placed(),
        usable_bits: planner.usable_bits(),
    })
}

/// 从像素矩阵中提取隐藏的负载并写入 `sink`。
///
/// # Errors
///
/// * 头部无效或声明的长度超出图像容量时返回 `StegError::Format`。
/// * 地址池耗尽时返回 `StegError::PoolExhausted`。
/// * 写入 `sink` 失败时返回 `StegError::Io`。
pub fn dig<W: Write>(
    store: &PixelStore,
    sink: &mut W,
    config: &StegConfig,
    sink_name: &str,
) -> Result<DigReport> {
    let mapper = ChannelMapper::new(store.format(), config)?;
    let ecc = ecc_for_config(config)?;
    let planner = CapacityPlanner::new(&mapper, store.samples(), store.pixel_count(), ecc.as_ref());
    let addressor = Addressor::new(config.algorithm, config.seed, planner.total_addressable_bits());
    let mut codec = ChunkCodec::new(addressor, mapper, ecc);

    log::info!("Reading steg header...");
    let header = frame::read_header(&mut codec, store.samples())?;
    if header.version != Version::CURRENT {
        log::warn!(
            "The data was hidden by format version {}, but this is version {}. Continuing anyway",
            header.version,
            Version::CURRENT
        );
    }
    if !planner.is_plausible(header.payload_len as u64) {
        return Err(StegError::Format(format!(
            "the hidden header claims {} bytes, which cannot fit in this image. The image may not contain hidden data, or the settings do not match the ones used to hide it",
            header.payload_len
        )));
    }
    log::debug!("File size: {} B", header.payload_len);

    log::info!("Reading file data...");
    let stats = frame::read_payload(&mut codec, store.samples(), &header, sink, sink_name)?;
    if stats.uncorrectable_chunks > 0 {
        log::warn!(
            "{} chunk(s) had more bit errors than could be corrected; the recovered file is likely damaged",
            stats.uncorrectable_chunks
        );
    }

    Ok(DigReport {
        header,
        corrected_errors: stats.corrected_errors,
        uncorrectable_chunks: stats.uncorrectable_chunks,
    })
}
