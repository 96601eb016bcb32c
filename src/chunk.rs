//! # 数据块编解码模块
//!
//! 将字节块展开为位序列 (每字节高位在前)，可选地用 BCH 码包裹，
//! 然后逐位向地址生成器申请地址并通过通道映射器写入或读取。
//!
//! 编码与解码必须以完全相同的顺序消耗地址，这是隐藏端与提取端保持同步的唯一保证。

use crate::addressor::Addressor;
use crate::bch::{BchCode, BchError, total_bits_for_config};
use crate::config::StegConfig;
use crate::constants::{BITS_PER_BYTE, CHUNK_SIZE, HEADER_SIZE};
use crate::error::{Result, StegError};
use crate::mapper::{BitSite, ChannelMapper};

/// 将字节展开为 0/1 位序列，每字节高位在前。
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| (0..BITS_PER_BYTE).rev().map(move |i| (byte >> i) & 1))
        .collect()
}

/// `bytes_to_bits` 的逆操作，末尾不足 8 位的部分被忽略。
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(BITS_PER_BYTE)
        .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
        .collect()
}

/// 按配置创建本次操作使用的纠错码。
///
/// 头部块与负载块共用同一套参数，码长按两者中较大的块计算。
///
/// # Errors
///
/// 没有任何受支持的 BCH 码能满足要求时返回 `StegError::Config`。
pub fn ecc_for_config(config: &StegConfig) -> Result<Option<BchCode>> {
    if !config.ecc_enabled() {
        return Ok(None);
    }
    let chunk_bits = CHUNK_SIZE.max(HEADER_SIZE) * BITS_PER_BYTE;
    let errors = config.max_correctable_errors as usize;
    let code = total_bits_for_config(chunk_bits, errors)
        .and_then(|length| BchCode::new(length, errors))
        .map_err(|e| StegError::Config(e.to_string()))?;
    log::debug!(
        "Using a BCH({}, {}) code correcting {} errors per chunk ({:.2}% errors : bits)",
        code.code_length(),
        code.storage_bits(),
        code.max_correctable_errors(),
        100.0 * code.ecc_ratio()
    );
    Ok(Some(code))
}

/// 单个数据块解码的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    pub bytes: Vec<u8>,
    pub corrected_errors: usize,
    /// 错误超出纠错能力，`bytes` 为未经纠正的原始数据。
    pub uncorrectable: bool,
}

#[derive(Debug)]
pub struct ChunkCodec {
    addressor: Addressor,
    mapper: ChannelMapper,
    ecc: Option<BchCode>,
    bits_placed: u64,
}

impl ChunkCodec {
    pub fn new(addressor: Addressor, mapper: ChannelMapper, ecc: Option<BchCode>) -> Self {
        Self {
            addressor,
            mapper,
            ecc,
            bits_placed: 0,
        }
    }

    pub fn ecc(&self) -> Option<&BchCode> {
        self.ecc.as_ref()
    }

    /// 已经写入或读取的位数 (不含因透明像素而跳过的地址)。
    pub fn bits_placed(&self) -> u64 {
        self.bits_placed
    }

    /// `n` 字节的块实际需要传输的位数。
    pub fn transmitted_bits(&self, n: usize) -> usize {
        n * BITS_PER_BYTE + self.ecc.as_ref().map_or(0, BchCode::checksum_bits)
    }

    /// 将一个字节块写入像素。
    ///
    /// # Errors
    ///
    /// * 地址池耗尽时返回 `StegError::PoolExhausted`。
    /// * 块大小超过纠错码容量时返回 `StegError::Config`。
    pub fn encode(&mut self, samples: &mut [u16], bytes: &[u8]) -> Result<()> {
        let bits = match &self.ecc {
            Some(code) => {
                let mut data = bytes_to_bits(bytes);
                if data.len() > code.storage_bits() {
                    return Err(StegError::Config(format!(
                        "a {}-byte chunk does not fit a BCH code storing {} bits",
                        bytes.len(),
                        code.storage_bits()
                    )));
                }
                data.resize(code.storage_bits(), 0);
                let mut codeword = code.encode(&data).map_err(|e| StegError::Config(e.to_string()))?;
                codeword.truncate(bytes.len() * BITS_PER_BYTE + code.checksum_bits());
                codeword
            }
            None => bytes_to_bits(bytes),
        };

        for bit in bits {
            let site = self.next_site(samples)?;
            self.mapper.write_bit(samples, site, bit);
            log::trace!("\twrote {} at {:?}", bit, site);
        }
        Ok(())
    }

    /// 从像素中读取 `n` 字节的块。
    ///
    /// # Errors
    ///
    /// 地址池耗尽时返回 `StegError::PoolExhausted`。
    pub fn decode(&mut self, samples: &[u16], n: usize) -> Result<DecodedChunk> {
        let count = self.transmitted_bits(n);
        let mut bits = Vec::with_capacity(count);
        for _ in 0..count {
            let site = self.next_site(samples)?;
            bits.push(self.mapper.read_bit(samples, site));
        }

        let Some(code) = &self.ecc else {
            return Ok(DecodedChunk {
                bytes: bits_to_bytes(&bits),
                corrected_errors: 0,
                uncorrectable: false,
            });
        };

        bits.resize(code.code_length(), 0);
        let (data, corrected_errors, uncorrectable) = match code.decode(&bits, count) {
            Ok((data, errors)) => (data, errors, false),
            Err(BchError::Uncorrectable { raw_data }) => {
                log::warn!("A {}-byte chunk has more bit errors than can be corrected", n);
                (raw_data, 0, true)
            }
            Err(e) => return Err(StegError::Format(e.to_string())),
        };
        if corrected_errors > 0 {
            log::debug!("Corrected {} bit errors in a {}-byte chunk", corrected_errors, n);
        }

        Ok(DecodedChunk {
            bytes: bits_to_bytes(&data[..n * BITS_PER_BYTE]),
            corrected_errors,
            uncorrectable,
        })
    }

    /// 申请下一个可用的物理位，跳过落在透明像素上的地址。
    fn next_site(&mut self, samples: &[u16]) -> Result<BitSite> {
        loop {
            let addr = self.addressor.next()?;
            if let Some(site) = self.mapper.locate(samples, addr) {
                self.bits_placed += 1;
                return Ok(site);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, BitOrder};
    use crate::pixels::FormatDescriptor;
    use rand::rngs::StdRng;
    use rand::seq::index::sample;
    use rand::{Rng, SeedableRng};

    fn rgb8_samples(pixels: usize, seed: u64) -> Vec<u16> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..pixels * 3).map(|_| rng.random_range(0..=255u16)).collect()
    }

    fn codec(config: &StegConfig, total_pixels: u64) -> ChunkCodec {
        let mapper = ChannelMapper::new(&FormatDescriptor::new(3, 8, None), config).unwrap();
        let total = mapper.total_addressable_bits(total_pixels);
        let addressor = Addressor::new(config.algorithm, config.seed, total);
        ChunkCodec::new(addressor, mapper, ecc_for_config(config).unwrap())
    }

    #[test]
    fn bits_are_msb_first() {
        assert_eq!(bytes_to_bits(&[0b1000_0001, 0x40]), vec![1, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bits_to_bytes(&bytes_to_bits(b"steg")), b"steg");
    }

    #[test]
    fn plain_chunk_round_trip() {
        let config = StegConfig {
            algorithm: Algorithm::Pattern,
            seed: 77,
            max_bits_per_channel: 2,
            ..StegConfig::default()
        };
        let mut samples = rgb8_samples(200, 1);
        let payload = b"thirty-two bytes of chunk data!!";

        let mut writer = codec(&config, 200);
        writer.encode(&mut samples, payload).unwrap();
        assert_eq!(writer.bits_placed(), 256);

        let mut reader = codec(&config, 200);
        let decoded = reader.decode(&samples, payload.len()).unwrap();
        assert_eq!(decoded.bytes, payload);
        assert_eq!(decoded.corrected_errors, 0);
    }

    #[test]
    fn ecc_only_transmits_data_and_checksum_bits() {
        let config = StegConfig {
            max_correctable_errors: 3,
            ..StegConfig::default()
        };
        let writer = codec(&config, 400);
        assert_eq!(writer.transmitted_bits(5), 40 + 27);
    }

    #[test]
    fn exhaustion_is_reported() {
        let config = StegConfig::default();
        let mut samples = rgb8_samples(2, 2);
        let mut writer = codec(&config, 2);
        let err = writer.encode(&mut samples, b"too long").unwrap_err();
        assert!(err.is_capacity());
    }

    #[test]
    fn ecc_corrects_injected_flips_with_exact_count() {
        let config = StegConfig {
            max_correctable_errors: 4,
            bit_order: BitOrder::Lsb,
            ..StegConfig::default()
        };
        let payload: Vec<u8> = (0..32u8).map(|i| i.wrapping_mul(37)).collect();
        let clean = rgb8_samples(400, 3);

        let mut rng = StdRng::seed_from_u64(9);
        for flips in 0..=4 {
            let mut samples = clean.clone();
            let mut writer = codec(&config, 400);
            writer.encode(&mut samples, &payload).unwrap();

            // 顺序寻址、每通道 1 位：第 i 个传输位就在样本 i 的最低位
            let sent = writer.transmitted_bits(payload.len());
            for i in sample(&mut rng, sent, flips).into_iter() {
                samples[i] ^= 1;
            }

            let mut reader = codec(&config, 400);
            let decoded = reader.decode(&samples, payload.len()).unwrap();
            assert_eq!(decoded.bytes, payload);
            assert_eq!(decoded.corrected_errors, flips);
            assert!(!decoded.uncorrectable);
        }
    }

    #[test]
    fn one_flip_too_many_is_a_mismatch_not_a_crash() {
        let config = StegConfig {
            max_correctable_errors: 2,
            ..StegConfig::default()
        };
        let payload = b"sixteen byte msg".to_vec();
        let mut rng = StdRng::seed_from_u64(10);

        for _ in 0..10 {
            let mut samples = rgb8_samples(400, 4);
            let mut writer = codec(&config, 400);
            writer.encode(&mut samples, &payload).unwrap();

            let checksum = writer.ecc().unwrap().checksum_bits();
            for i in sample(&mut rng, payload.len() * 8, 3).into_iter() {
                samples[checksum + i] ^= 1;
            }

            let mut reader = codec(&config, 400);
            let decoded = reader.decode(&samples, payload.len()).unwrap();
            assert_ne!(decoded.bytes, payload);
        }
    }
}
