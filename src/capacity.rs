//! # 容量规划模块
//!
//! 在写入任何数据之前检查负载 (含头部与纠错校验位) 能否放入图像。
//!
//! 透明像素的排除条件不会被隐写改变，因此可以预先统计可用像素数，
//! 得到的容量是精确值而不仅是上界。

use crate::bch::BchCode;
use crate::constants::{BITS_PER_BYTE, CHUNK_SIZE, HEADER_SIZE};
use crate::error::{Result, StegError};
use crate::mapper::ChannelMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlanner {
    total_addressable_bits: u64,
    usable_bits: u64,
    checksum_bits: u64,
}

impl CapacityPlanner {
    pub fn new(mapper: &ChannelMapper, samples: &[u16], pixel_count: u64, ecc: Option<&BchCode>) -> Self {
        Self {
            total_addressable_bits: mapper.total_addressable_bits(pixel_count),
            usable_bits: mapper.usable_pixels(samples) * mapper.bits_per_pixel(),
            checksum_bits: ecc.map_or(0, |code| code.checksum_bits() as u64),
        }
    }

    /// 地址空间大小，即地址生成器的总数。
    pub fn total_addressable_bits(&self) -> u64 {
        self.total_addressable_bits
    }

    /// 排除透明像素后真正可写的位数。
    pub fn usable_bits(&self) -> u64 {
        self.usable_bits
    }

    /// 写入头部与 `payload_len` 字节负载所需的总位数。
    pub fn required_bits(&self, payload_len: u64) -> u64 {
        let chunk = CHUNK_SIZE as u64;
        let payload_chunks = payload_len.div_ceil(chunk);
        let chunks = 1 + payload_chunks;
        (HEADER_SIZE as u64 + payload_len) * BITS_PER_BYTE as u64 + chunks * self.checksum_bits
    }

    /// 预检负载能否放入图像。
    ///
    /// # Errors
    ///
    /// 所需位数超过可用位数时返回 `StegError::InsufficientCapacity`。
    pub fn check(&self, payload_len: u64) -> Result<u64> {
        let required = self.required_bits(payload_len);
        log::debug!(
            "Bits to write: {} (addressable: {}, usable: {})",
            required,
            self.total_addressable_bits,
            self.usable_bits
        );
        if required > self.usable_bits {
            return Err(StegError::InsufficientCapacity {
                required,
                available: self.usable_bits,
            });
        }
        Ok(required)
    }

    /// 提取时的头部合理性检查：声明的长度必须放得进这张图。
    pub fn is_plausible(&self, payload_len: u64) -> bool {
        self.required_bits(payload_len) <= self.usable_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StegConfig;
    use crate::pixels::FormatDescriptor;

    fn planner(format: FormatDescriptor, samples: &[u16], config: &StegConfig, ecc: Option<&BchCode>) -> CapacityPlanner {
        let mapper = ChannelMapper::new(&format, config).unwrap();
        let pixels = (samples.len() / format.channels_per_pixel as usize) as u64;
        CapacityPlanner::new(&mapper, samples, pixels, ecc)
    }

    #[test]
    fn opaque_rgba_capacity_matches_reference_numbers() {
        let samples = vec![255u16; 100 * 100 * 4];
        let format = FormatDescriptor::new(4, 8, Some(3));
        let plan = planner(format, &samples, &StegConfig::default(), None);
        assert_eq!(plan.total_addressable_bits(), 30_000);
        assert_eq!(plan.usable_bits(), 30_000);
        assert_eq!(plan.required_bits(19), 408);
        assert_eq!(plan.check(19).unwrap(), 408);

        let two_bits = StegConfig {
            max_bits_per_channel: 2,
            ..StegConfig::default()
        };
        assert_eq!(planner(format, &samples, &two_bits, None).total_addressable_bits(), 60_000);
    }

    #[test]
    fn exact_boundary() {
        // 12x12 RGB，1 位/通道 = 432 位 = 32 字节头部 + 22 字节负载
        let samples = vec![0u16; 12 * 12 * 3];
        let plan = planner(FormatDescriptor::new(3, 8, None), &samples, &StegConfig::default(), None);
        assert_eq!(plan.check(22).unwrap(), 432);
        assert!(matches!(
            plan.check(23),
            Err(StegError::InsufficientCapacity { required: 440, available: 432 })
        ));
    }

    #[test]
    fn transparent_pixels_reduce_usable_bits() {
        let mut samples = vec![200u16; 10 * 4];
        samples[3] = 0;
        samples[7] = 0;
        let plan = planner(FormatDescriptor::new(4, 8, Some(3)), &samples, &StegConfig::default(), None);
        assert_eq!(plan.total_addressable_bits(), 30);
        assert_eq!(plan.usable_bits(), 24);
    }

    #[test]
    fn checksum_bits_are_charged_per_chunk() {
        let code = BchCode::new(511, 2).unwrap();
        let samples = vec![0u16; 3];
        let plan = planner(FormatDescriptor::new(3, 8, None), &samples, &StegConfig::default(), Some(&code));
        // 头部 + 2 个负载块 (32 + 1 字节)
        assert_eq!(plan.required_bits(33), (32 + 33) * 8 + 3 * 18);
        assert_eq!(plan.required_bits(0), 32 * 8 + 18);
        assert!(!plan.is_plausible(0));
    }
}
