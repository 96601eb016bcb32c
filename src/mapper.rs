//! # 像素通道映射模块
//!
//! 将线性位地址按混合进制分解为 (像素, 通道, 位)，并在对应位置读写单个位。
//!
//! 完全透明的像素不安全：下游工具可能清零或丢弃其颜色数据，因此映射器会拒绝落在
//! 这类像素上的地址，由调用方重新抽取。判定只看 alpha 通道中不可写的那些位，
//! 所以隐写本身永远不会改变某个像素是否被排除。

use crate::config::{BitOrder, StegConfig};
use crate::error::{Result, StegError};
use crate::pixels::FormatDescriptor;

/// 位地址分解后的坐标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitCoord {
    pub pixel: u64,
    pub channel: u8,
    pub bit: u8,
}

/// 平铺样本数组中的一个物理位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSite {
    pub sample: usize,
    pub bit: u8,
}

/// 按 `channels_per_pixel × bits_budget` 的混合进制分解地址。
pub fn decompose(addr: u64, channels_per_pixel: u8, bits_budget: u8) -> BitCoord {
    let budget = bits_budget as u64;
    let channels = channels_per_pixel as u64;
    BitCoord {
        pixel: addr / (channels * budget),
        channel: ((addr / budget) % channels) as u8,
        bit: (addr % budget) as u8,
    }
}

/// 生成从 `index` 开始、宽度为 `size` 的位掩码。
///
/// `mask(2, 3)` -> `0b0001_1100`
pub fn mask(index: u8, size: u8) -> u16 {
    (((1u32 << size) - 1) << index) as u16
}

pub fn read_from(data: u16, index: u8, size: u8) -> u16 {
    (data & mask(index, size)) >> index
}

pub fn write_to(data: u16, index: u8, size: u8, value: u16) -> u16 {
    (data & !mask(index, size)) | ((value << index) & mask(index, size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMapper {
    channels_per_pixel: u8,
    usable_channels: u8,
    native_bits: u8,
    bits_budget: u8,
    alpha_channel: Option<u8>,
    skip_alpha: bool,
    alpha_guard: u16,
    bit_order: BitOrder,
}

impl ChannelMapper {
    /// 由像素格式与运行配置推导映射参数。
    ///
    /// 每通道位数会被截断到图像的原生位深；未开启 alpha 写入时，alpha 通道不计入可用通道。
    ///
    /// # Errors
    ///
    /// 配置本身无效，或写入 alpha 时会占满整个 alpha 通道 (透明判定失去依据) 时返回 `StegError::Config`。
    pub fn new(format: &FormatDescriptor, config: &StegConfig) -> Result<Self> {
        config.validate()?;
        let native_bits = format.bits_per_channel;
        let bits_budget = config.max_bits_per_channel.min(native_bits);
        let skip_alpha = format.supports_alpha() && !config.include_alpha;
        let usable_channels = format.channels_per_pixel - u8::from(skip_alpha);

        let writable = match config.bit_order {
            BitOrder::Lsb => mask(0, bits_budget),
            BitOrder::Msb => mask(native_bits - bits_budget, bits_budget),
        };
        let alpha_guard = if config.include_alpha {
            format.channel_mask() & !writable
        } else {
            format.channel_mask()
        };
        if format.supports_alpha() && alpha_guard == 0 {
            return Err(StegError::Config(format!(
                "alpha encoding needs at least one alpha bit left unwritten, but {} bits per channel covers all {} bits of this image; lower --bits",
                bits_budget, native_bits
            )));
        }

        Ok(Self {
            channels_per_pixel: format.channels_per_pixel,
            usable_channels,
            native_bits,
            bits_budget,
            alpha_channel: format.alpha_channel,
            skip_alpha,
            alpha_guard,
            bit_order: config.bit_order,
        })
    }

    pub fn usable_channels(&self) -> u8 {
        self.usable_channels
    }

    pub fn bits_budget(&self) -> u8 {
        self.bits_budget
    }

    /// 图像中可寻址的位总数 (包括透明像素)。
    pub fn total_addressable_bits(&self, pixel_count: u64) -> u64 {
        pixel_count * self.usable_channels as u64 * self.bits_budget as u64
    }

    /// 每个未被排除的像素提供的位数。
    pub fn bits_per_pixel(&self) -> u64 {
        self.usable_channels as u64 * self.bits_budget as u64
    }

    /// 判断像素是否因透明而被排除。
    pub fn is_excluded(&self, pixel: &[u16]) -> bool {
        match self.alpha_channel {
            Some(alpha) => pixel[alpha as usize] & self.alpha_guard == 0,
            None => false,
        }
    }

    /// 统计未被排除的像素数量。
    pub fn usable_pixels(&self, samples: &[u16]) -> u64 {
        if self.alpha_channel.is_none() {
            return (samples.len() / self.channels_per_pixel as usize) as u64;
        }
        samples
            .chunks_exact(self.channels_per_pixel as usize)
            .filter(|pixel| !self.is_excluded(pixel))
            .count() as u64
    }

    /// 将位地址定位到具体的物理位；若目标像素被排除则返回 `None`。
    pub fn locate(&self, samples: &[u16], addr: u64) -> Option<BitSite> {
        let coord = decompose(addr, self.usable_channels, self.bits_budget);
        let cpp = self.channels_per_pixel as usize;
        let base = coord.pixel as usize * cpp;
        let pixel = &samples[base..base + cpp];

        log::trace!(
            "addr: {}, pixel: {}, channel: {}, bit: {}, channels: {:?}",
            addr,
            coord.pixel,
            coord.channel,
            coord.bit,
            pixel
        );

        if self.is_excluded(pixel) {
            return None;
        }

        let physical_channel = match self.alpha_channel {
            Some(alpha) if self.skip_alpha && coord.channel >= alpha => coord.channel + 1,
            _ => coord.channel,
        };
        let bit = match self.bit_order {
            BitOrder::Lsb => coord.bit,
            BitOrder::Msb => self.native_bits - coord.bit - 1,
        };

        Some(BitSite {
            sample: base + physical_channel as usize,
            bit,
        })
    }

    pub fn read_bit(&self, samples: &[u16], site: BitSite) -> u8 {
        read_from(samples[site.sample], site.bit, 1) as u8
    }

    pub fn write_bit(&self, samples: &mut [u16], site: BitSite, bit: u8) {
        let channel = &mut samples[site.sample];
        *channel = write_to(*channel, site.bit, 1, bit as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba8() -> FormatDescriptor {
        FormatDescriptor::new(4, 8, Some(3))
    }

    fn config(bits: u8, include_alpha: bool, bit_order: BitOrder) -> StegConfig {
        StegConfig {
            max_bits_per_channel: bits,
            include_alpha,
            bit_order,
            ..StegConfig::default()
        }
    }

    #[test]
    fn decompose_is_mixed_radix() {
        assert_eq!(decompose(0, 3, 2), BitCoord { pixel: 0, channel: 0, bit: 0 });
        assert_eq!(decompose(1, 3, 2), BitCoord { pixel: 0, channel: 0, bit: 1 });
        assert_eq!(decompose(2, 3, 2), BitCoord { pixel: 0, channel: 1, bit: 0 });
        assert_eq!(decompose(5, 3, 2), BitCoord { pixel: 0, channel: 2, bit: 1 });
        assert_eq!(decompose(6, 3, 2), BitCoord { pixel: 1, channel: 0, bit: 0 });
        assert_eq!(decompose(47, 4, 3), BitCoord { pixel: 3, channel: 3, bit: 2 });
    }

    #[test]
    fn write_to_touches_only_the_requested_bits() {
        assert_eq!(mask(2, 3), 0b0001_1100);
        assert_eq!(write_to(0b1111_1111, 3, 1, 0), 0b1111_0111);
        assert_eq!(write_to(0b0000_0000, 15, 1, 1), 0x8000);
        assert_eq!(read_from(0b1010_0000, 5, 1), 1);
        assert_eq!(read_from(0b1010_0000, 6, 1), 0);
        assert_eq!(mask(0, 16), 0xFFFF);
    }

    #[test]
    fn budget_is_clamped_to_native_depth() {
        let mapper = ChannelMapper::new(&rgba8(), &config(12, false, BitOrder::Lsb)).unwrap();
        assert_eq!(mapper.bits_budget(), 8);
        assert_eq!(mapper.usable_channels(), 3);
        assert_eq!(mapper.total_addressable_bits(10), 10 * 3 * 8);
    }

    #[test]
    fn alpha_channel_is_skipped_unless_requested() {
        let samples = vec![10, 20, 30, 255, 40, 50, 60, 255];
        let mapper = ChannelMapper::new(&rgba8(), &config(1, false, BitOrder::Lsb)).unwrap();
        let sites: Vec<usize> = (0..6)
            .map(|addr| mapper.locate(&samples, addr).unwrap().sample)
            .collect();
        assert_eq!(sites, vec![0, 1, 2, 4, 5, 6]);

        let mapper = ChannelMapper::new(&rgba8(), &config(1, true, BitOrder::Lsb)).unwrap();
        assert_eq!(mapper.locate(&samples, 3).unwrap().sample, 3);
    }

    #[test]
    fn gray_alpha_maps_the_single_colour_channel() {
        let format = FormatDescriptor::new(2, 8, Some(1));
        let mapper = ChannelMapper::new(&format, &config(2, false, BitOrder::Lsb)).unwrap();
        let samples = vec![7, 200, 9, 200];
        assert_eq!(mapper.usable_channels(), 1);
        assert_eq!(mapper.locate(&samples, 3).unwrap(), BitSite { sample: 2, bit: 1 });
    }

    #[test]
    fn transparent_pixels_are_rejected() {
        let samples = vec![1, 2, 3, 0, 4, 5, 6, 1];
        let mapper = ChannelMapper::new(&rgba8(), &config(1, false, BitOrder::Lsb)).unwrap();
        assert_eq!(mapper.locate(&samples, 0), None);
        assert_eq!(mapper.locate(&samples, 2), None);
        assert!(mapper.locate(&samples, 3).is_some());
        assert_eq!(mapper.usable_pixels(&samples), 1);
    }

    #[test]
    fn with_alpha_writes_only_unwritable_alpha_bits_decide_exclusion() {
        // alpha = 1 would become 0 after an LSB write, so it must not be used
        let samples = vec![1, 2, 3, 1, 4, 5, 6, 2];
        let mapper = ChannelMapper::new(&rgba8(), &config(1, true, BitOrder::Lsb)).unwrap();
        assert_eq!(mapper.locate(&samples, 0), None);
        assert!(mapper.locate(&samples, 4).is_some());

        let mut written = samples.clone();
        for addr in 4..8 {
            let site = mapper.locate(&written, addr).unwrap();
            mapper.write_bit(&mut written, site, 0);
        }
        assert_eq!(written[7], 2);
        assert!(!mapper.is_excluded(&written[4..8]));
    }

    #[test]
    fn alpha_encoding_must_leave_an_alpha_bit_unwritten() {
        for order in [BitOrder::Lsb, BitOrder::Msb] {
            let err = ChannelMapper::new(&rgba8(), &config(8, true, order)).unwrap_err();
            assert!(matches!(err, StegError::Config(_)));
            let err = ChannelMapper::new(&rgba8(), &config(16, true, order)).unwrap_err();
            assert!(matches!(err, StegError::Config(_)));
            assert!(ChannelMapper::new(&rgba8(), &config(7, true, order)).is_ok());
        }
        // 没有 alpha 通道或不写 alpha 时，满位深是合法的
        assert!(ChannelMapper::new(&FormatDescriptor::new(3, 8, None), &config(8, true, BitOrder::Lsb)).is_ok());
        assert!(ChannelMapper::new(&rgba8(), &config(8, false, BitOrder::Lsb)).is_ok());
    }

    #[test]
    fn msb_mode_mirrors_the_bit_position() {
        let samples = vec![0u16; 3];
        let format = FormatDescriptor::new(3, 8, None);
        let mapper = ChannelMapper::new(&format, &config(2, false, BitOrder::Msb)).unwrap();
        assert_eq!(mapper.locate(&samples, 0).unwrap(), BitSite { sample: 0, bit: 7 });
        assert_eq!(mapper.locate(&samples, 1).unwrap(), BitSite { sample: 0, bit: 6 });
        assert_eq!(mapper.locate(&samples, 2).unwrap(), BitSite { sample: 1, bit: 7 });
    }

    #[test]
    fn read_write_round_trip_on_a_single_bit() {
        let format = FormatDescriptor::new(3, 16, None);
        let mapper = ChannelMapper::new(&format, &config(16, false, BitOrder::Lsb)).unwrap();
        let mut samples = vec![0xAAAA, 0x5555, 0xFFFF];
        let site = mapper.locate(&samples, 16 + 4).unwrap();
        assert_eq!(site, BitSite { sample: 1, bit: 4 });
        assert_eq!(mapper.read_bit(&samples, site), 1);

        mapper.write_bit(&mut samples, site, 0);
        assert_eq!(samples, vec![0xAAAA, 0x5545, 0xFFFF]);
        assert_eq!(mapper.read_bit(&samples, site), 0);
    }
}
