//! # 运行配置模块
//!
//! 一次隐写/提取操作的全部参数都收拢在 `StegConfig` 中，并显式地传递给每个调用。
//! 隐藏与提取必须使用完全相同的配置，否则读取出的只是无意义的数据。

use crate::constants::MAX_BITS_PER_CHANNEL;
use crate::error::{Result, StegError};
use clap::ValueEnum;
use std::fmt;

/// 位地址的生成算法。
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// 从 0 开始依次递增。
    #[default]
    Sequential,
    /// 由密钥文件哈希作为种子的伪随机排列。
    Pattern,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sequential => write!(f, "sequential"),
            Algorithm::Pattern => write!(f, "pattern"),
        }
    }
}

/// 通道内的位序。
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    #[default]
    Lsb,
    Msb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StegConfig {
    pub algorithm: Algorithm,
    /// 伪随机排列的种子，仅在 `Algorithm::Pattern` 下使用。
    pub seed: u64,
    /// 每个通道最多修改的位数 (1-16)，实际值会被截断到图像的原生位深。
    pub max_bits_per_channel: u8,
    /// 是否允许在 alpha 通道中写入数据。
    pub include_alpha: bool,
    pub bit_order: BitOrder,
    /// 每个数据块可纠正的最大位错误数，0 表示关闭纠错。
    pub max_correctable_errors: u8,
}

impl Default for StegConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sequential,
            seed: 0,
            max_bits_per_channel: 1,
            include_alpha: false,
            bit_order: BitOrder::Lsb,
            max_correctable_errors: 0,
        }
    }
}

impl StegConfig {
    /// 检查参数取值范围。
    ///
    /// # Errors
    ///
    /// 当每通道位数不在 1-16 之间时返回 `StegError::Config`。
    pub fn validate(&self) -> Result<()> {
        if self.max_bits_per_channel == 0 || self.max_bits_per_channel > MAX_BITS_PER_CHANNEL {
            return Err(StegError::Config(format!(
                "bits per channel is outside the allowed range of 1-{}: provided {}",
                MAX_BITS_PER_CHANNEL, self.max_bits_per_channel
            )));
        }
        Ok(())
    }

    pub fn ecc_enabled(&self) -> bool {
        self.max_correctable_errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StegConfig::default().validate().is_ok());
    }

    #[test]
    fn bit_budget_must_be_in_range() {
        for bits in [0u8, 17, 255] {
            let config = StegConfig {
                max_bits_per_channel: bits,
                ..StegConfig::default()
            };
            assert!(matches!(config.validate(), Err(StegError::Config(_))));
        }
        let config = StegConfig {
            max_bits_per_channel: 16,
            ..StegConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
