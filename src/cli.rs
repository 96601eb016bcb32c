//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use crate::config::{Algorithm, BitOrder, StegConfig};
use clap::{Args, Parser};
use std::path::PathBuf;

/// 一款基于位寻址隐写术的命令行工具，用于在无损格式图像 (如 PNG, BMP) 中隐藏或提取任意文件。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款基于位寻址隐写术的命令行工具，用于在无损格式图像 (如 PNG, BMP) 中隐藏或提取任意文件。\n隐藏与提取必须使用完全相同的编码参数。"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出更多信息 (-v 显示细节，-vv 显示逐位调试信息)。
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// 只输出错误。
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// 可用的子命令：hide (隐藏) 和 dig (提取)。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 将文件隐藏到无损格式图像中。
    Hide(HideArgs),

    /// 从经过隐写的图像中提取隐藏的文件。
    Dig(DigArgs),
}

/// 隐藏与提取共用的编码参数，两端必须一致。
#[derive(Args, Debug, Clone)]
pub struct EncodingArgs {
    /// 位地址生成算法。
    #[arg(short, long, value_enum, default_value_t = Algorithm::Sequential)]
    pub algorithm: Algorithm,

    /// 用于生成伪随机地址排列的密钥文件 (pattern 算法必需)。
    #[arg(short, long)]
    pub pattern: Option<PathBuf>,

    /// 每个通道最多修改的位数 (1-16)。
    #[arg(short, long, default_value_t = 1)]
    pub bits: u8,

    /// 同时在 alpha (透明度) 通道中写入数据。
    #[arg(long)]
    pub alpha: bool,

    /// 修改最高有效位而不是最低有效位 (主要用于调试)。
    #[arg(long)]
    pub msb: bool,

    /// 每个数据块可纠正的位错误数，0 表示关闭纠错。
    #[arg(short, long, default_value_t = 0)]
    pub ecc: u8,
}

impl EncodingArgs {
    /// 转换为运行配置，`seed` 由调用方根据密钥文件计算。
    pub fn to_config(&self, seed: u64) -> StegConfig {
        StegConfig {
            algorithm: self.algorithm,
            seed,
            max_bits_per_channel: self.bits,
            include_alpha: self.alpha,
            bit_order: if self.msb { BitOrder::Msb } else { BitOrder::Lsb },
            max_correctable_errors: self.ecc,
        }
    }
}

impl Default for EncodingArgs {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sequential,
            pattern: None,
            bits: 1,
            alpha: false,
            msb: false,
            ecc: 0,
        }
    }
}

/// 'hide' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct HideArgs {
    /// 用于隐写的输入图像文件路径 (如 PNG, BMP)。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要隐藏的文件路径。
    #[arg(short, long)]
    pub file: PathBuf,

    /// 结果图像的输出路径，默认为输入图像旁的 `doctored_<name>.png`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 输出文件已存在时直接覆盖。
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub encoding: EncodingArgs,
}

/// 'dig' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct DigArgs {
    /// 已隐藏数据的图像文件路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 提取结果的输出路径，默认为图像旁的 `recovered_<name>.bin`。
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// 输出文件已存在时直接覆盖。
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub encoding: EncodingArgs,
}
