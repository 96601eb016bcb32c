//! # steg_hide 库
//!
//! 本库包含位寻址隐写工具的核心逻辑：地址生成、像素通道映射、
//! 分块编解码 (可选 BCH 纠错)、帧结构与容量规划。

// 声明库包含的所有模块。

pub mod addressor;
pub mod bch;
pub mod capacity;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod handler;
pub mod mapper;
pub mod pixels;
pub mod seed;
pub mod steganography;

pub use config::{Algorithm, BitOrder, StegConfig};
pub use error::StegError;
pub use pixels::{FormatDescriptor, PixelStore};
pub use steganography::{DigReport, HideReport, dig, hide};
