//! # 错误类型模块
//!
//! 库内部统一使用 `StegError`，命令行层再用 `anyhow` 附加上下文。

use crate::addressor::PoolExhausted;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StegError {
    /// 参数在执行任何 I/O 之前就已判定为无效。
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 预检阶段发现图像容量不足。
    #[error("Not enough space in the image to hide the payload. Required: {required} bits, Available: {available} bits")]
    InsufficientCapacity { required: u64, available: u64 },

    /// 写入或读取过程中地址池被耗尽。
    #[error("Not enough space in the image to hide the payload: {0}")]
    PoolExhausted(#[from] PoolExhausted),

    #[error("Invalid data format: {0}")]
    Format(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StegError {
    /// 构造携带路径信息的 I/O 错误。
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        StegError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 是否属于容量类错误 (预检失败或地址池耗尽)。
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            StegError::InsufficientCapacity { .. } | StegError::PoolExhausted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StegError>;
