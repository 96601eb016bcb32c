//! # 位地址生成模块
//!
//! 在图像可写位空间 `[0, total)` 上生成互不重复的位地址序列。
//!
//! `Pattern` 变体使用以密钥文件哈希为种子的 ChaCha20 伪随机数发生器，
//! 逐次从剩余地址池中均匀抽取一个地址，并用“与末尾交换后删除”的方式将其移出
//! (Fisher-Yates 无放回抽样)。隐藏端与提取端各自独立运行此过程，
//! 只要种子与总数相同就会得到完全一致的序列。
//!
//! 地址池以稀疏方式保存：只记录被交换过的槽位，内存占用与抽取次数成正比，
//! 与图像大小无关，抽取序列与显式地址池完全相同。
//!
//! 随机数范围统一使用 `u64`，保证 32 位与 64 位平台消耗相同数量的随机数。

use crate::config::Algorithm;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;
use thiserror::Error;

/// 地址池已空，无法再分配新的位地址。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("the pool of bit addresses is empty after {issued} draws")]
pub struct PoolExhausted {
    pub issued: u64,
}

#[derive(Debug, Clone)]
pub enum Addressor {
    Sequential {
        cursor: u64,
        total: u64,
    },
    Pattern {
        rng: ChaCha20Rng,
        total: u64,
        remaining: u64,
        displaced: HashMap<u64, u64>,
    },
}

impl Addressor {
    pub fn new(algorithm: Algorithm, seed: u64, total: u64) -> Self {
        match algorithm {
            Algorithm::Sequential => Self::sequential(total),
            Algorithm::Pattern => Self::pattern(seed, total),
        }
    }

    pub fn sequential(total: u64) -> Self {
        Addressor::Sequential { cursor: 0, total }
    }

    pub fn pattern(seed: u64, total: u64) -> Self {
        Addressor::Pattern {
            rng: ChaCha20Rng::seed_from_u64(seed),
            total,
            remaining: total,
            displaced: HashMap::new(),
        }
    }

    /// 返回下一个位地址。
    ///
    /// # Errors
    ///
    /// 当地址空间已全部分配完毕时返回 `PoolExhausted`。
    pub fn next(&mut self) -> Result<u64, PoolExhausted> {
        match self {
            Addressor::Sequential { cursor, total } => {
                if *cursor >= *total {
                    return Err(PoolExhausted { issued: *total });
                }
                let addr = *cursor;
                *cursor += 1;
                Ok(addr)
            }
            Addressor::Pattern {
                rng,
                total,
                remaining,
                displaced,
            } => {
                if *remaining == 0 {
                    return Err(PoolExhausted { issued: *total });
                }
                let j = rng.random_range(0..*remaining);
                let last = *remaining - 1;
                let tail = displaced.remove(&last).unwrap_or(last);
                let picked = if j == last {
                    tail
                } else {
                    displaced.insert(j, tail).unwrap_or(j)
                };
                *remaining = last;
                Ok(picked)
            }
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            Addressor::Sequential { total, .. } | Addressor::Pattern { total, .. } => *total,
        }
    }
}
