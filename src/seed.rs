//! # 密钥文件哈希模块
//!
//! 将任意密钥文件的内容折算为 64 位种子，供 `Pattern` 寻址算法使用。
//! 种子只用于让隐藏端与提取端得到相同的地址排列，不提供任何加密保证。

use crate::constants::PATTERN_READ_BLOCK;
use crate::error::{Result, StegError};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// 对密钥文件内容求哈希，取摘要前 8 字节 (大端序) 作为种子。
///
/// # Errors
///
/// 文件无法打开或读取时返回 `StegError::Io`。
pub fn hash_pattern_file(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| StegError::io(path, e))?;
    let seed = hash_reader(BufReader::new(file)).map_err(|e| StegError::io(path, e))?;
    log::debug!("Pattern hash of '{}': {:#018x}", path.display(), seed);
    Ok(seed)
}

pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<u64> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; PATTERN_READ_BLOCK];
    loop {
        match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => hasher.update(&block[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(head))
}
