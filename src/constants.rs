/// 每个字节的位数。
pub const BITS_PER_BYTE: usize = 8;

/// 负载数据分块大小 (字节)。
/// 隐写时按块读取源文件，每块单独进行寻址 (以及可选的纠错编码)。
pub const CHUNK_SIZE: usize = 32;

/// 头部块大小 (字节)。
/// 前 3 字节为版本号，随后 4 字节为大端序负载长度，其余字节保留并写 0。
pub const HEADER_SIZE: usize = 32;

/// 头部中负载长度字段的起始偏移。
pub const HEADER_LENGTH_OFFSET: usize = 3;

/// 头部中保留区域的起始偏移。
pub const HEADER_RESERVED_OFFSET: usize = HEADER_LENGTH_OFFSET + 4;

/// 单个通道允许写入的最大位数。
pub const MAX_BITS_PER_CHANNEL: u8 = 16;

/// 写入头部的格式版本 (主版本号)。
pub const VERSION_MAJOR: u8 = 0;
/// 写入头部的格式版本 (次版本号)。
pub const VERSION_MINOR: u8 = 9;
/// 写入头部的格式版本 (修订号)。
pub const VERSION_PATCH: u8 = 0;

/// 哈希密钥文件时每次读取的块大小。
pub const PATTERN_READ_BLOCK: usize = 1024;
