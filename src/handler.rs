//! # 命令处理逻辑模块
//!
//! 包含处理 `hide` 和 `dig` 子命令的高级业务逻辑。
//! 本模块负责协调文件 I/O、调用核心隐写流程以及向用户报告结果。

use crate::cli::{DigArgs, EncodingArgs, HideArgs};
use crate::config::{Algorithm, StegConfig};
use crate::error::StegError;
use crate::pixels::{PixelStore, lossless_format};
use crate::seed::hash_pattern_file;
use crate::steganography::{dig, hide};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// 处理 'Hide' 命令的执行逻辑。
///
/// 负责读取图像与待隐藏文件、预检容量、调用隐写核心流程，
/// 最后将结果写入目标图像文件。
///
/// # Arguments
///
/// * `args` - 包含输入/输出路径与编码参数的 `HideArgs` 结构体。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 路径为空、参数超出范围或输出格式不是无损格式。
/// * 目标文件已存在且未指定 `--force`。
/// * 无法读取输入的图像、文件或密钥文件。
/// * 图像没有足够的空间来隐藏文件。
/// * 无法写入到目标图像文件。
pub fn handle_hide(args: HideArgs) -> Result<()> {
    ensure_not_empty(&args.image, "image")?;
    ensure_not_empty(&args.file, "file")?;
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| default_hide_dest(&args.image));
    ensure_not_empty(&dest, "dest")?;
    lossless_format(&dest)?;
    ensure_writable(&dest, args.force)?;
    let config = build_config(&args.encoding)?;

    log::info!("Loading the image from '{}'...", args.image.display());
    let mut picture = PixelStore::load(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;
    log::debug!("Image size: {}x{}px", picture.width(), picture.height());
    picture.output_format(&dest)?;

    log::info!("Opening the file at '{}'...", args.file.display());
    let file = File::open(&args.file).with_context(|| {
        format!(
            "Unable to read payload file: {}",
            args.file.to_string_lossy().red().bold()
        )
    })?;
    let payload_len = file
        .metadata()
        .with_context(|| {
            format!(
                "Unable to read payload file info: {}",
                args.file.to_string_lossy().red().bold()
            )
        })?
        .len();

    let report = hide(
        &mut picture,
        &mut BufReader::new(file),
        payload_len,
        &config,
        &args.file.to_string_lossy(),
    )
    .map_err(|e| match e {
        StegError::InsufficientCapacity { required, available } => anyhow::anyhow!(
            "Not enough space in the image to hide the file. \nRequired: {} bits, Available: {} bits",
            required.to_string().red().bold(),
            available.to_string().green().bold()
        ),
        other => anyhow::Error::new(other).context(format!(
            "Failed to hide '{}' in '{}'.",
            args.file.to_string_lossy().red().bold(),
            args.image.to_string_lossy().red().bold()
        )),
    })?;

    log::info!("Writing the encoded image to '{}' now...", dest.display());
    picture.save(&dest).with_context(|| {
        format!(
            "Unable to write to target image file: {}",
            dest.to_string_lossy().red().bold()
        )
    })?;

    println!(
        "The file ({} bytes, {} of {} usable bits) has been successfully hidden and saved: {}",
        report.payload_bytes,
        report.bits_written,
        report.usable_bits,
        dest.to_string_lossy().green().bold()
    );

    Ok(())
}

/// 处理 'Dig' 命令的执行逻辑。
///
/// 负责读取经过隐写的图像、按相同参数还原地址序列、解析头部，
/// 最后将提取出的文件内容写入输出文件。
///
/// # Arguments
///
/// * `args` - 包含输入/输出路径与编码参数的 `DigArgs` 结构体。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 路径为空或参数超出范围。
/// * 输出文件已存在且未指定 `--force`。
/// * 无法读取输入的图像或密钥文件。
/// * 头部无效 (图像中没有隐藏数据，或参数与隐藏时不一致)。
/// * 无法写入到输出文件。
pub fn handle_dig(args: DigArgs) -> Result<()> {
    ensure_not_empty(&args.image, "image")?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_dig_out(&args.image));
    ensure_not_empty(&out, "out")?;
    ensure_writable(&out, args.force)?;
    let config = build_config(&args.encoding)?;

    log::info!("Loading the image from '{}'...", args.image.display());
    let picture = PixelStore::load(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    log::info!("Creating the file at '{}'...", out.display());
    let file = File::create(&out).with_context(|| {
        format!(
            "Unable to write to target file: {}",
            out.to_string_lossy().red().bold()
        )
    })?;

    let result = {
        let mut sink = BufWriter::new(file);
        dig(&picture, &mut sink, &config, &out.to_string_lossy())
    };
    let report = result
        .inspect_err(|_| discard_partial(&out))
        .with_context(|| {
            format!(
                "Failed to recover hidden data from '{}'. \nThe image may not contain hidden data, or the settings differ from the ones used to hide it.",
                args.image.to_string_lossy().red().bold()
            )
        })?;

    if report.corrected_errors > 0 {
        println!(
            "Corrected {} bit errors while reading the hidden data.",
            report.corrected_errors.to_string().green().bold()
        );
    }
    if report.uncorrectable_chunks > 0 {
        println!(
            "{} chunk(s) could not be corrected; the recovered file is likely damaged.",
            report.uncorrectable_chunks.to_string().red().bold()
        );
    }
    println!(
        "The file ({} bytes) has been successfully recovered and saved: {}",
        report.header.payload_len,
        out.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 由命令行编码参数构造运行配置，pattern 算法会在此读取并哈希密钥文件。
fn build_config(encoding: &EncodingArgs) -> Result<StegConfig> {
    let seed = match (encoding.algorithm, &encoding.pattern) {
        (Algorithm::Pattern, None) => {
            return Err(StegError::Config(
                "the pattern algorithm needs a key file (--pattern)".to_string(),
            )
            .into());
        }
        (Algorithm::Pattern, Some(path)) => {
            ensure_not_empty(path, "pattern")?;
            log::info!("Loading up the pattern key...");
            hash_pattern_file(path).with_context(|| {
                format!(
                    "Unable to read pattern file: {}",
                    path.to_string_lossy().red().bold()
                )
            })?
        }
        (Algorithm::Sequential, _) => 0,
    };
    let config = encoding.to_config(seed);
    config.validate()?;
    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

fn ensure_not_empty(path: &Path, what: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(StegError::Config(format!("the {} path is empty", what)).into());
    }
    Ok(())
}

fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    anyhow::ensure!(
        force || !path.exists(),
        "Output file already exists: {}. \nUse --force to overwrite it.",
        path.to_string_lossy().red().bold()
    );
    Ok(())
}

/// `dir/name.ext` -> `dir/doctored_name.png`
pub fn default_hide_dest(image: &Path) -> PathBuf {
    sibling(image, "doctored_", "png")
}

/// `dir/name.ext` -> `dir/recovered_name.bin`
pub fn default_dig_out(image: &Path) -> PathBuf {
    sibling(image, "recovered_", "bin")
}

fn sibling(path: &Path, prefix: &str, extension: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}{}.{}", prefix, stem, extension);
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// 删除不完整的输出文件，忽略失败。
fn discard_partial(path: &Path) {
    if path.exists() {
        let _ = fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_sit_next_to_the_input() {
        assert_eq!(
            default_hide_dest(Path::new("/tmp/pics/cat.bmp")),
            PathBuf::from("/tmp/pics/doctored_cat.png")
        );
        assert_eq!(
            default_dig_out(Path::new("/tmp/pics/doctored_cat.png")),
            PathBuf::from("/tmp/pics/recovered_doctored_cat.bin")
        );
        assert_eq!(default_hide_dest(Path::new("cat.png")), PathBuf::from("doctored_cat.png"));
    }

    #[test]
    fn pattern_without_key_is_a_config_error() {
        let encoding = EncodingArgs {
            algorithm: Algorithm::Pattern,
            ..EncodingArgs::default()
        };
        let err = build_config(&encoding).unwrap_err();
        assert!(matches!(err.downcast_ref::<StegError>(), Some(StegError::Config(_))));
    }

    #[test]
    fn out_of_range_bits_is_a_config_error() {
        let encoding = EncodingArgs {
            bits: 17,
            ..EncodingArgs::default()
        };
        let err = build_config(&encoding).unwrap_err();
        assert!(matches!(err.downcast_ref::<StegError>(), Some(StegError::Config(_))));
    }
}
