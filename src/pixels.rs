//! # 像素存储模块
//!
//! 负责无损图像的读取与写回。加载时将具体的颜色模型一次性折算为
//! `FormatDescriptor`，此后的隐写核心只按通道数、位深和 alpha 位置工作，
//! 不再关心图像原本是灰度、RGB 还是 RGBA。

use crate::error::{Result, StegError};
use image::{DynamicImage, ImageBuffer, ImageError, ImageFormat, Luma, LumaA, Rgb, Rgba};
use std::fmt;
use std::path::Path;

/// 像素格式描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub channels_per_pixel: u8,
    pub bits_per_channel: u8,
    pub alpha_channel: Option<u8>,
}

impl FormatDescriptor {
    pub fn new(channels_per_pixel: u8, bits_per_channel: u8, alpha_channel: Option<u8>) -> Self {
        Self {
            channels_per_pixel,
            bits_per_channel,
            alpha_channel,
        }
    }

    pub fn supports_alpha(&self) -> bool {
        self.alpha_channel.is_some()
    }

    /// 通道原生的全位掩码，例如 8 位通道为 `0xFF`。
    pub fn channel_mask(&self) -> u16 {
        ((1u32 << self.bits_per_channel) - 1) as u16
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = match (self.channels_per_pixel, self.alpha_channel.is_some()) {
            (1, _) => "L",
            (2, true) => "LA",
            (3, _) => "RGB",
            (4, true) => "RGBA",
            _ => "?",
        };
        write!(f, "{}{}", model, self.bits_per_channel)
    }
}

/// 内存中的像素矩阵，按行优先顺序平铺存放所有通道值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelStore {
    width: u32,
    height: u32,
    format: FormatDescriptor,
    samples: Vec<u16>,
}

impl PixelStore {
    /// 由原始通道数据构造像素矩阵。
    ///
    /// # Errors
    ///
    /// 当样本数量与 `width * height * channels` 不符，或通道布局不受支持时返回 `StegError::Format`。
    pub fn from_samples(
        width: u32,
        height: u32,
        format: FormatDescriptor,
        samples: Vec<u16>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * format.channels_per_pixel as usize;
        if samples.len() != expected {
            return Err(StegError::Format(format!(
                "expected {} channel samples for a {}x{} {} image, got {}",
                expected,
                width,
                height,
                format,
                samples.len()
            )));
        }
        if !matches!(format.bits_per_channel, 8 | 16) || !(1..=4).contains(&format.channels_per_pixel)
        {
            return Err(StegError::Format(format!(
                "unsupported pixel layout: {} channels of {} bits",
                format.channels_per_pixel, format.bits_per_channel
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            samples,
        })
    }

    /// 从磁盘读取图像。
    ///
    /// # Errors
    ///
    /// * 文件无法打开时返回 `StegError::Io`。
    /// * 图像无法解码或颜色模型不受支持时返回 `StegError::Format`。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| image_error(path, e))?;
        let store = Self::from_dynamic(image)?;
        log::debug!(
            "Loaded '{}': {}x{}px, format {}",
            path.display(),
            store.width,
            store.height,
            store.format
        );
        Ok(store)
    }

    /// 将像素矩阵以无损格式写回磁盘，格式由扩展名决定。
    ///
    /// # Errors
    ///
    /// * 扩展名对应的是有损、未知格式，或该格式无法原样保存当前通道布局时返回 `StegError::Config`。
    /// * 编码或写入失败时返回 `StegError::Io` / `StegError::Format`。
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = self.output_format(path)?;
        self.to_dynamic()?
            .save_with_format(path, format)
            .map_err(|e| image_error(path, e))?;
        log::debug!("Saved '{}' as {:?}", path.display(), format);
        Ok(())
    }

    /// 选择 `path` 对应的编码器，并确认它能逐位还原当前的通道布局。
    ///
    /// # Errors
    ///
    /// 格式有损或重新读取后通道布局会改变 (例如灰度 BMP 读回为 RGB) 时返回 `StegError::Config`。
    pub fn output_format(&self, path: impl AsRef<Path>) -> Result<ImageFormat> {
        let path = path.as_ref();
        let format = lossless_format(path)?;
        if !keeps_layout(format, &self.format) {
            return Err(StegError::Config(format!(
                "{:?} cannot store a {} image without changing its channels; save '{}' as PNG instead",
                format,
                self.format,
                path.display()
            )));
        }
        Ok(format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u16] {
        &mut self.samples
    }

    /// 返回第 `index` 个像素的全部通道值。
    pub fn pixel(&self, index: usize) -> &[u16] {
        let cpp = self.format.channels_per_pixel as usize;
        &self.samples[index * cpp..(index + 1) * cpp]
    }

    pub fn pixel_mut(&mut self, index: usize) -> &mut [u16] {
        let cpp = self.format.channels_per_pixel as usize;
        &mut self.samples[index * cpp..(index + 1) * cpp]
    }

    fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        let (format, samples) = match image {
            DynamicImage::ImageLuma8(buf) => (FormatDescriptor::new(1, 8, None), widen(buf.into_raw())),
            DynamicImage::ImageLumaA8(buf) => {
                (FormatDescriptor::new(2, 8, Some(1)), widen(buf.into_raw()))
            }
            DynamicImage::ImageRgb8(buf) => (FormatDescriptor::new(3, 8, None), widen(buf.into_raw())),
            DynamicImage::ImageRgba8(buf) => {
                (FormatDescriptor::new(4, 8, Some(3)), widen(buf.into_raw()))
            }
            DynamicImage::ImageLuma16(buf) => (FormatDescriptor::new(1, 16, None), buf.into_raw()),
            DynamicImage::ImageLumaA16(buf) => (FormatDescriptor::new(2, 16, Some(1)), buf.into_raw()),
            DynamicImage::ImageRgb16(buf) => (FormatDescriptor::new(3, 16, None), buf.into_raw()),
            DynamicImage::ImageRgba16(buf) => (FormatDescriptor::new(4, 16, Some(3)), buf.into_raw()),
            other => {
                return Err(StegError::Format(format!(
                    "the colour model {:?} of the provided image is not supported",
                    other.color()
                )));
            }
        };
        Self::from_samples(width, height, format, samples)
    }

    fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let narrow = || self.samples.iter().map(|&v| v as u8).collect::<Vec<u8>>();
        let wide = || self.samples.clone();
        let rebuilt = match (self.format.channels_per_pixel, self.format.bits_per_channel) {
            (1, 8) => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, narrow()).map(DynamicImage::ImageLuma8),
            (2, 8) => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, narrow()).map(DynamicImage::ImageLumaA8),
            (3, 8) => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, narrow()).map(DynamicImage::ImageRgb8),
            (4, 8) => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, narrow()).map(DynamicImage::ImageRgba8),
            (1, 16) => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, wide()).map(DynamicImage::ImageLuma16),
            (2, 16) => ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, wide()).map(DynamicImage::ImageLumaA16),
            (3, 16) => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, wide()).map(DynamicImage::ImageRgb16),
            (4, 16) => ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, wide()).map(DynamicImage::ImageRgba16),
            _ => None,
        };
        rebuilt.ok_or_else(|| {
            StegError::Format(format!("cannot rebuild a {} image of {}x{}px", self.format, w, h))
        })
    }
}

fn widen(raw: Vec<u8>) -> Vec<u16> {
    raw.into_iter().map(u16::from).collect()
}

/// 根据扩展名选择输出格式，只接受无损编码器。
///
/// # Errors
///
/// 扩展名缺失、未知或对应有损格式 (如 JPEG) 时返回 `StegError::Config`。
pub fn lossless_format(path: &Path) -> Result<ImageFormat> {
    let format = ImageFormat::from_path(path).map_err(|_| {
        StegError::Config(format!(
            "cannot determine an image format from '{}'",
            path.display()
        ))
    })?;
    match format {
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::Qoi | ImageFormat::WebP => {
            Ok(format)
        }
        other => Err(StegError::Config(format!(
            "{:?} output is not lossless and would destroy the hidden bits; use PNG, BMP, TIFF, QOI or WebP",
            other
        ))),
    }
}

/// 编码器写出的文件再次读取时是否仍是同一通道布局。
pub fn keeps_layout(format: ImageFormat, layout: &FormatDescriptor) -> bool {
    let has_alpha = layout.alpha_channel.is_some();
    match format {
        ImageFormat::Png => true,
        ImageFormat::Tiff => !(layout.channels_per_pixel == 2 && has_alpha),
        ImageFormat::Bmp | ImageFormat::Qoi | ImageFormat::WebP => {
            layout.bits_per_channel == 8 && layout.channels_per_pixel >= 3
        }
        _ => false,
    }
}

fn image_error(path: &Path, err: ImageError) -> StegError {
    match err {
        ImageError::IoError(source) => StegError::io(path, source),
        other => StegError::Format(format!("'{}': {}", path.display(), other)),
    }
}
