//! Encoding of composite surfaces to spill storage and subsampled re-decode

use std::io::{BufRead, Read, Seek, Write};
use std::num::NonZeroU32;

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::RgbImage;
use jpeg_decoder::PixelFormat;
use serde::{Deserialize, Serialize};

use super::request::CodecError;
use super::{JPEG_MAX_DIMENSION, SPILL_JPEG_QUALITY};

/// Compressed format used for spilled surfaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpillFormat {
    #[default]
    Jpeg,
    Png,
}

impl SpillFormat {
    /// Format that can actually hold a `width` x `height` surface
    #[must_use]
    pub fn effective(self, width: u32, height: u32) -> Self {
        match self {
            Self::Jpeg if width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION => Self::Png,
            other => other,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Writes a surface out and reads it back at reduced resolution
pub trait SurfaceCodec {
    /// Extension of the spill file for a surface of this size
    fn extension(&self, width: u32, height: u32) -> &'static str;

    fn encode<W: Write>(&self, surface: &RgbImage, out: W) -> Result<(), CodecError>;

    /// Decode and shrink each axis by `factor`
    fn decode_subsampled<R: BufRead + Seek>(
        &self,
        mut input: R,
        factor: u32,
    ) -> Result<RgbImage, CodecError> {
        let factor = factor.max(1);
        let header = input.fill_buf()?;
        let is_jpeg = header.starts_with(&JPEG_SIGNATURE);
        let is_png = header.starts_with(&PNG_SIGNATURE);
        if is_jpeg {
            decode_jpeg_scaled(input, factor)
        } else if is_png {
            decode_png_rows(input, factor)
        } else {
            Err("Unrecognized spill file format".into())
        }
    }
}

const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Decode a JPEG straight to reduced size using DCT scaling.
///
/// The decoder only offers 1/2, 1/4 and 1/8 steps and picks the smallest one
/// not below the target, so a small Box pass covers odd edges.
fn decode_jpeg_scaled<R: Read>(input: R, factor: u32) -> Result<RgbImage, CodecError> {
    let mut decoder = jpeg_decoder::Decoder::new(input);
    decoder.read_info()?;
    let info = decoder.info().ok_or("JPEG header missing")?;
    let target_width = (u32::from(info.width) / factor).max(1);
    let target_height = (u32::from(info.height) / factor).max(1);

    let (width, height) =
        decoder.scale(u16::try_from(target_width)?, u16::try_from(target_height)?)?;
    let (width, height) = (u32::from(width), u32::from(height));
    let pixels = decoder.decode()?;
    let scaled = match info.pixel_format {
        PixelFormat::RGB24 => RgbImage::from_raw(width, height, pixels),
        PixelFormat::L8 => {
            RgbImage::from_raw(width, height, pixels.iter().flat_map(|&l| [l, l, l]).collect())
        }
        other => return Err(format!("Unsupported spill pixel format {other:?}").into()),
    }
    .ok_or("Decoded JPEG does not match its dimensions")?;
    log::trace!("JPEG decoded at {width}x{height} for target {target_width}x{target_height}");

    resize_rgb(scaled, target_width, target_height, fr::FilterType::Box)
}

/// Decode a PNG one row at a time, averaging each `factor` x `factor` block
fn decode_png_rows<R: Read>(input: R, factor: u32) -> Result<RgbImage, CodecError> {
    let mut decoder = png::Decoder::new_with_limits(input, png::Limits { bytes: usize::MAX });
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    if reader.info().interlaced {
        return Err("Interlaced spill files are not supported".into());
    }
    let channels = match reader.output_color_type().0 {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => return Err("Indexed PNG was not expanded".into()),
    };

    let mut shrink = BoxShrink::new(reader.info().width, reader.info().height, factor);
    while let Some(row) = reader.next_row()? {
        shrink.push_row(row.data(), channels);
    }
    shrink.finish()
}

/// Streaming box filter over whole source rows
struct BoxShrink {
    width: u32,
    height: u32,
    factor: usize,
    rows_per_band: u32,
    divisor: u32,
    sums: Vec<u32>,
    rows_in_band: u32,
    pixels: Vec<u8>,
}

impl BoxShrink {
    fn new(src_width: u32, src_height: u32, factor: u32) -> Self {
        let width = (src_width / factor).max(1);
        let height = (src_height / factor).max(1);
        let cols_per_block = factor.min(src_width.max(1));
        let rows_per_band = factor.min(src_height.max(1));
        Self {
            width,
            height,
            factor: factor as usize,
            rows_per_band,
            divisor: cols_per_block * rows_per_band,
            sums: vec![0; width as usize * 3],
            rows_in_band: 0,
            pixels: Vec::with_capacity(width as usize * height as usize * 3),
        }
    }

    fn push_row(&mut self, row: &[u8], channels: usize) {
        if self.pixels.len() == self.sums.len() * self.height as usize {
            return;
        }
        for (x, pixel) in row.chunks_exact(channels).enumerate() {
            let block = x / self.factor;
            let Some(sum) = self.sums.get_mut(block * 3..block * 3 + 3) else {
                break;
            };
            let rgb = if channels < 3 {
                [pixel[0]; 3]
            } else {
                [pixel[0], pixel[1], pixel[2]]
            };
            for (total, value) in sum.iter_mut().zip(rgb) {
                *total += u32::from(value);
            }
        }

        self.rows_in_band += 1;
        if self.rows_in_band == self.rows_per_band {
            let divisor = self.divisor;
            self.pixels.extend(
                self.sums
                    .iter()
                    .map(|&total| ((total + divisor / 2) / divisor) as u8),
            );
            self.sums.fill(0);
            self.rows_in_band = 0;
        }
    }

    fn finish(self) -> Result<RgbImage, CodecError> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| "PNG ended before every row was decoded".into())
    }
}

/// Resize an RGB image with fast_image_resize
pub(crate) fn resize_rgb(
    source: RgbImage,
    width: u32,
    height: u32,
    filter: fr::FilterType,
) -> Result<RgbImage, CodecError> {
    let (src_width, src_height) = source.dimensions();
    if (src_width, src_height) == (width, height) {
        return Ok(source);
    }

    let src_image = fr::Image::from_vec_u8(
        NonZeroU32::new(src_width).ok_or("Invalid source width")?,
        NonZeroU32::new(src_height).ok_or("Invalid source height")?,
        source.into_raw(),
        fr::PixelType::U8x3,
    )?;

    let dst_width = NonZeroU32::new(width).ok_or("Invalid target width")?;
    let dst_height = NonZeroU32::new(height).ok_or("Invalid target height")?;
    let mut dst_image = fr::Image::new(dst_width, dst_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(filter));
    resizer.resize(&src_image.view(), &mut dst_image.view_mut())?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| "Resized buffer does not match target dimensions".into())
}
