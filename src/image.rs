use std::io::{self, Read, Write};
use png::{self, BitDepth, ColorType};

/// An 8-bit RGBA image.
pub struct Image {
    pub size: (u32, u32),
    pub data: Box<[[u8; 4]]>,
}

impl Image {
    pub fn new(w: u32, h: u32) -> Image {
        let size = w as usize * h as usize;
        Image {
            size: (w, h),
            data: vec![[0; 4]; size].into_boxed_slice(),
        }
    }

    /// Decode a PNG of any color type into RGBA.  Palette and low-depth images are expanded;
    /// 16-bit channels keep their high byte.
    pub fn read_png<R: Read>(r: R) -> io::Result<Image> {
        let mut decoder = png::Decoder::new(r);
        decoder.set_transformations(png::Transformations::EXPAND);
        let (info, mut reader) = decoder.read_info().map_err(decode_err)?;
        let mut buf = vec![0; info.buffer_size()];
        reader.next_frame(&mut buf).map_err(decode_err)?;

        let channels = match info.color_type {
            ColorType::Grayscale => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::RGB => 3,
            ColorType::RGBA => 4,
            ColorType::Indexed => return Err(io::Error::new(
                io::ErrorKind::InvalidData, "palette was not expanded")),
        };
        let depth = match info.bit_depth {
            BitDepth::Sixteen => 2,
            _ => 1,
        };

        let mut img = Image::new(info.width, info.height);
        let stride = channels * depth;
        for (px, raw) in img.data.iter_mut().zip(buf.chunks(stride)) {
            if raw.len() < stride {
                break;
            }
            let c = |i: usize| raw[i * depth];
            *px = match channels {
                1 => [c(0), c(0), c(0), 255],
                2 => [c(0), c(0), c(0), c(1)],
                3 => [c(0), c(1), c(2), 255],
                _ => [c(0), c(1), c(2), c(3)],
            };
        }
        Ok(img)
    }

    /// True if any pixel is less than fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.data.iter().any(|px| px[3] < 255)
    }
}

/// Encode 8-bit pixel rows as a PNG.  `data` holds `size.0 * size.1` pixels of `color`, top row
/// first.
pub fn write_png<W: Write>(w: W, size: (u32, u32), color: ColorType, data: &[u8]) -> io::Result<()> {
    let mut enc = png::Encoder::new(w, size.0, size.1);
    enc.set_color(color);
    enc.set_depth(BitDepth::Eight);
    let mut writer = enc.write_header()?;
    writer.write_image_data(data)?;
    Ok(())
}

fn decode_err(e: png::DecodingError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}
