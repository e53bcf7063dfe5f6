pub const RGB_CHANNELS: u8 = 3;
pub const RGBA_CHANNELS: u8 = 4;

/// Encodes 8-bit pixels as an in-memory PNG. When `flip_vertical` is set the
/// rows are written bottom-up.
pub fn encode_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    flip_vertical: bool,
) -> Result<Vec<u8>, String> {
    let color = match channels {
        RGB_CHANNELS => png::ColorType::Rgb,
        RGBA_CHANNELS => png::ColorType::Rgba,
        other => return Err(format!("unsupported channel count: {}", other)),
    };

    if width == 0 || height == 0 {
        return Err(format!("invalid image size {}x{}", width, height));
    }

    let row_len = width as usize * channels as usize;
    let expected = row_len * height as usize;
    if pixels.len() != expected {
        return Err(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}x{}",
            pixels.len(),
            expected,
            width,
            height,
            channels
        ));
    }

    let flipped;
    let data = if flip_vertical {
        flipped = flip_rows(pixels, row_len);
        flipped.as_slice()
    } else {
        pixels
    };

    let mut out = Vec::with_capacity(expected / 2);
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);
    encoder.set_filter(png::Filter::Sub);
    let mut png_writer = encoder
        .write_header()
        .map_err(|err| format!("png header failed: {}", err))?;
    png_writer
        .write_image_data(data)
        .map_err(|err| format!("png write failed: {}", err))?;
    png_writer
        .finish()
        .map_err(|err| format!("png finish failed: {}", err))?;

    Ok(out)
}

fn flip_rows(pixels: &[u8], row_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len());
    for row in pixels.chunks_exact(row_len).rev() {
        out.extend_from_slice(row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>) {
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let mut reader = decoder.read_info().unwrap();
        let (w, h) = (reader.info().width, reader.info().height);
        let mut buf = vec![0; (w * h * 4) as usize];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    #[test]
    fn encodes_rgb_with_signature_and_size() {
        let pixels: Vec<u8> = (0..(4 * 2 * 3)).map(|i| i as u8).collect();
        let bytes = encode_png(&pixels, 4, 2, RGB_CHANNELS, false).unwrap();

        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let (info, decoded) = decode(&bytes);
        assert_eq!((info.width, info.height), (4, 2));
        assert_eq!(info.color_type, png::ColorType::Rgb);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn flips_rows_when_origin_is_bottom_left() {
        // 1x3 image: red, green, blue rows.
        let pixels = [255, 0, 0, 0, 255, 0, 0, 0, 255];
        let bytes = encode_png(&pixels, 1, 3, RGB_CHANNELS, true).unwrap();

        let (_, decoded) = decode(&bytes);
        assert_eq!(decoded, vec![0, 0, 255, 0, 255, 0, 255, 0, 0]);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let err = encode_png(&[0; 5], 2, 1, RGB_CHANNELS, false).unwrap_err();
        assert!(err.contains("expected 6"));

        assert!(encode_png(&[0; 4], 1, 1, 2, false).is_err());
        assert!(encode_png(&[], 0, 1, RGB_CHANNELS, false).is_err());
    }
}
