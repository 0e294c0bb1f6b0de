//! Channel-order conversion between capture and encoder layouts.
//!
//! Capture backends and encoders disagree on whether red or blue comes first
//! in a 24-bit pixel. The routines here reorder channels row by row, honoring
//! each buffer's own stride, with bounds-checked slice access throughout.

use crate::{CodecError, Frame, PixelFormat};

/// Validate that a buffer of `len` bytes can hold `height` rows of `width`
/// pixels spaced `stride` bytes apart.
pub(crate) fn check_geometry(
    len: usize,
    stride: usize,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Ok(());
    }
    let row = (width as usize)
        .checked_mul(bytes_per_pixel)
        .ok_or_else(|| CodecError::InvalidBuffer(format!("row of {width} pixels overflows")))?;
    if stride < row {
        return Err(CodecError::InvalidBuffer(format!(
            "stride {stride} is narrower than a {row}-byte row"
        )));
    }
    let needed = stride
        .checked_mul(height as usize - 1)
        .and_then(|n| n.checked_add(row))
        .ok_or_else(|| CodecError::InvalidBuffer(format!("{height} rows overflow")))?;
    if len < needed {
        return Err(CodecError::InvalidBuffer(format!(
            "{len} bytes cannot hold {width}x{height} (needs {needed})"
        )));
    }
    Ok(())
}

/// Copy `src` into `dst`, swapping the first and third channel of every
/// 24-bit pixel. Green is copied unchanged.
///
/// A zero-sized image is a no-op. `src` and `dst` are distinct buffers, so
/// there is no aliasing between the read and the write side.
///
/// # Errors
///
/// Returns `CodecError::InvalidBuffer` if either stride is narrower than a
/// row or either buffer is too short for `height` rows.
pub fn swap_red_blue(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: u32,
    height: u32,
) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Ok(());
    }
    check_geometry(src.len(), src_stride, width, height, 3)?;
    check_geometry(dst.len(), dst_stride, width, height, 3)?;

    let row = width as usize * 3;
    let rows = src
        .chunks(src_stride)
        .zip(dst.chunks_mut(dst_stride))
        .take(height as usize);
    for (src_row, dst_row) in rows {
        for (s, d) in src_row[..row]
            .chunks_exact(3)
            .zip(dst_row[..row].chunks_exact_mut(3))
        {
            d[0] = s[2];
            d[1] = s[1];
            d[2] = s[0];
        }
    }
    Ok(())
}

/// Swap the first and third channel of every 24-bit pixel in place.
///
/// # Errors
///
/// Returns `CodecError::InvalidBuffer` on the same conditions as [`swap_red_blue`].
pub fn swap_red_blue_in_place(
    buf: &mut [u8],
    stride: usize,
    width: u32,
    height: u32,
) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Ok(());
    }
    check_geometry(buf.len(), stride, width, height, 3)?;

    let row = width as usize * 3;
    for line in buf.chunks_mut(stride).take(height as usize) {
        for px in line[..row].chunks_exact_mut(3) {
            px.swap(0, 2);
        }
    }
    Ok(())
}

/// Expand a frame to tightly packed RGBA with opaque alpha.
///
/// # Errors
///
/// Returns `CodecError::InvalidBuffer` if the frame geometry is inconsistent.
pub fn to_rgba(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let bpp = frame.format.bytes_per_pixel();
    check_geometry(frame.data.len(), frame.stride, frame.width, frame.height, bpp)?;

    let width = frame.width as usize;
    let mut rgba = Vec::with_capacity(width * frame.height as usize * 4);
    if width == 0 || frame.height == 0 {
        return Ok(rgba);
    }
    for line in frame.data.chunks(frame.stride).take(frame.height as usize) {
        let pixels = line[..width * bpp].chunks_exact(bpp);
        match frame.format {
            PixelFormat::Rgb24 => {
                for px in pixels {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
            PixelFormat::Bgr24 => {
                for px in pixels {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
                }
            }
            PixelFormat::Rgba32 => rgba.extend_from_slice(&line[..width * 4]),
        }
    }
    Ok(rgba)
}

/// Reduce a 24-bit frame to full-range 8-bit luma.
///
/// # Errors
///
/// Returns `CodecError::Unsupported` for RGBA frames and
/// `CodecError::InvalidBuffer` if the frame geometry is inconsistent.
pub fn to_luma(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let (r, b) = match frame.format {
        PixelFormat::Rgb24 => (0, 2),
        PixelFormat::Bgr24 => (2, 0),
        PixelFormat::Rgba32 => {
            return Err(CodecError::Unsupported("luma from RGBA frame".into()));
        }
    };
    check_geometry(frame.data.len(), frame.stride, frame.width, frame.height, 3)?;

    let width = frame.width as usize;
    let mut luma = Vec::with_capacity(width * frame.height as usize);
    if width == 0 || frame.height == 0 {
        return Ok(luma);
    }
    for line in frame.data.chunks(frame.stride).take(frame.height as usize) {
        for px in line[..width * 3].chunks_exact(3) {
            let y = (77 * u32::from(px[r]) + 150 * u32::from(px[1]) + 29 * u32::from(px[b]) + 128)
                >> 8;
            luma.push(u8::try_from(y.min(255)).unwrap_or(u8::MAX));
        }
    }
    Ok(luma)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random bytes so failures are reproducible.
    fn pattern(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            })
            .collect()
    }

    #[test]
    fn swaps_red_and_blue_for_every_pixel() {
        for (width, height, pad) in [(1, 1, 0), (3, 2, 3), (7, 5, 1), (16, 9, 0), (5, 4, 7)] {
            let src_stride = width as usize * 3 + pad;
            let dst_stride = width as usize * 3;
            let src = pattern(src_stride * height as usize, width * 31 + height);
            let mut dst = vec![0u8; dst_stride * height as usize];

            swap_red_blue(&src, src_stride, &mut dst, dst_stride, width, height).unwrap();

            for y in 0..height as usize {
                for x in 0..width as usize {
                    let s = &src[y * src_stride + x * 3..][..3];
                    let d = &dst[y * dst_stride + x * 3..][..3];
                    assert_eq!(d, &[s[2], s[1], s[0]], "pixel ({x}, {y}) of {width}x{height}");
                }
            }
        }
    }

    #[test]
    fn swap_twice_restores_original() {
        let (width, height) = (13, 11);
        let stride = 13 * 3 + 1;
        let original = pattern(stride * height as usize, 7);
        let mut once = vec![0u8; stride * height as usize];
        let mut twice = vec![0u8; stride * height as usize];

        swap_red_blue(&original, stride, &mut once, stride, width, height).unwrap();
        swap_red_blue(&once, stride, &mut twice, stride, width, height).unwrap();

        for y in 0..height as usize {
            let row = y * stride..y * stride + width as usize * 3;
            assert_eq!(&twice[row.clone()], &original[row]);
        }
    }

    #[test]
    fn in_place_matches_copying_swap() {
        let (width, height, stride) = (6, 4, 20);
        let src = pattern(stride * height as usize, 3);
        let mut copied = vec![0u8; stride * height as usize];
        swap_red_blue(&src, stride, &mut copied, stride, width, height).unwrap();

        let mut in_place = src;
        swap_red_blue_in_place(&mut in_place, stride, width, height).unwrap();

        for y in 0..height as usize {
            let row = y * stride..y * stride + width as usize * 3;
            assert_eq!(&in_place[row.clone()], &copied[row]);
        }
    }

    #[test]
    fn single_pixel() {
        let mut dst = [0u8; 3];
        swap_red_blue(&[10, 20, 30], 3, &mut dst, 3, 1, 1).unwrap();
        assert_eq!(dst, [30, 20, 10]);
    }

    #[test]
    fn zero_sized_is_noop() {
        let mut dst: [u8; 0] = [];
        swap_red_blue(&[], 0, &mut dst, 0, 0, 0).unwrap();
        swap_red_blue(&[], 0, &mut dst, 0, 0, 10).unwrap();
        swap_red_blue(&[], 30, &mut dst, 30, 10, 0).unwrap();

        let mut untouched = [1u8, 2, 3];
        swap_red_blue_in_place(&mut untouched, 3, 0, 1).unwrap();
        assert_eq!(untouched, [1, 2, 3]);
    }

    #[test]
    fn narrow_stride_is_rejected() {
        let mut dst = [0u8; 12];
        let err = swap_red_blue(&[0; 12], 5, &mut dst, 6, 2, 2).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBuffer(_)));
    }

    #[test]
    fn short_destination_is_rejected() {
        let mut dst = [0u8; 8];
        let err = swap_red_blue(&[0; 12], 6, &mut dst, 6, 2, 2).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBuffer(_)));
    }

    #[test]
    fn last_row_may_omit_padding() {
        // Two rows of one pixel, stride 4, final row without its pad byte.
        let src = [1, 2, 3, 0, 4, 5, 6];
        let mut dst = [0u8; 6];
        swap_red_blue(&src, 4, &mut dst, 3, 1, 2).unwrap();
        assert_eq!(dst, [3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn rgba_expansion_from_bgr() {
        let frame = Frame::with_stride(vec![1, 2, 3, 9, 4, 5, 6, 9], 1, 2, 4, PixelFormat::Bgr24)
            .unwrap();
        assert_eq!(to_rgba(&frame).unwrap(), vec![3, 2, 1, 255, 6, 5, 4, 255]);
    }

    #[test]
    fn luma_of_primaries() {
        let frame = Frame::new(
            vec![255, 255, 255, 0, 0, 0, 255, 0, 0],
            3,
            1,
            PixelFormat::Rgb24,
        )
        .unwrap();
        let luma = to_luma(&frame).unwrap();
        assert_eq!(luma[0], 255);
        assert_eq!(luma[1], 0);
        assert_eq!(luma[2], 77);
    }

    #[test]
    fn zero_height_frame_converts_to_nothing() {
        for format in [PixelFormat::Bgr24, PixelFormat::Rgb24] {
            let frame = Frame::with_stride(Vec::new(), 4, 0, 0, format).unwrap();
            assert!(to_rgba(&frame).unwrap().is_empty());
            assert!(to_luma(&frame).unwrap().is_empty());
        }
        let frame = Frame::with_stride(Vec::new(), 0, 4, 0, PixelFormat::Bgr24).unwrap();
        assert!(to_rgba(&frame).unwrap().is_empty());
        assert!(to_luma(&frame).unwrap().is_empty());
    }
}
