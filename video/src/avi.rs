//! Minimal RIFF AVI muxer for a single MJPG video stream.

use crate::VideoError;
use byteorder::{LittleEndian, WriteBytesExt};
use camkit_codec::FourCc;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

const AVIF_HASINDEX: u32 = 0x10;
const AVIF_ISINTERLEAVED: u32 = 0x100;
const AVIIF_KEYFRAME: u32 = 0x10;
const VIDEO_CHUNK: &[u8; 4] = b"00dc";

/// RIFF 1.0 caps every size field at 32 bits.
const MAX_RIFF_SIZE: u64 = u32::MAX as u64;

/// Offsets of header fields that are only known once recording ends.
#[derive(Debug, Default)]
struct Placeholders {
    riff_size: u64,
    max_bytes_per_sec: u64,
    total_frames: u64,
    avih_buffer_size: u64,
    strh_length: u64,
    strh_buffer_size: u64,
    movi_size: u64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u32,
    size: u32,
}

/// Writes JPEG payloads as `00dc` chunks and an `idx1` index.
pub(crate) struct AviMuxer {
    file: BufWriter<File>,
    fps: u32,
    position: u64,
    movi_fourcc: u64,
    max_chunk: u32,
    index: Vec<IndexEntry>,
    placeholders: Placeholders,
}

impl AviMuxer {
    pub(crate) fn create(
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        fourcc: FourCc,
    ) -> Result<Self, VideoError> {
        let (header, placeholders) = build_header(width, height, fps, fourcc)?;
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&header)?;

        let position = header.len() as u64;
        Ok(Self {
            file,
            fps,
            position,
            // The header ends with "LIST" <size> "movi".
            movi_fourcc: position - 4,
            max_chunk: 0,
            index: Vec::new(),
            placeholders,
        })
    }

    pub(crate) fn write_chunk(&mut self, payload: &[u8]) -> Result<(), VideoError> {
        let size = u32::try_from(payload.len())
            .map_err(|_| VideoError::Container("frame exceeds 4 GiB".into()))?;
        let padded = payload.len() as u64 + payload.len() as u64 % 2;

        // Leave room for this chunk's index entry and the index header.
        let projected = self.position + 8 + padded + 8 + (self.index.len() as u64 + 1) * 16;
        if projected > MAX_RIFF_SIZE {
            return Err(VideoError::Container(
                "AVI file would exceed 4 GiB".into(),
            ));
        }

        let offset = u32::try_from(self.position - self.movi_fourcc)
            .map_err(|_| VideoError::Container("chunk offset overflow".into()))?;
        self.file.write_all(VIDEO_CHUNK)?;
        self.file.write_u32::<LittleEndian>(size)?;
        self.file.write_all(payload)?;
        if payload.len() % 2 == 1 {
            self.file.write_u8(0)?;
        }

        self.index.push(IndexEntry { offset, size });
        self.max_chunk = self.max_chunk.max(size);
        self.position += 8 + padded;
        Ok(())
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.index.len() as u64
    }

    /// Append the index and patch every size and count in the header.
    pub(crate) fn finish(mut self) -> Result<u64, VideoError> {
        let movi_end = self.position;

        self.file.write_all(b"idx1")?;
        self.file
            .write_u32::<LittleEndian>(to_u32(self.index.len() as u64 * 16)?)?;
        for entry in &self.index {
            self.file.write_all(VIDEO_CHUNK)?;
            self.file.write_u32::<LittleEndian>(AVIIF_KEYFRAME)?;
            self.file.write_u32::<LittleEndian>(entry.offset)?;
            self.file.write_u32::<LittleEndian>(entry.size)?;
        }
        self.position += 8 + self.index.len() as u64 * 16;

        let frames = to_u32(self.frame_count())?;
        let buffer_size = self.max_chunk + 8;
        let p = &self.placeholders;
        let patches = [
            (p.riff_size, to_u32(self.position - 8)?),
            (p.max_bytes_per_sec, self.max_chunk.saturating_mul(self.fps)),
            (p.total_frames, frames),
            (p.avih_buffer_size, buffer_size),
            (p.strh_length, frames),
            (p.strh_buffer_size, buffer_size),
            (p.movi_size, to_u32(movi_end - self.movi_fourcc)?),
        ];

        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;
        for (offset, value) in patches {
            file.seek(SeekFrom::Start(offset))?;
            file.write_u32::<LittleEndian>(value)?;
        }
        file.flush()?;
        Ok(u64::from(frames))
    }
}

fn to_u32(value: u64) -> Result<u32, VideoError> {
    u32::try_from(value).map_err(|_| VideoError::Container("AVI size field overflow".into()))
}

/// Patch a little-endian u32 inside an in-memory header.
fn patch(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Build everything up to and including the `movi` list header.
fn build_header(
    width: u32,
    height: u32,
    fps: u32,
    fourcc: FourCc,
) -> Result<(Vec<u8>, Placeholders), VideoError> {
    let mut h = Vec::with_capacity(224);
    let mut p = Placeholders::default();
    let here = |h: &Vec<u8>| h.len() as u64;

    h.write_all(b"RIFF")?;
    p.riff_size = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_all(b"AVI ")?;

    // hdrl
    h.write_all(b"LIST")?;
    let hdrl_size = h.len();
    h.write_u32::<LittleEndian>(0)?;
    h.write_all(b"hdrl")?;

    // avih
    h.write_all(b"avih")?;
    h.write_u32::<LittleEndian>(56)?;
    h.write_u32::<LittleEndian>(1_000_000 / fps)?; // Microseconds per frame
    p.max_bytes_per_sec = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_u32::<LittleEndian>(0)?; // Padding granularity
    h.write_u32::<LittleEndian>(AVIF_HASINDEX | AVIF_ISINTERLEAVED)?;
    p.total_frames = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_u32::<LittleEndian>(0)?; // Initial frames
    h.write_u32::<LittleEndian>(1)?; // Streams
    p.avih_buffer_size = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_u32::<LittleEndian>(width)?;
    h.write_u32::<LittleEndian>(height)?;
    h.write_all(&[0u8; 16])?; // Reserved

    // strl
    h.write_all(b"LIST")?;
    let strl_size = h.len();
    h.write_u32::<LittleEndian>(0)?;
    h.write_all(b"strl")?;

    // strh
    h.write_all(b"strh")?;
    h.write_u32::<LittleEndian>(56)?;
    h.write_all(b"vids")?;
    h.write_all(&fourcc.bytes())?;
    h.write_u32::<LittleEndian>(0)?; // Flags
    h.write_u16::<LittleEndian>(0)?; // Priority
    h.write_u16::<LittleEndian>(0)?; // Language
    h.write_u32::<LittleEndian>(0)?; // Initial frames
    h.write_u32::<LittleEndian>(1)?; // Scale
    h.write_u32::<LittleEndian>(fps)?; // Rate
    h.write_u32::<LittleEndian>(0)?; // Start
    p.strh_length = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    p.strh_buffer_size = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_i32::<LittleEndian>(-1)?; // Quality (driver default)
    h.write_u32::<LittleEndian>(0)?; // Sample size
    h.write_i16::<LittleEndian>(0)?; // rcFrame
    h.write_i16::<LittleEndian>(0)?;
    h.write_i16::<LittleEndian>(i16::try_from(width).unwrap_or(i16::MAX))?;
    h.write_i16::<LittleEndian>(i16::try_from(height).unwrap_or(i16::MAX))?;

    // strf (BITMAPINFOHEADER)
    h.write_all(b"strf")?;
    h.write_u32::<LittleEndian>(40)?;
    h.write_u32::<LittleEndian>(40)?;
    h.write_i32::<LittleEndian>(i32::try_from(width).unwrap_or(i32::MAX))?;
    h.write_i32::<LittleEndian>(i32::try_from(height).unwrap_or(i32::MAX))?;
    h.write_u16::<LittleEndian>(1)?; // Planes
    h.write_u16::<LittleEndian>(24)?; // Bit count
    h.write_all(&fourcc.bytes())?;
    h.write_u32::<LittleEndian>(width.saturating_mul(height).saturating_mul(3))?;
    h.write_all(&[0u8; 16])?; // Resolution and palette fields

    let strl_len = to_u32((h.len() - strl_size - 4) as u64)?;
    patch(&mut h, strl_size, strl_len);
    let hdrl_len = to_u32((h.len() - hdrl_size - 4) as u64)?;
    patch(&mut h, hdrl_size, hdrl_len);

    // movi
    h.write_all(b"LIST")?;
    p.movi_size = here(&h);
    h.write_u32::<LittleEndian>(0)?;
    h.write_all(b"movi")?;

    Ok((h, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(data: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
    }

    /// Walk the top-level chunks of a RIFF file, returning (fourcc, offset, size).
    fn top_level_chunks(data: &[u8]) -> Vec<([u8; 4], usize, u32)> {
        let mut chunks = Vec::new();
        let mut at = 12;
        while at + 8 <= data.len() {
            let id: [u8; 4] = data[at..at + 4].try_into().unwrap();
            let size = u32_at(data, at + 4);
            chunks.push((id, at, size));
            at += 8 + size as usize + size as usize % 2;
        }
        chunks
    }

    #[test]
    fn header_layout_is_fixed() {
        let (header, p) = build_header(640, 480, 25, FourCc::MJPG).unwrap();
        assert_eq!(header.len(), 224);
        assert_eq!(&header[..4], b"RIFF");
        assert_eq!(&header[8..12], b"AVI ");
        // hdrl list covers avih (64) and strl (124) plus its own fourcc.
        assert_eq!(u32_at(&header, 16), 192);
        assert_eq!(u32_at(&header, 32), 40_000);
        assert_eq!(p.total_frames, 48);
        assert_eq!(&header[112..116], b"MJPG");
        assert_eq!(&header[212..216], b"LIST");
        assert_eq!(&header[220..224], b"movi");
    }

    #[test]
    fn finish_patches_sizes_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        let mut muxer = AviMuxer::create(&path, 4, 2, 10, FourCc::MJPG).unwrap();
        muxer.write_chunk(&[1, 2, 3]).unwrap(); // odd, gets a pad byte
        muxer.write_chunk(&[4, 5, 6, 7]).unwrap();
        assert_eq!(muxer.finish().unwrap(), 2);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(u32_at(&data, 4) as usize, data.len() - 8);
        assert_eq!(u32_at(&data, 48), 2, "avih total frames");
        assert_eq!(u32_at(&data, 140), 2, "strh length");
        assert_eq!(u32_at(&data, 60), 12, "suggested buffer");

        let chunks = top_level_chunks(&data);
        let ids: Vec<_> = chunks.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![*b"LIST", *b"LIST", *b"idx1"]);

        let (_, movi_at, movi_size) = chunks[1];
        assert_eq!(&data[movi_at + 8..movi_at + 12], b"movi");
        assert_eq!(movi_size, 4 + (8 + 4) + (8 + 4));

        let (_, idx_at, idx_size) = chunks[2];
        assert_eq!(idx_size, 32);
        let first = idx_at + 8;
        assert_eq!(&data[first..first + 4], b"00dc");
        assert_eq!(u32_at(&data, first + 4), AVIIF_KEYFRAME);
        assert_eq!(u32_at(&data, first + 8), 4);
        assert_eq!(u32_at(&data, first + 12), 3);

        // Offsets are relative to the "movi" fourcc.
        let second_offset = u32_at(&data, first + 24) as usize;
        let movi_fourcc = movi_at + 8;
        assert_eq!(&data[movi_fourcc + second_offset..][..4], b"00dc");
        assert_eq!(&data[movi_fourcc + second_offset + 8..][..4], &[4, 5, 6, 7]);
    }

    #[test]
    fn empty_recording_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.avi");
        let muxer = AviMuxer::create(&path, 2, 2, 25, FourCc::MJPG).unwrap();
        assert_eq!(muxer.finish().unwrap(), 0);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 224 + 8);
        assert_eq!(u32_at(&data, 216), 4);
    }

    #[test]
    fn refuses_to_grow_past_riff_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer =
            AviMuxer::create(&dir.path().join("big.avi"), 2, 2, 25, FourCc::MJPG).unwrap();
        muxer.position = MAX_RIFF_SIZE - 30;

        let err = muxer.write_chunk(&[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, VideoError::Container(ref msg) if msg.contains("4 GiB")));
        assert_eq!(muxer.frame_count(), 0);
        assert_eq!(muxer.position, MAX_RIFF_SIZE - 30);
    }
}
