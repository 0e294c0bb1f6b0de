use std::fmt;
use std::path::Path;

/// A four-character code identifying a codec in container metadata.
///
/// Stored little-endian, so the first character is the low byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(u32);

impl FourCc {
    /// Motion JPEG.
    pub const MJPG: Self = Self::from_bytes(*b"MJPG");
    /// H.264 / AVC.
    pub const H264: Self = Self::from_bytes(*b"H264");

    /// Pack four characters.
    #[must_use]
    pub const fn from_bytes(code: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(code))
    }

    /// The packed integer value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The four characters.
    #[must_use]
    pub const fn bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Container file formats a recording can be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// RIFF AVI.
    Avi,
    /// ISO base media (MP4).
    Mp4,
}

impl Container {
    /// Canonical file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Avi => "avi",
            Self::Mp4 => "mp4",
        }
    }
}

/// Recording codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    /// Motion JPEG in an AVI container.
    #[default]
    Mjpg,
    /// H.264 in an MP4 container.
    H264,
}

/// Result of picking a codec from an output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecChoice {
    /// Codec to record with.
    pub codec: Codec,
    /// False when the extension was neither `.avi` nor `.mp4` and MJPG was
    /// picked as the fallback.
    pub recognized: bool,
}

impl Codec {
    /// FourCC identifier written into container metadata.
    #[must_use]
    pub const fn fourcc(self) -> FourCc {
        match self {
            Self::Mjpg => FourCc::MJPG,
            Self::H264 => FourCc::H264,
        }
    }

    /// Container this codec is recorded into.
    #[must_use]
    pub const fn container(self) -> Container {
        match self {
            Self::Mjpg => Container::Avi,
            Self::H264 => Container::Mp4,
        }
    }

    /// Pick a codec from the output path's extension.
    ///
    /// `.mp4` (any case) selects H.264; anything else selects MJPG.
    #[must_use]
    pub fn for_path(path: impl AsRef<Path>) -> CodecChoice {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mp4") => CodecChoice {
                codec: Self::H264,
                recognized: true,
            },
            Some("avi") => CodecChoice {
                codec: Self::Mjpg,
                recognized: true,
            },
            _ => CodecChoice {
                codec: Self::Mjpg,
                recognized: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpg_matches_packed_constant() {
        assert_eq!(FourCc::MJPG.value(), 1_196_444_237);
        assert_eq!(FourCc::MJPG.to_string(), "MJPG");
    }

    #[test]
    fn h264_round_trips_characters() {
        assert_eq!(&FourCc::H264.bytes(), b"H264");
        assert_eq!(FourCc::H264.value(), u32::from_le_bytes(*b"H264"));
        assert_ne!(FourCc::H264.value(), 875_967_075);
        assert_eq!(FourCc::from_bytes(*b"c264").value(), 875_967_075);
    }

    #[test]
    fn mp4_selects_h264() {
        for path in ["clip.mp4", "clip.MP4", "/videos/a.b.Mp4"] {
            let choice = Codec::for_path(path);
            assert_eq!(choice.codec, Codec::H264, "{path}");
            assert!(choice.recognized);
            assert_eq!(choice.codec.fourcc(), FourCc::H264);
            assert_eq!(choice.codec.container(), Container::Mp4);
        }
    }

    #[test]
    fn everything_else_selects_mjpg() {
        assert_eq!(
            Codec::for_path("clip.avi"),
            CodecChoice {
                codec: Codec::Mjpg,
                recognized: true
            }
        );
        for path in ["clip.mkv", "clip", "clip.mp4.bak", ".mp4"] {
            let choice = Codec::for_path(path);
            assert_eq!(choice.codec, Codec::Mjpg, "{path}");
            assert!(!choice.recognized, "{path}");
            assert_eq!(choice.codec.fourcc(), FourCc::MJPG);
        }
    }
}
