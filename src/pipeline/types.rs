//! Core types shared by the renderer and the engine backends

use bytes::Bytes;
use std::fmt;

/// Media type advertised on the ingest stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaCaps {
    pub media_type: &'static str,
    pub fields: &'static [(&'static str, &'static str)],
}

/// H.264 Annex-B access units, one per buffer.
///
/// The sender tags its stream as colorimetry 1:3:5:1 (full range BT.709),
/// which the engine does not enumerate. The closest known tag is `bt709`
/// (2:3:5:1, limited range), so that is what gets advertised.
pub const H264_INGEST_CAPS: MediaCaps = MediaCaps {
    media_type: "video/x-h264",
    fields: &[
        ("colorimetry", "bt709"),
        ("stream-format", "byte-stream"),
        ("alignment", "au"),
    ],
};

impl MediaCaps {
    pub fn field(&self, name: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

impl fmt::Display for MediaCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type)?;
        for (key, value) in self.fields {
            write!(f, ",{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Valid data starts with a start code, so its first byte is zero.
/// A non-zero first byte is how the decrypt stage flags a failure.
pub fn is_decrypted(payload: &[u8]) -> bool {
    payload.first() == Some(&0)
}

/// One encoded video frame as handed over by the decrypt stage.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Annex-B data; the first byte doubles as the decryption marker
    pub data: Bytes,

    /// Presentation timestamp in pipeline clock ticks (nanoseconds)
    pub pts: u64,

    /// Number of NAL units in `data`, informational only
    pub nal_count: u32,
}

impl AccessUnit {
    pub fn new(data: impl Into<Bytes>, pts: u64, nal_count: u32) -> Self {
        Self {
            data: data.into(),
            pts,
            nal_count,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for AccessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessUnit")
            .field("pts", &self.pts)
            .field("nal_count", &self.nal_count)
            .field("size", &self.size())
            .finish()
    }
}

/// Source and display dimensions reported by the mirroring session.
///
/// Recorded for diagnostics only; nothing in the pipeline consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub width_source: u16,
    pub height_source: u16,
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    /// Session dimensions arrive as floats; they are truncated to whole pixels.
    pub fn from_f32(width_source: f32, height_source: f32, width: f32, height: f32) -> Self {
        Self {
            width_source: width_source as u16,
            height_source: height_source as u16,
            width: width as u16,
            height: height as u16,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wxh = {}x{}; source {}x{}",
            self.width, self.height, self.width_source, self.height_source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_caps_string() {
        assert_eq!(
            H264_INGEST_CAPS.to_string(),
            "video/x-h264,colorimetry=bt709,stream-format=byte-stream,alignment=au"
        );
        assert_eq!(H264_INGEST_CAPS.field("alignment"), Some("au"));
        assert_eq!(H264_INGEST_CAPS.field("framerate"), None);
    }

    #[test]
    fn test_decryption_marker() {
        assert!(is_decrypted(&[0, 0, 0, 1, 0x65]));
        assert!(!is_decrypted(&[1, 0, 0, 1, 0x65]));
        assert!(!is_decrypted(&[]));
    }

    #[test]
    fn test_geometry_truncates() {
        let geometry = Geometry::from_f32(1920.7, 1080.2, 1280.0, 720.9);
        assert_eq!(geometry.width_source, 1920);
        assert_eq!(geometry.height, 720);
        assert_eq!(geometry.to_string(), "wxh = 1280x720; source 1920x1080");
    }
}
