use crate::pipeline::AccessUnit;
use bytes::Bytes;

/// One access unit cut out of an Annex-B byte stream, start codes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUnit {
    pub data: Bytes,
    pub nal_count: u32,
    /// Contains an IDR slice
    pub keyframe: bool,
}

impl EncodedUnit {
    /// Stamp the unit as frame number `index` of a stream running at `fps`.
    pub fn into_access_unit(self, index: u64, fps: u32) -> AccessUnit {
        AccessUnit::new(self.data, index * frame_duration(fps), self.nal_count)
    }
}

/// Frame duration in nanoseconds. A zero rate is treated as 1 fps.
pub fn frame_duration(fps: u32) -> u64 {
    1_000_000_000 / u64::from(fps.max(1))
}

struct Nal {
    /// Offset of the start code
    start: usize,
    nal_type: u8,
    /// first_mb_in_slice is zero, i.e. this slice opens a new picture
    first_slice: bool,
}

/// Locate every NAL unit. Both 3 and 4 byte start codes are accepted.
fn scan(data: &[u8]) -> Vec<Nal> {
    let mut nals = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let start = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
            let header = i + 3;
            if header < data.len() {
                nals.push(Nal {
                    start,
                    nal_type: data[header] & 0x1F,
                    // ue(v) zero is coded as a single set bit
                    first_slice: data.get(header + 1).is_some_and(|b| b & 0x80 != 0),
                });
            }
            i = header;
        } else {
            i += 1;
        }
    }
    nals
}

fn is_vcl(nal_type: u8) -> bool {
    nal_type == 1 || nal_type == 5
}

/// Whether `nal` opens a new access unit once the current one holds a slice.
fn opens_access_unit(nal: &Nal) -> bool {
    match nal.nal_type {
        // SEI, SPS, PPS, AUD, prefix and reserved types
        6..=9 | 14..=18 => true,
        t if is_vcl(t) => nal.first_slice,
        _ => false,
    }
}

/// Split an Annex-B H.264 elementary stream into access units.
///
/// Bytes before the first start code are discarded. The returned units share
/// the input buffer.
pub fn split_access_units(data: Bytes) -> Vec<EncodedUnit> {
    let nals = scan(&data);
    let mut units = Vec::new();

    let mut unit_start = None;
    let mut nal_count = 0u32;
    let mut has_slice = false;
    let mut keyframe = false;

    for nal in &nals {
        if has_slice && opens_access_unit(nal) {
            if let Some(start) = unit_start {
                units.push(EncodedUnit {
                    data: data.slice(start..nal.start),
                    nal_count,
                    keyframe,
                });
            }
            unit_start = None;
            nal_count = 0;
            has_slice = false;
            keyframe = false;
        }

        unit_start.get_or_insert(nal.start);
        nal_count += 1;
        has_slice |= is_vcl(nal.nal_type);
        keyframe |= nal.nal_type == 5;
    }

    if let Some(start) = unit_start {
        units.push(EncodedUnit {
            data: data.slice(start..),
            nal_count,
            keyframe,
        });
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1F];
    const PPS: &[u8] = &[0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80];
    const IDR: &[u8] = &[0, 0, 0, 1, 0x65, 0x88, 0x84, 0x21];
    const P_FIRST: &[u8] = &[0, 0, 1, 0x41, 0x9A, 0x02];
    const P_SECOND: &[u8] = &[0, 0, 1, 0x41, 0x1A, 0x02];

    fn stream(parts: &[&[u8]]) -> Bytes {
        Bytes::from(parts.concat())
    }

    #[test]
    fn test_parameter_sets_stay_with_idr() {
        let units = split_access_units(stream(&[SPS, PPS, IDR, P_FIRST]));

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].nal_count, 3);
        assert!(units[0].keyframe);
        assert_eq!(units[0].data, stream(&[SPS, PPS, IDR]));
        assert_eq!(units[1].data, Bytes::from_static(P_FIRST));
        assert!(!units[1].keyframe);
    }

    #[test]
    fn test_multi_slice_picture() {
        let units = split_access_units(stream(&[IDR, P_FIRST, P_SECOND, P_FIRST]));

        assert_eq!(units.len(), 3);
        assert_eq!(units[1].nal_count, 2);
        assert_eq!(units[1].data, stream(&[P_FIRST, P_SECOND]));
    }

    #[test]
    fn test_leading_garbage_and_empty_input() {
        assert!(split_access_units(Bytes::new()).is_empty());
        assert!(split_access_units(Bytes::from_static(&[1, 2, 3])).is_empty());

        let units = split_access_units(stream(&[&[0xFF, 0xEE], IDR]));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].data, Bytes::from_static(IDR));
        assert_eq!(units[0].data[0], 0);
    }

    #[test]
    fn test_access_unit_timestamps() {
        assert_eq!(frame_duration(25), 40_000_000);
        assert_eq!(frame_duration(0), 1_000_000_000);

        let units = split_access_units(stream(&[IDR, P_FIRST]));
        let au = units[1].clone().into_access_unit(1, 25);
        assert_eq!(au.pts, 40_000_000);
        assert_eq!(au.nal_count, 1);
    }
}
