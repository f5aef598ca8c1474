//! Encoded stream input for hosts that read H.264 from a file or pipe instead
//! of a mirroring session.

pub mod annexb;

pub use annexb::{EncodedUnit, frame_duration, split_access_units};
