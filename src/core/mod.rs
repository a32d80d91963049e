//! Core functionality for the Tone bridge
//! Bluetooth session handling, payload codecs and host volume backends

pub mod bluetooth;
pub mod payload;
pub mod volume;

// Re-export commonly used types
pub use bluetooth::{BluestTransport, SessionController};
pub use payload::{decode_payload, encode_volume_frame, DecodedPayload};
pub use volume::{provider_for_os, VolumeProvider};
