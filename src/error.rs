//! Error kinds for the Tone bridge.
//! Only [`SessionError`] aborts a session; every other kind is absorbed where it is
//! detected and surfaced through the log.

use thiserror::Error;

use crate::core::bluetooth::types::Capability;

/// Failures reported by the Bluetooth transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    AdapterUnavailable,

    #[error("bluetooth error: {0}")]
    Bluest(#[from] bluest::Error),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("device {0} is not known to the adapter")]
    UnknownDevice(String),

    #[error("characteristic handle {0} is not part of this connection")]
    UnknownCharacteristic(usize),

    #[error("link closed")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// A scan attempt failed. Never fatal: the attempt reports "no match".
#[derive(Error, Debug)]
#[error("scan failed: {0}")]
pub struct ScanError(#[from] pub TransportError);

/// The connected peer does not expose what the session needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("no characteristic with {capability} support")]
    MissingCharacteristic { capability: Capability },
}

/// An inbound frame could not be turned into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload is not an object")]
    NotAnObject,
}

/// Errors from the host volume backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VolumeError {
    #[error("volume command failed: {0}")]
    Command(String),

    #[error("could not parse volume output: {0:?}")]
    Parse(String),

    #[error("setting the volume is not supported on this host")]
    Unsupported,
}

/// Acting on a decoded payload failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("\"value\" is not a volume: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// Tagged result of handling one notification frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("error decoding data: {0}")]
    Decode(#[from] DecodeError),

    #[error("error dispatching payload: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Errors that end a session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Connection(#[source] TransportError),

    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("initial write failed: {0}")]
    InitialWrite(#[source] TransportError),

    #[error("subscribing to notifications failed: {0}")]
    Subscribe(#[source] TransportError),

    #[error("device not found after {attempts} scan attempts")]
    DiscoveryExhausted { attempts: u32 },
}
