//! Notification handling for the Tone Equalizer
//! This module decodes frames pushed by the device and applies the volume they carry

use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::transport::NotificationStream;
use crate::core::bluetooth::types::NotificationFrame;
use crate::core::payload::decode_payload;
use crate::core::volume::VolumeProvider;
use crate::error::{DecodeError, DispatchError, NotificationError, TransportError};

/// What happened to a successfully decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The host volume was set to this level
    Applied(u8),
    /// Dispatch is disabled here, the payload was only logged
    LoggedOnly,
    /// The payload carried no `value`
    NoValue,
}

/// Why the notification loop stopped
#[derive(Debug)]
pub enum ListenStopReason {
    Cancelled,
    StreamEnded,
    LinkError(TransportError),
}

/// Notification handler for Tone payloads
#[derive(Clone)]
pub struct NotificationHandler {
    volume: Arc<dyn VolumeProvider>,
    dispatch_enabled: bool,
}

impl NotificationHandler {
    /// Create a new NotificationHandler. Dispatch only happens when requested and the
    /// backend can actually set the volume.
    pub fn new(volume: Arc<dyn VolumeProvider>, dispatch: bool) -> Self {
        let dispatch_enabled = dispatch && volume.can_set();
        Self {
            volume,
            dispatch_enabled,
        }
    }

    pub fn dispatch_enabled(&self) -> bool {
        self.dispatch_enabled
    }

    pub fn volume_provider(&self) -> &Arc<dyn VolumeProvider> {
        &self.volume
    }

    /// Decode one frame and act on it
    pub async fn handle_frame(
        &self,
        frame: &NotificationFrame,
    ) -> Result<Dispatch, NotificationError> {
        let payload = decode_payload(&frame.data)?;
        info!(target: "tone", "From {}: {}", frame.characteristic, payload);

        if !self.dispatch_enabled {
            return Ok(Dispatch::LoggedOnly);
        }
        match payload.volume()? {
            Some(volume) => {
                self.volume
                    .set_volume(volume)
                    .await
                    .map_err(DispatchError::from)?;
                debug!("Volume set to {}", volume);
                Ok(Dispatch::Applied(volume))
            }
            None => {
                debug!("Payload carries no value, nothing to dispatch");
                Ok(Dispatch::NoValue)
            }
        }
    }

    /// Handles frames until the stream ends, fails, or `cancel` fires.
    /// Bad frames are logged and skipped.
    pub async fn process_notifications(
        &self,
        mut notification_stream: NotificationStream,
        cancel: &CancellationToken,
    ) -> ListenStopReason {
        info!("Listening for messages...");
        loop {
            tokio::select! {
                result = notification_stream.next() => {
                    match result {
                        Some(Ok(frame)) => {
                            debug!("Received data: {:?}", frame.data);
                            match self.handle_frame(&frame).await {
                                Ok(_) => {}
                                Err(NotificationError::Decode(DecodeError::Empty)) => {
                                    debug!("Ignoring empty notification");
                                }
                                Err(e) => error!("{}", e),
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            return ListenStopReason::LinkError(e);
                        }
                        None => {
                            info!("Notification stream ended");
                            return ListenStopReason::StreamEnded;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Stopping notifications");
                    return ListenStopReason::Cancelled;
                }
            }
        }
    }
}
