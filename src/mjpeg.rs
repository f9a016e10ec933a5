//! Motion-JPEG over `multipart/x-mixed-replace`.

use std::convert::Infallible;
use std::sync::Arc;

use async_broadcast::Receiver as BroadcastReceiver;
use axum::body::Bytes;
use futures_util::stream::{self, Stream};
use log::{debug, warn};

use crate::config::StreamConfig;
use crate::framework::frame_slot::FrameSlot;
use crate::messages::camera_frame::CameraFrame;
use crate::messages::control_msg::{quit_pending, ControlMsg};

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut part = Vec::with_capacity(PART_HEADER.len() + jpeg.len() + 2);
    part.extend_from_slice(PART_HEADER);
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Per-viewer generator: one multipart part for every new frame in `slot`,
/// until `Quit` shows up on the control bus.
pub fn frame_stream(
    slot: Arc<FrameSlot<CameraFrame>>,
    control_rx: BroadcastReceiver<ControlMsg>,
    config: StreamConfig,
) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Send + 'static {
    let viewer = Viewer { slot, control_rx, config, last_sent: None };
    stream::unfold(viewer, |mut viewer| async move {
        let part = viewer.next_part().await?;
        Some((Ok(part), viewer))
    })
}

struct Viewer {
    slot: Arc<FrameSlot<CameraFrame>>,
    control_rx: BroadcastReceiver<ControlMsg>,
    config: StreamConfig,
    last_sent: Option<Arc<CameraFrame>>,
}

impl Viewer {
    async fn next_part(&mut self) -> Option<Bytes> {
        loop {
            if quit_pending(&mut self.control_rx) {
                debug!("Viewer stream finished");
                return None;
            }

            let Some(frame) = self.slot.take_copy() else {
                tokio::time::sleep(self.config.not_ready_backoff).await;
                continue;
            };
            if self.last_sent.as_ref().is_some_and(|last| Arc::ptr_eq(last, &frame)) {
                tokio::time::sleep(self.config.repeat_backoff).await;
                continue;
            }
            self.last_sent = Some(Arc::clone(&frame));

            let quality = self.config.jpeg_quality;
            let encoded = tokio::task::spawn_blocking(move || frame.to_jpeg(quality)).await;
            match encoded {
                Ok(Ok(jpeg)) => return Some(multipart_part(&jpeg)),
                Ok(Err(e)) => warn!("Skipping frame, JPEG encoding failed: {}", e),
                Err(e) => warn!("Skipping frame, encoder task failed: {}", e),
            }
        }
    }
}
