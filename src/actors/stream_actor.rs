use std::net::SocketAddr;
use std::sync::Arc;

use async_broadcast::Receiver as BroadcastReceiver;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::config::StreamConfig;
use crate::framework::actor::Actor;
use crate::framework::frame_slot::FrameSlot;
use crate::framework::streams::BroadcastStream;
use crate::messages::camera_frame::CameraFrame;
use crate::messages::control_msg::ControlMsg;
use crate::mjpeg;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Jetson Camera Capture</title>
    <style>
        body { font-family: Arial; text-align: center; background: #222; color: white; padding: 20px; }
        img { max-width: 90%; border: 3px solid #0f0; margin: 20px auto; display: block; }
        h1 { color: #0f0; }
        .instructions { background: #333; padding: 20px; border-radius: 10px; margin: 20px auto; max-width: 600px; }
        .key { background: #0f0; color: #000; padding: 5px 10px; border-radius: 5px; font-weight: bold; }
    </style>
</head>
<body>
    <h1>Jetson Camera</h1>
    <div class="instructions">
        <p>Go back to your SSH terminal and press:</p>
        <p><span class="key">1</span> = Capture MIDDLE gesture</p>
        <p><span class="key">2</span> = Capture PEACE gesture</p>
        <p><span class="key">3</span> = Capture WOENSEL gesture</p>
        <p><span class="key">q</span> = Quit</p>
    </div>
    <img src="/video_feed" alt="Live Camera Feed">
</body>
</html>
"#;

#[derive(Clone)]
struct StreamState {
    frames: Arc<FrameSlot<CameraFrame>>,
    control: BroadcastStream<ControlMsg>,
    config: StreamConfig,
}

/// Serves the live preview page and its MJPEG feed.
pub struct StreamActor {
    state: StreamState,
    shutdown_rx: BroadcastReceiver<ControlMsg>,
}

impl StreamActor {
    pub(crate) fn new(
        config: StreamConfig,
        frames: Arc<FrameSlot<CameraFrame>>,
        control: BroadcastStream<ControlMsg>,
    ) -> Self {
        Self {
            shutdown_rx: control.broadcast_receiver(),
            state: StreamState { frames, control, config },
        }
    }

    #[cfg(test)]
    pub(crate) fn quit_received(&mut self) -> bool {
        crate::messages::control_msg::quit_pending(&mut self.shutdown_rx)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/video_feed", get(video_feed))
            .with_state(self.state.clone())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn video_feed(State(state): State<StreamState>) -> impl IntoResponse {
    if state.frames.is_ready() {
        debug!("Viewer connected");
    } else {
        debug!("Viewer connected, waiting for the first frame");
    }
    let parts = mjpeg::frame_stream(state.frames, state.control.broadcast_receiver(), state.config);
    ([(header::CONTENT_TYPE, mjpeg::CONTENT_TYPE)], Body::from_stream(parts))
}

async fn wait_for_quit(mut rx: BroadcastReceiver<ControlMsg>) {
    loop {
        match rx.recv_direct().await {
            Ok(ControlMsg::Quit) | Err(async_broadcast::RecvError::Closed) => return,
            Ok(_) | Err(async_broadcast::RecvError::Overflowed(_)) => {}
        }
    }
}

impl Actor for StreamActor {
    const NAME: &'static str = "stream";

    async fn on_started(self) {
        debug!("Stream actor started");

        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Could not listen on {}: {}", addr, e);
                return;
            }
        };
        match listener.local_addr() {
            Ok(local) => info!("Streaming on http://{} (open this device's address in a browser)", local),
            Err(_) => info!("Streaming on port {}", self.state.config.port),
        }

        let app = self.router();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_quit(self.shutdown_rx))
            .await;
        match result {
            Ok(()) => debug!("Stream server stopped"),
            Err(e) => error!("Stream server failed: {}", e),
        }
    }
}
