use std::marker::PhantomData;
use std::sync::Arc;

use async_broadcast::{Receiver as BroadcastReceiver, Sender as BroadcastSender, TryRecvError};
use log::{debug, error, warn};

use crate::camera::FrameSource;
use crate::config::CameraConfig;
use crate::dataset::{DatasetWriter, GestureClass};
use crate::framework::actor::Actor;
use crate::framework::frame_slot::FrameSlot;
use crate::framework::streams::BroadcastStream;
use crate::messages::camera_frame::CameraFrame;
use crate::messages::control_msg::ControlMsg;

/// Owns the camera: publishes every frame and saves samples on request.
///
/// The source `S` is opened on the actor's own thread.
pub struct CameraActor<S> {
    config: CameraConfig,
    frames: Arc<FrameSlot<CameraFrame>>,
    control_tx: BroadcastSender<ControlMsg>,
    control_rx: BroadcastReceiver<ControlMsg>,
    dataset: Option<DatasetWriter>,
    source: PhantomData<fn() -> S>,
}

impl<S: FrameSource> CameraActor<S> {
    pub(crate) fn new(
        config: CameraConfig,
        frames: Arc<FrameSlot<CameraFrame>>,
        control: BroadcastStream<ControlMsg>,
        dataset: Option<DatasetWriter>,
    ) -> Self {
        Self {
            config,
            frames,
            control_tx: control.broadcast_sender(),
            control_rx: control.broadcast_receiver(),
            dataset,
            source: PhantomData,
        }
    }

    /// Capture loop. Returns when `Quit` is received or the camera is lost.
    pub(crate) async fn run(&mut self, source: &mut S) {
        let mut failures = 0u32;
        loop {
            let frame = match source.next_frame() {
                Ok(frame) => {
                    failures = 0;
                    frame
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.max_read_failures {
                        error!("Camera lost after {} failed reads: {}", failures, e);
                        self.shutdown().await;
                        return;
                    }
                    warn!("{}", e);
                    continue;
                }
            };
            self.frames.publish(frame.clone());

            if self.handle_controls(&frame) {
                debug!("Capture loop stopped");
                return;
            }

            if let Some(interval) = self.config.frame_interval {
                tokio::time::sleep(interval).await;
            }
        }
    }

    /// Applies every pending command to `frame`. True once `Quit` was seen.
    fn handle_controls(&mut self, frame: &CameraFrame) -> bool {
        loop {
            match self.control_rx.try_recv() {
                Ok(ControlMsg::Save(class)) => self.save(class, frame),
                Ok(ControlMsg::Quit) | Err(TryRecvError::Closed) => return true,
                Err(TryRecvError::Overflowed(n)) => warn!("Dropped {} control message(s)", n),
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    fn save(&mut self, class: GestureClass, frame: &CameraFrame) {
        match self.dataset.as_mut() {
            Some(dataset) => {
                if let Err(e) = dataset.save(class, frame) {
                    error!("Could not save {} sample: {}", class, e);
                }
            }
            None => debug!("Ignoring save of {}, not capturing", class),
        }
    }

    async fn shutdown(&self) {
        let _ = self.control_tx.broadcast(ControlMsg::Quit).await;
    }

    #[cfg(test)]
    pub(crate) fn quit_received(&mut self) -> bool {
        crate::messages::control_msg::quit_pending(&mut self.control_rx)
    }
}

impl<S: FrameSource + 'static> Actor for CameraActor<S> {
    const NAME: &'static str = "camera";

    async fn on_started(mut self) {
        debug!("Camera actor started");

        let mut source = match S::open(&self.config) {
            Ok(source) => source,
            Err(e) => {
                error!("Error: {}", e);
                self.shutdown().await;
                return;
            }
        };

        self.run(&mut source).await;

        if let Some(dataset) = &self.dataset {
            dataset.log_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;
    use std::time::Duration;

    use tempfile::tempdir;

    use crate::error::{GestureError, Result};

    /// Plays back a fixed script; runs dry with read errors.
    struct ScriptedSource {
        script: VecDeque<Result<CameraFrame>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<CameraFrame>>) -> Self {
            Self { script: script.into() }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(_config: &CameraConfig) -> Result<Self> {
            Ok(Self::new(Vec::new()))
        }

        fn next_frame(&mut self) -> Result<CameraFrame> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(GestureError::FrameRead("end of script".to_string())))
        }
    }

    /// A camera that is never there.
    struct MissingCamera;

    impl FrameSource for MissingCamera {
        fn open(config: &CameraConfig) -> Result<Self> {
            Err(GestureError::CameraOpen(format!("no device at index {}", config.index)))
        }

        fn next_frame(&mut self) -> Result<CameraFrame> {
            unreachable!("never opened")
        }
    }

    fn test_config() -> CameraConfig {
        CameraConfig { max_read_failures: 3, frame_interval: None, ..CameraConfig::default() }
    }

    #[tokio::test]
    async fn saves_requested_class_then_quits() {
        let tmp = tempdir().unwrap();
        let frames = Arc::new(FrameSlot::new());
        let control: BroadcastStream<ControlMsg> = BroadcastStream::new(8);
        let dataset = DatasetWriter::prepare(tmp.path()).unwrap();
        let mut actor = CameraActor::<ScriptedSource>::new(test_config(), frames.clone(), control.clone(), Some(dataset));

        let tx = control.broadcast_sender();
        tx.broadcast(ControlMsg::Save(GestureClass::Peace)).await.unwrap();
        tx.broadcast(ControlMsg::Quit).await.unwrap();

        let mut source = ScriptedSource::new(vec![Ok(CameraFrame::filled(16, 16, 77))]);
        actor.run(&mut source).await;

        let counters = actor.dataset.as_ref().unwrap().counters();
        assert_eq!(counters.get(GestureClass::Peace), 1);
        assert_eq!(counters.get(GestureClass::Middle), 0);
        assert_eq!(fs::read_dir(tmp.path().join("peace")).unwrap().count(), 1);
        assert!(frames.take_copy().is_some());
    }

    #[tokio::test]
    async fn failed_reads_are_skipped() {
        let frames = Arc::new(FrameSlot::new());
        let control: BroadcastStream<ControlMsg> = BroadcastStream::new(8);
        let mut actor = CameraActor::<ScriptedSource>::new(test_config(), frames.clone(), control.clone(), None);

        let mut source = ScriptedSource::new(vec![
            Err(GestureError::FrameRead("glitch".to_string())),
            Ok(CameraFrame::filled(4, 4, 0)),
            Err(GestureError::FrameRead("glitch".to_string())),
            Ok(CameraFrame::filled(4, 4, 255)),
        ]);
        actor.run(&mut source).await;

        // The run ends once the script is exhausted; the last good frame stays published.
        let latest = frames.take_copy().unwrap();
        assert!(latest.image().pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[tokio::test]
    async fn lost_camera_broadcasts_quit() {
        let frames: Arc<FrameSlot<CameraFrame>> = Arc::new(FrameSlot::new());
        let control: BroadcastStream<ControlMsg> = BroadcastStream::new(8);
        let mut observer = control.broadcast_receiver();
        let mut actor = CameraActor::<ScriptedSource>::new(test_config(), frames.clone(), control.clone(), None);

        actor.run(&mut ScriptedSource::new(Vec::new())).await;

        assert_eq!(observer.recv().await.unwrap(), ControlMsg::Quit);
        assert!(frames.take_copy().is_none());
    }

    #[tokio::test]
    async fn saves_are_ignored_without_dataset() {
        let frames = Arc::new(FrameSlot::new());
        let control: BroadcastStream<ControlMsg> = BroadcastStream::new(8);
        let mut actor = CameraActor::<ScriptedSource>::new(test_config(), frames, control.clone(), None);

        let tx = control.broadcast_sender();
        tx.broadcast(ControlMsg::Save(GestureClass::Middle)).await.unwrap();
        tx.broadcast(ControlMsg::Quit).await.unwrap();

        actor.run(&mut ScriptedSource::new(vec![Ok(CameraFrame::filled(4, 4, 1))])).await;
        assert!(actor.dataset.is_none());
    }

    #[tokio::test]
    async fn open_failure_broadcasts_quit_and_publishes_nothing() {
        let frames: Arc<FrameSlot<CameraFrame>> = Arc::new(FrameSlot::new());
        let control: BroadcastStream<ControlMsg> = BroadcastStream::new(8);
        let mut observer = control.broadcast_receiver();
        let actor = CameraActor::<MissingCamera>::new(test_config(), frames.clone(), control.clone(), None);

        tokio::time::timeout(Duration::from_secs(2), actor.on_started()).await.unwrap();

        assert_eq!(observer.recv().await.unwrap(), ControlMsg::Quit);
        assert!(!frames.is_ready());
    }
}
