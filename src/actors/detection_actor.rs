use std::sync::Arc;
use std::time::Duration;

use async_broadcast::{Receiver as BroadcastReceiver, Sender as BroadcastSender};
use log::{debug, error, info, warn};

use crate::config::InferenceConfig;
use crate::framework::actor::Actor;
use crate::framework::frame_slot::FrameSlot;
use crate::framework::streams::BroadcastStream;
use crate::inference::{Classifier, OnnxClassifier, Prediction};
use crate::messages::camera_frame::CameraFrame;
use crate::messages::control_msg::{quit_pending, ControlMsg};

/// Classifies the latest camera frame whenever a new one is published.
pub struct DetectionActor {
    config: InferenceConfig,
    frames: Arc<FrameSlot<CameraFrame>>,
    control_tx: BroadcastSender<ControlMsg>,
    control_rx: BroadcastReceiver<ControlMsg>,
    idle_backoff: Duration,
    latest: Option<Prediction>,
}

impl DetectionActor {
    pub fn new(
        config: InferenceConfig,
        frames: Arc<FrameSlot<CameraFrame>>,
        control: BroadcastStream<ControlMsg>,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            config,
            frames,
            control_tx: control.broadcast_sender(),
            control_rx: control.broadcast_receiver(),
            idle_backoff,
            latest: None,
        }
    }

    /// Returns on `Quit`, or after `max_failures` inferences in a row failed.
    pub(crate) async fn run<C: Classifier>(&mut self, classifier: &mut C) {
        let mut last_seen: Option<Arc<CameraFrame>> = None;
        let mut failures = 0u32;
        while !quit_pending(&mut self.control_rx) {
            let frame = match self.frames.take_copy() {
                Some(frame) if !last_seen.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, &frame)) => frame,
                _ => {
                    tokio::time::sleep(self.idle_backoff).await;
                    continue;
                }
            };
            last_seen = Some(Arc::clone(&frame));

            match classifier.classify(frame.image()) {
                Ok(prediction) => {
                    failures = 0;
                    self.report(prediction);
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.max_failures {
                        error!("Giving up after {} failed inferences: {}", failures, e);
                        let _ = self.control_tx.broadcast(ControlMsg::Quit).await;
                        return;
                    }
                    match failures {
                        1 => warn!("{}", e),
                        _ => debug!("{} ({} in a row)", e, failures),
                    }
                }
            }
        }
        debug!("Detection loop stopped");
    }

    /// Logs at info level when the label or its confidence band changes.
    fn report(&mut self, prediction: Prediction) {
        let threshold = self.config.confidence_threshold;
        let confident = prediction.is_confident(threshold);
        let changed = self.latest.as_ref().map_or(true, |last| {
            last.class != prediction.class || last.is_confident(threshold) != confident
        });

        let text = format!("{}: {:.1}%", prediction.class, prediction.confidence);
        match (changed, confident) {
            (true, true) => info!("{}", text),
            (true, false) => info!("{} (uncertain)", text),
            (false, _) => debug!("{} scores={:?}", text, prediction.scores),
        }
        self.latest = Some(prediction);
    }

    #[cfg(test)]
    pub(crate) fn quit_received(&mut self) -> bool {
        quit_pending(&mut self.control_rx)
    }

    #[cfg(test)]
    fn latest_class(&self) -> Option<crate::dataset::GestureClass> {
        self.latest.as_ref().map(|p| p.class)
    }
}

impl Actor for DetectionActor {
    const NAME: &'static str = "detection";

    async fn on_started(mut self) {
        debug!("Detection actor started");

        info!("Loading model...");
        let mut classifier = match OnnxClassifier::load(&self.config) {
            Ok(classifier) => classifier,
            Err(e) => {
                error!("Error loading model: {}", e);
                let _ = self.control_tx.broadcast(ControlMsg::Quit).await;
                return;
            }
        };
        info!("Model loaded successfully. Press 'q' to quit.");

        self.run(&mut classifier).await;
    }
}
