use async_broadcast::{InactiveReceiver, Receiver as BroadcastReceiver, Sender as BroadcastSender};

/// Multi-subscriber bus. Every receiver handed out sees every message sent
/// after it was created; a lagging receiver loses its oldest messages rather
/// than stalling the sender, and sending with nobody listening is an error
/// instead of a wait.
#[derive(Debug, Clone)]
pub struct BroadcastStream<T> {
    stream_sender: BroadcastSender<T>,
    stream_receiver: InactiveReceiver<T>,
}

impl<T: Clone> BroadcastStream<T> {
    pub(crate) fn new(size: usize) -> Self {
        let (mut stream_sender, stream_receiver) = async_broadcast::broadcast::<T>(size);
        stream_sender.set_overflow(true);
        stream_sender.set_await_active(false);
        Self { stream_sender, stream_receiver: stream_receiver.deactivate() }
    }

    pub fn broadcast_sender(&self) -> BroadcastSender<T> {
        self.stream_sender.clone()
    }

    pub fn broadcast_receiver(&self) -> BroadcastReceiver<T> {
        self.stream_receiver.activate_cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_broadcast::RecvError;

    #[tokio::test]
    async fn every_subscriber_sees_each_message() {
        let stream: BroadcastStream<u32> = BroadcastStream::new(4);
        let mut a = stream.broadcast_receiver();
        let mut b = stream.broadcast_receiver();

        stream.broadcast_sender().broadcast(7).await.unwrap();

        assert_eq!(a.recv().await.unwrap(), 7);
        assert_eq!(b.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn slow_subscriber_never_blocks_sender() {
        let stream: BroadcastStream<u32> = BroadcastStream::new(2);
        let mut idle = stream.broadcast_receiver();
        let tx = stream.broadcast_sender();

        for i in 0..10 {
            tx.broadcast(i).await.unwrap();
        }

        // Only the newest messages survive for the idle subscriber.
        assert!(matches!(idle.recv().await, Err(RecvError::Overflowed(_))));
        assert_eq!(idle.recv().await.unwrap(), 8);
        assert_eq!(idle.recv().await.unwrap(), 9);
    }
}
