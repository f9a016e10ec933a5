use std::io;
use std::thread;
use std::thread::JoinHandle;

use log::error;
use tokio::runtime::Runtime;

/// A long running unit of work with its own thread and tokio runtime.
pub trait Actor where Self: 'static {
    const NAME: &'static str;

    fn start(self) -> io::Result<JoinHandle<()>> where Self: Sized, Self: Send {
        thread::Builder::new()
            .name(Self::NAME.to_string())
            .spawn(move || {
                match Runtime::new() {
                    Ok(rt) => rt.block_on(async {
                        self.on_started().await;
                    }),
                    Err(e) => error!("{} could not build its runtime: {}", Self::NAME, e),
                }
            })
    }

    async fn on_started(self);
}
