use crate::bundler::Bundle;
use crate::pipeline::{ConversionRequest, Outcome, Pipeline};
use crate::relay::{self, RelayEvent, RelayReceiver};
use crate::surface::Surface;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the surface and at most one running conversion worker.
pub struct Session<S: Surface> {
    surface: S,
    converting: bool,
    events: Option<RelayReceiver>,
    worker: Option<JoinHandle<Outcome>>,
}

impl<S: Surface> Session<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            converting: false,
            events: None,
            worker: None,
        }
    }

    #[cfg(test)]
    pub fn is_converting(&self) -> bool {
        self.converting
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Start a conversion on a background worker. Refused while another one
    /// is still running.
    pub fn start<B: Bundle>(&mut self, pipeline: Arc<Pipeline<B>>, request: ConversionRequest) -> bool {
        if self.converting {
            debug!("Conversion already in progress");
            return false;
        }

        info!("Starting conversion process");
        self.converting = true;
        self.surface.set_start_enabled(false);

        let (tx, rx) = relay::channel();
        self.events = Some(rx);
        self.worker = Some(tokio::spawn(async move {
            pipeline.run(&request, &tx).await
        }));
        true
    }

    /// Drain every queued event without blocking. Returns whether polling
    /// should continue.
    pub fn poll(&mut self) -> bool {
        let Some(mut events) = self.events.take() else {
            return false;
        };

        loop {
            match events.try_recv() {
                Ok(event) => {
                    debug!("Queue message received: {event:?}");
                    self.surface.render(&event);
                    if event == RelayEvent::Done {
                        self.finish();
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => {
                    self.events = Some(events);
                    return self.converting;
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("Conversion worker stopped without reporting completion");
                    self.surface.render(&RelayEvent::Error(
                        "An error occurred: the conversion stopped unexpectedly".to_string(),
                    ));
                    self.surface.render(&RelayEvent::Done);
                    self.finish();
                    return false;
                }
            }
        }
    }

    fn finish(&mut self) {
        self.converting = false;
        self.surface.set_start_enabled(true);
    }

    /// Poll on a fixed timer until the running conversion is done, then
    /// return what the worker reported.
    pub async fn wait(&mut self) -> Option<Outcome> {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        while self.poll() {
            ticker.tick().await;
        }

        let worker = self.worker.take()?;
        match worker.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Conversion worker failed: {e}");
                None
            }
        }
    }
}
