//! Rendering on a worker thread.

use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use tracing::trace;

use crate::animation::{render_frame, LottieAnimation};
use crate::error::{Error, Result};
use crate::options::RenderOptions;

/// A frame being rendered in the background.
#[derive(Debug)]
pub struct PendingFrame {
    frame: usize,
    rx: Receiver<Result<Vec<u8>>>,
}

impl PendingFrame {
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Block until the frame is finished.
    pub fn wait(self) -> Result<Vec<u8>> {
        self.rx.recv().map_err(|_| Error::WorkerLost(self.frame))?
    }

    /// The finished frame, or `None` while the worker is still busy.
    pub fn try_wait(&self) -> Option<Result<Vec<u8>>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerLost(self.frame))),
        }
    }
}

impl LottieAnimation {
    /// Start rendering `frame` on its own thread. The result is a buffer
    /// of [`RenderOptions::buffer_len`] bytes, written as by
    /// [`LottieAnimation::render_with`] into zeroed memory.
    pub fn render_async(&self, frame: usize, options: RenderOptions) -> PendingFrame {
        let (document, overrides) = self.shared();
        let len = options.buffer_len(self.size());
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let mut buffer = vec![0u8; len];
            let result = render_frame(&document, &overrides, frame, &mut buffer, &options)
                .map(|()| buffer);
            trace!(frame, ok = result.is_ok(), "async render finished");
            // the receiver may already be gone
            let _ = tx.send(result);
        });
        PendingFrame { frame, rx }
    }
}
