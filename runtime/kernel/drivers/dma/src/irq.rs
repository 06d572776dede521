// Licensed under the Apache-2.0 license

//! Interrupt half and completion half of the DMA engine.
//!
//! [`IrqNotifier::interrupt`] runs where the APBH interrupt is taken. It
//! only acknowledges the hardware, records which channels fired in an
//! [`IrqLatch`] and wakes the [`CompletionWorker`]. The worker runs the
//! channel bookkeeping and the client callbacks on its own thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, error, info, warn};

use crate::engine::{Engine, IrqStatus};
use crate::error::DmaError;
use crate::hil::{DmaClient, RegisterWindow};

/// Wakeups that may be outstanding before further interrupts are coalesced.
pub const IRQ_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaEvents {
    Interrupt,
    Stop,
}

/// Channels with an acknowledged but unprocessed event, one bit per
/// hardware channel.
#[derive(Debug, Default)]
pub struct IrqLatch {
    completion: AtomicU32,
    error: AtomicU32,
}

impl IrqLatch {
    pub fn record(&self, channel: u32, status: IrqStatus) {
        let bit = 1 << channel;
        if status.complete {
            self.completion.fetch_or(bit, Ordering::AcqRel);
        }
        if status.error {
            self.error.fetch_or(bit, Ordering::AcqRel);
        }
    }

    /// Take all recorded events as `(completion, error)` bitmaps.
    pub fn take(&self) -> (u32, u32) {
        (
            self.completion.swap(0, Ordering::AcqRel),
            self.error.swap(0, Ordering::AcqRel),
        )
    }
}

#[derive(Clone)]
pub struct IrqNotifier {
    latch: Arc<IrqLatch>,
    event_tx: SyncSender<DmaEvents>,
}

impl IrqNotifier {
    /// Service the APBH interrupt line.
    ///
    /// Returns the bitmap of channels that had an event.
    pub fn interrupt<W: RegisterWindow>(&self, engine: &Engine<W>) -> Result<u32, DmaError> {
        let mut fired = 0;
        for channel in engine.channels() {
            let status = engine.irq_status(channel)?;
            if !status.is_pending() {
                continue;
            }
            engine.ack_irq(channel)?;
            self.latch.record(channel, status);
            fired |= 1 << channel;
        }

        if fired != 0 {
            match self.event_tx.try_send(DmaEvents::Interrupt) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("completion wakeup coalesced"),
                Err(TrySendError::Disconnected(_)) => {
                    warn!("completion worker gone, events for {:#x} left latched", fired)
                }
            }
        }
        Ok(fired)
    }
}

/// Thread that retires completed descriptors and reports them to a client.
pub struct CompletionWorker {
    handle: Option<JoinHandle<()>>,
    event_tx: Option<SyncSender<DmaEvents>>,
    latch: Arc<IrqLatch>,
}

impl CompletionWorker {
    pub fn spawn<W, C>(engine: Arc<Engine<W>>, client: Arc<C>) -> Self
    where
        W: RegisterWindow + 'static,
        C: DmaClient + Send + Sync + 'static,
    {
        let (event_tx, event_rx) = mpsc::sync_channel(IRQ_QUEUE_DEPTH);
        let latch = Arc::new(IrqLatch::default());
        let worker_latch = latch.clone();

        let handle = std::thread::spawn(move || {
            Self::event_loop(event_rx, engine, worker_latch, client);
        });
        info!("DMA completion worker running");

        CompletionWorker {
            handle: Some(handle),
            event_tx: Some(event_tx),
            latch,
        }
    }

    /// Interrupt-side handle feeding this worker.
    pub fn notifier(&self) -> Option<IrqNotifier> {
        self.event_tx.as_ref().map(|event_tx| IrqNotifier {
            latch: self.latch.clone(),
            event_tx: event_tx.clone(),
        })
    }

    /// Stop the worker and wait for it to exit. Events still latched are
    /// processed first.
    pub fn stop(&mut self) {
        if let Some(event_tx) = self.event_tx.take() {
            let _ = event_tx.send(DmaEvents::Stop);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("DMA completion worker panicked");
            }
        }
    }

    fn event_loop<W: RegisterWindow, C: DmaClient>(
        event_rx: Receiver<DmaEvents>,
        engine: Arc<Engine<W>>,
        latch: Arc<IrqLatch>,
        client: Arc<C>,
    ) {
        while let Ok(event) = event_rx.recv() {
            debug!("completion worker event: {:?}", event);
            Self::drain(&engine, &latch, client.as_ref());
            if event == DmaEvents::Stop {
                break;
            }
        }
        info!("DMA completion worker stopped");
    }

    fn drain<W: RegisterWindow, C: DmaClient>(engine: &Engine<W>, latch: &IrqLatch, client: &C) {
        let (completion, errors) = latch.take();
        for channel in engine.channels() {
            let bit = 1 << channel;
            if errors & bit != 0 {
                match engine.on_error(channel) {
                    Ok(err) => client.transfer_error(channel, err),
                    Err(err) => error!("ch{}: {}", channel, err),
                }
            }
            if completion & bit != 0 {
                let result = engine.on_completion(channel, |descriptor| {
                    client.transfer_complete(channel, descriptor)
                });
                if let Err(err) = result {
                    error!("ch{}: completion failed: {}", channel, err);
                }
            }
        }
    }
}

impl Drop for CompletionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
