//! Hosted DIO0 interrupt dispatch
//!
//! A GPIO watcher (or a simulation) sends one message per rising edge on
//! DIO0. A dedicated thread services each edge by running the driver's
//! interrupt handler, which takes the driver lock for the whole capture.

use crate::hardware::RegisterInterface;
use crate::radio::RadioDriver;
use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// A rising edge on DIO0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge;

/// Owner side of a running interrupt dispatcher
pub struct InterruptHandle {
    edges: Sender<Edge>,
    worker: JoinHandle<u64>,
}

impl InterruptHandle {
    /// Deliver one rising edge. Returns false once the dispatcher is gone.
    pub fn trigger(&self) -> bool {
        self.edges.send(Edge).is_ok()
    }

    /// Another edge source, e.g. for a GPIO watcher thread
    pub fn edge_source(&self) -> Sender<Edge> {
        self.edges.clone()
    }

    /// Close the edge channel and wait for the dispatcher to drain it.
    /// Returns the number of packets captured over its lifetime.
    ///
    /// Blocks until every sender from `edge_source` has been dropped too.
    pub fn shutdown(self) -> u64 {
        drop(self.edges);
        self.worker.join().unwrap_or(0)
    }
}

/// Start the interrupt dispatcher for `driver`
pub fn spawn_interrupt_handler<B>(driver: Arc<RadioDriver<B>>) -> io::Result<InterruptHandle>
where
    B: RegisterInterface + Send + 'static,
{
    let (edges, rx) = mpsc::channel::<Edge>();

    let worker = thread::Builder::new()
        .name("rfm-dio0".to_string())
        .spawn(move || {
            let mut captured = 0u64;
            for _edge in rx {
                match driver.handle_interrupt() {
                    Ok(true) => captured += 1,
                    Ok(false) => {}
                    Err(err) => warn!(target: "rfm", error = %err, "interrupt service failed"),
                }
            }
            debug!(target: "rfm", captured, "interrupt dispatcher stopped");
            captured
        })?;

    Ok(InterruptHandle { edges, worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PacketBuffer;
    use crate::hardware::{MockRfm69, EU_CHANNELS};

    fn armed_driver() -> Arc<RadioDriver<MockRfm69>> {
        let driver = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        driver.initialize().unwrap();
        driver.set_channel(0).unwrap();
        driver
    }

    #[test]
    fn test_edge_runs_handler() {
        let driver = armed_driver();
        let handle = spawn_interrupt_handler(Arc::clone(&driver)).unwrap();

        let packet = PacketBuffer::new([0x80, 0x00, 0xB2, 0x30, 0xA9, 0x00, 0xAA, 0xDA]);
        driver.critical_section(|chip| chip.deliver_payload(&packet, -55));
        assert!(handle.trigger());

        assert_eq!(handle.shutdown(), 1);
        assert!(driver.receive_done());
        assert_eq!(driver.packet(), packet);
        assert_eq!(driver.rssi(), -55);
    }

    #[test]
    fn test_spurious_edges_capture_nothing() {
        let driver = armed_driver();
        let handle = spawn_interrupt_handler(Arc::clone(&driver)).unwrap();

        for _ in 0..3 {
            handle.trigger();
        }

        assert_eq!(handle.shutdown(), 0);
        assert!(!driver.receive_done());
    }

    #[test]
    fn test_extra_edge_sources() {
        let driver = armed_driver();
        let handle = spawn_interrupt_handler(Arc::clone(&driver)).unwrap();

        let source = handle.edge_source();
        let watcher = thread::spawn(move || {
            source.send(Edge).unwrap();
        });
        watcher.join().unwrap();

        assert_eq!(handle.shutdown(), 0);
    }
}
