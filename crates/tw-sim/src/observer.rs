//! Observer callbacks of the physics loop.
//!
//! Callbacks run synchronously on the simulation thread. Across threads use
//! [`observer_channel`]: the publisher blocks until the receiving side has
//! handled (or dropped) each event, so the physics loop never runs ahead of
//! what an observer has seen. Observers only ever get owned snapshots.

use std::sync::mpsc;

use tw_results::WakeFrame;

/// Geometry of one step, copied out of the driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometrySnapshot {
    pub step: usize,
    pub time: f64,
    pub wake: WakeFrame,
}

pub trait Observer {
    fn on_geometry_changed(&mut self, _snapshot: &GeometrySnapshot) {}
    fn on_progress(&mut self, _step: usize) {}
    /// `stored` is the number of entries in the replay store.
    fn on_graph_data_changed(&mut self, _stored: usize) {}
}

#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

#[derive(Clone, Debug, PartialEq)]
pub enum ObserverEvent {
    GeometryChanged(GeometrySnapshot),
    Progress(usize),
    GraphDataChanged(usize),
}

/// One event plus its acknowledgement. Dropping the delivery acknowledges.
#[derive(Debug)]
pub struct Delivery {
    event: ObserverEvent,
    ack: Option<mpsc::Sender<()>>,
}

impl Delivery {
    pub fn event(&self) -> &ObserverEvent {
        &self.event
    }

    pub fn ack(mut self) {
        self.send_ack();
    }

    fn send_ack(&mut self) {
        if let Some(tx) = self.ack.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.send_ack();
    }
}

/// Sending half, handed to the driver as its observer.
#[derive(Debug)]
pub struct ObserverPublisher {
    tx: mpsc::Sender<Delivery>,
    connected: bool,
}

impl ObserverPublisher {
    fn publish(&mut self, event: ObserverEvent) {
        if !self.connected {
            return;
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        let delivery = Delivery {
            event,
            ack: Some(ack_tx),
        };
        if self.tx.send(delivery).is_err() || ack_rx.recv().is_err() {
            // receiver gone; keep running unobserved
            self.connected = false;
        }
    }
}

impl Observer for ObserverPublisher {
    fn on_geometry_changed(&mut self, snapshot: &GeometrySnapshot) {
        self.publish(ObserverEvent::GeometryChanged(snapshot.clone()));
    }

    fn on_progress(&mut self, step: usize) {
        self.publish(ObserverEvent::Progress(step));
    }

    fn on_graph_data_changed(&mut self, stored: usize) {
        self.publish(ObserverEvent::GraphDataChanged(stored));
    }
}

/// Receiving half, owned by the observing thread.
#[derive(Debug)]
pub struct ObserverReceiver {
    rx: mpsc::Receiver<Delivery>,
}

impl ObserverReceiver {
    /// Next event; `None` once the publisher is gone.
    pub fn recv(&self) -> Option<Delivery> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Delivery> + '_ {
        self.rx.iter()
    }
}

pub fn observer_channel() -> (ObserverPublisher, ObserverReceiver) {
    let (tx, rx) = mpsc::channel();
    (ObserverPublisher { tx, connected: true }, ObserverReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn publisher_waits_for_each_acknowledgement() {
        let (mut publisher, receiver) = observer_channel();
        let handled = Arc::new(AtomicUsize::new(0));
        let seen = handled.clone();
        let worker = thread::spawn(move || {
            let mut steps = Vec::new();
            for delivery in receiver.iter() {
                if let ObserverEvent::Progress(step) = delivery.event() {
                    steps.push(*step);
                }
                seen.fetch_add(1, Ordering::SeqCst);
                delivery.ack();
            }
            steps
        });
        for step in 1..=5 {
            publisher.on_progress(step);
            assert_eq!(handled.load(Ordering::SeqCst), step);
        }
        drop(publisher);
        assert_eq!(worker.join().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dropped_receiver_does_not_block() {
        let (mut publisher, receiver) = observer_channel();
        drop(receiver);
        publisher.on_progress(1);
        publisher.on_graph_data_changed(3);
    }
}
