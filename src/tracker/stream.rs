// Prediction queue - lock-free SPSC hand-off from the inference thread to
// the tracker thread
//
//   producer thread: PredictionSender::push
//   tracker thread:  PredictionReceiver::drain_into / run
//
// Order is preserved; the tracker sees predictions exactly as pushed.

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use super::Tracker;

/// Default queue length in predictions
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Idle wait of the receiving loop
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One model output step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub onset: f32,
    pub notes: Vec<f32>,
}

pub struct PredictionSender {
    producer: Producer<Prediction>,
}

pub struct PredictionReceiver {
    consumer: Consumer<Prediction>,
}

/// Create a bounded prediction queue
///
/// # Panics
/// Panics if capacity is 0
pub fn prediction_queue(capacity: usize) -> (PredictionSender, PredictionReceiver) {
    assert!(capacity > 0, "capacity must be greater than 0");
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        PredictionSender { producer },
        PredictionReceiver { consumer },
    )
}

impl PredictionSender {
    /// Push without blocking, handing the prediction back when the queue is full
    pub fn try_push(&mut self, prediction: Prediction) -> Result<(), Prediction> {
        self.producer
            .push(prediction)
            .map_err(|PushError::Full(prediction)| prediction)
    }

    /// Push, waiting while the queue is full
    ///
    /// # Returns
    /// `false` if the receiver is gone
    pub fn push(&mut self, mut prediction: Prediction) -> bool {
        loop {
            if self.producer.is_abandoned() {
                return false;
            }
            match self.try_push(prediction) {
                Ok(()) => return true,
                Err(returned) => {
                    prediction = returned;
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

impl PredictionReceiver {
    /// Feed every queued prediction to the tracker
    ///
    /// # Returns
    /// Number of predictions consumed
    pub fn drain_into(&mut self, tracker: &mut Tracker) -> usize {
        let mut count = 0;
        while let Ok(prediction) = self.consumer.pop() {
            tracker.update(prediction.onset, &prediction.notes);
            count += 1;
        }
        count
    }

    /// Feed predictions until the sender is dropped and the queue is empty
    ///
    /// # Returns
    /// Number of predictions consumed
    pub fn run(&mut self, tracker: &mut Tracker) -> usize {
        let mut total = 0;
        loop {
            let drained = self.drain_into(tracker);
            total += drained;
            if drained == 0 {
                if self.consumer.is_abandoned() && self.consumer.is_empty() {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        log::debug!("[Tracker] Prediction stream closed after {} steps", total);
        total
    }
}
