//! Bounded frame queue between the audio callback and the render loop.
//!
//! A fixed ring of `capacity` preallocated slots, each holding one window of
//! samples. The producer never waits: when every slot holds an unconsumed
//! frame it overwrites the oldest one and counts a drop.
//!
//! Each slot carries a version derived from the sequence number it holds
//! (`2·seq + 1` while being written, `2·seq + 2` once complete). The consumer
//! copies a slot out and re-checks the version; a mismatch means the producer
//! lapped it mid-copy and that frame is treated as dropped. Samples are stored
//! as `f32` bit patterns in atomics so the whole exchange is lock-free and
//! free of `unsafe`.

use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::AudioFrame;

/// Result of publishing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame went into a free slot.
    Enqueued,
    /// The queue was full; the oldest unconsumed frame was overwritten.
    Overwrote,
}

const fn writing(sequence: u64) -> u64 {
    sequence * 2 + 1
}

const fn written(sequence: u64) -> u64 {
    sequence * 2 + 2
}

struct Slot {
    version: AtomicU64,
    timestamp_nanos: AtomicU64,
    captured: AtomicU64,
    samples: Box<[AtomicU32]>,
}

impl Slot {
    fn new(window_size: usize) -> Self {
        Self {
            version: AtomicU64::new(0),
            timestamp_nanos: AtomicU64::new(0),
            captured: AtomicU64::new(0),
            samples: (0..window_size).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

struct FrameQueue {
    slots: Box<[Slot]>,
    /// Number of frames ever published; the next sequence number to write.
    head: AtomicU64,
    /// Next sequence number the consumer will read.
    tail: AtomicU64,
    dropped: AtomicU64,
}

impl FrameQueue {
    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    fn slot(&self, sequence: u64) -> &Slot {
        &self.slots[(sequence % self.capacity()) as usize]
    }
}

/// Creates a queue of `capacity` frames of `window_size` samples.
///
/// All slot memory is allocated here; neither half allocates afterwards.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use cli_vis::pipeline::frame_queue;
///
/// let (mut producer, mut consumer) = frame_queue(4, 2);
/// producer.publish(Duration::ZERO, 4, |i| i as f32);
///
/// let frame = consumer.pop().unwrap();
/// assert_eq!(frame.samples(), &[0.0, 1.0, 2.0, 3.0]);
/// ```
pub fn frame_queue(window_size: usize, capacity: usize) -> (FrameProducer, FrameConsumer) {
    let capacity = capacity.max(1);
    let queue = Arc::new(FrameQueue {
        slots: (0..capacity).map(|_| Slot::new(window_size)).collect(),
        head: AtomicU64::new(0),
        tail: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });

    let producer = FrameProducer {
        queue: Arc::clone(&queue),
        next: 0,
        window_size,
    };
    let consumer = FrameConsumer {
        queue,
        read: 0,
        skipped: 0,
        frame: AudioFrame::silent(window_size),
    };
    (producer, consumer)
}

/// Write half of the frame queue. Wait-free; owned by the audio callback.
pub struct FrameProducer {
    queue: Arc<FrameQueue>,
    next: u64,
    window_size: usize,
}

impl FrameProducer {
    /// Number of samples in every frame.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Publishes the next frame, filling sample `i` with `sample_at(i)`.
    ///
    /// Runs in time proportional to the window size, never blocks and never
    /// allocates. Overwrites the oldest unconsumed frame when the queue is full.
    pub fn publish(
        &mut self,
        timestamp: Duration,
        captured: usize,
        mut sample_at: impl FnMut(usize) -> f32,
    ) -> PushOutcome {
        let sequence = self.next;
        let unconsumed = sequence.saturating_sub(self.queue.tail.load(Ordering::Acquire));
        let outcome = if unconsumed >= self.queue.capacity() {
            self.queue.dropped.fetch_add(1, Ordering::Relaxed);
            PushOutcome::Overwrote
        } else {
            PushOutcome::Enqueued
        };

        let slot = self.queue.slot(sequence);
        slot.version.store(writing(sequence), Ordering::Relaxed);
        fence(Ordering::Release);

        slot.timestamp_nanos
            .store(timestamp.as_nanos() as u64, Ordering::Relaxed);
        slot.captured.store(captured as u64, Ordering::Relaxed);
        for (i, cell) in slot.samples.iter().enumerate() {
            cell.store(sample_at(i).to_bits(), Ordering::Relaxed);
        }

        slot.version.store(written(sequence), Ordering::Release);
        self.next = sequence + 1;
        self.queue.head.store(self.next, Ordering::Release);
        outcome
    }

    /// Frames overwritten before the consumer reached them.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

/// Read half of the frame queue. Owned by the render loop.
///
/// Popped frames are copied into a scratch [`AudioFrame`] owned by the
/// consumer and lent out until the next pop.
pub struct FrameConsumer {
    queue: Arc<FrameQueue>,
    read: u64,
    skipped: u64,
    frame: AudioFrame,
}

impl FrameConsumer {
    /// Returns the oldest buffered frame, or `None` if nothing new was published.
    ///
    /// Frames overwritten by the producer are skipped silently; sequence gaps
    /// show up in [`dropped()`](Self::dropped).
    pub fn pop(&mut self) -> Option<&AudioFrame> {
        loop {
            let head = self.queue.head.load(Ordering::Acquire);
            if self.read >= head {
                return None;
            }

            let oldest = head.saturating_sub(self.queue.capacity());
            let sequence = self.read.max(oldest);
            let copied = self.copy_slot(sequence);

            self.read = sequence + 1;
            self.queue.tail.store(self.read, Ordering::Release);
            if copied {
                return Some(&self.frame);
            }
        }
    }

    /// Skips every buffered frame except the newest and returns that one.
    ///
    /// Skipped frames are counted in [`skipped()`](Self::skipped), not as drops.
    pub fn pop_latest(&mut self) -> Option<&AudioFrame> {
        let head = self.queue.head.load(Ordering::Acquire);
        let newest = head.saturating_sub(1);
        let oldest = head.saturating_sub(self.queue.capacity());
        let first_available = self.read.max(oldest);
        if newest > first_available {
            self.skipped += newest - first_available;
            self.read = newest;
            self.queue.tail.store(self.read, Ordering::Release);
        }
        self.pop()
    }

    /// Copies slot `sequence` into the scratch frame. Returns `false` if it was overwritten.
    fn copy_slot(&mut self, sequence: u64) -> bool {
        let slot = self.queue.slot(sequence);
        let expected = written(sequence);
        if slot.version.load(Ordering::Acquire) != expected {
            return false;
        }

        let timestamp_nanos = slot.timestamp_nanos.load(Ordering::Relaxed);
        let captured = slot.captured.load(Ordering::Relaxed);
        for (dst, cell) in self.frame.samples.iter_mut().zip(slot.samples.iter()) {
            *dst = f32::from_bits(cell.load(Ordering::Relaxed));
        }

        fence(Ordering::Acquire);
        if slot.version.load(Ordering::Relaxed) != expected {
            return false;
        }

        self.frame.sequence = sequence;
        self.frame.timestamp = Duration::from_nanos(timestamp_nanos);
        self.frame.captured = captured as usize;
        true
    }

    /// Frames currently buffered and not yet consumed. Never exceeds [`capacity()`](Self::capacity).
    pub fn len(&self) -> usize {
        let head = self.queue.head.load(Ordering::Acquire);
        let oldest = head.saturating_sub(self.queue.capacity());
        (head - self.read.max(oldest).min(head)) as usize
    }

    /// Returns `true` if no unconsumed frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered frames.
    pub fn capacity(&self) -> usize {
        self.queue.slots.len()
    }

    /// Frames published so far.
    pub fn produced(&self) -> u64 {
        self.queue.head.load(Ordering::Acquire)
    }

    /// Frames overwritten before they could be consumed.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Frames passed over by [`pop_latest()`](Self::pop_latest).
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_constant(producer: &mut FrameProducer, value: f32) -> PushOutcome {
        let len = producer.window_size();
        producer.publish(Duration::ZERO, len, |_| value)
    }

    #[test]
    fn test_fifo_order() {
        let (mut producer, mut consumer) = frame_queue(8, 4);
        for i in 0..3 {
            assert_eq!(push_constant(&mut producer, i as f32), PushOutcome::Enqueued);
        }

        for expected in 0..3u64 {
            let frame = consumer.pop().unwrap();
            assert_eq!(frame.sequence(), expected);
            assert!(frame.samples().iter().all(|&s| s == expected as f32));
        }
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn test_empty_queue_pops_nothing() {
        let (_producer, mut consumer) = frame_queue(8, 4);
        assert!(consumer.pop().is_none());
        assert!(consumer.pop_latest().is_none());
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_drop_oldest_keeps_newest_capacity_frames() {
        let (mut producer, mut consumer) = frame_queue(8, 4);
        let mut overwrites = 0;
        for i in 0..10 {
            if push_constant(&mut producer, i as f32) == PushOutcome::Overwrote {
                overwrites += 1;
            }
            assert!(consumer.len() <= consumer.capacity());
        }

        assert_eq!(overwrites, 6);
        assert_eq!(consumer.dropped(), 6);
        assert_eq!(producer.dropped(), 6);
        assert_eq!(consumer.len(), 4);

        let delivered: Vec<u64> = std::iter::from_fn(|| consumer.pop().map(|f| f.sequence()))
            .collect();
        assert_eq!(delivered, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_consuming_frees_slots() {
        let (mut producer, mut consumer) = frame_queue(8, 2);
        push_constant(&mut producer, 1.0);
        push_constant(&mut producer, 2.0);
        assert!(consumer.pop().is_some());
        assert_eq!(push_constant(&mut producer, 3.0), PushOutcome::Enqueued);
        assert_eq!(consumer.dropped(), 0);
    }

    #[test]
    fn test_pop_latest_skips_to_newest() {
        let (mut producer, mut consumer) = frame_queue(8, 8);
        for i in 0..5 {
            push_constant(&mut producer, i as f32);
        }

        let frame = consumer.pop_latest().unwrap();
        assert_eq!(frame.sequence(), 4);
        assert_eq!(consumer.skipped(), 4);
        assert_eq!(consumer.dropped(), 0);
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn test_pop_latest_after_overflow_counts_only_available_frames() {
        let (mut producer, mut consumer) = frame_queue(8, 4);
        for i in 0..10 {
            push_constant(&mut producer, i as f32);
        }

        let frame = consumer.pop_latest().unwrap();
        assert_eq!(frame.sequence(), 9);
        assert_eq!(consumer.dropped(), 6);
        assert_eq!(consumer.skipped(), 3);
    }

    #[test]
    fn test_metadata_round_trips() {
        let (mut producer, mut consumer) = frame_queue(4, 2);
        producer.publish(Duration::from_millis(250), 2, |i| if i < 2 { 0.5 } else { 0.0 });

        let frame = consumer.pop().unwrap();
        assert_eq!(frame.timestamp(), Duration::from_millis(250));
        assert_eq!(frame.captured_len(), 2);
        assert_eq!(frame.samples(), &[0.5, 0.5, 0.0, 0.0]);
        assert_eq!(consumer.produced(), 1);
    }

    #[test]
    fn test_concurrent_producer_never_delivers_torn_or_reordered_frames() {
        const FRAMES: u64 = 20_000;
        let (mut producer, mut consumer) = frame_queue(64, 4);

        let handle = std::thread::spawn(move || {
            for sequence in 0..FRAMES {
                producer.publish(Duration::ZERO, 64, |_| sequence as f32);
            }
        });

        let mut last: Option<u64> = None;
        let check = |frame: &AudioFrame, last: &mut Option<u64>| {
            let expected = frame.sequence() as f32;
            assert!(
                frame.samples().iter().all(|&s| s == expected),
                "torn frame {}",
                frame.sequence()
            );
            if let Some(previous) = *last {
                assert!(frame.sequence() > previous, "frames out of order");
            }
            *last = Some(frame.sequence());
        };

        while !handle.is_finished() {
            if let Some(frame) = consumer.pop() {
                check(frame, &mut last);
            }
        }
        handle.join().unwrap();
        while let Some(frame) = consumer.pop() {
            check(frame, &mut last);
        }

        assert_eq!(last, Some(FRAMES - 1));
        assert_eq!(consumer.produced(), FRAMES);
    }
}
