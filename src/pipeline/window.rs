//! Fixed-capacity sample window.

use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

/// The window shared between the capture thread and readers.
///
/// All access (append, trim, snapshot) goes through this one lock.
pub(crate) type SharedWindow = Arc<Mutex<SampleWindow>>;

/// The most recent samples, oldest first, bounded by a fixed capacity.
///
/// Appending past capacity evicts exactly enough of the oldest samples to
/// get back to capacity. The ring never reallocates, so trimming is O(1)
/// per evicted sample rather than a shift of the whole window.
pub(crate) struct SampleWindow {
    ring: HeapRb<i16>,
}

impl SampleWindow {
    /// Creates an empty window.
    ///
    /// `capacity` must be non-zero; [`BufferConfig::validate`] guarantees it
    /// for every window the recorder builds.
    ///
    /// [`BufferConfig::validate`]: crate::BufferConfig::validate
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity),
        }
    }

    /// Wraps the window in the shared lock.
    pub fn shared(capacity: usize) -> SharedWindow {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    /// Appends samples and returns how many samples were evicted.
    ///
    /// Evicts `len + samples.len() - capacity` samples when positive. If a
    /// single append is larger than the whole window, only its tail is kept.
    pub fn push(&mut self, samples: &[i16]) -> usize {
        let evicted = (self.ring.occupied_len() + samples.len()).saturating_sub(self.capacity());
        self.ring.push_slice_overwrite(samples);
        evicted
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Maximum number of samples the window holds.
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        let _ = self.ring.clear();
    }

    /// Copies the window contents, oldest first.
    pub fn to_vec(&self) -> Vec<i16> {
        let (head, tail) = self.ring.as_slices();
        let mut samples = Vec::with_capacity(head.len() + tail.len());
        samples.extend_from_slice(head);
        samples.extend_from_slice(tail);
        samples
    }
}
