//! Lock-free SPSC ring buffer for captured audio samples.
//!
//! Uses `ringbuf::HeapRb<f32>` which provides a wait-free `push_slice`
//! safe to call from the real-time audio callback.

pub mod chunk;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Type alias for the producer half — held by the audio callback thread.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half — held by the input-director thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Buffer capacity: 2^21 = 2 097 152 f32 samples ≈ 43.7 s at 48 kHz.
/// Covers the worst case of a long phrase plus a slow full-vocabulary
/// transcription pass without the capture callback dropping frames.
pub const RING_CAPACITY: usize = 1 << 21;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}
