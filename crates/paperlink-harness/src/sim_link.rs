//! One direction of a lossy visual channel.
//!
//! Models the printed-QR-to-camera path as an ordered in-flight queue of
//! visual payloads. Faults are injected at emission time, either scripted
//! by emission index (for the literal protocol scenarios) or drawn from a
//! seeded RNG (for chaos sweeps). Determinism by seed: the same plan and
//! seed always damage the same emissions the same way.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use bytes::Bytes;
use paperlink_core::{
    ArtifactId, ArtifactTag, CameraFrame, CancelFlag, FrameSource, LinkError, VisualEmitter,
};
use paperlink_proto::to_visual;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random fault probabilities for chaos testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaosConfig {
    /// Probability an emission vanishes entirely
    pub drop_prob: f64,
    /// Probability one byte of an emission is flipped
    pub corrupt_prob: f64,
    /// Probability an emission is delivered twice
    pub duplicate_prob: f64,
}

/// Fault schedule for one channel direction.
///
/// Scripted faults key on the emission index (0-based count of `send`
/// calls); random chaos applies to every emission not already scripted.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    drops: HashSet<u64>,
    corruptions: HashMap<u64, usize>,
    duplicates: HashSet<u64>,
    chaos: Option<ChaosConfig>,
}

impl FaultPlan {
    /// Plan with no faults: a perfect channel.
    #[must_use]
    pub fn perfect() -> Self {
        Self::default()
    }

    /// Drop the `index`-th emission.
    #[must_use]
    pub fn drop_emission(mut self, index: u64) -> Self {
        self.drops.insert(index);
        self
    }

    /// Flip one byte (at `byte_position`, modulo length) of the `index`-th
    /// emission.
    #[must_use]
    pub fn corrupt_emission(mut self, index: u64, byte_position: usize) -> Self {
        self.corruptions.insert(index, byte_position);
        self
    }

    /// Deliver the `index`-th emission twice.
    #[must_use]
    pub fn duplicate_emission(mut self, index: u64) -> Self {
        self.duplicates.insert(index);
        self
    }

    /// Add seeded random chaos on top of the scripted faults.
    #[must_use]
    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = Some(chaos);
        self
    }
}

/// Ordered, lossy, one-direction channel carrying visual payloads.
///
/// The sending side plays visual emitter: it applies the base64 wrap
/// exactly as a real emitter must. The receiving side plays camera: each
/// [`LossyDirection::recv`] yields the next payload a frame would carry,
/// or `None` for a frame that saw nothing.
#[derive(Debug)]
pub struct LossyDirection {
    label: &'static str,
    in_flight: VecDeque<Vec<u8>>,
    plan: FaultPlan,
    rng: ChaCha8Rng,
    emitted: u64,
    /// Emissions destroyed by the fault plan
    pub dropped: u64,
    /// Emissions damaged by the fault plan
    pub corrupted: u64,
    /// Emissions delivered twice by the fault plan
    pub duplicated: u64,
}

impl LossyDirection {
    /// New direction with the given fault schedule and chaos seed.
    #[must_use]
    pub fn new(label: &'static str, plan: FaultPlan, seed: u64) -> Self {
        Self {
            label,
            in_flight: VecDeque::new(),
            plan,
            rng: ChaCha8Rng::seed_from_u64(seed),
            emitted: 0,
            dropped: 0,
            corrupted: 0,
            duplicated: 0,
        }
    }

    /// Emit packet bytes onto the channel, applying the visual wrap and
    /// then the fault schedule.
    pub fn send(&mut self, packet: &[u8]) {
        let index = self.emitted;
        self.emitted += 1;

        let mut visual = to_visual(packet).into_bytes();

        if self.plan.drops.contains(&index) || self.chaos_hit(|c| c.drop_prob) {
            self.dropped += 1;
            tracing::trace!(channel = self.label, index, "Dropped emission");
            return;
        }

        if let Some(&position) = self.plan.corruptions.get(&index) {
            Self::flip_byte(&mut visual, position);
            self.corrupted += 1;
        } else if self.chaos_hit(|c| c.corrupt_prob) {
            let position = self.rng.gen_range(0..visual.len().max(1));
            Self::flip_byte(&mut visual, position);
            self.corrupted += 1;
        }

        if self.plan.duplicates.contains(&index) || self.chaos_hit(|c| c.duplicate_prob) {
            self.duplicated += 1;
            self.in_flight.push_back(visual.clone());
        }

        self.in_flight.push_back(visual);
    }

    /// Next in-flight payload, or `None` when the channel is quiet.
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        self.in_flight.pop_front()
    }

    /// Number of payloads currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total `send` calls so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn chaos_hit(&mut self, prob: impl Fn(&ChaosConfig) -> f64) -> bool {
        match self.plan.chaos {
            Some(chaos) => {
                let p = prob(&chaos);
                p > 0.0 && self.rng.gen_bool(p.clamp(0.0, 1.0))
            },
            None => false,
        }
    }

    fn flip_byte(payload: &mut [u8], position: usize) {
        if payload.is_empty() {
            return;
        }
        let position = position % payload.len();
        payload[position] ^= 0x01;
    }
}

/// The sending side of a direction is its visual emitter: the base64 wrap
/// and the fault schedule both happen in [`LossyDirection::send`].
impl VisualEmitter for LossyDirection {
    fn emit(&mut self, packet: &[u8], tag: ArtifactTag) -> Result<ArtifactId, LinkError> {
        self.send(packet);
        Ok(ArtifactId(tag.to_string()))
    }
}

/// The receiving side is its camera: one frame per call, carrying every
/// payload currently in flight - possibly none, like a camera pointed at
/// a blank wall.
impl FrameSource for LossyDirection {
    fn next_frame(&mut self) -> Result<CameraFrame, LinkError> {
        let payloads = std::iter::from_fn(|| self.recv()).map(Bytes::from).collect();
        Ok(CameraFrame { payloads })
    }
}

/// Clonable handle sharing one direction between threads.
///
/// The blocking drivers need the printer end and the camera end of the
/// same lossy channel held by different threads; clones of this handle
/// lock the shared direction per operation. An empty frame costs one
/// frame interval, so a driver polling a quiet channel paces itself like
/// a real camera instead of spinning.
#[derive(Debug, Clone)]
pub struct SharedDirection {
    inner: Arc<Mutex<LossyDirection>>,
    cancel: CancelFlag,
    frame_interval: Duration,
}

impl SharedDirection {
    /// Wrap a direction for cross-thread use.
    #[must_use]
    pub fn new(direction: LossyDirection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(direction)),
            cancel: CancelFlag::new(),
            frame_interval: Duration::from_millis(1),
        }
    }

    /// Attach a cancel flag observed by `next_frame` on this handle.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `f` against the underlying direction (fault counters, queue
    /// depth). `None` if the lock was poisoned by a panicked peer.
    pub fn with_direction<T>(&self, f: impl FnOnce(&mut LossyDirection) -> T) -> Option<T> {
        self.inner.lock().ok().map(|mut direction| f(&mut direction))
    }
}

impl VisualEmitter for SharedDirection {
    fn emit(&mut self, packet: &[u8], tag: ArtifactTag) -> Result<ArtifactId, LinkError> {
        self.inner
            .lock()
            .map_err(|e| LinkError::Emit(e.to_string()))?
            .emit(packet, tag)
    }
}

impl FrameSource for SharedDirection {
    fn next_frame(&mut self) -> Result<CameraFrame, LinkError> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }

        let frame = self
            .inner
            .lock()
            .map_err(|e| LinkError::FrameSource(e.to_string()))?
            .next_frame()?;

        if frame.is_empty() {
            thread::sleep(self.frame_interval);
        }
        Ok(frame)
    }
}
