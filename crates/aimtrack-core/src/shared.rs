use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free cell holding a live angle in radians.
///
/// Used for values that are written by the robot side and read once per
/// frame, such as the current mechanism (arm) angle. Clones share the value.
#[derive(Clone, Debug)]
pub struct SharedAngle {
    bits: Arc<AtomicU64>,
}

impl SharedAngle {
    pub fn new(radians: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(radians.to_bits())),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, radians: f64) {
        self.bits.store(radians.to_bits(), Ordering::Release);
    }
}

impl Default for SharedAngle {
    fn default() -> Self {
        Self::new(0.0)
    }
}
