/// Exponentially smoothed frame rate.
///
/// Each [`tick`](Self::tick) blends the instantaneous rate `1 / dt` into the
/// average with weight `1 - alpha`.
#[derive(Clone, Copy, Debug)]
pub struct FramerateCounter {
    alpha: f64,
    average: f64,
    last: Option<f64>,
}

impl FramerateCounter {
    pub const DEFAULT_ALPHA: f64 = 0.9;

    pub fn new() -> Self {
        Self::with_alpha(Self::DEFAULT_ALPHA)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            average: 1.0,
            last: None,
        }
    }

    /// Record a frame at `now` seconds and return the updated average.
    ///
    /// The first tick only sets the reference time. Non-positive intervals
    /// leave the average untouched.
    pub fn tick(&mut self, now: f64) -> f64 {
        if let Some(last) = self.last {
            let dt = now - last;
            if dt > 0.0 && dt.is_finite() {
                self.average = self.alpha * self.average + (1.0 - self.alpha) / dt;
            }
        }
        self.last = Some(now);
        self.average
    }

    pub fn fps(&self) -> f64 {
        self.average
    }
}

impl Default for FramerateCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn converges_to_steady_rate() {
        let mut counter = FramerateCounter::new();
        assert_eq!(counter.tick(0.0), 1.0);
        assert_abs_diff_eq!(counter.tick(0.1), 0.9 + 0.1 * 10.0, epsilon = 1e-12);
        for i in 2..200 {
            counter.tick(i as f64 * 0.1);
        }
        assert_abs_diff_eq!(counter.fps(), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn ignores_non_increasing_time() {
        let mut counter = FramerateCounter::new();
        counter.tick(1.0);
        assert_eq!(counter.tick(1.0), 1.0);
        assert_eq!(counter.tick(0.5), 1.0);
    }
}
