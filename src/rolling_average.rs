//! Fixed-size rolling average over the most recent speed samples

/// Circular buffer of the last `N` samples.
///
/// Slots start zeroed and the mean always divides by `N`, so the average ramps up
/// over the first `N` pushes after power-up.
#[derive(Debug, Clone)]
pub struct RollingAverage<const N: usize> {
    /// Sample slots, overwritten in order
    samples: [f32; N],
    /// Slot the next sample goes into
    next: usize,
}

impl<const N: usize> RollingAverage<N> {
    /// Creates a zero-filled buffer
    pub const fn new() -> Self {
        Self {
            samples: [0.0; N],
            next: 0,
        }
    }

    /// Overwrites the oldest slot with `sample`
    pub fn push(&mut self, sample: f32) {
        if N == 0 {
            return;
        }
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % N;
    }

    /// Arithmetic mean over all `N` slots
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f32 {
        if N == 0 {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / N as f32
    }

    /// Pushes `sample` and returns the new mean
    pub fn update(&mut self, sample: f32) -> f32 {
        self.push(sample);
        self.mean()
    }
}

impl<const N: usize> Default for RollingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}
