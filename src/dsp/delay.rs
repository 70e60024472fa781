/// Circular delay buffer with fractional reads and a feedback path.
///
/// The buffer is sized once at construction; nothing allocates afterwards.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// `max_delay_samples` is the longest delay that can ever be read.
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            // One extra slot so the maximum delay never reads the write head
            buffer: vec![0.0; max_delay_samples.max(1) + 2],
            write_pos: 0,
        }
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 2
    }

    /// Read `delay_samples` behind the write head with linear interpolation.
    #[inline]
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, self.max_delay() as f32);

        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let idx_a = (self.write_pos + len - whole) % len;
        let idx_b = (idx_a + len - 1) % len;

        let a = self.buffer[idx_a];
        let b = self.buffer[idx_b];
        a + (b - a) * frac
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read the delayed sample, then write `input + feedback * delayed`.
    #[inline]
    pub fn next_sample(&mut self, input: f32, delay_samples: f32, feedback: f32) -> f32 {
        let delayed = self.read_interpolated(delay_samples);
        self.write(input + delayed * feedback);
        delayed
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
