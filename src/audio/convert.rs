//! Streaming conversion from the input device's native format to the
//! **16 kHz mono `i16`** stream the calibrator and recognizer consume.
//!
//! cpal hands over interleaved `f32` frames at the device rate, one callback
//! buffer at a time.  [`PcmConverter`] downmixes, resamples by linear
//! interpolation and quantises each buffer, carrying the last sample and the
//! fractional read position across callbacks so buffer boundaries do not
//! click or drift.

/// Output rate of every capture device.
pub const TARGET_RATE: u32 = 16_000;

/// Average interleaved channels down to mono.  `channels == 0` yields
/// nothing; a trailing partial frame is dropped.
///
/// ```rust
/// use voice_command::audio::downmix;
///
/// assert_eq!(downmix(&[0.5, -0.5, 0.25, 0.75], 2), vec![0.0, 0.5]);
/// ```
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels as usize {
        0 => Vec::new(),
        1 => interleaved.to_vec(),
        n => interleaved
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Quantise float samples to signed 16-bit PCM, clamping to `[-1.0, 1.0]`
/// first so a hot microphone saturates instead of wrapping.
///
/// ```rust
/// use voice_command::audio::f32_to_i16;
///
/// assert_eq!(f32_to_i16(&[0.0, 1.0, -1.0, 2.0]), vec![0, 32_767, -32_767, 32_767]);
/// ```
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Stateful device-format → 16 kHz mono PCM16 converter.
#[derive(Debug, Clone)]
pub struct PcmConverter {
    channels: u16,
    /// Source samples advanced per output sample.
    step: f64,
    /// Read position of the next output sample, relative to the first frame
    /// of the next `process` call (which is the previous call's last sample).
    pos: f64,
    last: Option<f32>,
}

impl PcmConverter {
    pub fn new(channels: u16, source_rate: u32) -> Self {
        Self {
            channels,
            step: source_rate.max(1) as f64 / TARGET_RATE as f64,
            pos: 0.0,
            last: None,
        }
    }

    /// Convert one callback buffer of interleaved samples.
    pub fn process(&mut self, interleaved: &[f32]) -> Vec<i16> {
        let mono = downmix(interleaved, self.channels);
        if mono.is_empty() {
            return Vec::new();
        }
        if self.step == 1.0 {
            return f32_to_i16(&mono);
        }

        let mut frames = Vec::with_capacity(mono.len() + 1);
        frames.extend(self.last);
        frames.extend_from_slice(&mono);

        let mut out = Vec::with_capacity((mono.len() as f64 / self.step).ceil() as usize + 1);
        loop {
            let idx = self.pos as usize;
            if idx + 1 >= frames.len() {
                break;
            }
            let frac = (self.pos - idx as f64) as f32;
            out.push(frames[idx] * (1.0 - frac) + frames[idx + 1] * frac);
            self.pos += self.step;
        }

        // The last frame becomes frame 0 of the next call.
        self.pos -= (frames.len() - 1) as f64;
        self.last = frames.last().copied();
        f32_to_i16(&out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
