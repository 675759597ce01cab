use std::f32::consts::TAU;
#[cfg(feature = "audio")]
use std::time::Duration;

use crate::settings::AlarmStyle;

pub const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy)]
enum Wave {
    Sine,
    Sawtooth,
    Square,
}

impl Wave {
    /// One sample at `phase` in [0, 1).
    fn sample(self, phase: f32) -> f32 {
        match self {
            Wave::Sine => (phase * TAU).sin(),
            Wave::Sawtooth => 2.0 * phase - 1.0,
            Wave::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Oscillator whose pitch glides exponentially from `start_hz` to `end_hz`
/// over the burst.
#[derive(Debug, Clone, Copy)]
struct Voice {
    wave: Wave,
    start_hz: f32,
    end_hz: f32,
}

impl Voice {
    fn frequency_at(&self, t: f32, burst: f32) -> f32 {
        let progress = (t / burst).clamp(0.0, 1.0);
        self.start_hz * (self.end_hz / self.start_hz).powf(progress)
    }
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    voices: [Voice; 2],
    /// Sounding part of each repetition, seconds.
    burst: f32,
    /// Start of each repetition to the next, seconds.
    period: f32,
    /// Gain envelope breakpoints `(time, gain)`, linear between them.
    envelope: &'static [(f32, f32)],
}

const GENTLE: Shape = Shape {
    voices: [
        Voice {
            wave: Wave::Sine,
            start_hz: 330.0,
            end_hz: 440.0,
        },
        Voice {
            wave: Wave::Sine,
            start_hz: 333.0,
            end_hz: 443.0,
        },
    ],
    burst: 1.0,
    period: 1.2,
    envelope: &[(0.0, 0.0), (0.2, 0.2), (1.0, 0.0)],
};

const URGENT: Shape = Shape {
    voices: [
        Voice {
            wave: Wave::Sawtooth,
            start_hz: 440.0,
            end_hz: 880.0,
        },
        Voice {
            wave: Wave::Square,
            start_hz: 445.0,
            end_hz: 885.0,
        },
    ],
    burst: 0.4,
    period: 0.45,
    envelope: &[(0.0, 0.0), (0.05, 0.4), (0.35, 0.4), (0.4, 0.0)],
};

fn shape_for(style: AlarmStyle) -> Shape {
    match style {
        AlarmStyle::Gentle => GENTLE,
        AlarmStyle::Urgent => URGENT,
    }
}

fn envelope_at(points: &[(f32, f32)], t: f32) -> f32 {
    for pair in points.windows(2) {
        let (t0, g0) = pair[0];
        let (t1, g1) = pair[1];
        if t >= t0 && t <= t1 {
            if t1 <= t0 {
                return g1;
            }
            return g0 + (g1 - g0) * (t - t0) / (t1 - t0);
        }
    }
    0.0
}

/// Endless repeating alarm: a two-voice burst followed by silence until the
/// next repetition.
pub struct AlarmTone {
    shape: Shape,
    sample_rate: u32,
    period_samples: u64,
    position: u64,
    phases: [f32; 2],
}

impl AlarmTone {
    pub fn new(style: AlarmStyle) -> Self {
        let shape = shape_for(style);
        Self {
            shape,
            sample_rate: SAMPLE_RATE,
            period_samples: (shape.period * SAMPLE_RATE as f32).round() as u64,
            position: 0,
            phases: [0.0; 2],
        }
    }

    pub fn period_samples(&self) -> u64 {
        self.period_samples
    }
}

impl Iterator for AlarmTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.position % self.period_samples;
        self.position = self.position.wrapping_add(1);

        if offset == 0 {
            self.phases = [0.0; 2];
        }

        let t = offset as f32 / self.sample_rate as f32;
        if t >= self.shape.burst {
            return Some(0.0);
        }

        let gain = envelope_at(self.shape.envelope, t);
        let mut mixed = 0.0;
        for (voice, phase) in self.shape.voices.iter().zip(self.phases.iter_mut()) {
            mixed += voice.wave.sample(*phase);
            let step = voice.frequency_at(t, self.shape.burst) / self.sample_rate as f32;
            *phase = (*phase + step).fract();
        }

        Some(mixed * gain)
    }
}

#[cfg(feature = "audio")]
impl rodio::Source for AlarmTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
