//! Envelope follower: smoothed amplitude tracking with separate attack/release rates.

/// Peak envelope follower.
///
/// Rising input moves the envelope by `attack` of the gap per sample,
/// falling input by `release`.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Attack coefficient in (0, 1].
    pub attack: f32,
    /// Release coefficient in (0, 1].
    pub release: f32,
    level: f32,
}

impl EnvelopeFollower {
    pub fn new(attack: f32, release: f32) -> Self {
        EnvelopeFollower {
            attack,
            release,
            level: 0.0,
        }
    }

    /// Feed one rectified sample and return the updated envelope.
    #[inline]
    pub fn next(&mut self, input_level: f32) -> f32 {
        let coef = if input_level > self.level {
            self.attack
        } else {
            self.release
        };
        self.level += coef * (input_level - self.level);
        self.level
    }

    /// Current envelope value.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}
