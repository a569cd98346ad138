//! Target configuration

/// Settle delay used by the original bench firmware, in `nop` iterations
pub const DEFAULT_SETTLE_ITERATIONS: u32 = 0x100;

/// Level at which the trigger line counts as asserted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Default for Polarity {
    fn default() -> Polarity {
        Polarity::ActiveHigh
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// `nop` iterations between programming the accelerator and asserting
    /// the trigger
    pub settle_iterations: u32,
    pub polarity: Polarity,
}

impl Config {
    pub fn settle_iterations(mut self, iterations: u32) -> Self {
        self.settle_iterations = iterations;
        self
    }

    pub fn trigger_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn active_high(self) -> Self {
        self.trigger_polarity(Polarity::ActiveHigh)
    }

    pub fn active_low(self) -> Self {
        self.trigger_polarity(Polarity::ActiveLow)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            settle_iterations: DEFAULT_SETTLE_ITERATIONS,
            polarity: Polarity::default(),
        }
    }
}
