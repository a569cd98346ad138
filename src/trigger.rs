//! Trigger signal for scope synchronization
//!
//! A single GPIO line is held at its asserted level while an instrumented
//! operation runs. No other component drives this pin.

use crate::config::Polarity;
use crate::hal::digital::v2::OutputPin;

/// Trigger line wrapper
pub struct Trigger<PIN> {
    pin: PIN,
    polarity: Polarity,
}

impl<PIN> Trigger<PIN>
where
    PIN: OutputPin,
{
    /// Take ownership of `pin` and drive it to the idle level
    pub fn new(pin: PIN, polarity: Polarity) -> Result<Self, PIN::Error> {
        let mut trigger = Trigger { pin, polarity };
        trigger.deassert()?;
        Ok(trigger)
    }

    /// Drive the line to its asserted level
    pub fn assert(&mut self) -> Result<(), PIN::Error> {
        match self.polarity {
            Polarity::ActiveHigh => self.pin.set_high(),
            Polarity::ActiveLow => self.pin.set_low(),
        }
    }

    /// Drive the line to its idle level
    pub fn deassert(&mut self) -> Result<(), PIN::Error> {
        match self.polarity {
            Polarity::ActiveHigh => self.pin.set_low(),
            Polarity::ActiveLow => self.pin.set_high(),
        }
    }

    /// Run `f` with the trigger asserted
    ///
    /// The line is asserted immediately before `f` and deasserted immediately
    /// after it returns.
    pub fn bracket<T>(&mut self, f: impl FnOnce() -> T) -> Result<T, PIN::Error> {
        self.assert()?;
        let result = f();
        self.deassert()?;
        Ok(result)
    }

    /// Releases the pin
    pub fn free(self) -> PIN {
        self.pin
    }
}
