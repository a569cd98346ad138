//! Side-channel and fault-injection target for the bigmac AES accelerator
//!
//! The host drives the target over SimpleSerial. Each command either changes
//! the key state, encrypts one block (on the accelerator or in software) with
//! the trigger line bracketing the operation, or pokes at raw memory.
//!
//! ```ignore
//! let hw = unsafe { Mmio::new() };
//! let mut dispatcher = Dispatcher::new(hw, trigger_pin, Config::default())?;
//! let mut link = uart.simpleserial(simpleserial::Config::default());
//! let mut session = CryptoSession::new();
//! dispatcher.run(&mut session, &mut link)?;
//! ```

#![cfg_attr(not(test), no_std)]

use embedded_hal as hal;

pub mod accel;
pub mod calib;
pub mod config;
pub mod debug;
pub mod dispatch;
pub mod hw;
#[cfg(feature = "log-semihosting")]
pub mod logging;
pub mod prelude;
pub mod session;
pub mod simpleserial;
pub mod soft;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use crate::config::Config;
pub use crate::dispatch::{Dispatcher, Opcode};
pub use crate::session::{CryptoSession, KeyLength};
