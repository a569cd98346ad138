pub use embedded_hal::digital::v2::*;
pub use embedded_hal::prelude::*;

pub use crate::accel::WaitReady as _;
pub use crate::dispatch::Transport as _;
pub use crate::hw::Hardware as _;
pub use crate::simpleserial::SimpleSerialExt as _;
