//! Timing calibration loops
//!
//! Known-length runs of a single instruction, bracketed by the trigger, for
//! lining up the capture setup. They compute nothing.

use crate::{
    hal::digital::v2::OutputPin,
    hw::{Hardware, LoopKind},
    trigger::Trigger,
};

/// Run `n` iterations of `kind` with the trigger asserted
pub fn run<H, PIN>(
    hw: &mut H,
    trigger: &mut Trigger<PIN>,
    n: u32,
    kind: LoopKind,
) -> Result<(), PIN::Error>
where
    H: Hardware,
    PIN: OutputPin,
{
    trigger.bracket(|| hw.run_fixed_cost_loop(n, kind))
}

/// `nop` loop
pub fn nop<H: Hardware, PIN: OutputPin>(
    hw: &mut H,
    trigger: &mut Trigger<PIN>,
    n: u32,
) -> Result<(), PIN::Error> {
    run(hw, trigger, n, LoopKind::Nop)
}

/// Integer division loop
pub fn div<H: Hardware, PIN: OutputPin>(
    hw: &mut H,
    trigger: &mut Trigger<PIN>,
    n: u32,
) -> Result<(), PIN::Error> {
    run(hw, trigger, n, LoopKind::Div)
}
