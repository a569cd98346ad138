//! Raw hardware access
//!
//! Everything that touches physical memory goes through the [`Hardware`]
//! trait: accelerator registers, the debug memory primitives and the timing
//! calibration loops. The protocol logic in the rest of the crate only ever
//! sees this trait, so it can be driven against an in-memory model on the
//! host.

#[cfg(any(test, all(target_arch = "arm", target_os = "none")))]
use core::cell::UnsafeCell;

/// A 16-byte AES block
pub type Block = [u8; 16];

/// Instruction used by a calibration loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    /// One `nop` per iteration
    Nop,
    /// One integer division per iteration
    Div,
}

/// Narrow interface to the target's address space
pub trait Hardware {
    /// Read the 32-bit word at `addr`
    ///
    /// `addr` must be 4-byte aligned.
    fn read_reg(&mut self, addr: u32) -> u32;

    /// Write the 32-bit word `value` to `addr`
    ///
    /// `addr` must be 4-byte aligned.
    fn write_reg(&mut self, addr: u32, value: u32);

    /// Read the byte at `addr`
    fn read_byte(&mut self, addr: u32) -> u8;

    /// Write the byte `value` to `addr`
    fn write_byte(&mut self, addr: u32, value: u8);

    /// Bus address of a 16-byte, word-aligned buffer the accelerator can read
    /// from and write to
    fn staging_address(&self) -> u32;

    /// Execute `n` iterations of a fixed-cost instruction sequence
    fn run_fixed_cost_loop(&mut self, n: u32, kind: LoopKind);

    /// Call the zero-argument function at `addr` and return its result
    ///
    /// # Safety
    ///
    /// `addr` must be the entry point of a function with the signature
    /// `extern "C" fn() -> u32` (including the Thumb bit where applicable).
    /// Nothing about that is checked.
    unsafe fn call(&mut self, addr: u32) -> u32;
}

/// Whether `addr` can be used for a word access
pub fn is_word_aligned(addr: u32) -> bool {
    addr % 4 == 0
}

/// Word-aligned block the accelerator reads from and writes back to
///
/// Written by the accelerator as well as the core, so only accessed through
/// the raw pointer from [`Staging::as_ptr`].
#[cfg(any(test, all(target_arch = "arm", target_os = "none")))]
#[repr(C, align(16))]
pub(crate) struct Staging(UnsafeCell<[u32; 4]>);

#[cfg(any(test, all(target_arch = "arm", target_os = "none")))]
impl Staging {
    pub(crate) const fn new() -> Self {
        Staging(UnsafeCell::new([0; 4]))
    }

    pub(crate) fn as_ptr(&self) -> *mut u32 {
        self.0.get().cast()
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::mmio::Mmio;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod mmio {
    use core::{hint::black_box, mem, ptr};

    use super::{Hardware, LoopKind, Staging};

    /// Direct access to the physical address space
    pub struct Mmio {
        staging: Staging,
    }

    impl Mmio {
        /// Create the production hardware interface
        ///
        /// # Safety
        ///
        /// Every address handed to the [`Hardware`] methods is dereferenced
        /// as-is. The caller takes responsibility for all accesses made
        /// through this instance.
        pub unsafe fn new() -> Self {
            Mmio {
                staging: Staging::new(),
            }
        }
    }

    impl Hardware for Mmio {
        fn read_reg(&mut self, addr: u32) -> u32 {
            debug_assert!(super::is_word_aligned(addr));
            // NOTE(unsafe) unchecked by contract of `Mmio::new`; callers
            // keep word accesses aligned
            unsafe { ptr::read_volatile(addr as usize as *const u32) }
        }

        fn write_reg(&mut self, addr: u32, value: u32) {
            debug_assert!(super::is_word_aligned(addr));
            // NOTE(unsafe) unchecked by contract of `Mmio::new`; callers
            // keep word accesses aligned
            unsafe { ptr::write_volatile(addr as usize as *mut u32, value) }
        }

        fn read_byte(&mut self, addr: u32) -> u8 {
            // NOTE(unsafe) unchecked by contract of `Mmio::new`
            unsafe { ptr::read_volatile(addr as usize as *const u8) }
        }

        fn write_byte(&mut self, addr: u32, value: u8) {
            // NOTE(unsafe) unchecked by contract of `Mmio::new`
            unsafe { ptr::write_volatile(addr as usize as *mut u8, value) }
        }

        fn staging_address(&self) -> u32 {
            self.staging.as_ptr() as usize as u32
        }

        fn run_fixed_cost_loop(&mut self, n: u32, kind: LoopKind) {
            match kind {
                LoopKind::Nop => {
                    for _ in 0..n {
                        cortex_m::asm::nop();
                    }
                }
                LoopKind::Div => {
                    let mut acc = u32::MAX;
                    for _ in 0..n {
                        acc = black_box(acc) / black_box(7) + black_box(0x8000_0000);
                    }
                    black_box(acc);
                }
            }
        }

        unsafe fn call(&mut self, addr: u32) -> u32 {
            let f: extern "C" fn() -> u32 = mem::transmute(addr as usize);
            f()
        }
    }
}
