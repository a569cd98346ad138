//! Raw memory and code execution primitives
//!
//! None of these check their arguments. Reading or writing an unmapped
//! address faults the target, calling garbage crashes it. That is what they
//! are for.

use core::cmp;

use crate::hw::{is_word_aligned, Hardware};

/// Read `len` bytes starting at `addr`, passing them to `sink` in order
///
/// Bytes up to the first word boundary and after the last one are read with
/// byte accesses, everything in between with aligned 32-bit accesses.
/// Addresses wrap at the end of the address space.
pub fn peek<H, E, F>(hw: &mut H, addr: u32, len: u32, mut sink: F) -> Result<(), E>
where
    H: Hardware,
    F: FnMut(&[u8]) -> Result<(), E>,
{
    let head = cmp::min(addr.wrapping_neg() % 4, len);
    for i in 0..head {
        sink(&[hw.read_byte(addr.wrapping_add(i))])?;
    }

    let words = (len - head) / 4;
    for i in 0..words {
        let word = hw.read_reg(addr.wrapping_add(head + 4 * i));
        sink(&word.to_le_bytes())?;
    }

    for i in head + 4 * words..len {
        sink(&[hw.read_byte(addr.wrapping_add(i))])?;
    }
    Ok(())
}

/// Write one 32-bit word
///
/// Unaligned addresses are written one byte at a time, in memory order.
pub fn poke<H: Hardware>(hw: &mut H, addr: u32, word: u32) {
    if is_word_aligned(addr) {
        hw.write_reg(addr, word);
    } else {
        for (i, byte) in word.to_le_bytes().iter().enumerate() {
            hw.write_byte(addr.wrapping_add(i as u32), *byte);
        }
    }
}

/// Read one 32-bit word, byte-swapped
///
/// Unaligned addresses are read one byte at a time.
pub fn read32<H: Hardware>(hw: &mut H, addr: u32) -> u32 {
    let word = if is_word_aligned(addr) {
        hw.read_reg(addr)
    } else {
        let mut bytes = [0; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = hw.read_byte(addr.wrapping_add(i as u32));
        }
        u32::from_le_bytes(bytes)
    };
    word.swap_bytes()
}

/// Call the function at `addr` and return what it returns
///
/// # Safety
///
/// See [`Hardware::call`].
pub unsafe fn call<H: Hardware>(hw: &mut H, addr: u32) -> u32 {
    hw.call(addr)
}
