//! Interface to the bigmac AES accelerator
//!
//! The accelerator is driven through a small register file. A job is
//! described by source, destination, length, a parameter bitfield and a key
//! slot, then started with a write to the command register. The engine
//! clears the busy bit of the status register once the output is written.
//!
//! Register addresses and bit layouts below are fixed by the hardware.

use log::trace;
use nb::block;
use void::{ResultVoidExt, Void};

use crate::{
    config::Config,
    hal::digital::v2::OutputPin,
    hw::{Block, Hardware, LoopKind},
    session::{CryptoSession, KeyLength},
    trigger::Trigger,
};

/// Base address of the register block
pub const BASE: u32 = 0xE005_0000;

/// Key input region, 32 bytes
pub const KEY_REGION: u32 = 0xE005_0200;

/// Register offsets from [`BASE`]
pub mod reg {
    pub const SRC: u32 = 0x00;
    pub const DST: u32 = 0x04;
    pub const LEN: u32 = 0x08;
    pub const PARAM: u32 = 0x0C;
    pub const KEYSLOT: u32 = 0x10;
    pub const COMMAND: u32 = 0x1C;
    pub const STATUS: u32 = 0x24;
}

/// Bits of the parameter register
pub mod param {
    /// Always set
    pub const BASE: u32 = 0x001;
    /// Key is taken from the key input region
    pub const HOST_KEY: u32 = 0x080;
    pub const KEY_SIZE_MASK: u32 = 0x300;
    pub const KEY_SIZE_128: u32 = 0x100;
    pub const KEY_SIZE_256: u32 = 0x300;
    /// Destination register holds a keyslot index instead of an address
    pub const DEST_SLOT: u32 = 0x1000;
}

/// Value written to the command register to start a job
pub const COMMAND_START: u32 = 1;

/// Busy bit of the status register
pub const STATUS_BUSY: u32 = 1;

/// One accelerator job, as written to the register file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub src: u32,
    /// Buffer address, or keyslot index if `param` has [`param::DEST_SLOT`]
    pub dst: u32,
    pub len: u32,
    pub param: u32,
    pub key_slot: u32,
}

impl Command {
    /// Describe an in-place encryption of the block at `block_addr`
    pub fn for_session(session: &CryptoSession, block_addr: u32) -> Self {
        let mut param = param::BASE;
        param |= match session.key_length() {
            KeyLength::Aes128 => param::KEY_SIZE_128,
            KeyLength::Aes256 => param::KEY_SIZE_256,
        };

        let mut dst = block_addr;
        if session.uses_host_key() {
            param |= param::HOST_KEY;
        } else if session.dest_slot() != 0 {
            // Output redirection only when a destination slot was selected.
            // An internal key alone still writes back to the buffer.
            param |= param::DEST_SLOT;
            dst = cast::u32(session.dest_slot());
        }

        Command {
            src: block_addr,
            dst,
            len: 16,
            param,
            key_slot: cast::u32(session.key_slot()),
        }
    }

    /// Write the job to the register file without starting it
    pub fn program<H: Hardware>(&self, hw: &mut H) {
        hw.write_reg(BASE + reg::SRC, self.src);
        hw.write_reg(BASE + reg::DST, self.dst);
        hw.write_reg(BASE + reg::LEN, self.len);
        hw.write_reg(BASE + reg::PARAM, self.param);
        hw.write_reg(BASE + reg::KEYSLOT, self.key_slot);
    }
}

/// Strategy for waiting on the busy bit
pub trait WaitReady {
    /// Call `poll` until it stops returning `WouldBlock`
    fn wait_ready<F>(&mut self, poll: F)
    where
        F: FnMut() -> nb::Result<(), Void>;
}

/// Spin on the status register with no timeout
pub struct BusyWait;

impl WaitReady for BusyWait {
    fn wait_ready<F>(&mut self, mut poll: F)
    where
        F: FnMut() -> nb::Result<(), Void>,
    {
        block!(poll()).void_unwrap()
    }
}

/// Check the busy bit once
pub fn poll_done<H: Hardware>(hw: &mut H) -> nb::Result<(), Void> {
    if hw.read_reg(BASE + reg::STATUS) & STATUS_BUSY != 0 {
        return Err(nb::Error::WouldBlock);
    }
    Ok(())
}

/// Copy the whole key buffer into the key input region
pub fn load_key<H: Hardware>(hw: &mut H, key: &[u8; 32]) {
    for (i, word) in key.chunks_exact(4).enumerate() {
        let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        hw.write_reg(KEY_REGION + 4 * i as u32, word);
    }
}

/// Encrypt `block` on the accelerator
///
/// The trigger is asserted right before the start command and deasserted as
/// soon as the busy bit clears. The block is updated in place; when the
/// output is redirected to a keyslot it comes back unchanged.
pub fn encrypt<H, PIN, W>(
    hw: &mut H,
    trigger: &mut Trigger<PIN>,
    wait: &mut W,
    config: &Config,
    session: &CryptoSession,
    block: &mut Block,
) -> Result<(), PIN::Error>
where
    H: Hardware,
    PIN: OutputPin,
    W: WaitReady,
{
    let staging = hw.staging_address();
    write_block(hw, staging, block);

    if session.uses_host_key() {
        load_key(hw, session.key());
    }

    let command = Command::for_session(session, staging);
    trace!("accelerator job {:x?}", command);
    command.program(hw);

    hw.run_fixed_cost_loop(config.settle_iterations, LoopKind::Nop);

    trigger.assert()?;
    hw.write_reg(BASE + reg::COMMAND, COMMAND_START);
    wait.wait_ready(|| poll_done(hw));
    trigger.deassert()?;

    read_block(hw, staging, block);
    Ok(())
}

fn write_block<H: Hardware>(hw: &mut H, addr: u32, block: &Block) {
    for (i, word) in block.chunks_exact(4).enumerate() {
        let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        hw.write_reg(addr + 4 * i as u32, word);
    }
}

fn read_block<H: Hardware>(hw: &mut H, addr: u32, block: &mut Block) {
    for (i, word) in block.chunks_exact_mut(4).enumerate() {
        word.copy_from_slice(&hw.read_reg(addr + 4 * i as u32).to_le_bytes());
    }
}
