//! Software AES-128
//!
//! Runs the same block through an in-firmware AES so its power trace can be
//! compared against the accelerator's.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt};
use log::debug;

use crate::{
    hal::digital::v2::OutputPin,
    hw::Block,
    session::{CryptoSession, KeyLength},
    trigger::Trigger,
};

/// Encrypt `block` in place with the session's AES-128 key schedule
///
/// Only AES-128 is implemented. With any other key length the block is left
/// as it is, but the trigger still pulses so the capture stays in step with
/// the host.
pub fn encrypt<PIN>(
    trigger: &mut Trigger<PIN>,
    session: &CryptoSession,
    block: &mut Block,
) -> Result<(), PIN::Error>
where
    PIN: OutputPin,
{
    if session.key_length() != KeyLength::Aes128 {
        debug!("no software AES for {:?}", session.key_length());
        return trigger.bracket(|| ());
    }

    let schedule = session.schedule();
    let block = GenericArray::from_mut_slice(&mut block[..]);
    trigger.bracket(|| schedule.encrypt_block(block))
}
