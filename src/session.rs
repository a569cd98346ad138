//! Key material and keyslot selection
//!
//! A [`CryptoSession`] is the only mutable state of the target. It is owned by
//! the caller of the dispatcher and handed to each handler by exclusive
//! reference.

use aes::cipher::{generic_array::GenericArray, KeyInit};
use aes::Aes128Enc;
use log::debug;

/// Size of the key material buffer, large enough for AES-256
pub const KEY_BUFFER_LEN: usize = 32;

/// AES key size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLength {
    Aes128,
    Aes256,
}

impl KeyLength {
    /// Key size in bytes
    pub fn bytes(self) -> usize {
        match self {
            KeyLength::Aes128 => 16,
            KeyLength::Aes256 => 32,
        }
    }

    /// Decode the length byte of a select-keyslot command
    ///
    /// 16 selects AES-128. Every other value selects AES-256, the same split
    /// the accelerator parameter encoding makes.
    pub fn from_wire(len: u8) -> Self {
        match len {
            16 => KeyLength::Aes128,
            _ => KeyLength::Aes256,
        }
    }
}

/// Key state shared by all handlers
pub struct CryptoSession {
    key: [u8; KEY_BUFFER_LEN],
    len: KeyLength,
    key_slot: u16,
    dest_slot: u16,
    // Expanded from the first 16 bytes of `key`, kept in step with every
    // wholesale key overwrite.
    schedule: Aes128Enc,
}

impl CryptoSession {
    /// Create a session in the reset state
    pub fn new() -> Self {
        let key = [0; KEY_BUFFER_LEN];
        CryptoSession {
            schedule: expand(&key),
            key,
            len: KeyLength::Aes128,
            key_slot: 0,
            dest_slot: 0,
        }
    }

    /// Load host-supplied key material
    ///
    /// `key` must be 16 or 32 bytes long; the length selects the key size.
    /// Both slots are cleared, so the next encryption uses this key and
    /// writes to the caller's buffer.
    ///
    /// # Panics
    ///
    /// Panics if `key` is neither 16 nor 32 bytes long.
    pub fn load_key(&mut self, key: &[u8]) {
        let len = match key.len() {
            16 => KeyLength::Aes128,
            32 => KeyLength::Aes256,
            n => panic!("invalid key length {}", n),
        };

        self.key = [0; KEY_BUFFER_LEN];
        self.key[..key.len()].copy_from_slice(key);
        self.schedule = expand(&self.key);
        self.len = len;
        self.key_slot = 0;
        self.dest_slot = 0;

        debug!("loaded {:?} key", len);
    }

    /// Select a hardware keyslot and output slot
    ///
    /// The key material is left untouched. Slot numbers are not validated,
    /// the accelerator decides what they mean.
    pub fn select_keyslot(&mut self, key_slot: u16, dest_slot: u16, len: KeyLength) {
        self.key_slot = key_slot;
        self.dest_slot = dest_slot;
        self.len = len;

        debug!(
            "keyslot {:#06x}, destination slot {:#06x}, {:?}",
            key_slot, dest_slot, len
        );
    }

    /// Zero the key and return to AES-128 with the host key
    pub fn reset(&mut self) {
        *self = CryptoSession::new();
        debug!("key state reset");
    }

    /// The full key material buffer
    ///
    /// Bytes past the current key length are zero.
    pub fn key(&self) -> &[u8; KEY_BUFFER_LEN] {
        &self.key
    }

    pub fn key_length(&self) -> KeyLength {
        self.len
    }

    /// Hardware keyslot in use, 0 for the host-supplied key
    pub fn key_slot(&self) -> u16 {
        self.key_slot
    }

    /// Hardware slot that receives the output, 0 for none
    pub fn dest_slot(&self) -> u16 {
        self.dest_slot
    }

    /// Whether the accelerator should use the key material of this session
    pub fn uses_host_key(&self) -> bool {
        self.key_slot == 0
    }

    /// AES-128 key schedule of the current key material
    pub fn schedule(&self) -> &Aes128Enc {
        &self.schedule
    }
}

impl Default for CryptoSession {
    fn default() -> Self {
        CryptoSession::new()
    }
}

fn expand(key: &[u8; KEY_BUFFER_LEN]) -> Aes128Enc {
    Aes128Enc::new(GenericArray::from_slice(&key[..16]))
}
