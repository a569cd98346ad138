//! Command dispatch
//!
//! Every command is one opcode byte followed by a fixed number of parameter
//! bytes. The [`Dispatcher`] pulls one command at a time out of a
//! [`Transport`], runs its handler to completion and sends the reply before
//! looking at the next one.

use core::convert::TryFrom;

use log::trace;
use void::Void;

use crate::{
    accel::{self, BusyWait, WaitReady},
    calib,
    config::Config,
    debug,
    hal::digital::v2::OutputPin,
    hw::{Block, Hardware},
    session::{CryptoSession, KeyLength},
    soft,
    trigger::Trigger,
};

/// Largest parameter block of any command
pub const MAX_PARAM_LEN: usize = 32;

/// Parameter bytes of one command
pub type Params = heapless::Vec<u8, MAX_PARAM_LEN>;

/// Status returned by every handler
pub const STATUS_OK: u8 = 0x00;

/// Recognized commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    LoadKey128 = b'k',
    LoadKey256 = b'K',
    SelectKeyslot = b's',
    EncryptHw = b'p',
    EncryptSw = b'e',
    Reset = b'x',
    MemRead = b'm',
    MemWrite = b'w',
    MemRead32 = b'd',
    Call = b'c',
    CalibNop = b'n',
    CalibDiv = b'v',
}

impl Opcode {
    /// Every recognized command
    pub const ALL: [Opcode; 12] = [
        Opcode::LoadKey128,
        Opcode::LoadKey256,
        Opcode::SelectKeyslot,
        Opcode::EncryptHw,
        Opcode::EncryptSw,
        Opcode::Reset,
        Opcode::MemRead,
        Opcode::MemWrite,
        Opcode::MemRead32,
        Opcode::Call,
        Opcode::CalibNop,
        Opcode::CalibDiv,
    ];

    /// Number of parameter bytes that follow the opcode
    pub const fn param_len(self) -> usize {
        match self {
            Opcode::LoadKey128 => 16,
            Opcode::LoadKey256 => 32,
            Opcode::SelectKeyslot => 5,
            Opcode::EncryptHw | Opcode::EncryptSw => 16,
            Opcode::Reset => 0,
            Opcode::MemRead | Opcode::MemWrite => 8,
            Opcode::MemRead32 | Opcode::Call | Opcode::CalibNop | Opcode::CalibDiv => 4,
        }
    }

    /// Parameter length for a raw opcode byte, `None` if it isn't a command
    pub fn param_len_of(byte: u8) -> Option<usize> {
        Opcode::try_from(byte).ok().map(Opcode::param_len)
    }
}

/// The byte isn't a recognized opcode
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownOpcode(pub u8);

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, UnknownOpcode> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| *op as u8 == byte)
            .ok_or(UnknownOpcode(byte))
    }
}

/// Framing layer between the dispatcher and the link
pub trait Transport {
    type Error;

    /// Block until a complete, well-formed command arrives
    ///
    /// `param_len` maps an opcode byte to its parameter length, or `None` for
    /// bytes that aren't commands. On success `params` holds exactly that
    /// many bytes.
    fn receive(
        &mut self,
        param_len: fn(u8) -> Option<usize>,
        params: &mut Params,
    ) -> Result<u8, Self::Error>;

    /// Start a reply payload
    fn begin_reply(&mut self) -> Result<(), Self::Error>;

    /// Append to the reply payload started with `begin_reply`
    fn reply_data(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Finish the reply payload
    fn end_reply(&mut self) -> Result<(), Self::Error>;

    /// Report the handler's status
    fn acknowledge(&mut self, status: u8) -> Result<(), Self::Error>;

    /// Send a complete reply payload
    fn reply(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.begin_reply()?;
        self.reply_data(data)?;
        self.end_reply()
    }
}

/// Dispatch error
#[derive(Debug)]
pub enum Error<T, P> {
    /// The link failed
    Transport(T),
    /// The trigger pin failed
    Trigger(P),
}

/// Owns the hardware and runs commands against a [`CryptoSession`]
pub struct Dispatcher<H, PIN, W = BusyWait> {
    hw: H,
    trigger: Trigger<PIN>,
    wait: W,
    config: Config,
}

impl<H, PIN> Dispatcher<H, PIN, BusyWait>
where
    H: Hardware,
    PIN: OutputPin,
{
    /// Create a dispatcher that spins on the accelerator with no timeout
    pub fn new(hw: H, trigger_pin: PIN, config: Config) -> Result<Self, PIN::Error> {
        Dispatcher::with_wait(hw, trigger_pin, BusyWait, config)
    }
}

impl<H, PIN, W> Dispatcher<H, PIN, W>
where
    H: Hardware,
    PIN: OutputPin,
    W: WaitReady,
{
    /// Create a dispatcher with a custom accelerator wait strategy
    pub fn with_wait(hw: H, trigger_pin: PIN, wait: W, config: Config) -> Result<Self, PIN::Error> {
        Ok(Dispatcher {
            hw,
            trigger: Trigger::new(trigger_pin, config.polarity)?,
            wait,
            config,
        })
    }

    /// Serve commands forever
    pub fn run<T>(
        &mut self,
        session: &mut CryptoSession,
        transport: &mut T,
    ) -> Result<Void, Error<T::Error, PIN::Error>>
    where
        T: Transport,
    {
        loop {
            self.service(session, transport)?;
        }
    }

    /// Receive, execute and acknowledge one command
    pub fn service<T>(
        &mut self,
        session: &mut CryptoSession,
        transport: &mut T,
    ) -> Result<(), Error<T::Error, PIN::Error>>
    where
        T: Transport,
    {
        let mut params = Params::new();
        let byte = transport
            .receive(Opcode::param_len_of, &mut params)
            .map_err(Error::Transport)?;

        // The transport only hands out bytes `param_len_of` accepted.
        let opcode = match Opcode::try_from(byte) {
            Ok(opcode) => opcode,
            Err(_) => return Ok(()),
        };

        let status = self.execute(session, opcode, &params, transport)?;
        transport.acknowledge(status).map_err(Error::Transport)
    }

    /// Run the handler for `opcode`
    ///
    /// `params` must be exactly `opcode.param_len()` bytes long. Any reply
    /// payload is sent through `transport`; the status is returned.
    ///
    /// # Panics
    ///
    /// Panics if `params` isn't exactly the opcode's parameter length.
    pub fn execute<T>(
        &mut self,
        session: &mut CryptoSession,
        opcode: Opcode,
        params: &[u8],
        transport: &mut T,
    ) -> Result<u8, Error<T::Error, PIN::Error>>
    where
        T: Transport,
    {
        assert_eq!(params.len(), opcode.param_len(), "bad parameter length for {:?}", opcode);
        trace!("{:?} {:02x?}", opcode, params);

        match opcode {
            Opcode::LoadKey128 => session.load_key(&params[..16]),
            Opcode::LoadKey256 => session.load_key(&params[..32]),
            Opcode::SelectKeyslot => {
                let key_slot = u16::from_be_bytes([params[0], params[1]]);
                let dest_slot = u16::from_be_bytes([params[2], params[3]]);
                session.select_keyslot(key_slot, dest_slot, KeyLength::from_wire(params[4]));
            }
            Opcode::EncryptHw => {
                let mut block = block(params);
                accel::encrypt(
                    &mut self.hw,
                    &mut self.trigger,
                    &mut self.wait,
                    &self.config,
                    session,
                    &mut block,
                )
                .map_err(Error::Trigger)?;
                transport.reply(&block).map_err(Error::Transport)?;
            }
            Opcode::EncryptSw => {
                let mut block = block(params);
                soft::encrypt(&mut self.trigger, session, &mut block).map_err(Error::Trigger)?;
                transport.reply(&block).map_err(Error::Transport)?;
            }
            Opcode::Reset => session.reset(),
            Opcode::MemRead => {
                let addr = be_u32(&params[0..4]);
                let len = be_u32(&params[4..8]);
                transport.begin_reply().map_err(Error::Transport)?;
                debug::peek(&mut self.hw, addr, len, |bytes| transport.reply_data(bytes))
                    .map_err(Error::Transport)?;
                transport.end_reply().map_err(Error::Transport)?;
            }
            Opcode::MemWrite => {
                debug::poke(&mut self.hw, be_u32(&params[0..4]), be_u32(&params[4..8]));
            }
            Opcode::MemRead32 => {
                let word = debug::read32(&mut self.hw, be_u32(params));
                transport
                    .reply(&word.to_le_bytes())
                    .map_err(Error::Transport)?;
            }
            Opcode::Call => {
                // NOTE(unsafe) executing whatever the host points at is the
                // whole point of this command
                let result = unsafe { debug::call(&mut self.hw, be_u32(params)) };
                transport
                    .reply(&result.to_be_bytes())
                    .map_err(Error::Transport)?;
            }
            Opcode::CalibNop => {
                calib::nop(&mut self.hw, &mut self.trigger, be_u32(params)).map_err(Error::Trigger)?
            }
            Opcode::CalibDiv => {
                calib::div(&mut self.hw, &mut self.trigger, be_u32(params)).map_err(Error::Trigger)?
            }
        }

        Ok(STATUS_OK)
    }

    /// Configuration the dispatcher was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Releases the hardware, trigger pin and wait strategy
    pub fn free(self) -> (H, PIN, W) {
        (self.hw, self.trigger.free(), self.wait)
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn block(params: &[u8]) -> Block {
    let mut block = [0; 16];
    block.copy_from_slice(&params[..16]);
    block
}
