//! Host-side stand-ins for the target hardware

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::{Aes128Enc, Aes256Enc};
use void::Void;

use crate::accel::{self, param, reg};
use crate::hal::{digital::v2::OutputPin, serial};
use crate::hw::{is_word_aligned, Block, Hardware, LoopKind};

/// Something observable happened on the fake target
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Trigger pin driven to the given level
    Pin(bool),
    /// 32-bit write through [`Hardware::write_reg`]
    Write(u32, u32),
    /// Accelerator status read, `true` while busy
    Status(bool),
    Loop(u32, LoopKind),
    Call(u32),
    Marker(&'static str),
}

/// Shared, ordered record of [`Event`]s
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Levels the trigger pin was driven to, in order
    pub fn pin_levels(&self) -> Vec<bool> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Pin(level) => Some(*level),
                _ => None,
            })
            .collect()
    }
}

pub struct FakePin {
    log: EventLog,
}

impl FakePin {
    pub fn new(log: &EventLog) -> Self {
        FakePin { log: log.clone() }
    }
}

impl OutputPin for FakePin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.push(Event::Pin(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.push(Event::Pin(true));
        Ok(())
    }
}

/// Memory read made through [`Hardware`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Word(u32),
    Byte(u32),
}

/// Address the fake hands out as its staging buffer
pub const STAGING: u32 = 0x2000_0000;

/// Sparse byte-addressed memory with an accelerator behind [`accel::BASE`]
pub struct FakeHardware {
    log: EventLog,
    memory: HashMap<u32, u8>,
    slots: HashMap<u32, [u8; 32]>,
    functions: HashMap<u32, fn() -> u32>,
    accesses: Vec<Access>,
    latency: u32,
    busy: u32,
}

impl FakeHardware {
    pub fn new(log: &EventLog) -> Self {
        FakeHardware {
            log: log.clone(),
            memory: HashMap::new(),
            slots: HashMap::new(),
            functions: HashMap::new(),
            accesses: Vec::new(),
            latency: 0,
            busy: 0,
        }
    }

    /// Number of busy status reads after each start command
    pub fn busy_latency(mut self, latency: u32) -> Self {
        self.latency = latency;
        self
    }

    /// Place `key` in an accelerator keyslot
    pub fn provision_slot(&mut self, slot: u32, key: &[u8]) {
        let mut buf = [0; 32];
        buf[..key.len()].copy_from_slice(key);
        self.slots.insert(slot, buf);
    }

    pub fn slot(&self, slot: u32) -> [u8; 32] {
        self.slots.get(&slot).copied().unwrap_or([0; 32])
    }

    /// Make `f` callable at `addr`
    pub fn install_function(&mut self, addr: u32, f: fn() -> u32) {
        self.functions.insert(addr, f);
    }

    /// Reads made so far, in order
    pub fn accesses(&self) -> Vec<Access> {
        self.accesses.clone()
    }

    pub fn fill(&mut self, addr: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.memory.insert(addr.wrapping_add(i as u32), *b);
        }
    }

    fn byte(&self, addr: u32) -> u8 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    fn word(&self, addr: u32) -> u32 {
        let mut bytes = [0; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.byte(addr.wrapping_add(i as u32));
        }
        u32::from_le_bytes(bytes)
    }

    fn run_job(&mut self) {
        let src = self.word(accel::BASE + reg::SRC);
        let dst = self.word(accel::BASE + reg::DST);
        let params = self.word(accel::BASE + reg::PARAM);
        let key_slot = self.word(accel::BASE + reg::KEYSLOT);

        let key = if params & param::HOST_KEY != 0 {
            let mut key = [0; 32];
            for (i, b) in key.iter_mut().enumerate() {
                *b = self.byte(accel::KEY_REGION + i as u32);
            }
            key
        } else {
            self.slot(key_slot)
        };

        let mut block = GenericArray::clone_from_slice(&self.read_block(src));
        if params & param::KEY_SIZE_MASK == param::KEY_SIZE_256 {
            Aes256Enc::new(GenericArray::from_slice(&key)).encrypt_block(&mut block);
        } else {
            Aes128Enc::new(GenericArray::from_slice(&key[..16])).encrypt_block(&mut block);
        }

        if params & param::DEST_SLOT != 0 {
            let mut slot = [0; 32];
            slot[..16].copy_from_slice(&block);
            self.slots.insert(dst, slot);
        } else {
            self.fill(dst, &block);
        }
        self.busy = self.latency;
    }

    fn read_block(&self, addr: u32) -> Block {
        let mut block = [0; 16];
        for (i, b) in block.iter_mut().enumerate() {
            *b = self.byte(addr.wrapping_add(i as u32));
        }
        block
    }
}

impl Hardware for FakeHardware {
    fn read_reg(&mut self, addr: u32) -> u32 {
        assert!(is_word_aligned(addr), "unaligned word read at {:#010x}", addr);
        self.accesses.push(Access::Word(addr));
        if addr == accel::BASE + reg::STATUS {
            let busy = self.busy > 0;
            if busy {
                self.busy -= 1;
            }
            self.log.push(Event::Status(busy));
            return busy as u32;
        }
        self.word(addr)
    }

    fn write_reg(&mut self, addr: u32, value: u32) {
        assert!(is_word_aligned(addr), "unaligned word write at {:#010x}", addr);
        self.log.push(Event::Write(addr, value));
        self.fill(addr, &value.to_le_bytes());
        if addr == accel::BASE + reg::COMMAND && value == accel::COMMAND_START {
            self.run_job();
        }
    }

    fn read_byte(&mut self, addr: u32) -> u8 {
        self.accesses.push(Access::Byte(addr));
        self.byte(addr)
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        self.memory.insert(addr, value);
    }

    fn staging_address(&self) -> u32 {
        STAGING
    }

    fn run_fixed_cost_loop(&mut self, n: u32, kind: LoopKind) {
        self.log.push(Event::Loop(n, kind));
    }

    unsafe fn call(&mut self, addr: u32) -> u32 {
        self.log.push(Event::Call(addr));
        match self.functions.get(&addr) {
            Some(f) => f(),
            None => panic!("no function at {:#010x}", addr),
        }
    }
}

/// Gives up after a fixed number of polls instead of spinning forever
pub struct BoundedWait {
    max_polls: usize,
}

impl BoundedWait {
    pub fn new(max_polls: usize) -> Self {
        BoundedWait { max_polls }
    }
}

impl accel::WaitReady for BoundedWait {
    fn wait_ready<F>(&mut self, mut poll: F)
    where
        F: FnMut() -> nb::Result<(), Void>,
    {
        for _ in 0..self.max_polls {
            if poll().is_ok() {
                return;
            }
        }
        panic!("accelerator still busy after {} polls", self.max_polls);
    }
}

/// The scripted input ran out
#[derive(Debug, PartialEq, Eq)]
pub struct Exhausted;

/// Serial port fed from a script, recording everything written to it
#[derive(Default)]
pub struct ScriptedSerial {
    rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl ScriptedSerial {
    pub fn new(input: &[u8]) -> Self {
        ScriptedSerial {
            rx: input.iter().copied().collect(),
            tx: Vec::new(),
        }
    }

    pub fn output(&self) -> &str {
        std::str::from_utf8(&self.tx).unwrap()
    }
}

impl serial::Read<u8> for ScriptedSerial {
    type Error = Exhausted;

    fn read(&mut self) -> nb::Result<u8, Exhausted> {
        self.rx.pop_front().ok_or(nb::Error::Other(Exhausted))
    }
}

impl serial::Write<u8> for ScriptedSerial {
    type Error = Exhausted;

    fn write(&mut self, byte: u8) -> nb::Result<(), Exhausted> {
        self.tx.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Exhausted> {
        Ok(())
    }
}
