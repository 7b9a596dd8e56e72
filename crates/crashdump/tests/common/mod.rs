//! Shared fixtures: a host buffer standing in for persistent RAM, a NOR flash
//! model and a fake faulting stack.

// Each test binary uses a different subset of the fixtures.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use crashdump::{CoreRegisters, DumpStorage, PersistentRegion, RamStorage};
use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};

/// Persistent RAM region backed by a heap buffer.
pub struct RamDump {
    // Keeps the buffer behind `storage` alive; only accessed through it.
    _backing: Box<[u8]>,
    pub region: PersistentRegion,
    pub storage: RamStorage,
}

impl RamDump {
    /// Region of `capacity` bytes at `base`, filled with `fill` (power-on garbage).
    pub fn new(base: u32, capacity: u32, fill: u8) -> Self {
        let mut backing = vec![fill; capacity as usize].into_boxed_slice();
        let region = PersistentRegion::new(base, capacity).unwrap();
        // SAFETY: the boxed buffer is owned by the fixture, never moves and is
        // only accessed through the adapter.
        let storage = unsafe { RamStorage::from_raw_parts(backing.as_mut_ptr(), region) };
        Self {
            _backing: backing,
            region,
            storage,
        }
    }

    /// Whole region as stored.
    pub fn snapshot(&mut self) -> Vec<u8> {
        let mut buf = vec![0u8; self.region.capacity() as usize];
        self.storage.read(self.region.base(), &mut buf).unwrap();
        buf
    }
}

/// Stack image as the processor leaves it: the exception frame followed by
/// the caller's stack contents.
pub fn fault_stack(regs: &CoreRegisters, above_frame: &[u8]) -> Vec<u8> {
    let mut stack = regs.as_bytes().to_vec();
    stack.extend_from_slice(above_frame);
    stack
}

/// Frame typical of a fault in thread mode.
pub fn thread_mode_frame() -> CoreRegisters {
    CoreRegisters {
        r0: 0x2000_0100,
        r1: 0,
        r2: 0x0000_0040,
        r3: 0xDEAD_BEEF,
        r12: 0x0000_000C,
        lr: 0x0800_0463,
        pc: 0x0800_1A2C,
        xpsr: 0x6100_0000,
    }
}

/// NOR flash with 32-byte program words and 256-byte erase pages, like the
/// smaller STM32 parts scaled down. Programming a word that is not fully
/// erased fails, as on real flash.
pub struct MockFlash {
    pub mem: Vec<u8>,
}

impl MockFlash {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0u8; size] }
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let src = self
            .mem
            .get(start..start + bytes.len())
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 32;
    const ERASE_SIZE: usize = 256;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.mem
            .get_mut(from as usize..to as usize)
            .ok_or(NorFlashErrorKind::OutOfBounds)?
            .fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let start = offset as usize;
        let dst = self
            .mem
            .get_mut(start..start + bytes.len())
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        if dst.iter().any(|&b| b != 0xFF) {
            return Err(NorFlashErrorKind::Other);
        }
        dst.copy_from_slice(bytes);
        Ok(())
    }
}
