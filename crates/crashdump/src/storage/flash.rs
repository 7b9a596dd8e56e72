//! NOR flash adapter over `embedded-storage`.
//!
//! Internal flash on the STM32H7 programs in 32-byte words and erases in
//! 128 KB sectors; smaller parts use 8-byte words and 2 KB pages. The record
//! is written as a 24-byte status block followed by a contiguous frame/stack
//! copy, so neither write lands on a word boundary by itself. Writes are
//! therefore staged: whole aligned words go straight to the driver, partial
//! words collect in a buffer padded with the erased value and are programmed
//! once full or on [`DumpStorage::flush`].

use embedded_storage::nor_flash::{NorFlash, NorFlashError};

use super::{len_u32, DumpStorage, StorageError};
use crate::layout::ERASED_BYTE;
use crate::region::PersistentRegion;

/// Persistent region inside a NOR flash device.
///
/// `W` is the staging buffer size and must be at least the driver's
/// `WRITE_SIZE`; the default covers every STM32 internal flash.
pub struct FlashStorage<F, const W: usize = 32> {
    flash: F,
    flash_base: u32,
    region: PersistentRegion,
    stage: [u8; W],
    stage_addr: u32,
    stage_fill: usize,
}

fn flash_err<E: NorFlashError>(e: E) -> StorageError {
    StorageError::Flash(e.kind().into())
}

impl<F: NorFlash, const W: usize> FlashStorage<F, W> {
    /// Wrap `flash`, whose offset 0 sits at absolute address `flash_base`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::UnsupportedWriteSize`] if `F::WRITE_SIZE` exceeds `W`
    /// - [`StorageError::NotAligned`] if the region is not made of whole erase pages
    /// - [`StorageError::OutOfBounds`] if the region is not inside the device
    pub fn new(flash: F, flash_base: u32, region: PersistentRegion) -> Result<Self, StorageError> {
        let write_size = u32::try_from(F::WRITE_SIZE).unwrap_or(u32::MAX);
        if F::WRITE_SIZE == 0 || F::WRITE_SIZE > W {
            return Err(StorageError::UnsupportedWriteSize(write_size));
        }
        let erase_size = u32::try_from(F::ERASE_SIZE).map_err(|_| StorageError::NotAligned)?;
        region
            .check_alignment(erase_size)
            .map_err(|_| StorageError::NotAligned)?;

        let start = region
            .base()
            .checked_sub(flash_base)
            .ok_or(StorageError::OutOfBounds)?;
        let end = start
            .checked_add(region.capacity())
            .ok_or(StorageError::OutOfBounds)?;
        if end as usize > flash.capacity() {
            return Err(StorageError::OutOfBounds);
        }

        Ok(Self {
            flash,
            flash_base,
            region,
            stage: [ERASED_BYTE; W],
            stage_addr: 0,
            stage_fill: 0,
        })
    }

    /// Give the driver back.
    pub fn release(self) -> F {
        self.flash
    }

    /// Driver offset of `[address, address + len)`, checked against the region.
    fn offset(&self, address: u32, len: u32) -> Result<u32, StorageError> {
        if !self.region.contains(address, len) {
            return Err(StorageError::OutOfBounds);
        }
        Ok(address.wrapping_sub(self.flash_base))
    }

    fn word_size() -> u32 {
        u32::try_from(F::WRITE_SIZE).unwrap_or(u32::MAX)
    }

    fn commit_stage(&mut self) -> Result<(), StorageError> {
        if self.stage_fill == 0 {
            return Ok(());
        }
        let offset = self.offset(self.stage_addr, Self::word_size())?;
        let word = self
            .stage
            .get(..F::WRITE_SIZE)
            .ok_or(StorageError::UnsupportedWriteSize(Self::word_size()))?;
        self.stage_fill = 0;
        self.flash.write(offset, word).map_err(flash_err)
    }
}

impl<F: NorFlash, const W: usize> DumpStorage for FlashStorage<F, W> {
    type Error = StorageError;

    fn erase(&mut self, address: u32, len: u32) -> Result<(), Self::Error> {
        let from = self.offset(address, len)?;
        let page = u32::try_from(F::ERASE_SIZE).map_err(|_| StorageError::NotAligned)?;
        let lead = from.checked_rem(page).ok_or(StorageError::NotAligned)?;
        let from = from.wrapping_sub(lead);
        let to = from
            .checked_add(lead)
            .and_then(|end| end.checked_add(len))
            .and_then(|end| end.checked_next_multiple_of(page))
            .ok_or(StorageError::OutOfBounds)?;

        // Anything still staged belongs to the range being wiped or is stale.
        self.stage_fill = 0;
        if from == to {
            return Ok(());
        }
        self.flash.erase(from, to).map_err(flash_err)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        self.offset(address, len_u32(data)?)?;
        let word = Self::word_size();
        let mut address = address;
        let mut data = data;

        while !data.is_empty() {
            if self.stage_fill == 0 {
                let lead = address.checked_rem(word).ok_or(StorageError::NotAligned)?;
                if lead == 0 && data.len() >= F::WRITE_SIZE {
                    let whole = data
                        .len()
                        .checked_rem(F::WRITE_SIZE)
                        .map_or(0, |tail| data.len().saturating_sub(tail));
                    let (direct, rest) = data.split_at(whole);
                    let offset = self.offset(address, len_u32(direct)?)?;
                    self.flash.write(offset, direct).map_err(flash_err)?;
                    address = address.wrapping_add(len_u32(direct)?);
                    data = rest;
                    continue;
                }
                // Bytes of the word before `address` are left erased.
                self.stage = [ERASED_BYTE; W];
                self.stage_addr = address.wrapping_sub(lead);
                self.stage_fill = lead as usize;
            } else if address != self.stage_addr.wrapping_add(self.stage_fill as u32) {
                self.commit_stage()?;
                continue;
            }

            let take = F::WRITE_SIZE.saturating_sub(self.stage_fill).min(data.len());
            let (head, rest) = data.split_at(take);
            let end = self.stage_fill.saturating_add(take);
            if let Some(slot) = self.stage.get_mut(self.stage_fill..end) {
                slot.copy_from_slice(head);
            }
            self.stage_fill = end;
            address = address.wrapping_add(len_u32(head)?);
            data = rest;

            if self.stage_fill >= F::WRITE_SIZE {
                self.commit_stage()?;
            }
        }
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let offset = self.offset(address, len_u32(buf)?)?;
        self.commit_stage()?;
        self.flash.read(offset, buf).map_err(flash_err)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.commit_stage()
    }
}
