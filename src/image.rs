/*
sdatimg, to build raw images from Android transfer lists: image module
Copyright (C) 2024-present Guoxin "7Ji" Pu

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU Affero General Public License as
published by the Free Software Foundation, either version 3 of the
License, or (at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU Affero General Public License for more details.

You should have received a copy of the GNU Affero General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{fmt::Display, fs::{File, OpenOptions}, io::{Read, Seek, SeekFrom, Write}, path::Path};

use tracing::{debug, error, info, warn};

use crate::{progress::block_progress_bar, transfer::RangeSet, Error, Result};

/* Same for every transfer list, never configurable */

pub(crate) const BLOCK_SIZE: u64 = 0x1000;

/// Blocks moved per buffer, larger ranges are split into several writes
const CHUNK_BLOCKS: u64 = 0x100;
const CHUNK_SIZE: usize = (CHUNK_BLOCKS * BLOCK_SIZE) as usize;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BuildError {
    ShortRead {
        start: u64,
        end: u64,
        expected: u64,
        available: u64,
    },
    RangeOverflow {
        start: u64,
        end: u64,
    },
}

impl From<BuildError> for Error {
    fn from(value: BuildError) -> Self {
        Self::BuildError(value)
    }
}

/// Byte offset and byte length of a block range
fn byte_span(start: u64, end: u64) -> Result<(u64, u64)> {
    match (start.checked_mul(BLOCK_SIZE), (end - start).checked_mul(BLOCK_SIZE)) {
        (Some(offset), Some(length)) if offset.checked_add(length).is_some()
            => Ok((offset, length)),
        _ => {
            error!("Block range [{}, {}) does not fit in a 64-bit byte offset",
                start, end);
            Err(BuildError::RangeOverflow { start, end }.into())
        }
    }
}

#[derive(Default, Debug, PartialEq, Eq)]
pub(crate) struct BuildReport {
    pub(crate) erased_blocks: u64,
    pub(crate) written_blocks: u64,
    pub(crate) bytes_read: u64,
}

impl Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "erased {} blocks, wrote {} blocks from {} bytes of data",
            self.erased_blocks, self.written_blocks, self.bytes_read)
    }
}

/// Applies the erase and new ranges of a transfer list onto a target,
/// always erasing first.
pub(crate) struct ImageBuilder<'a> {
    erase_set: &'a RangeSet,
    new_set: &'a RangeSet,
    progress: bool,
}

impl<'a> ImageBuilder<'a> {
    pub(crate) fn new(erase_set: &'a RangeSet, new_set: &'a RangeSet) -> Self {
        Self { erase_set, new_set, progress: false }
    }

    pub(crate) fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Fill every erase range with zero blocks, returns the count of blocks
    /// written
    pub(crate) fn erase<W: Write + Seek>(&self, target: &mut W) -> Result<u64> {
        let bar = block_progress_bar(
            self.progress, self.erase_set.block_count(), "Erasing")?;
        let zeros = vec![0; CHUNK_SIZE];
        let mut blocks = 0;
        for (start, end) in self.erase_set.pairs().iter().copied() {
            let (offset, mut remaining) = byte_span(start, end)?;
            debug!("Erasing blocks [{}, {}) at 0x{:x}", start, end, offset);
            target.seek(SeekFrom::Start(offset))?;
            while remaining > 0 {
                let size = remaining.min(CHUNK_SIZE as u64);
                target.write_all(&zeros[..size as usize])?;
                remaining -= size;
                bar.inc(size / BLOCK_SIZE);
            }
            blocks += end - start;
        }
        bar.finish_and_clear();
        Ok(blocks)
    }

    /// Move blocks from the source into every new range, consuming the
    /// source sequentially in range order. Returns the count of blocks
    /// written.
    pub(crate) fn copy<R, W>(&self, source: &mut R, target: &mut W) -> Result<u64>
    where
        R: Read,
        W: Write + Seek,
    {
        let bar = block_progress_bar(
            self.progress, self.new_set.block_count(), "Writing")?;
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);
        let mut blocks = 0;
        for (start, end) in self.new_set.pairs().iter().copied() {
            let (offset, expected) = byte_span(start, end)?;
            debug!("Writing blocks [{}, {}) to 0x{:x}", start, end, offset);
            bar.set_message(format!("{}..{}", start, end));
            let mut done = 0;
            while done < expected {
                let size = (expected - done).min(CHUNK_SIZE as u64);
                buffer.clear();
                let read = source.by_ref().take(size).read_to_end(&mut buffer)?;
                if (read as u64) < size {
                    let available = done + read as u64;
                    error!("Data ran out while reading blocks [{}, {}): \
                        needed {} bytes, only {} left",
                        start, end, expected, available);
                    return Err(BuildError::ShortRead {
                        start, end, expected, available }.into())
                }
                if done == 0 {
                    target.seek(SeekFrom::Start(offset))?;
                }
                target.write_all(&buffer)?;
                done += size;
                bar.inc(size / BLOCK_SIZE);
            }
            blocks += end - start;
        }
        bar.finish_and_clear();
        Ok(blocks)
    }

    pub(crate) fn build<R, W>(&self, source: &mut R, target: &mut W)
        -> Result<BuildReport>
    where
        R: Read,
        W: Write + Seek,
    {
        info!("Erasing {} ranges ({} blocks)",
            self.erase_set.pair_count(), self.erase_set.block_count());
        let erased_blocks = self.erase(target)?;
        info!("Writing {} ranges ({} blocks)",
            self.new_set.pair_count(), self.new_set.block_count());
        let written_blocks = self.copy(source, target)?;
        target.flush()?;
        Ok(BuildReport {
            erased_blocks,
            written_blocks,
            bytes_read: written_blocks.saturating_mul(BLOCK_SIZE),
        })
    }

    /// Build into the image file, created if missing and never truncated
    pub(crate) fn try_build_files<P1, P2>(&self, data: P1, image: P2)
        -> Result<BuildReport>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>
    {
        let data = data.as_ref();
        let image = image.as_ref();
        let mut source = File::open(data)?;
        let mut target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(image)?;
        info!("Building image '{}' from '{}'", image.display(), data.display());
        let report = self.build(&mut source, &mut target)?;
        let data_size = source.metadata()?.len();
        if data_size > report.bytes_read {
            warn!("{} bytes at the end of '{}' were not used by any \
                new range", data_size - report.bytes_read, data.display());
        }
        Ok(report)
    }
}
