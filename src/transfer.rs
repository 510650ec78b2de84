/*
sdatimg, to build raw images from Android transfer lists: transfer list module
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

//! Transfer list interpreter.
//!
//! A transfer list is line oriented: the first line is the format version,
//! the second the total count of blocks the target should have, and every
//! line after that is a command. Only `erase` and `new` are interpreted,
//! every other command is skipped.

use std::{fmt::Display, fs::read_to_string, path::Path, str::FromStr};

use serde::Serialize;
use tracing::{debug, error};

use crate::{Error, Result};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TransferListError {
    MissingHeader {
        line: usize,
    },
    InvalidHeader {
        line: usize,
        value: String,
    },
    InvalidInteger {
        token: String,
    },
    OddCount {
        count: u64,
    },
    TooFewValues {
        count: u64,
        available: usize,
    },
    InvertedRange {
        start: u64,
        end: u64,
    },
    MissingRangeField {
        command: &'static str,
        line: usize,
    },
}

impl From<TransferListError> for Error {
    fn from(value: TransferListError) -> Self {
        Self::TransferListError(value)
    }
}

/// Half-open block ranges, kept in the order they were written
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RangeSet {
    pairs: Vec<(u64, u64)>,
}

impl RangeSet {
    pub(crate) fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub(crate) fn pairs(&self) -> &[(u64, u64)] {
        &self.pairs
    }

    /// Total count of blocks covered, overlapping ranges counted repeatedly
    pub(crate) fn block_count(&self) -> u64 {
        self.pairs.iter().fold(0, |sum, (start, end)|
            sum.saturating_add(end - start))
    }
}

fn parse_integer(token: &str) -> Result<u64> {
    match token.trim().parse() {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Range value '{}' is not a non-negative integer: {}",
                token, e);
            Err(TransferListError::InvalidInteger { token: token.into() }.into())
        }
    }
}

/// Decode an encoded range field, e.g. `4,0,2,5,8` for blocks `[0,2)` and
/// `[5,8)`. Values after the ones announced by the leading count are ignored.
pub(crate) fn parse_range_field(field: &str) -> Result<RangeSet> {
    let mut tokens = field.split(',');
    let count = parse_integer(tokens.next().unwrap_or_default())?;
    if count % 2 != 0 {
        error!("Range field '{}' announces an odd value count {}", field, count);
        return Err(TransferListError::OddCount { count }.into())
    }
    let values: Vec<&str> = tokens.collect();
    if (values.len() as u64) < count {
        error!("Range field '{}' announces {} values but only has {}",
            field, count, values.len());
        return Err(TransferListError::TooFewValues {
            count, available: values.len() }.into())
    }
    let mut pairs = Vec::with_capacity((count / 2) as usize);
    for pair in values[..count as usize].chunks_exact(2) {
        let start = parse_integer(pair[0])?;
        let end = parse_integer(pair[1])?;
        if start > end {
            error!("Range [{}, {}) in '{}' ends before it starts",
                start, end, field);
            return Err(TransferListError::InvertedRange { start, end }.into())
        }
        pairs.push((start, end))
    }
    Ok(RangeSet { pairs })
}

impl FromStr for RangeSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_range_field(s)
    }
}

impl Display for RangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pairs.len() * 2)?;
        for (start, end) in self.pairs.iter() {
            write!(f, ",{},{}", start, end)?
        }
        Ok(())
    }
}

fn parse_header_line<T: FromStr>(lines: &[&str], line: usize) -> Result<T> {
    let value = match lines.get(line) {
        Some(value) => value.trim(),
        None => {
            error!("Transfer list ends before header line {}", line + 1);
            return Err(TransferListError::MissingHeader { line }.into())
        }
    };
    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => {
            error!("Header line {} of transfer list is not an integer: '{}'",
                line + 1, value);
            Err(TransferListError::InvalidHeader {
                line, value: value.into() }.into())
        }
    }
}

/// Version and total block count from the first two lines
pub(crate) fn parse_header(lines: &[&str]) -> Result<(u32, u64)> {
    Ok((parse_header_line(lines, 0)?, parse_header_line(lines, 1)?))
}

/// Pick the first `erase` and the first `new` command from the lines after
/// the header, returned in that order.
pub(crate) fn parse_commands(lines: &[&str]) -> Result<(RangeSet, RangeSet)> {
    let mut erase_set = None;
    let mut new_set = None;
    for (id, line) in lines.iter().enumerate().skip(2) {
        let mut tokens = line.split_whitespace();
        let (command, slot) = match tokens.next() {
            Some("erase") => ("erase", &mut erase_set),
            Some("new") => ("new", &mut new_set),
            _ => {
                debug!("Ignoring transfer list line {}: '{}'", id + 1, line);
                continue
            }
        };
        if slot.is_some() {
            debug!("Ignoring repeated '{}' command on line {}", command, id + 1);
            continue
        }
        let Some(field) = tokens.next() else {
            error!("Command '{}' on transfer list line {} has no range field",
                command, id + 1);
            return Err(TransferListError::MissingRangeField {
                command, line: id }.into())
        };
        let set = parse_range_field(field)?;
        debug!("{} set from line {}: {} ranges, {} blocks: {}",
            command, id + 1, set.pair_count(), set.block_count(), set);
        *slot = Some(set);
    }
    Ok((erase_set.unwrap_or_default(), new_set.unwrap_or_default()))
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferList {
    pub(crate) version: u32,
    pub(crate) total_blocks: u64,
    pub(crate) erase_set: RangeSet,
    pub(crate) new_set: RangeSet,
}

impl FromStr for TransferList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lines: Vec<&str> = s.lines().collect();
        let (version, total_blocks) = parse_header(&lines)?;
        let (erase_set, new_set) = parse_commands(&lines)?;
        Ok(Self { version, total_blocks, erase_set, new_set })
    }
}

impl Display for TransferList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transfer list v{}, {} blocks total, erase {} ranges \
            ({} blocks), new {} ranges ({} blocks)",
            self.version, self.total_blocks,
            self.erase_set.pair_count(), self.erase_set.block_count(),
            self.new_set.pair_count(), self.new_set.block_count())
    }
}

impl TransferList {
    pub(crate) fn try_read<P: AsRef<Path>>(file: P) -> Result<Self> {
        read_to_string(file)?.parse()
    }

    pub(crate) fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub(crate) fn print_table_stdout(&self) -> Result<()> {
        use cli_table::{Cell, Style, Table, format::Justify};
        use crate::{image::BLOCK_SIZE, pretty::HumanSize};

        macro_rules! cell_right {
            ($raw: expr) => {
                $raw.cell().justify(Justify::Right)
            };
        }
        macro_rules! cell_bold_center {
            ($raw: expr) => {
                $raw.cell().bold(true).justify(Justify::Center)
            };
        }
        let mut rows = Vec::new();
        for (command, set) in [("erase", &self.erase_set), ("new", &self.new_set)] {
            for (id, (start, end)) in set.pairs().iter().enumerate() {
                // Ranges past 64-bit byte offsets are rejected at build time
                let offset = match start.checked_mul(BLOCK_SIZE) {
                    Some(offset) => format!("0x{:x}", offset),
                    None => "-".into(),
                };
                let size = match (end - start).checked_mul(BLOCK_SIZE) {
                    Some(size) => HumanSize(size).to_string(),
                    None => "-".into(),
                };
                rows.push([
                    cell_right!(command),
                    cell_right!(id),
                    cell_right!(start),
                    cell_right!(end),
                    cell_right!(end - start),
                    cell_right!(offset),
                    cell_right!(size),
                ])
            }
        }
        let table = rows.table().title([
            cell_bold_center!("command"),
            cell_bold_center!("ID"),
            cell_bold_center!("start"),
            cell_bold_center!("end"),
            cell_bold_center!("blocks"),
            cell_bold_center!("offset"),
            cell_bold_center!("size"),
        ]).bold(true);
        println!("{}", self);
        cli_table::print_stdout(table)?;
        Ok(())
    }
}
