/*
sdatimg, to build raw images from Android transfer lists: sha1 checksum module
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

use std::{fmt::Display, fs::File, io::{ErrorKind, Read}, path::Path};

use indicatif::ProgressBar;
use sha1::{Digest, Sha1};

use crate::Result;

type Sha1sumByteArray = [u8; 20];

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Sha1sum(Sha1sumByteArray);

impl Sha1sum {
    pub(crate) fn from_reader_with_bar<R: Read>(mut reader: R, bar: &ProgressBar)
        -> Result<Self>
    {
        let mut hasher = Sha1::new();
        let mut buffer = vec![0; 0x100000];
        loop {
            let size = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(size) => size,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..size]);
            bar.inc(size as u64);
        }
        bar.finish_and_clear();
        Ok(Self(hasher.finalize().into()))
    }

    pub(crate) fn try_from_file<P: AsRef<Path>>(file: P, bar: &ProgressBar)
        -> Result<Self>
    {
        Self::from_reader_with_bar(File::open(file)?, bar)
    }
}

impl Display for Sha1sum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
