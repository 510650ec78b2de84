/*
sdatimg, to build raw images from Android transfer lists: error module
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

use std::path::PathBuf;

#[derive(Debug)]
pub(crate) enum Error {
    IOError (std::io::Error),
    TemplateError (indicatif::style::TemplateError),
    YamlError (serde_yaml::Error),
    MissingInput {
        path: PathBuf,
    },
    TransferListError (crate::transfer::TransferListError),
    BuildError (crate::image::BuildError),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<indicatif::style::TemplateError> for Error {
    fn from(value: indicatif::style::TemplateError) -> Self {
        Self::TemplateError(value)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::YamlError(value)
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
