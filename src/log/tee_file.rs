//! Tee-file directive: mirror records at or above a level into a plain file.
//!
//! Grounded on `dqcsim/src/log/tee_file.rs`, which parses the CLI/config
//! syntax `"<level>:<filename>"`.

use super::LoglevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{inv_arg, Result};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TeeFile {
    pub level: LoglevelFilter,
    pub filename: PathBuf,
}

impl FromStr for TeeFile {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<TeeFile> {
        let idx = s
            .find(':')
            .ok_or_else(|| inv_arg::<()>("expected <level>:<filename>").unwrap_err())?;
        let (level, filename) = s.split_at(idx);
        let filename = &filename[1..];
        if filename.is_empty() {
            return inv_arg("tee file filename must not be empty");
        }
        Ok(TeeFile {
            level: level.parse()?,
            filename: filename.into(),
        })
    }
}

impl fmt::Display for TeeFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.filename.display())
    }
}
