pub mod gateway;
pub mod listing;
pub mod model;
pub mod planner;
pub mod scheduler;
pub mod store;
pub mod sweeper;
pub mod time;

#[cfg(test)]
mod testing;

use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
