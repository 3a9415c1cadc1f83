//! Host side access to APA/PFS disks: a file backed [`BlockDevice`](block_dev::BlockDevice)
//! for raw devices and disk images.

mod block_file;

use std::path::{Path, PathBuf};

pub use self::block_file::BlockFile;

/// Host path for extracting the on-disk file `name` into `dir`, or `None`
/// when `name` is not a single path component.
pub fn output_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let file_name = Path::new(name).file_name()?;
    (file_name == name).then(|| dir.join(file_name))
}
