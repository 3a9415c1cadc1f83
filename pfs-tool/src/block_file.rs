use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{BlockDevice, Sector, SECTOR_SIZE};

/// A raw device node or image file seen as 512-byte sectors.
#[derive(Debug)]
pub struct BlockFile {
    file: File,
    writable: bool,
}

impl BlockFile {
    pub fn new(file: File, writable: bool) -> Self {
        Self { file, writable }
    }

    /// Opens an existing device, read-write only when asked to.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> pfs::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|err| open_error(path, err))?;
        log::debug!(
            "opened {} {}",
            path.display(),
            if writable { "read-write" } else { "read-only" }
        );
        Ok(Self::new(file, writable))
    }

    /// Creates (or truncates) an image file of `bytes` bytes.
    pub fn create(path: impl AsRef<Path>, bytes: u64) -> pfs::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| open_error(path, err))?;
        file.set_len(bytes)?;
        Ok(Self::new(file, true))
    }
}

fn open_error(path: &Path, err: io::Error) -> pfs::Error {
    match err.kind() {
        ErrorKind::PermissionDenied => pfs::Error::AccessDenied(path.display().to_string()),
        ErrorKind::NotFound => pfs::Error::DeviceNotFound(path.display().to_string()),
        _ => pfs::Error::Io(err),
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&mut self, block_id: u64, buf: &mut Sector) -> io::Result<usize> {
        self.file
            .seek(SeekFrom::Start(block_id * SECTOR_SIZE as u64))?;

        // devices may hand out less than asked for; only EOF ends the sector
        let mut len = 0;
        while len < SECTOR_SIZE {
            match self.file.read(&mut buf[len..]) {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        buf[len..].fill(0);

        Ok(len)
    }

    fn write_block(&mut self, block_id: u64, buf: &Sector) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(block_id * SECTOR_SIZE as u64))?;
        self.file.write_all(buf)
    }

    fn num_blocks(&mut self) -> io::Result<u64> {
        let len = self.file.seek(SeekFrom::End(0))?;
        Ok(len / SECTOR_SIZE as u64)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.writable {
            self.file.flush()?;
            self.file.sync_data()?;
        }
        Ok(())
    }
}
