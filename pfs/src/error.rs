use std::io;

use derive_more::Display;

#[derive(Debug, Display)]
pub enum Error {
    /// The device cannot be opened in the required mode
    #[display(fmt = "permission denied: {}", _0)]
    AccessDenied(String),

    #[display(fmt = "device {} not found", _0)]
    DeviceNotFound(String),

    #[display(fmt = "device I/O error: {}", _0)]
    Io(io::Error),

    /// Expected magic is absent; the medium is blank rather than corrupt
    #[display(fmt = "{} is not formatted", _0)]
    NotFormatted(String),

    #[display(fmt = "sector {} is truncated: {} of 512 bytes readable", sector, len)]
    TruncatedRead { sector: u64, len: usize },

    #[display(fmt = "malformed on-disk record: {}", _0)]
    Codec(binrw::Error),

    #[display(fmt = "out of space: {} free sectors found, {} needed", found, needed)]
    OutOfSpace { needed: usize, found: usize },

    #[display(fmt = "no free inode left in the inode table")]
    NoFreeInode,

    #[display(fmt = "{} is a directory, not a file", _0)]
    NotAFile(String),

    #[display(fmt = "inode {} is not a directory", _0)]
    NotADirectory(u32),

    #[display(fmt = "inode {} lies outside the inode table", _0)]
    InodeOutOfRange(u32),

    #[display(fmt = "block {} lies outside the data area of the partition", _0)]
    BlockOutOfRange(u32),

    /// A direct block slot shadowed by the inode name field is in use
    #[display(fmt = "direct block slot {} overlaps the inode name field", _0)]
    LayoutOverlap(usize),

    #[display(fmt = "file of {} bytes exceeds the {} byte limit", size, max)]
    FileTooLarge { size: usize, max: usize },

    #[display(fmt = "invalid name {:?}", _0)]
    InvalidName(String),

    #[display(fmt = "{} already exists", _0)]
    AlreadyExists(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(String),

    #[display(fmt = "directory has no free entry slot")]
    DirectoryFull,

    #[display(fmt = "partition index {} out of range ({} found)", index, count)]
    PartitionOutOfRange { index: usize, count: usize },

    #[display(fmt = "device of {} sectors is too small, {} needed", sectors, min)]
    DeviceTooSmall { sectors: u64, min: u64 },
}

impl Error {
    /// Whether the failure means "blank medium", so callers can offer to
    /// format instead of reporting corruption.
    pub fn is_unformatted(&self) -> bool {
        matches!(self, Self::NotFormatted(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(err) => Self::Io(err),
            err => Self::Codec(err),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
