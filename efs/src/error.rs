use core::fmt;

use page_dev::IoError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 页设备读写失败
    Io(IoError),
    /// 超级块的魔数不符
    InvalidMagic,
    OutOfSpace,
    /// 空闲链表违反了有序、不重叠、不相邻的约束
    CorruptFreeList,
    /// 目录表链表出现环或越界的节点
    CorruptCatalog,
    DuplicateId,
    DuplicateName,
    /// 无法再为目录表分配节点
    CatalogFull,
    /// 片段数组已满且无法合并
    FragmentLimitExceeded,
    DirectoryNotEmpty,
    OffsetOutOfRange,
    NotFound,
    NotADirectory,
    IsADirectory,
    NotALink,
    InvalidName,
    NameTooLong,
    InvalidArgument,
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidMagic => f.write_str("invalid superblock magic"),
            Error::OutOfSpace => f.write_str("no free region is large enough"),
            Error::CorruptFreeList => f.write_str("free space list is corrupted"),
            Error::CorruptCatalog => f.write_str("descriptor catalog is corrupted"),
            Error::DuplicateId => f.write_str("file ID already exists"),
            Error::DuplicateName => f.write_str("name already exists in this directory"),
            Error::CatalogFull => f.write_str("descriptor catalog is full"),
            Error::FragmentLimitExceeded => f.write_str("file has too many fragments"),
            Error::DirectoryNotEmpty => f.write_str("directory is not empty"),
            Error::OffsetOutOfRange => f.write_str("offset is out of the allocated range"),
            Error::NotFound => f.write_str("no such file or directory"),
            Error::NotADirectory => f.write_str("not a directory"),
            Error::IsADirectory => f.write_str("is a directory"),
            Error::NotALink => f.write_str("not a symbolic link"),
            Error::InvalidName => f.write_str("invalid file name"),
            Error::NameTooLong => f.write_str("file name too long"),
            Error::InvalidArgument => f.write_str("invalid argument"),
        }
    }
}

impl core::error::Error for Error {}
