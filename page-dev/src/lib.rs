//! # 页设备接口层
//!
//! 分区被切分为定长的**页**，[`PageDevice`] 是对按页读写分区的抽象，
//! 页号从分区起始处以 0 开始编号。
//!
//! 读写失败以 [`IoError`] 报告，本层不做任何重试。

#![no_std]

extern crate alloc;

mod ram;

use core::any::Any;
use core::fmt;

pub use self::ram::RamDisk;

/// 页设备驱动特质
///
/// `buf` 的长度恒为一页。
pub trait PageDevice: Send + Sync + Any {
    fn read_page(&self, page_id: u64, buf: &mut [u8]) -> Result<(), IoError>;
    fn write_page(&self, page_id: u64, buf: &[u8]) -> Result<(), IoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoError {
    /// 出错的页
    pub page_id: u64,
    pub kind: IoErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    Read,
    Write,
    /// 页号超出设备容量
    OutOfBounds,
}

impl IoError {
    pub const fn new(page_id: u64, kind: IoErrorKind) -> Self {
        Self { page_id, kind }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IoErrorKind::Read => write!(f, "failed to read page {}", self.page_id),
            IoErrorKind::Write => write!(f, "failed to write page {}", self.page_id),
            IoErrorKind::OutOfBounds => write!(f, "page {} is out of bounds", self.page_id),
        }
    }
}

impl core::error::Error for IoError {}
