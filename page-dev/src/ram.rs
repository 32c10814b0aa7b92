use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::{IoError, IoErrorKind, PageDevice};

/// 内存中的页设备
///
/// 可以指定一个“坏页”，对它的读写都会失败，用于演练错误路径。
#[derive(Debug)]
pub struct RamDisk {
    page_size: usize,
    data: Mutex<Vec<u8>>,
    faulty: AtomicU64,
    writes: AtomicU64,
    last_write: AtomicU64,
}

impl RamDisk {
    /// 不对应任何页
    const NONE: u64 = u64::MAX;

    pub fn new(page_size: usize, pages: u64) -> Self {
        Self {
            page_size,
            data: Mutex::new(vec![0; page_size * pages as usize]),
            faulty: AtomicU64::new(Self::NONE),
            writes: AtomicU64::new(0),
            last_write: AtomicU64::new(Self::NONE),
        }
    }

    pub fn pages(&self) -> u64 {
        (self.data.lock().len() / self.page_size) as u64
    }

    /// 扩容至`pages`页，新增的页以0填充
    pub fn resize(&self, pages: u64) {
        self.data.lock().resize(self.page_size * pages as usize, 0);
    }

    pub fn set_faulty(&self, page_id: Option<u64>) {
        self.faulty
            .store(page_id.unwrap_or(Self::NONE), Ordering::Relaxed);
    }

    /// 累计写入的页数
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 最近写入的页号
    pub fn last_write(&self) -> Option<u64> {
        match self.last_write.load(Ordering::Relaxed) {
            Self::NONE => None,
            page_id => Some(page_id),
        }
    }

    fn range(&self, page_id: u64, len: usize) -> Result<core::ops::Range<usize>, IoError> {
        if len != self.page_size {
            return Err(IoError::new(page_id, IoErrorKind::OutOfBounds));
        }
        let start = usize::try_from(page_id)
            .ok()
            .and_then(|page_id| page_id.checked_mul(self.page_size))
            .ok_or(IoError::new(page_id, IoErrorKind::OutOfBounds))?;
        Ok(start..start + len)
    }
}

impl PageDevice for RamDisk {
    fn read_page(&self, page_id: u64, buf: &mut [u8]) -> Result<(), IoError> {
        if self.faulty.load(Ordering::Relaxed) == page_id {
            return Err(IoError::new(page_id, IoErrorKind::Read));
        }
        let range = self.range(page_id, buf.len())?;
        let data = self.data.lock();
        let src = data
            .get(range)
            .ok_or(IoError::new(page_id, IoErrorKind::OutOfBounds))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_page(&self, page_id: u64, buf: &[u8]) -> Result<(), IoError> {
        if self.faulty.load(Ordering::Relaxed) == page_id {
            return Err(IoError::new(page_id, IoErrorKind::Write));
        }
        let range = self.range(page_id, buf.len())?;
        let mut data = self.data.lock();
        let dest = data
            .get_mut(range)
            .ok_or(IoError::new(page_id, IoErrorKind::OutOfBounds))?;
        dest.copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.last_write.store(page_id, Ordering::Relaxed);
        Ok(())
    }
}
