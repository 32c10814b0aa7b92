#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{Read, Write};
use std::io::{Seek, SeekFrom};
use std::sync::Mutex;

use efs::PAGE_SIZE;
use page_dev::{IoError, IoErrorKind, PageDevice};

/// 以宿主机上的镜像文件充当页设备
#[derive(Debug)]
pub struct BlockFile(pub Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }

    /// 镜像文件可容纳的页数
    pub fn pages(&self) -> std::io::Result<u64> {
        let file = self
            .0
            .lock()
            .map_err(|_| std::io::Error::other("image file lock poisoned"))?;
        Ok(file.metadata()?.len() / PAGE_SIZE as u64)
    }

    fn access(
        &self,
        page_id: u64,
        kind: IoErrorKind,
        f: impl FnOnce(&mut File) -> std::io::Result<()>,
    ) -> Result<(), IoError> {
        let error = IoError::new(page_id, kind);
        let mut file = self.0.lock().map_err(|_| error)?;
        file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))
            .and_then(|_| f(&mut file))
            .map_err(|e| {
                log::error!("page {page_id}: {e}");
                error
            })
    }
}

impl PageDevice for BlockFile {
    fn read_page(&self, page_id: u64, buf: &mut [u8]) -> Result<(), IoError> {
        if buf.len() != PAGE_SIZE {
            return Err(IoError::new(page_id, IoErrorKind::OutOfBounds));
        }
        self.access(page_id, IoErrorKind::Read, |file| file.read_exact(buf))
    }

    fn write_page(&self, page_id: u64, buf: &[u8]) -> Result<(), IoError> {
        if buf.len() != PAGE_SIZE {
            return Err(IoError::new(page_id, IoErrorKind::OutOfBounds));
        }
        self.access(page_id, IoErrorKind::Write, |file| file.write_all(buf))
    }
}
