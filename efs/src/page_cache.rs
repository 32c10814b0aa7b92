//! # 页缓存层
//!
//! 页设备读写速度一般慢于内存读写速度，因此我们在内存中开辟缓冲区，
//! 把即将操作的页复制到内存中，修改过的页在同步时才写回页设备。
//!
//! 缓存由文件系统句柄持有，而非全局单例：每个挂载的文件系统各有一份。
//! 超级块不经过缓存，由句柄在同步的最后一步单独写入。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::mem;
use core::ops::Add;

use derive_more::{From, Into};
use page_dev::PageDevice;
use spin::Mutex;

use crate::{DataPage, PAGE_SIZE, Result};

/// 可以直接映射到页内字节上的磁盘数据结构。
///
/// # Safety
///
/// 实现者必须是`#[repr(C)]`的，且任意字节组合都是合法的值。
pub unsafe trait OnDisk: Sized {}

unsafe impl OnDisk for DataPage {}
unsafe impl OnDisk for u64 {}

/// 页号，相对分区起始处
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, From, Into)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    pub const SUPER_BLOCK: Self = Self(0);
}

impl Add<u64> for PageId {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[repr(C, align(8))]
struct PageBuf(DataPage);

/// 内存中的页
pub struct Page {
    /// 缓存的数据
    data: Box<PageBuf>,
    /// 对应的页号
    id: PageId,
    /// 底层页设备的引用
    dev: Arc<dyn PageDevice>,
    /// 是否为脏页
    modified: bool,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn load(id: PageId, dev: Arc<dyn PageDevice>) -> Result<Self> {
        let mut data = Box::new(PageBuf([0; PAGE_SIZE]));
        dev.read_page(u64::from(id), &mut data.0)?;

        Ok(Self {
            data,
            id,
            dev,
            modified: false,
        })
    }

    /// 全0的新页，不读取页设备，视为已修改
    pub fn zeroed(id: PageId, dev: Arc<dyn PageDevice>) -> Self {
        Self {
            data: Box::new(PageBuf([0; PAGE_SIZE])),
            id,
            dev,
            modified: true,
        }
    }

    pub fn sync(&mut self) -> Result<()> {
        if self.modified {
            self.dev.write_page(u64::from(self.id), &self.data.0)?;
            self.modified = false;
        }
        Ok(())
    }

    pub fn get<T: OnDisk>(&self, offset: usize) -> &T {
        assert!(mem::size_of::<T>() + offset <= PAGE_SIZE);
        assert_eq!(0, offset % mem::align_of::<T>());
        let addr = self.data.0[offset..].as_ptr().cast::<T>();
        unsafe { &*addr }
    }

    pub fn get_mut<T: OnDisk>(&mut self, offset: usize) -> &mut T {
        assert!(mem::size_of::<T>() + offset <= PAGE_SIZE);
        assert_eq!(0, offset % mem::align_of::<T>());
        self.modified = true;
        let addr = self.data.0[offset..].as_mut_ptr().cast::<T>();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: OnDisk, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: OnDisk, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.0.fill(0);
        self.modified = true;
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            log::error!("page {} lost on drop: {e}", self.id);
        }
    }
}

/// 页缓存，缓存、调度内存中的页
pub struct PageCache {
    dev: Arc<dyn PageDevice>,
    queue: Mutex<Vec<(PageId, Arc<Mutex<Page>>)>>,
}

impl fmt::Debug for PageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("cached", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl PageCache {
    /// 页缓存个数的上限
    pub const CAPACITY: usize = 16;

    pub fn new(dev: Arc<dyn PageDevice>) -> Self {
        Self {
            dev,
            queue: Mutex::default(),
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn PageDevice> {
        &self.dev
    }

    // 页缓存调度策略：踢走闲置页
    pub fn get(&self, id: PageId) -> Result<Arc<Mutex<Page>>> {
        let mut queue = self.queue.lock();

        // 尝试从缓冲区中读取页
        if let Some(page) = queue
            .iter()
            .find_map(|(pid, page)| (id == *pid).then_some(page))
        {
            return Ok(Arc::clone(page));
        }

        Self::evict(&mut queue)?;

        // 缓存新页
        let page = Arc::new(Mutex::new(Page::load(id, self.dev.clone())?));
        queue.push((id, page.clone()));

        Ok(page)
    }

    /// 取得一个内容全为0的页，即将被完全覆盖的页无需从设备读取
    pub fn get_zeroed(&self, id: PageId) -> Result<Arc<Mutex<Page>>> {
        let mut queue = self.queue.lock();

        if let Some(page) = queue
            .iter()
            .find_map(|(pid, page)| (id == *pid).then_some(page))
        {
            page.lock().zeroize();
            return Ok(Arc::clone(page));
        }

        Self::evict(&mut queue)?;

        let page = Arc::new(Mutex::new(Page::zeroed(id, self.dev.clone())));
        queue.push((id, page.clone()));

        Ok(page)
    }

    /// 写回全部脏页
    pub fn sync_all(&self) -> Result<()> {
        self.queue
            .lock()
            .iter()
            .try_for_each(|(_, page)| page.lock().sync())
    }

    // 触及上限，写回并移除一个没有其它引用的页
    fn evict(queue: &mut Vec<(PageId, Arc<Mutex<Page>>)>) -> Result<()> {
        if queue.len() < Self::CAPACITY {
            return Ok(());
        }

        match queue
            .iter()
            .position(|(_, page)| Arc::strong_count(page) == 1)
        {
            Some(index) => {
                queue[index].1.lock().sync()?;
                queue.remove(index);
            }
            None => log::warn!("page cache is over capacity: {} pages in use", queue.len()),
        }

        Ok(())
    }
}
