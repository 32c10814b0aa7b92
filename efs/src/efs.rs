//! # 文件系统句柄
//!
//! [`EasyFileSystem`] 是显式的上下文对象，持有页设备、页缓存、
//! 内存中的超级块以及文件ID计数器。
//!
//! 只读操作取`&self`，修改操作取`&mut self`；
//! 句柄以`Arc<RwLock<_>>`交出，由此得到单写多读的约束。
//! 每个修改操作都以[`sync`](EasyFileSystem::sync)结尾：先写回脏页，超级块有变化时最后写入。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use enumflags2::BitFlags;
use page_dev::PageDevice;
use spin::{Mutex, RwLock};

use crate::catalog::{Catalog, NewEntry};
use crate::free_list::FreeList;
use crate::layout::{DescriptorKind, FileDescriptor, FreeNode, Permission, Stat, SuperBlock};
use crate::page_cache::{Page, PageCache, PageId};
use crate::{DataPage, Error, NAME_CAP, PAGE_SIZE, ROOT, Result, fragment};

const PS: u64 = PAGE_SIZE as u64;

#[derive(Debug)]
pub struct EasyFileSystem {
    cache: PageCache,
    uuid: [u8; 16],
    name: String,
    free_list: FreeList,
    catalog: Catalog,
    /// 下一个可用的文件ID
    next_id: u64,
    /// 时间戳来源
    clock: fn() -> u64,
    /// 最近一次写入磁盘的超级块内容，`None`表示尚未写入
    flushed: Option<SuperState>,
}

/// 超级块中会随操作变化的部分
#[derive(Debug, Clone, PartialEq, Eq)]
struct SuperState {
    descriptor_table: u64,
    free_space: u64,
    total_pages: u64,
    name: String,
}

/// 格式化参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// 分区总页数，至少为2
    pub pages: u64,
    pub name: String,
    pub uuid: [u8; 16],
}

/// 文件系统的空间统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub total_pages: u64,
    pub free_pages: u64,
    pub free_regions: usize,
    pub catalog_nodes: usize,
    pub files: usize,
}

/// 时间未知
fn unknown_time() -> u64 {
    0
}

impl EasyFileSystem {
    /// 在页设备上创建新的文件系统：
    /// 整个分区除超级块外是一个空闲区域，目录表为空。
    pub fn format(dev: Arc<dyn PageDevice>, opts: FormatOptions) -> Result<Arc<RwLock<Self>>> {
        if opts.pages < 2 {
            log::error!("cannot format {} pages", opts.pages);
            return Err(Error::InvalidArgument);
        }
        check_fs_name(&opts.name)?;

        let cache = PageCache::new(dev);
        cache
            .get_zeroed(PageId::from(1))?
            .lock()
            .map_mut(0, |node: &mut FreeNode| node.init(0, opts.pages - 1));

        let mut efs = Self {
            cache,
            uuid: opts.uuid,
            name: opts.name,
            free_list: FreeList::new(1, opts.pages),
            catalog: Catalog::new(0, opts.pages),
            next_id: ROOT + 1,
            clock: unknown_time,
            flushed: None,
        };
        efs.sync()?;

        log::info!("format {:?}: {} pages", efs.name, opts.pages);
        Ok(Arc::new(RwLock::new(efs)))
    }

    /// 读取超级块，挂载已有的文件系统
    pub fn mount(dev: Arc<dyn PageDevice>) -> Result<Arc<RwLock<Self>>> {
        let (valid, uuid, descriptor_table, free_space, total_pages, name) =
            Page::load(PageId::SUPER_BLOCK, dev.clone())?.map(0, |sb: &SuperBlock| {
                (
                    sb.is_valid(),
                    sb.uuid,
                    sb.descriptor_table,
                    sb.free_space,
                    sb.total_pages,
                    sb.name(),
                )
            });
        if !valid {
            log::error!("no filesystem found: bad magic");
            return Err(Error::InvalidMagic);
        }

        let mut efs = Self {
            cache: PageCache::new(dev),
            uuid,
            name: name.clone(),
            free_list: FreeList::new(free_space, total_pages),
            catalog: Catalog::new(descriptor_table, total_pages),
            next_id: ROOT + 1,
            clock: unknown_time,
            flushed: Some(SuperState {
                descriptor_table,
                free_space,
                total_pages,
                name,
            }),
        };

        let mut max_id = ROOT;
        efs.catalog
            .for_each(&efs.cache, |fd| max_id = max_id.max(fd.id))?;
        efs.next_id = max_id + 1;

        log::info!(
            "mount {:?}: {total_pages} pages, catalog at {descriptor_table}, free space at {free_space}",
            efs.name
        );
        Ok(Arc::new(RwLock::new(efs)))
    }

    #[inline]
    pub fn uuid(&self) -> [u8; 16] {
        self.uuid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn total_pages(&self) -> u64 {
        self.free_list.total_pages()
    }

    pub fn set_clock(&mut self, clock: fn() -> u64) {
        self.clock = clock;
    }

    /// 写回全部脏页；链表头、分区大小或名字变了的话，最后写入超级块
    pub fn sync(&mut self) -> Result<()> {
        self.cache.sync_all()?;
        if self.flushed.as_ref() != Some(&self.super_state()) {
            self.flush()?;
        }
        Ok(())
    }

    /// 由内存中的状态重写超级块
    pub fn flush(&mut self) -> Result<()> {
        let state = self.super_state();
        let mut page = Page::zeroed(PageId::SUPER_BLOCK, self.cache.device().clone());
        page.map_mut(0, |sb: &mut SuperBlock| {
            sb.init(
                self.uuid,
                state.descriptor_table,
                state.free_space,
                state.total_pages,
                &state.name,
            )
        })?;
        page.sync()?;

        log::debug!(
            "superblock: catalog at {}, free space at {}",
            state.descriptor_table,
            state.free_space
        );
        self.flushed = Some(state);
        Ok(())
    }

    pub fn statfs(&self) -> Result<FsStat> {
        let mut files = 0;
        self.catalog.for_each(&self.cache, |_| files += 1)?;

        Ok(FsStat {
            total_pages: self.free_list.total_pages(),
            free_pages: self.free_list.free_pages(&self.cache)?,
            free_regions: self.free_list.regions(&self.cache)?.len(),
            catalog_nodes: self.catalog.node_count(&self.cache)?,
            files,
        })
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        check_fs_name(name)?;
        self.name = name.into();
        self.sync()
    }

    /// 分区扩容到`new_pages`页，新增的页并入空闲空间
    pub fn grow(&mut self, new_pages: u64) -> Result<()> {
        let old_pages = self.free_list.total_pages();
        if new_pages <= old_pages {
            return Err(Error::InvalidArgument);
        }

        self.free_list.set_total_pages(new_pages);
        self.catalog.set_total_pages(new_pages);
        let r = self
            .free_list
            .free(&self.cache, PageId::from(old_pages), new_pages - old_pages);
        if r.is_err() {
            self.free_list.set_total_pages(old_pages);
            self.catalog.set_total_pages(old_pages);
        } else {
            log::info!("grow from {old_pages} to {new_pages} pages");
        }
        self.commit(r)
    }
}

impl EasyFileSystem {
    pub fn create_file(&mut self, parent: u64, name: &str) -> Result<u64> {
        self.create(
            parent,
            name,
            DescriptorKind::File,
            Permission::from_mode(0o644),
        )
    }

    pub fn mkdir(&mut self, parent: u64, name: &str) -> Result<u64> {
        self.create(
            parent,
            name,
            DescriptorKind::Directory,
            Permission::from_mode(0o755),
        )
    }

    /// 创建符号链接，链接目标作为文件内容存放
    pub fn symlink(&mut self, parent: u64, name: &str, target: &str) -> Result<u64> {
        let id = self.create(
            parent,
            name,
            DescriptorKind::Symlink,
            Permission::from_mode(0o777),
        )?;

        if let Err(e) = self.write_at(id, 0, target.as_bytes()) {
            if let Err(e) = self.unlink(id) {
                log::error!("symlink {id} left half-written: {e}");
            }
            return Err(e);
        }
        Ok(id)
    }

    pub fn lookup(&self, parent: u64, name: &str) -> Result<Stat> {
        let slot = self.catalog.find_child(&self.cache, parent, name)?;
        Ok(self.cache.get(slot)?.lock().map(0, FileDescriptor::stat))
    }

    pub fn stat(&self, id: u64) -> Result<Stat> {
        self.catalog.stat(&self.cache, id)
    }

    pub fn read_dir(&self, parent: u64) -> Result<Vec<Stat>> {
        if parent != ROOT && self.stat(parent)?.kind != DescriptorKind::Directory {
            return Err(Error::NotADirectory);
        }
        self.catalog.children(&self.cache, parent)
    }

    /// 从`offset`处读取，读到文件尾为止，返回读取的字节数
    pub fn read_at(&self, id: u64, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let page = self.descriptor(id)?;
        let page = page.lock();
        let fd: &FileDescriptor = page.get(0);
        if fd.is_dir() {
            return Err(Error::IsADirectory);
        }
        if offset >= fd.size {
            return Ok(0);
        }

        let len = usize::try_from(fd.size - offset).map_or(buf.len(), |left| left.min(buf.len()));
        let mut read = 0;
        while read < len {
            let (data, page_offset) = fragment::offset_to_location(fd, offset + read as u64)?;
            let n = (PAGE_SIZE - page_offset).min(len - read);
            self.cache.get(data)?.lock().map(0, |block: &DataPage| {
                buf[read..read + n].copy_from_slice(&block[page_offset..page_offset + n]);
            });
            read += n;
        }

        Ok(read)
    }

    /// 写入`offset`处，超出文件尾时文件随之增长
    pub fn write_at(&mut self, id: u64, offset: u64, buf: &[u8]) -> Result<usize> {
        let r = self.write_data(id, offset, buf);
        self.commit(r)
    }

    /// 改变文件大小，增长的部分全为0
    pub fn truncate(&mut self, id: u64, size: u64) -> Result<()> {
        let r = self.descriptor(id).and_then(|page| {
            let mut page = page.lock();
            let fd: &mut FileDescriptor = page.get_mut(0);
            if fd.is_dir() {
                return Err(Error::IsADirectory);
            }
            self.resize(fd, size)?;
            fd.modified = (self.clock)();
            Ok(())
        });
        self.commit(r)
    }

    /// 删除文件或符号链接
    pub fn unlink(&mut self, id: u64) -> Result<()> {
        if self.stat(id)?.kind == DescriptorKind::Directory {
            return Err(Error::IsADirectory);
        }
        let r = self.catalog.remove(&self.cache, &mut self.free_list, id);
        self.commit(r)
    }

    /// 删除空目录
    pub fn rmdir(&mut self, id: u64) -> Result<()> {
        if self.stat(id)?.kind != DescriptorKind::Directory {
            return Err(Error::NotADirectory);
        }
        let r = self.catalog.remove(&self.cache, &mut self.free_list, id);
        self.commit(r)
    }

    pub fn rename(&mut self, id: u64, new_parent: u64, new_name: &str) -> Result<()> {
        let r = self.catalog.rename(&self.cache, id, new_parent, new_name);
        self.commit(r)
    }

    pub fn set_permissions(&mut self, id: u64, permissions: BitFlags<Permission>) -> Result<()> {
        self.update(id, |fd| {
            fd.set_permissions(permissions);
            Ok(())
        })
    }

    pub fn set_owner(&mut self, id: u64, owner: u64, group: u64) -> Result<()> {
        self.update(id, |fd| {
            fd.owner = owner;
            fd.group = group;
            Ok(())
        })
    }

    pub fn set_times(&mut self, id: u64, accessed: u64, modified: u64) -> Result<()> {
        self.update(id, |fd| {
            fd.accessed = accessed;
            fd.modified = modified;
            Ok(())
        })
    }

    pub fn read_link(&self, id: u64) -> Result<String> {
        let stat = self.stat(id)?;
        if stat.kind != DescriptorKind::Symlink {
            return Err(Error::NotALink);
        }

        // 大小取自磁盘，不超过已分配的页
        let len = stat.size.min(stat.pages.saturating_mul(PS));
        let mut buf = alloc::vec![0; usize::try_from(len).map_err(|_| Error::CorruptCatalog)?];
        let len = self.read_at(id, 0, &mut buf)?;
        buf.truncate(len);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl EasyFileSystem {
    fn create(
        &mut self,
        parent: u64,
        name: &str,
        kind: DescriptorKind,
        permissions: BitFlags<Permission>,
    ) -> Result<u64> {
        let id = self.next_id;
        let entry = NewEntry {
            id,
            parent,
            kind,
            permissions,
            owner: 0,
            group: 0,
            name,
            timestamp: (self.clock)(),
        };
        let r = self.catalog.insert(&self.cache, &mut self.free_list, &entry);
        self.commit(r)?;

        self.next_id += 1;
        Ok(id)
    }

    fn write_data(&mut self, id: u64, offset: u64, buf: &[u8]) -> Result<usize> {
        let page = self.descriptor(id)?;
        let mut page = page.lock();
        let fd: &mut FileDescriptor = page.get_mut(0);
        if fd.is_dir() {
            return Err(Error::IsADirectory);
        }

        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(Error::InvalidArgument)?;
        if end > fd.size {
            self.resize(fd, end)?;
        }

        let mut written = 0;
        while written < buf.len() {
            let (data, page_offset) = fragment::offset_to_location(fd, offset + written as u64)?;
            let n = (PAGE_SIZE - page_offset).min(buf.len() - written);
            self.cache.get(data)?.lock().map_mut(0, |block: &mut DataPage| {
                block[page_offset..page_offset + n].copy_from_slice(&buf[written..written + n]);
            });
            written += n;
        }

        fd.modified = (self.clock)();
        Ok(written)
    }

    /// 按新的大小分配或释放页。
    ///
    /// 已分配但超出文件大小的字节总为0：新页清零，截断时清掉最后一页的尾部。
    fn resize(&mut self, fd: &mut FileDescriptor, size: u64) -> Result<()> {
        let have = fd.allocated_pages();
        let need = FileDescriptor::pages_for(size);

        if need > have {
            let additional = (need - have).checked_mul(PS).ok_or(Error::OutOfSpace)?;
            if let Some(start) = fragment::grow(fd, additional, &mut self.free_list, &self.cache)? {
                for page in 0..need - have {
                    self.cache.get_zeroed(start + page)?;
                }
            }
        } else if need < have {
            let removed = (have - need).checked_mul(PS).ok_or(Error::OffsetOutOfRange)?;
            fragment::shrink(fd, removed, &mut self.free_list, &self.cache)?;
        }

        if size < fd.size && size % PS != 0 {
            let (page, page_offset) = fragment::offset_to_location(fd, size)?;
            self.cache
                .get(page)?
                .lock()
                .map_mut(0, |block: &mut DataPage| block[page_offset..].fill(0));
        }

        fd.size = size;
        Ok(())
    }

    fn descriptor(&self, id: u64) -> Result<Arc<Mutex<Page>>> {
        let slot = self.catalog.find_by_id(&self.cache, id)?;
        self.cache.get(slot)
    }

    fn update(
        &mut self,
        id: u64,
        f: impl FnOnce(&mut FileDescriptor) -> Result<()>,
    ) -> Result<()> {
        let r = self.descriptor(id).and_then(|page| {
            let mut page = page.lock();
            page.map_mut(0, f)
        });
        self.commit(r)
    }

    fn super_state(&self) -> SuperState {
        SuperState {
            descriptor_table: self.catalog.head(),
            free_space: self.free_list.head(),
            total_pages: self.free_list.total_pages(),
            name: self.name.clone(),
        }
    }

    /// 无论操作成败都同步，已生效的部分修改照样落盘
    fn commit<T>(&mut self, r: Result<T>) -> Result<T> {
        let synced = self.sync();
        let value = r?;
        synced?;
        Ok(value)
    }
}

fn check_fs_name(name: &str) -> Result<()> {
    if name.len() >= NAME_CAP || name.contains('\0') {
        log::error!("invalid filesystem name of {} bytes", name.len());
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use page_dev::{IoErrorKind, RamDisk};

    use super::*;

    fn setup(pages: u64) -> (Arc<RamDisk>, Arc<RwLock<EasyFileSystem>>) {
        let disk = Arc::new(RamDisk::new(PAGE_SIZE, pages));
        let efs = EasyFileSystem::format(
            disk.clone(),
            FormatOptions {
                pages,
                name: "test".into(),
                uuid: [7; 16],
            },
        )
        .unwrap();
        (disk, efs)
    }

    fn clock() -> u64 {
        42
    }

    #[test]
    fn format_rejects_bad_options() {
        let disk = Arc::new(RamDisk::new(PAGE_SIZE, 4));
        let opts = |pages, name: &str| FormatOptions {
            pages,
            name: name.into(),
            uuid: [0; 16],
        };
        assert!(matches!(
            EasyFileSystem::format(disk.clone(), opts(1, "x")),
            Err(Error::InvalidArgument)
        ));
        assert!(matches!(
            EasyFileSystem::format(disk.clone(), opts(4, &"x".repeat(NAME_CAP))),
            Err(Error::InvalidArgument)
        ));
        assert!(EasyFileSystem::format(disk, opts(2, "x")).is_ok());
    }

    #[test]
    fn write_read_and_clamp() {
        let (_, efs) = setup(100);
        let mut efs = efs.write();
        let id = efs.create_file(ROOT, "a").unwrap();

        let data: Vec<u8> = (0..PAGE_SIZE * 2 + 100).map(|i| i as u8).collect();
        assert_eq!(efs.write_at(id, 10, &data).unwrap(), data.len());

        let stat = efs.stat(id).unwrap();
        assert_eq!(stat.size, 10 + data.len() as u64);
        assert_eq!(stat.pages, 3);

        let mut buf = vec![0xffu8; data.len() + 100];
        assert_eq!(efs.read_at(id, 0, &mut buf).unwrap(), data.len() + 10);
        assert_eq!(buf[..10], [0; 10]);
        assert_eq!(buf[10..10 + data.len()], data[..]);
        assert_eq!(efs.read_at(id, stat.size, &mut buf).unwrap(), 0);
    }

    #[test]
    fn huge_offsets_are_out_of_space() {
        let (_, efs) = setup(100);
        let mut efs = efs.write();
        let id = efs.create_file(ROOT, "a").unwrap();
        let free = efs.statfs().unwrap().free_pages;

        assert_eq!(efs.write_at(id, u64::MAX - 100, b"x"), Err(Error::OutOfSpace));
        assert_eq!(efs.truncate(id, u64::MAX), Err(Error::OutOfSpace));
        let stat = efs.stat(id).unwrap();
        assert_eq!((stat.size, stat.pages), (0, 0));
        assert_eq!(efs.statfs().unwrap().free_pages, free);
    }

    #[test]
    fn truncate_zeroes_the_tail() {
        let (_, efs) = setup(100);
        let mut efs = efs.write();
        let id = efs.create_file(ROOT, "a").unwrap();
        efs.write_at(id, 0, &[1; 300]).unwrap();

        efs.truncate(id, 100).unwrap();
        efs.truncate(id, PAGE_SIZE as u64 * 2).unwrap();
        assert_eq!(efs.stat(id).unwrap().pages, 2);

        let mut buf = [0xffu8; 300];
        efs.read_at(id, 0, &mut buf).unwrap();
        assert_eq!(buf[..100], [1; 100]);
        assert_eq!(buf[100..], [0; 200]);

        efs.truncate(id, 0).unwrap();
        let stat = efs.stat(id).unwrap();
        assert_eq!((stat.size, stat.pages), (0, 0));
    }

    #[test]
    fn kinds_are_checked() {
        let (_, efs) = setup(1000);
        let mut efs = efs.write();
        let dir = efs.mkdir(ROOT, "d").unwrap();
        let file = efs.create_file(dir, "f").unwrap();

        assert_eq!(efs.unlink(dir), Err(Error::IsADirectory));
        assert_eq!(efs.rmdir(file), Err(Error::NotADirectory));
        assert_eq!(efs.rmdir(dir), Err(Error::DirectoryNotEmpty));
        assert_eq!(efs.write_at(dir, 0, b"x"), Err(Error::IsADirectory));
        assert_eq!(efs.read_dir(file), Err(Error::NotADirectory));
        assert_eq!(efs.read_link(file), Err(Error::NotALink));

        efs.unlink(file).unwrap();
        efs.rmdir(dir).unwrap();
        assert!(efs.read_dir(ROOT).unwrap().is_empty());
    }

    #[test]
    fn symlink_and_metadata() {
        let (_, efs) = setup(1000);
        let mut efs = efs.write();
        efs.set_clock(clock);

        let link = efs.symlink(ROOT, "l", "/some/where").unwrap();
        assert_eq!(efs.read_link(link).unwrap(), "/some/where");

        let stat = efs.lookup(ROOT, "l").unwrap();
        assert_eq!(stat.kind, DescriptorKind::Symlink);
        assert_eq!(stat.modified, 42);
        assert_eq!(Permission::to_mode(stat.permissions), 0o777);

        efs.set_permissions(link, Permission::from_mode(0o600)).unwrap();
        efs.set_owner(link, 1000, 100).unwrap();
        efs.set_times(link, 1, 2).unwrap();
        let stat = efs.stat(link).unwrap();
        assert_eq!(Permission::to_mode(stat.permissions), 0o600);
        assert_eq!((stat.owner, stat.group), (1000, 100));
        assert_eq!((stat.accessed, stat.modified), (1, 2));
    }

    #[test]
    fn grow_partition() {
        let disk = Arc::new(RamDisk::new(PAGE_SIZE, 10));
        let efs = EasyFileSystem::format(
            disk.clone(),
            FormatOptions {
                pages: 10,
                name: "small".into(),
                uuid: [0; 16],
            },
        )
        .unwrap();
        let mut efs = efs.write();
        assert_eq!(efs.create_file(ROOT, "a"), Err(Error::CatalogFull));

        disk.resize(300);
        assert_eq!(efs.grow(5), Err(Error::InvalidArgument));
        efs.grow(300).unwrap();
        let stat = efs.statfs().unwrap();
        assert_eq!((stat.total_pages, stat.free_pages, stat.free_regions), (300, 299, 1));

        efs.create_file(ROOT, "a").unwrap();
        efs.set_name("big").unwrap();
        drop(efs);

        let efs = EasyFileSystem::mount(disk).unwrap();
        let efs = efs.read();
        assert_eq!(efs.name(), "big");
        assert_eq!(efs.total_pages(), 300);
        assert_eq!(efs.statfs().unwrap().files, 1);
    }

    #[test]
    fn superblock_written_when_heads_change() {
        let (disk, efs) = setup(1000);
        let mut efs = efs.write();

        // 首次插入分配目录表节点，超级块最后写入
        let id = efs.create_file(ROOT, "a").unwrap();
        assert_eq!(disk.last_write(), Some(0));
        efs.write_at(id, 0, &[1; PAGE_SIZE]).unwrap();
        assert_eq!(disk.last_write(), Some(0));

        // 只改描述符，写回一页
        let writes = disk.writes();
        efs.set_times(id, 1, 2).unwrap();
        assert_eq!(disk.writes(), writes + 1);
        assert_ne!(disk.last_write(), Some(0));

        // 超级块不可写时，原地修改不受影响
        disk.set_faulty(Some(0));
        efs.write_at(id, 10, b"x").unwrap();
        efs.set_permissions(id, Permission::from_mode(0o600)).unwrap();
        assert!(matches!(
            efs.write_at(id, PAGE_SIZE as u64, b"y"),
            Err(Error::Io(e)) if e.page_id == 0 && e.kind == IoErrorKind::Write
        ));

        // 恢复后下一次同步补写超级块
        disk.set_faulty(None);
        efs.set_times(id, 3, 4).unwrap();
        assert_eq!(disk.last_write(), Some(0));
        drop(efs);

        let efs = EasyFileSystem::mount(disk).unwrap();
        let efs = efs.read();
        let stat = efs.stat(id).unwrap();
        assert_eq!((stat.size, stat.pages), (PAGE_SIZE as u64 + 1, 2));
        assert_eq!(efs.statfs().unwrap().files, 1);
    }

    #[test]
    fn read_link_is_bounded_by_pages() {
        let (_, efs) = setup(100);
        let mut efs = efs.write();
        let link = efs.symlink(ROOT, "l", "/x").unwrap();

        // 描述符中的大小损坏
        efs.update(link, |fd| {
            fd.size = u64::MAX;
            Ok(())
        })
        .unwrap();
        let target = efs.read_link(link).unwrap();
        assert_eq!(target.len(), PAGE_SIZE);
        assert!(target.starts_with("/x\0"));
    }
}
