//! # 目录表
//!
//! 全部文件与目录的描述符存放在一个展开链表中：
//! - 每个节点占据 1 + [`CATALOG_CAPACITY`] 个连续的页，首页为 [`CatalogNode`]，其余为描述符槽；
//! - 节点之间无序，新节点总是插在链表头；
//! - 槽可以稀疏分布，`id == 0` 的槽为空。
//!
//! 节点的槽全部空出且它不是链表头时，整个节点归还给分配器。

use alloc::vec::Vec;

use enumflags2::BitFlags;

use crate::free_list::FreeList;
use crate::layout::{CatalogNode, DescriptorKind, FileDescriptor, Permission, Stat};
use crate::page_cache::{PageCache, PageId};
use crate::{CATALOG_CAPACITY, Error, NAME_CAP, ROOT, Result, fragment};

/// 节点占据的页数
const NODE_PAGES: u64 = 1 + CATALOG_CAPACITY as u64;

#[derive(Debug)]
pub struct Catalog {
    /// 链表头，0 表示目录表为空。与超级块中的记录同步
    head: u64,
    total_pages: u64,
}

/// 新建描述符所需的信息
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub id: u64,
    pub parent: u64,
    pub kind: DescriptorKind,
    pub permissions: BitFlags<Permission>,
    pub owner: u64,
    pub group: u64,
    pub name: &'a str,
    /// 写入访问与修改时间
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    location: u64,
    next: u64,
    len: u64,
}

impl Catalog {
    pub fn new(head: u64, total_pages: u64) -> Self {
        Self { head, total_pages }
    }

    #[inline]
    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn set_total_pages(&mut self, total_pages: u64) {
        self.total_pages = total_pages;
    }

    /// 链表上的节点数
    pub fn node_count(&self, cache: &PageCache) -> Result<usize> {
        Ok(self.nodes(cache)?.len())
    }

    pub fn find_by_id(&self, cache: &PageCache, id: u64) -> Result<PageId> {
        self.find_map(cache, |slot, fd| (fd.id == id).then_some(slot))?
            .ok_or(Error::NotFound)
    }

    /// 在`parent`下按名字查找，返回描述符所在页
    pub fn find_child(&self, cache: &PageCache, parent: u64, name: &str) -> Result<PageId> {
        self.find_map(cache, |slot, fd| {
            (fd.parent == parent && fd.name_bytes() == name.as_bytes()).then_some(slot)
        })?
        .ok_or(Error::NotFound)
    }

    pub fn stat(&self, cache: &PageCache, id: u64) -> Result<Stat> {
        self.find_map(cache, |_, fd| (fd.id == id).then(|| fd.stat()))?
            .ok_or(Error::NotFound)
    }

    /// 列出`parent`目录下的全部项
    pub fn children(&self, cache: &PageCache, parent: u64) -> Result<Vec<Stat>> {
        let mut children = Vec::new();
        self.find_map(cache, |_, fd| {
            if fd.parent == parent {
                children.push(fd.stat());
            }
            None::<()>
        })?;
        Ok(children)
    }

    /// 遍历全部已占用的槽
    pub fn for_each(&self, cache: &PageCache, mut f: impl FnMut(&FileDescriptor)) -> Result<()> {
        self.find_map(cache, |_, fd| {
            f(fd);
            None::<()>
        })?;
        Ok(())
    }

    pub fn has_children(&self, cache: &PageCache, id: u64) -> Result<bool> {
        Ok(self
            .find_map(cache, |_, fd| (fd.parent == id).then_some(()))?
            .is_some())
    }

    /// 插入新的描述符，返回其所在页。
    ///
    /// 所有节点都已满时分配新节点并插到链表头。
    pub fn insert(
        &mut self,
        cache: &PageCache,
        free_list: &mut FreeList,
        entry: &NewEntry<'_>,
    ) -> Result<PageId> {
        check_name(entry.name)?;
        if entry.id == ROOT {
            return Err(Error::InvalidArgument);
        }
        if self
            .find_map(cache, |_, fd| (fd.id == entry.id).then_some(()))?
            .is_some()
        {
            return Err(Error::DuplicateId);
        }
        self.check_parent(cache, entry.parent)?;
        match self.find_child(cache, entry.parent, entry.name) {
            Ok(_) => return Err(Error::DuplicateName),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        let node = match self
            .nodes(cache)?
            .iter()
            .find(|node| node.len < CATALOG_CAPACITY as u64)
        {
            Some(node) => node.location,
            None => self.grow(cache, free_list)?,
        };

        for index in 0..CATALOG_CAPACITY {
            let slot = slot_page(node, index);
            if !cache
                .get(slot)?
                .lock()
                .map(0, |fd: &FileDescriptor| fd.is_free())
            {
                continue;
            }

            cache
                .get_zeroed(slot)?
                .lock()
                .map_mut(0, |fd: &mut FileDescriptor| {
                    fd.location = u64::from(slot);
                    fd.id = entry.id;
                    fd.parent = entry.parent;
                    fd.set_kind(entry.kind);
                    fd.set_permissions(entry.permissions);
                    fd.owner = entry.owner;
                    fd.group = entry.group;
                    fd.accessed = entry.timestamp;
                    fd.modified = entry.timestamp;
                    fd.set_name(entry.name)
                })?;
            cache
                .get(PageId::from(node))?
                .lock()
                .map_mut(0, |node: &mut CatalogNode| node.len += 1);

            log::debug!(
                "insert file {} ({:?}) under {} at {slot}",
                entry.id,
                entry.name,
                entry.parent
            );
            return Ok(slot);
        }

        log::error!("catalog node {node} claims a free slot but has none");
        Err(Error::CorruptCatalog)
    }

    /// 删除描述符并归还它的片段。
    ///
    /// 非空目录不可删除；节点清空后若不是链表头则一并回收。
    pub fn remove(&mut self, cache: &PageCache, free_list: &mut FreeList, id: u64) -> Result<()> {
        if id == ROOT {
            return Err(Error::InvalidArgument);
        }

        let nodes = self.nodes(cache)?;
        for (node_index, node) in nodes.iter().enumerate() {
            if node.len == 0 {
                continue;
            }

            for index in 0..CATALOG_CAPACITY {
                let slot = slot_page(node.location, index);
                let (found, is_dir) = cache
                    .get(slot)?
                    .lock()
                    .map(0, |fd: &FileDescriptor| (fd.id == id, fd.is_dir()));
                if !found {
                    continue;
                }

                if is_dir && self.has_children(cache, id)? {
                    return Err(Error::DirectoryNotEmpty);
                }

                cache
                    .get(slot)?
                    .lock()
                    .map_mut(0, |fd: &mut FileDescriptor| {
                        fragment::release_all(fd, free_list, cache)
                    })?;
                cache.get(slot)?.lock().zeroize();

                let len = cache
                    .get(PageId::from(node.location))?
                    .lock()
                    .map_mut(0, |header: &mut CatalogNode| {
                        header.len = header.len.saturating_sub(1);
                        header.len
                    });
                log::debug!("remove file {id} from {slot}");

                if len == 0 && node.location != self.head {
                    self.reclaim(cache, free_list, &nodes[..node_index], node)?;
                }
                return Ok(());
            }
        }

        Err(Error::NotFound)
    }

    /// 改名或移动到另一个目录，描述符本身不挪位置
    pub fn rename(
        &mut self,
        cache: &PageCache,
        id: u64,
        new_parent: u64,
        new_name: &str,
    ) -> Result<()> {
        check_name(new_name)?;
        if id == ROOT {
            return Err(Error::InvalidArgument);
        }

        let slot = self.find_by_id(cache, id)?;
        self.check_parent(cache, new_parent)?;

        // 目录不能移动到自己或自己的后代之下
        let mut cursor = new_parent;
        let mut depth = 0;
        while cursor != ROOT {
            if cursor == id {
                return Err(Error::InvalidArgument);
            }
            depth += 1;
            if depth > self.total_pages {
                return Err(Error::CorruptCatalog);
            }
            cursor = self.stat(cache, cursor)?.parent;
        }

        match self.find_child(cache, new_parent, new_name) {
            Ok(other) if other != slot => return Err(Error::DuplicateName),
            Ok(_) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        cache
            .get(slot)?
            .lock()
            .map_mut(0, |fd: &mut FileDescriptor| {
                fd.parent = new_parent;
                fd.set_name(new_name)
            })?;
        log::debug!("rename file {id} to {new_name:?} under {new_parent}");
        Ok(())
    }
}

impl Catalog {
    /// 按链表顺序列出节点
    fn nodes(&self, cache: &PageCache) -> Result<Vec<Node>> {
        let max_nodes = self.total_pages / NODE_PAGES + 1;
        let mut nodes = Vec::new();
        let mut cursor = self.head;
        while cursor != 0 {
            if nodes.len() as u64 >= max_nodes || cursor.saturating_add(NODE_PAGES) > self.total_pages {
                log::error!("catalog node {cursor} is out of bounds or part of a cycle");
                return Err(Error::CorruptCatalog);
            }

            let (next, len) = cache
                .get(PageId::from(cursor))?
                .lock()
                .map(0, |node: &CatalogNode| (node.next, node.len));
            if len > CATALOG_CAPACITY as u64 {
                return Err(Error::CorruptCatalog);
            }

            nodes.push(Node {
                location: cursor,
                next,
                len,
            });
            cursor = next;
        }
        Ok(nodes)
    }

    /// 依次访问已占用的槽，直到`f`返回`Some`
    fn find_map<T>(
        &self,
        cache: &PageCache,
        mut f: impl FnMut(PageId, &FileDescriptor) -> Option<T>,
    ) -> Result<Option<T>> {
        for node in self.nodes(cache)? {
            let mut seen = 0;
            for index in 0..CATALOG_CAPACITY {
                // 节点内的描述符都已看过
                if seen == node.len {
                    break;
                }

                let slot = slot_page(node.location, index);
                let found = cache.get(slot)?.lock().map(0, |fd: &FileDescriptor| {
                    (!fd.is_free()).then(|| f(slot, fd))
                });
                match found {
                    Some(Some(value)) => return Ok(Some(value)),
                    Some(None) => seen += 1,
                    None => {}
                }
            }
        }
        Ok(None)
    }

    fn check_parent(&self, cache: &PageCache, parent: u64) -> Result<()> {
        if parent == ROOT {
            return Ok(());
        }
        let is_dir = self
            .find_map(cache, |_, fd| (fd.id == parent).then(|| fd.is_dir()))?
            .ok_or(Error::NotFound)?;
        if is_dir {
            Ok(())
        } else {
            Err(Error::NotADirectory)
        }
    }

    /// 分配新节点，所有槽清零后插到链表头
    fn grow(&mut self, cache: &PageCache, free_list: &mut FreeList) -> Result<u64> {
        let node = free_list
            .allocate(cache, NODE_PAGES)
            .map_err(|e| match e {
                Error::OutOfSpace => Error::CatalogFull,
                e => e,
            })?;

        for page in 0..NODE_PAGES {
            cache.get_zeroed(node + page)?;
        }
        cache
            .get(node)?
            .lock()
            .map_mut(0, |header: &mut CatalogNode| header.init(self.head));

        log::debug!("catalog head {} -> {node}", self.head);
        self.head = u64::from(node);
        Ok(u64::from(node))
    }

    /// 把空节点从链表上摘下并归还
    fn reclaim(
        &mut self,
        cache: &PageCache,
        free_list: &mut FreeList,
        before: &[Node],
        node: &Node,
    ) -> Result<()> {
        let prev = before.last().ok_or(Error::CorruptCatalog)?;
        cache
            .get(PageId::from(prev.location))?
            .lock()
            .map_mut(0, |header: &mut CatalogNode| header.next = node.next);
        free_list.free(cache, PageId::from(node.location), NODE_PAGES)?;

        log::debug!("reclaim empty catalog node {}", node.location);
        Ok(())
    }
}

#[inline]
fn slot_page(node: u64, index: usize) -> PageId {
    PageId::from(node + 1 + index as u64)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::InvalidName);
    }
    if name.len() >= NAME_CAP {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use page_dev::RamDisk;

    use super::*;
    use crate::PAGE_SIZE;
    use crate::layout::FreeNode;

    struct Fixture {
        cache: PageCache,
        free_list: FreeList,
        catalog: Catalog,
    }

    fn setup(pages: u64) -> Fixture {
        let cache = PageCache::new(Arc::new(RamDisk::new(PAGE_SIZE, pages)));
        cache
            .get_zeroed(PageId::from(1))
            .unwrap()
            .lock()
            .map_mut(0, |node: &mut FreeNode| node.init(0, pages - 1));
        Fixture {
            cache,
            free_list: FreeList::new(1, pages),
            catalog: Catalog::new(0, pages),
        }
    }

    fn entry(id: u64, parent: u64, kind: DescriptorKind, name: &str) -> NewEntry<'_> {
        NewEntry {
            id,
            parent,
            kind,
            permissions: Permission::from_mode(0o644),
            owner: 0,
            group: 0,
            name,
            timestamp: 0,
        }
    }

    impl Fixture {
        fn insert(&mut self, e: NewEntry<'_>) -> Result<PageId> {
            self.catalog.insert(&self.cache, &mut self.free_list, &e)
        }

        fn remove(&mut self, id: u64) -> Result<()> {
            self.catalog.remove(&self.cache, &mut self.free_list, id)
        }

        fn free_pages(&self) -> u64 {
            self.free_list.free_pages(&self.cache).unwrap()
        }
    }

    #[test]
    fn first_insert_allocates_node() {
        let mut fx = setup(1000);
        let slot = fx
            .insert(entry(1, ROOT, DescriptorKind::File, "a.txt"))
            .unwrap();
        assert_eq!(fx.catalog.head(), 1);
        assert_eq!(slot, PageId::from(2));
        assert_eq!(fx.free_pages(), 999 - NODE_PAGES);

        let stat = fx.catalog.stat(&fx.cache, 1).unwrap();
        assert_eq!(stat.name, "a.txt");
        assert_eq!(stat.location, slot);
        assert_eq!(fx.catalog.find_child(&fx.cache, ROOT, "a.txt"), Ok(slot));
        assert_eq!(
            fx.catalog.find_child(&fx.cache, ROOT, "b.txt"),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut fx = setup(1000);
        fx.insert(entry(1, ROOT, DescriptorKind::Directory, "dir"))
            .unwrap();
        fx.insert(entry(2, 1, DescriptorKind::File, "x")).unwrap();
        let free = fx.free_pages();

        assert_eq!(
            fx.insert(entry(2, ROOT, DescriptorKind::File, "y")),
            Err(Error::DuplicateId)
        );
        assert_eq!(
            fx.insert(entry(3, 1, DescriptorKind::File, "x")),
            Err(Error::DuplicateName)
        );
        // 同名但父目录不同
        fx.insert(entry(3, ROOT, DescriptorKind::File, "x")).unwrap();

        assert_eq!(fx.free_pages(), free);
        assert_eq!(fx.catalog.children(&fx.cache, 1).unwrap().len(), 1);
    }

    #[test]
    fn parent_must_be_directory() {
        let mut fx = setup(1000);
        fx.insert(entry(1, ROOT, DescriptorKind::File, "f")).unwrap();
        assert_eq!(
            fx.insert(entry(2, 1, DescriptorKind::File, "g")),
            Err(Error::NotADirectory)
        );
        assert_eq!(
            fx.insert(entry(2, 9, DescriptorKind::File, "g")),
            Err(Error::NotFound)
        );
        assert_eq!(
            fx.insert(entry(0, ROOT, DescriptorKind::File, "g")),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            fx.insert(entry(2, ROOT, DescriptorKind::File, "a/b")),
            Err(Error::InvalidName)
        );
    }

    #[test]
    fn directory_not_empty() {
        let mut fx = setup(1000);
        fx.insert(entry(1, ROOT, DescriptorKind::Directory, "d"))
            .unwrap();
        fx.insert(entry(2, 1, DescriptorKind::File, "f")).unwrap();

        assert_eq!(fx.remove(1), Err(Error::DirectoryNotEmpty));
        fx.remove(2).unwrap();
        fx.remove(1).unwrap();
        assert_eq!(fx.remove(1), Err(Error::NotFound));
        assert_eq!(fx.catalog.node_count(&fx.cache).unwrap(), 1);
    }

    #[test]
    fn full_node_spills_and_empty_node_is_reclaimed() {
        let mut fx = setup(1000);
        let cap = CATALOG_CAPACITY as u64;
        for id in 1..=cap {
            fx.insert(entry(id, ROOT, DescriptorKind::File, &alloc::format!("f{id}")))
                .unwrap();
        }
        let first = fx.catalog.head();
        let free = fx.free_pages();

        fx.insert(entry(cap + 1, ROOT, DescriptorKind::File, "spill"))
            .unwrap();
        let second = fx.catalog.head();
        assert_ne!(first, second);
        assert_eq!(fx.catalog.node_count(&fx.cache).unwrap(), 2);
        assert_eq!(fx.free_pages(), free - NODE_PAGES);

        // 清空旧节点（非链表头），它会被回收
        for id in 1..=cap {
            fx.remove(id).unwrap();
        }
        assert_eq!(fx.catalog.node_count(&fx.cache).unwrap(), 1);
        assert_eq!(fx.catalog.head(), second);
        assert_eq!(fx.free_pages(), free);

        // 清空链表头不会回收
        fx.remove(cap + 1).unwrap();
        assert_eq!(fx.catalog.node_count(&fx.cache).unwrap(), 1);
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut fx = setup(1000);
        let a = fx.insert(entry(1, ROOT, DescriptorKind::File, "a")).unwrap();
        let b = fx.insert(entry(2, ROOT, DescriptorKind::File, "b")).unwrap();
        fx.remove(1).unwrap();
        let c = fx.insert(entry(3, ROOT, DescriptorKind::File, "c")).unwrap();
        assert_eq!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn catalog_full() {
        // 只够存放一个节点
        let mut fx = setup(NODE_PAGES + 10);
        for id in 1..=CATALOG_CAPACITY as u64 {
            fx.insert(entry(id, ROOT, DescriptorKind::File, &alloc::format!("f{id}")))
                .unwrap();
        }
        assert_eq!(
            fx.insert(entry(1000, ROOT, DescriptorKind::File, "more")),
            Err(Error::CatalogFull)
        );
    }

    #[test]
    fn rename_and_move() {
        let mut fx = setup(1000);
        fx.insert(entry(1, ROOT, DescriptorKind::Directory, "a"))
            .unwrap();
        fx.insert(entry(2, 1, DescriptorKind::Directory, "b"))
            .unwrap();
        fx.insert(entry(3, ROOT, DescriptorKind::File, "f")).unwrap();
        fx.insert(entry(4, 2, DescriptorKind::File, "g")).unwrap();

        assert_eq!(
            fx.catalog.rename(&fx.cache, 1, 2, "a"),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            fx.catalog.rename(&fx.cache, 3, 2, "g"),
            Err(Error::DuplicateName)
        );
        assert_eq!(
            fx.catalog.rename(&fx.cache, 3, 4, "f"),
            Err(Error::NotADirectory)
        );

        fx.catalog.rename(&fx.cache, 3, 2, "h").unwrap();
        // 改成原名也可以
        fx.catalog.rename(&fx.cache, 3, 2, "h").unwrap();

        let names: Vec<_> = fx
            .catalog
            .children(&fx.cache, 2)
            .unwrap()
            .into_iter()
            .map(|stat| stat.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"g".into()) && names.contains(&"h".into()));
        assert!(fx.catalog.children(&fx.cache, ROOT).unwrap().len() == 1);
    }
}
