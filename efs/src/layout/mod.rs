//! # 磁盘数据结构层
//!
//! efs 的磁盘布局：
//! 超级块(第0页) | 散布于分区各处的目录表节点、空闲区域、文件数据
//!
//! 所有结构体都恰好占据一整页，或者是页内的定长数组元素。

mod catalog_node;
mod descriptor;
mod free_node;
mod super_block;

use alloc::string::String;

pub use self::{
    catalog_node::CatalogNode,
    descriptor::{DescriptorFlag, DescriptorKind, FileDescriptor, Fragment, Permission, Stat},
    free_node::FreeNode,
    super_block::SuperBlock,
};
use crate::{Error, NAME_CAP, Result};

/// 以 \0 结尾的定长字符串
pub type Name = [u8; NAME_CAP];

fn name_bytes(name: &Name) -> &[u8] {
    let len = name.iter().position(|&c| c == 0).unwrap_or(NAME_CAP);
    &name[..len]
}

fn name_to_string(name: &Name) -> String {
    String::from_utf8_lossy(name_bytes(name)).into_owned()
}

/// 写入名字，最后一字节留给 \0
fn encode_name(name: &str) -> Result<Name> {
    let bytes = name.as_bytes();
    if bytes.contains(&0) {
        return Err(Error::InvalidName);
    }
    if bytes.len() >= NAME_CAP {
        return Err(Error::NameTooLong);
    }

    let mut buf = [0; NAME_CAP];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;
    use crate::PAGE_SIZE;

    #[test]
    fn layout() {
        assert_eq!(PAGE_SIZE, mem::size_of::<SuperBlock>());
        assert_eq!(PAGE_SIZE, mem::size_of::<FreeNode>());
        assert_eq!(PAGE_SIZE, mem::size_of::<CatalogNode>());
        assert_eq!(PAGE_SIZE, mem::size_of::<FileDescriptor>());
        assert_eq!(16, mem::size_of::<Fragment>());
    }

    #[test]
    fn names() {
        let name = encode_name("a.txt").unwrap();
        assert_eq!(name_bytes(&name), b"a.txt");
        assert_eq!(name_to_string(&name), "a.txt");

        assert_eq!(encode_name("a\0b"), Err(Error::InvalidName));
        let long = "x".repeat(NAME_CAP);
        assert_eq!(encode_name(&long), Err(Error::NameTooLong));
        assert!(encode_name(&long[1..]).is_ok());
    }
}
