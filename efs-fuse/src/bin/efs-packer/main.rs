mod cli;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use efs::{DescriptorKind, EasyFileSystem, Error, FormatOptions, PAGE_SIZE, Permission, ROOT};
use efs_fuse::BlockFile;
use spin::RwLock;
use typed_bytesize::ByteSizeIec;

fn main() -> io::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Format {
            image,
            size,
            name,
            uuid,
        } => format(&image, size, name, uuid.unwrap_or_default()),
        Command::Pack { image, files, dir } => pack(&image, &files, dir.as_deref()),
        Command::Ls { image } => ls(&image),
    }
}

fn format(image: &Path, size_mib: u64, name: String, uuid: [u8; 16]) -> io::Result<()> {
    let disk_size = ByteSizeIec::mib(size_mib).0;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len(disk_size)?;

    let pages = disk_size / PAGE_SIZE as u64;
    EasyFileSystem::format(Arc::new(BlockFile::new(fd)), FormatOptions { pages, name, uuid })
        .map_err(io::Error::other)?;
    println!("image={image:?} pages={pages}");

    Ok(())
}

fn pack(image: &Path, files: &[PathBuf], dir: Option<&str>) -> io::Result<()> {
    let efs = mount(image)?;
    let mut efs = efs.write();

    let parent = match dir {
        None => ROOT,
        Some(dir) => match efs.lookup(ROOT, dir) {
            Ok(stat) => stat.id,
            Err(Error::NotFound) => efs.mkdir(ROOT, dir).map_err(io::Error::other)?,
            Err(e) => return Err(io::Error::other(e)),
        },
    };

    for path in files {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| io::Error::other(format!("bad file name: {path:?}")))?;
        let data = fs::read(path)?;

        let id = efs.create_file(parent, name).map_err(io::Error::other)?;
        efs.write_at(id, 0, &data).map_err(io::Error::other)?;
        log::info!("file={name:?} id={id} size={}", data.len());
    }

    Ok(())
}

fn ls(image: &Path) -> io::Result<()> {
    let efs = mount(image)?;
    let efs = efs.read();

    let stat = efs.statfs().map_err(io::Error::other)?;
    println!(
        "{:?}: {} pages, {} free in {} regions, {} files",
        efs.name(),
        stat.total_pages,
        stat.free_pages,
        stat.free_regions,
        stat.files
    );
    walk(&efs, ROOT, 0)
}

fn walk(efs: &EasyFileSystem, parent: u64, depth: usize) -> io::Result<()> {
    let mut children = efs.read_dir(parent).map_err(io::Error::other)?;
    children.sort_by(|a, b| a.name.cmp(&b.name));

    for child in children {
        let kind = match child.kind {
            DescriptorKind::File => '-',
            DescriptorKind::Directory => 'd',
            DescriptorKind::Symlink => 'l',
        };
        println!(
            "{:indent$}{kind} {:03o} {:>8} {:>3} {}",
            "",
            Permission::to_mode(child.permissions),
            child.size,
            child.fragments.len(),
            child.name,
            indent = depth * 2
        );
        if child.kind == DescriptorKind::Directory {
            walk(efs, child.id, depth + 1)?;
        }
    }

    Ok(())
}

fn mount(image: &Path) -> io::Result<Arc<RwLock<EasyFileSystem>>> {
    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    EasyFileSystem::mount(Arc::new(BlockFile::new(fd))).map_err(io::Error::other)
}
