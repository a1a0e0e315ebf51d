use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DirEntry, FilesystemProvider};
use crate::ext::{AsyncTryFrom, AsyncTryInto};
use crate::scheduler::offload;
use crate::tree::{EntryKind, LinkInfo, file_name_of};

/// Provider backed by the local disk. Every call runs on the runtime's
/// blocking pool, so awaiting it is a suspension point.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl FilesystemProvider for LocalFilesystem {
    async fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = dir.to_path_buf();
        offload(move || read_entries(&dir)).await
    }

    async fn stat(&self, path: &Path) -> Option<DirEntry> {
        let described: io::Result<DirEntry> = path.to_path_buf().async_try_into().await;
        match described {
            Ok(entry) => Some(entry),
            Err(error) => {
                debug!("Cannot stat {}: {}", path.display(), error);
                None
            }
        }
    }
}

impl AsyncTryFrom<PathBuf> for DirEntry {
    type Error = io::Error;

    async fn async_try_from(path: PathBuf) -> Result<Self, Self::Error> {
        offload(move || {
            let metadata = fs::symlink_metadata(&path)?;
            Ok(describe(&path, file_name_of(&path), &metadata))
        })
        .await
    }
}

fn read_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!("Skipping unreadable entry in {}: {}", dir.display(), error);
                continue;
            }
        };
        let path = entry.path();
        // The entry may vanish between readdir and lstat.
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(error) => {
                debug!("Skipping {}: {}", path.display(), error);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(describe(&path, name, &metadata));
    }

    Ok(entries)
}

// Symlinks to directories are listed as directories carrying link info, so
// they can be expanded like any other directory.
fn describe(path: &Path, name: String, metadata: &Metadata) -> DirEntry {
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(path).unwrap_or_default();
        let resolved = fs::metadata(path).ok();
        let target_is_dir = resolved.as_ref().is_some_and(Metadata::is_dir);
        return DirEntry {
            name,
            kind: if target_is_dir {
                EntryKind::Directory
            } else {
                EntryKind::Symlink
            },
            link: Some(LinkInfo {
                target,
                orphan: resolved.is_none(),
                target_is_dir,
            }),
            size: resolved.filter(Metadata::is_file).map(|m| m.len()),
        };
    }

    let kind = kind_of(&file_type);
    DirEntry {
        name,
        kind,
        link: None,
        size: (kind == EntryKind::File).then(|| metadata.len()),
    }
}

#[cfg(unix)]
fn kind_of(file_type: &fs::FileType) -> EntryKind {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_fifo() {
        EntryKind::Fifo
    } else if file_type.is_socket() {
        EntryKind::Socket
    } else if file_type.is_char_device() {
        EntryKind::CharDevice
    } else if file_type.is_block_device() {
        EntryKind::BlockDevice
    } else {
        EntryKind::File
    }
}

#[cfg(not(unix))]
fn kind_of(file_type: &fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}
