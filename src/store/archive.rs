//! Single-payload encoding of an artifact tree
//!
//! Format:
//! ```text
//! [MAGIC: 8 bytes ("KILNART\0")]
//! [VERSION: 4 bytes (u32 LE)]
//! [BODY: zstd(bincode(Vec<ArchiveEntry>))]
//! ```
//!
//! Entries are listed in sorted path order, parents before children. A
//! single-file artifact is one file entry with an empty path.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};
use walkdir::WalkDir;

pub const MAGIC: &[u8; 8] = b"KILNART\0";
pub const VERSION: u32 = 1;

const HEADER_SIZE: usize = 12;
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File { data: Vec<u8>, executable: bool },
    Dir,
    Symlink { target: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// `/`-separated, relative to the artifact root
    pub path: String,
    pub kind: EntryKind,
}

/// Pack the file or directory at `root`
pub fn pack(root: &Path) -> Result<Vec<u8>> {
    let entries = collect_entries(root)?;
    let body = bincode::serialize(&entries)?;
    let compressed = zstd::encode_all(body.as_slice(), COMPRESSION_LEVEL)?;

    let mut output = Vec::with_capacity(HEADER_SIZE + compressed.len());
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(&VERSION.to_le_bytes());
    output.extend(compressed);
    Ok(output)
}

/// Decode a payload without touching the filesystem
pub fn decode(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    if data.len() < HEADER_SIZE {
        return Err(Error::Corruption(format!(
            "artifact payload too short: {} bytes",
            data.len()
        )));
    }
    if &data[0..8] != MAGIC {
        return Err(Error::Corruption("invalid artifact magic".into()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&data[8..12]);
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(Error::Corruption(format!(
            "unsupported artifact version {}",
            version
        )));
    }

    let body = zstd::decode_all(&data[HEADER_SIZE..])
        .map_err(|e| Error::Corruption(format!("artifact body: {}", e)))?;
    let entries: Vec<ArchiveEntry> = bincode::deserialize(&body)
        .map_err(|e| Error::Corruption(format!("artifact entries: {}", e)))?;
    validate_entries(&entries)?;
    Ok(entries)
}

/// Recreate a packed artifact at `dest`, which must not exist yet
pub fn unpack(data: &[u8], dest: &Path) -> Result<()> {
    let entries = decode(data)?;

    if let [ArchiveEntry {
        path,
        kind: EntryKind::File { data: bytes, executable },
    }] = entries.as_slice()
    {
        if path.is_empty() {
            return write_file(dest, bytes, *executable);
        }
    }

    fs::create_dir_all(dest).map_err(|e| Error::storage(dest, e))?;
    for entry in &entries {
        if entry.path.is_empty() {
            return Err(Error::Corruption("root entry inside a directory artifact".into()));
        }
        let target = dest.join(&entry.path);
        match &entry.kind {
            EntryKind::Dir => fs::create_dir_all(&target).map_err(|e| Error::storage(&target, e))?,
            EntryKind::File { data, executable } => write_file(&target, data, *executable)?,
            EntryKind::Symlink { target: link } => make_symlink(link, &target)?,
        }
    }
    Ok(())
}

fn collect_entries(root: &Path) -> Result<Vec<ArchiveEntry>> {
    let meta = fs::symlink_metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileDoesntExist {
            path: root.to_path_buf(),
        },
        _ => Error::storage(root, e),
    })?;
    if !meta.is_dir() {
        return Ok(vec![ArchiveEntry {
            path: String::new(),
            kind: read_entry(root, &meta)?,
        }]);
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::storage(root, e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Corruption(e.to_string()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let meta = entry
            .path()
            .symlink_metadata()
            .map_err(|e| Error::storage(entry.path(), e))?;
        entries.push(ArchiveEntry {
            path,
            kind: read_entry(entry.path(), &meta)?,
        });
    }
    Ok(entries)
}

fn read_entry(path: &Path, meta: &fs::Metadata) -> Result<EntryKind> {
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path).map_err(|e| Error::storage(path, e))?;
        return Ok(EntryKind::Symlink {
            target: target.to_string_lossy().into_owned(),
        });
    }
    if meta.is_dir() {
        return Ok(EntryKind::Dir);
    }
    let data = fs::read(path).map_err(|e| Error::storage(path, e))?;
    Ok(EntryKind::File {
        data,
        executable: is_executable(meta),
    })
}

/// Everything an archive writes must land inside the artifact root: entry
/// paths are plain relative paths, symlinks point inside the tree without
/// `..`, and nothing is written beneath a symlink.
fn validate_entries(entries: &[ArchiveEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut links = HashSet::new();
    for entry in entries {
        validate_path(&entry.path)?;
        if !seen.insert(entry.path.as_str()) {
            return Err(Error::Corruption(format!("duplicate entry path: {}", entry.path)));
        }
        if let EntryKind::Symlink { target } = &entry.kind {
            validate_link_target(&entry.path, target)?;
            links.insert(Path::new(&entry.path));
        }
    }

    for entry in entries {
        let beneath_link = Path::new(&entry.path)
            .ancestors()
            .skip(1)
            .any(|ancestor| links.contains(ancestor));
        if beneath_link {
            return Err(Error::Corruption(format!(
                "entry beneath a symlink: {}",
                entry.path
            )));
        }
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<()> {
    let ok = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(Error::Corruption(format!("unsafe entry path: {}", path)))
    }
}

fn validate_link_target(path: &str, target: &str) -> Result<()> {
    let ok = !target.is_empty()
        && Path::new(target)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(Error::Corruption(format!(
            "unsafe symlink target: {} -> {}",
            path, target
        )))
    }
}

fn write_file(path: &Path, data: &[u8], executable: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
    }
    fs::write(path, data).map_err(|e| Error::storage(path, e))?;
    if executable {
        set_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| Error::storage(path, e))?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).map_err(|e| Error::storage(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn make_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::storage(link, e))
}

#[cfg(not(unix))]
pub(crate) fn make_symlink(target: &str, link: &Path) -> Result<()> {
    tracing::warn!(path = ?link, target, "symlinks unsupported on this platform, skipping");
    Ok(())
}
