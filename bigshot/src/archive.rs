//! Single-file packing of a generated tile tree
//!
//! Layout:
//! - 8 bytes: magic `"BIGSHOT "`
//! - 16 bytes: index length, lowercase hex, right-aligned, space padded
//! - index: `key:offset:length:` per entry
//! - payload: file contents in index order
//!
//! Offsets are relative to the start of the payload.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BigshotError, IoContext, Result};

pub const MAGIC: &[u8; 8] = b"BIGSHOT ";

/// Magic plus the hex index length.
pub const HEADER_LEN: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path relative to the packed directory
    pub key: String,
    /// Byte offset into the payload
    pub offset: u64,
    pub length: u64,
}

/// Header for an index of `index_len` bytes.
pub fn header(index_len: usize) -> String {
    format!("BIGSHOT {index_len:16x}")
}

/// Concatenated `key:offset:length:` records.
pub fn encode_index(entries: &[ArchiveEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}:{}:{}:", e.key, e.offset, e.length))
        .collect()
}

pub fn parse_index(index: &str) -> Result<Vec<ArchiveEntry>> {
    if index.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = index.strip_suffix(':') else {
        return Err(BigshotError::Archive("index is not ':'-terminated".into()));
    };
    let fields: Vec<&str> = body.split(':').collect();
    if fields.len() % 3 != 0 {
        return Err(BigshotError::Archive(format!(
            "index has {} fields, expected a multiple of 3",
            fields.len()
        )));
    }
    fields
        .chunks(3)
        .map(|f| {
            let number = |s: &str| {
                s.parse::<u64>()
                    .map_err(|_| BigshotError::Archive(format!("bad number {s:?} for entry {}", f[0])))
            };
            Ok(ArchiveEntry {
                key: f[0].to_string(),
                offset: number(f[1])?,
                length: number(f[2])?,
            })
        })
        .collect()
}

/// Files under `dir`, depth first, each directory's entries sorted by name.
/// Symbolic links are followed; a link cycle is an error.
///
/// Returns the entries with running offsets plus the file each came from.
pub fn scan(dir: &Path) -> Result<Vec<(ArchiveEntry, PathBuf)>> {
    let mut result = Vec::new();
    let mut offset = 0u64;
    for entry in WalkDir::new(dir).min_depth(1).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let message = e.to_string();
            let source = e.into_io_error().unwrap_or_else(|| io::Error::other(message));
            BigshotError::io(&path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let key = archive_key(dir, path)?;
        let length = entry.metadata().map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("metadata unavailable"));
            BigshotError::io(path, source)
        })?;
        let length = length.len();
        result.push((ArchiveEntry { key, offset, length }, path.to_path_buf()));
        offset += length;
    }
    Ok(result)
}

fn archive_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| BigshotError::Archive(format!("{} is outside {}", path.display(), root.display())))?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            BigshotError::Archive(format!("{} is not valid UTF-8", path.display()))
        })?;
        parts.push(part);
    }
    let key = parts.join("/");
    if key.contains(':') {
        return Err(BigshotError::Archive(format!(
            "{key}: ':' cannot appear in an archive path"
        )));
    }
    Ok(key)
}

/// Pack every file under `source` into the archive at `output`.
///
/// The archive is written to a temporary file next to `output` and renamed
/// into place only once complete.
pub fn pack(source: &Path, output: &Path) -> Result<Vec<ArchiveEntry>> {
    let files = scan(source)?;
    let entries: Vec<ArchiveEntry> = files.iter().map(|(e, _)| e.clone()).collect();
    let index = encode_index(&entries);
    info!("Packing {} files to {}", entries.len(), output.display());

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).at(parent)?;
    let mut tmp = NamedTempFile::new_in(parent).at(parent)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        out.write_all(header(index.len()).as_bytes()).at(output)?;
        out.write_all(index.as_bytes()).at(output)?;
        for (entry, path) in &files {
            debug!("{}", entry.key);
            let mut input = File::open(path).at(path)?;
            let copied = io::copy(&mut input, &mut out).at(path)?;
            if copied != entry.length {
                return Err(BigshotError::Archive(format!(
                    "{} changed size while packing ({} -> {copied} bytes)",
                    path.display(),
                    entry.length
                )));
            }
        }
        out.flush().at(output)?;
    }
    tmp.persist(output).map_err(|e| BigshotError::io(output, e.error))?;
    Ok(entries)
}

/// Random access to the entries of a packed archive.
#[derive(Debug)]
pub struct ArchiveReader {
    file: File,
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
    payload_start: u64,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).at(path)?;
        let file_len = file.metadata().at(path)?.len();
        let mut reader = BufReader::new(&file);

        let mut head = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut head).map_err(|_| {
            BigshotError::Archive(format!("{} is too short for a header", path.display()))
        })?;
        if &head[..MAGIC.len()] != MAGIC {
            return Err(BigshotError::Archive(format!(
                "{} does not start with \"BIGSHOT \"",
                path.display()
            )));
        }
        let len_field = std::str::from_utf8(&head[MAGIC.len()..])
            .map_err(|_| BigshotError::Archive("index length is not text".into()))?;
        let index_len = u64::from_str_radix(len_field.trim_start_matches(' '), 16).map_err(|_| {
            BigshotError::Archive(format!("bad index length {len_field:?}"))
        })?;

        let payload_start = HEADER_LEN + index_len;
        if payload_start > file_len {
            return Err(BigshotError::Archive(format!(
                "index of {index_len} bytes runs past the end of {}",
                path.display()
            )));
        }
        let mut index = vec![0u8; index_len as usize];
        reader.read_exact(&mut index).at(path)?;
        let index = String::from_utf8(index)
            .map_err(|_| BigshotError::Archive("index is not valid UTF-8".into()))?;
        let entries = parse_index(&index)?;

        let payload_len = file_len - payload_start;
        if let Some(e) = entries
            .iter()
            .find(|e| e.offset.checked_add(e.length).is_none_or(|end| end > payload_len))
        {
            return Err(BigshotError::Archive(format!(
                "entry {} ({}+{}) exceeds the {payload_len}-byte payload",
                e.key, e.offset, e.length
            )));
        }

        drop(reader);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries,
            payload_start,
        })
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Contents of the entry named `key`.
    pub fn read(&mut self, key: &str) -> Result<Vec<u8>> {
        let entry = self
            .get(key)
            .cloned()
            .ok_or_else(|| BigshotError::Archive(format!("no entry named {key}")))?;
        self.read_entry(&entry)
    }

    fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; entry.length as usize];
        self.file
            .seek(SeekFrom::Start(self.payload_start + entry.offset))
            .at(&self.path)?;
        self.file.read_exact(&mut buf).at(&self.path)?;
        Ok(buf)
    }

    /// Recreate every entry under `dir`. Returns the number of files written.
    pub fn extract_all(&mut self, dir: &Path) -> Result<usize> {
        let entries = self.entries.clone();
        for entry in &entries {
            let relative = Path::new(&entry.key);
            if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(BigshotError::Archive(format!(
                    "refusing to extract {} outside the target directory",
                    entry.key
                )));
            }
            let target = dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            let data = self.read_entry(entry)?;
            fs::write(&target, data).at(&target)?;
            debug!("Extracted {}", entry.key);
        }
        info!("Extracted {} files to {}", entries.len(), dir.display());
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_header_is_24_bytes_space_padded() {
        let h = header(0x1a2);
        assert_eq!(h.len(), HEADER_LEN as usize);
        assert_eq!(h, "BIGSHOT              1a2");
    }

    #[test]
    fn test_index_roundtrip() {
        let entries = vec![
            ArchiveEntry { key: "a.txt".into(), offset: 0, length: 3 },
            ArchiveEntry { key: "dir/b.txt".into(), offset: 3, length: 5 },
        ];
        let index = encode_index(&entries);
        assert_eq!(index, "a.txt:0:3:dir/b.txt:3:5:");
        assert_eq!(parse_index(&index).unwrap(), entries);
        assert!(parse_index("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_index_rejects_malformed() {
        assert!(parse_index("a.txt:0:3").is_err());
        assert!(parse_index("a.txt:0:").is_err());
        assert!(parse_index("a.txt:zero:3:").is_err());
    }

    #[test]
    fn test_key_with_colon_is_rejected() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(dir.path().join("c:d"), b"x").unwrap();
        let archive = out.path().join("out.bigshot");
        let err = pack(dir.path(), &archive).unwrap_err();
        assert!(err.to_string().contains("':'"));
        assert!(!archive.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_followed() {
        use std::os::unix::fs::symlink;

        let outside = tempdir().unwrap();
        fs::write(outside.path().join("real.txt"), b"linked").unwrap();
        fs::create_dir(outside.path().join("shared")).unwrap();
        fs::write(outside.path().join("shared").join("s.txt"), b"s").unwrap();

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        symlink(outside.path().join("real.txt"), dir.path().join("b.txt")).unwrap();
        symlink(outside.path().join("shared"), dir.path().join("c")).unwrap();

        let out = tempdir().unwrap();
        let archive = out.path().join("out.bigshot");
        let entries = pack(dir.path(), &archive).unwrap();
        assert_eq!(encode_index(&entries), "a.txt:0:3:b.txt:3:6:c/s.txt:9:1:");
        let mut reader = ArchiveReader::open(&archive).unwrap();
        assert_eq!(reader.read("b.txt").unwrap(), b"linked");

        // A cycle cannot be packed
        symlink(dir.path(), dir.path().join("loop")).unwrap();
        assert!(pack(dir.path(), &out.path().join("loop.bigshot")).is_err());
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad");
        fs::write(&path, b"NOTSHOT                0").unwrap();
        let err = ArchiveReader::open(&path).unwrap_err();
        assert!(err.to_string().contains("BIGSHOT"));
    }

    #[test]
    fn test_open_accepts_zero_padded_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zeros");
        let mut bytes = b"BIGSHOT 000000000000000a".to_vec();
        bytes.extend_from_slice(b"x.bin:0:2:hi");
        fs::write(&path, bytes).unwrap();
        let mut reader = ArchiveReader::open(&path).unwrap();
        assert_eq!(reader.read("x.bin").unwrap(), b"hi");
    }

    #[test]
    fn test_open_rejects_truncated_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short");
        let mut bytes = header(10).into_bytes();
        bytes.extend_from_slice(b"x.bin:0:9:hi");
        fs::write(&path, bytes).unwrap();
        assert!(ArchiveReader::open(&path).is_err());
    }

    #[test]
    fn test_extract_rejects_parent_components() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evil");
        let index = "../x:0:1:";
        let mut bytes = header(index.len()).into_bytes();
        bytes.extend_from_slice(index.as_bytes());
        bytes.push(b'!');
        fs::write(&path, bytes).unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert!(reader.extract_all(&dir.path().join("out")).is_err());
        assert!(!dir.path().join("x").exists());
    }
}
