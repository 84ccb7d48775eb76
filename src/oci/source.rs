//! Image sources: the two physical encodings an OCI image arrives in
//!
//! A source is a restartable, ordered sequence of entries. Every call to
//! [`ImageSource::for_each_entry`] starts again from the first entry, so the
//! unpacker can scan for the layout marker and then copy in a second pass.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, trace};
use tar::{Archive, EntryType};

use crate::exceptions::{BndlError, Result};

/// Gzip member header magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What an entry is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Symlinks, hard links, devices, fifos
    Other,
}

/// One entry of an image source
pub struct SourceEntry<'a> {
    /// Path relative to the top of the source, without `.` components
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Unix mode bits, when the source records them
    pub mode: Option<u32>,
    /// Entry content; empty for anything but regular files
    pub content: Box<dyn Read + 'a>,
}

impl std::fmt::Debug for SourceEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Visitor called once per entry; `Break` stops the walk early
pub type EntryVisitor<'v> = dyn FnMut(SourceEntry<'_>) -> Result<ControlFlow<()>> + 'v;

/// An ordered, restartable sequence of image entries
pub trait ImageSource {
    /// Walk all entries from the start, in the source's natural order
    fn for_each_entry(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()>;
}

/// Make an entry path relative and free of `.` components
///
/// Absolute paths and `..` are rejected: they would land outside the
/// destination once unpacked.
pub fn normalize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BndlError::UnsupportedEntry(path.to_path_buf()));
            }
        }
    }
    Ok(normalized)
}

/// Tar archive source, optionally gzip compressed
#[derive(Debug)]
pub struct ArchiveSource<R> {
    reader: R,
    compressed: bool,
}

impl<R: Read + Seek> ArchiveSource<R> {
    /// Wrap an already-opened archive stream, sniffing gzip compression
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 2];
        let compressed = match reader.read_exact(&mut magic) {
            Ok(()) => magic == GZIP_MAGIC,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
        debug!("📦 Archive source (gzip: {compressed})");
        Ok(Self { reader, compressed })
    }

    /// Whether the stream is gzip compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

/// GNU tar volume label record
const GNU_VOLUME_LABEL: u8 = b'V';

/// Kind of a tar record, `None` for metadata records that describe no file
fn archive_entry_kind(entry_type: EntryType) -> Option<EntryKind> {
    if entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
        || entry_type.as_byte() == GNU_VOLUME_LABEL
    {
        None
    } else if entry_type.is_dir() {
        Some(EntryKind::Directory)
    } else if entry_type.is_file()
        || entry_type.is_contiguous()
        || entry_type.is_gnu_sparse()
    {
        Some(EntryKind::File)
    } else {
        Some(EntryKind::Other)
    }
}

impl<R: Read + Seek> ImageSource for ArchiveSource<R> {
    fn for_each_entry(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        let stream: Box<dyn Read + '_> = if self.compressed {
            Box::new(GzDecoder::new(&mut self.reader))
        } else {
            Box::new(&mut self.reader)
        };

        let mut archive = Archive::new(stream);
        for entry_result in archive.entries()? {
            let entry = entry_result?;
            let header = entry.header();
            let Some(kind) = archive_entry_kind(header.entry_type()) else {
                trace!("⏭️ Skipping tar metadata record {:?}", header.entry_type());
                continue;
            };
            let mode = header.mode().ok();
            let path = normalize_entry_path(&entry.path()?)?;
            trace!("📄 Archive entry: {path:?} ({kind:?})");

            let flow = visitor(SourceEntry {
                path,
                kind,
                mode,
                content: Box::new(entry),
            })?;
            if flow.is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// Already-extracted image directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All paths below the root, in lexical walk order
    fn walk(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&self.root.to_string_lossy())
        );
        let mut paths = Vec::new();
        for path in glob::glob(&pattern)? {
            paths.push(path?);
        }
        // component-wise ordering keeps every directory ahead of its children
        paths.sort();
        Ok(paths)
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

impl ImageSource for DirectorySource {
    fn for_each_entry(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()> {
        for full_path in self.walk()? {
            let relative = full_path
                .strip_prefix(&self.root)
                .map_err(|_| BndlError::UnsupportedEntry(full_path.clone()))?;
            let path = normalize_entry_path(relative)?;

            // symlink_metadata so links are reported, not followed
            let metadata = fs::symlink_metadata(&full_path)?;
            let file_type = metadata.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            trace!("📄 Directory entry: {path:?} ({kind:?})");

            let content: Box<dyn Read> = if kind == EntryKind::File {
                Box::new(File::open(&full_path)?)
            } else {
                Box::new(io::empty())
            };

            let flow = visitor(SourceEntry {
                path,
                kind,
                mode: file_mode(&metadata),
                content,
            })?;
            if flow.is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// Open an image source from a path: directories are walked, files are read as (gzipped) tar
pub fn open_source(path: &Path) -> Result<Box<dyn ImageSource>> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        debug!("📁 Using directory source: {path:?}");
        Ok(Box::new(DirectorySource::new(path)))
    } else {
        debug!("📦 Using archive source: {path:?}");
        Ok(Box::new(ArchiveSource::new(File::open(path)?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn collect_paths(source: &mut dyn ImageSource) -> Vec<(PathBuf, EntryKind)> {
        let mut seen = Vec::new();
        source
            .for_each_entry(&mut |entry| {
                seen.push((entry.path, entry.kind));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        seen
    }

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_normalize_entry_path() {
        assert_eq!(
            normalize_entry_path(Path::new("./a/./b")).unwrap(),
            PathBuf::from("a/b")
        );
        assert_eq!(normalize_entry_path(Path::new(".")).unwrap(), PathBuf::new());
        assert!(normalize_entry_path(Path::new("a/../../etc")).is_err());
        assert!(normalize_entry_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_archive_source_is_restartable() {
        let data = tar_bytes(&[("one", b"1"), ("two/three", b"3")]);
        let mut source = ArchiveSource::new(Cursor::new(data)).unwrap();
        assert!(!source.is_compressed());

        let first = collect_paths(&mut source);
        let second = collect_paths(&mut source);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                (PathBuf::from("one"), EntryKind::File),
                (PathBuf::from("two/three"), EntryKind::File),
            ]
        );
    }

    #[test]
    fn test_archive_source_reads_gzip() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&tar_bytes(&[("oci-layout", b"hello")]))
            .unwrap();
        let gz = encoder.finish().unwrap();

        let mut source = ArchiveSource::new(Cursor::new(gz)).unwrap();
        assert!(source.is_compressed());

        let mut contents = String::new();
        source
            .for_each_entry(&mut |mut entry| {
                entry.content.read_to_string(&mut contents)?;
                Ok(ControlFlow::Break(()))
            })
            .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_archive_source_skips_metadata_records() {
        let mut builder = tar::Builder::new(Vec::new());
        let record: &[u8] = b"15 comment=abc\n";
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(EntryType::XGlobalHeader);
        header.set_path("pax_global_header").unwrap();
        header.set_size(record.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, record).unwrap();

        let mut header = tar::Header::new_ustar();
        header.set_size(2);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "oci-layout", &b"{}"[..]).unwrap();

        let mut source = ArchiveSource::new(Cursor::new(builder.into_inner().unwrap())).unwrap();
        assert_eq!(
            collect_paths(&mut source),
            vec![(PathBuf::from("oci-layout"), EntryKind::File)]
        );
    }

    #[test]
    fn test_archive_entry_kind() {
        assert_eq!(archive_entry_kind(EntryType::Regular), Some(EntryKind::File));
        assert_eq!(archive_entry_kind(EntryType::GNUSparse), Some(EntryKind::File));
        assert_eq!(archive_entry_kind(EntryType::Directory), Some(EntryKind::Directory));
        assert_eq!(archive_entry_kind(EntryType::Symlink), Some(EntryKind::Other));
        assert_eq!(archive_entry_kind(EntryType::XGlobalHeader), None);
        assert_eq!(archive_entry_kind(EntryType::new(b'V')), None);
    }

    #[test]
    fn test_empty_stream_is_an_empty_source() {
        let mut source = ArchiveSource::new(Cursor::new(vec![0u8; 1024])).unwrap();
        assert!(collect_paths(&mut source).is_empty());
    }

    #[test]
    fn test_directory_source_walks_in_lexical_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::write(root.join("b/nested/file"), b"x").unwrap();
        fs::write(root.join("a"), b"y").unwrap();

        let mut source = DirectorySource::new(root);
        assert_eq!(
            collect_paths(&mut source),
            vec![
                (PathBuf::from("a"), EntryKind::File),
                (PathBuf::from("b"), EntryKind::Directory),
                (PathBuf::from("b/nested"), EntryKind::Directory),
                (PathBuf::from("b/nested/file"), EntryKind::File),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_source_reports_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("target"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("target"), root.join("link")).unwrap();

        let mut source = DirectorySource::new(root);
        let entries = collect_paths(&mut source);
        assert!(entries.contains(&(PathBuf::from("link"), EntryKind::Other)));
    }

    #[test]
    fn test_open_source_picks_adapter() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("image.tar");
        fs::write(&archive, tar_bytes(&[("oci-layout", b"{}")])).unwrap();

        let mut from_file = open_source(&archive).unwrap();
        assert_eq!(
            collect_paths(from_file.as_mut()),
            vec![(PathBuf::from("oci-layout"), EntryKind::File)]
        );

        let mut from_dir = open_source(temp_dir.path()).unwrap();
        assert_eq!(
            collect_paths(from_dir.as_mut()),
            vec![(PathBuf::from("image.tar"), EntryKind::File)]
        );
    }
}
