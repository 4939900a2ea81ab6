//! Byte sources and sinks behind the stream controller
//!
//! Inputs can be regular files (optionally memory-mapped for cheap page
//! seeking), standard input, or any boxed reader; outputs can be regular
//! files, standard output, any boxed writer, or a temporary file standing
//! in for an in-place rewrite. Pipes stream; only file-backed inputs are
//! seekable.

use sdf_core::{Result, SdfError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A readable endpoint
pub enum ByteSource {
    File {
        reader: BufReader<File>,
        path: PathBuf,
    },
    #[cfg(feature = "mmap")]
    Mapped {
        cursor: Cursor<memmap2::Mmap>,
        path: PathBuf,
    },
    Stdin(BufReader<io::Stdin>),
    Boxed(BufReader<Box<dyn Read>>),
}

impl ByteSource {
    /// Open a regular file for buffered streaming reads
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(ByteSource::File {
            reader: BufReader::new(file),
            path,
        })
    }

    /// Open a regular file memory-mapped
    ///
    /// Used for random-access reading; the map is immutable and the file
    /// must not be truncated by another process while mapped.
    #[cfg(feature = "mmap")]
    pub fn open_mapped(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // Safety: the mapping is read-only and lives as long as the source
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Ok(ByteSource::Mapped {
            cursor: Cursor::new(map),
            path,
        })
    }

    pub fn stdin() -> Self {
        ByteSource::Stdin(BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        ByteSource::Boxed(BufReader::new(reader))
    }

    /// Path of the underlying file, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            ByteSource::File { path, .. } => Some(path),
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether byte positions can be recorded and restored
    pub fn is_seekable(&self) -> bool {
        match self {
            ByteSource::File { .. } => true,
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { .. } => true,
            _ => false,
        }
    }

    /// Current byte position; `None` on pipes
    pub fn position(&mut self) -> Result<Option<u64>> {
        match self {
            ByteSource::File { reader, .. } => Ok(Some(reader.stream_position()?)),
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { cursor, .. } => Ok(Some(cursor.position())),
            _ => Ok(None),
        }
    }

    /// Restore a previously recorded byte position
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        match self {
            ByteSource::File { reader, .. } => {
                reader.seek(SeekFrom::Start(pos))?;
                Ok(())
            }
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { cursor, .. } => {
                cursor.set_position(pos);
                Ok(())
            }
            _ => Err(SdfError::usage("this byte source is not seekable")),
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File { reader, .. } => reader.read(buf),
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { cursor, .. } => cursor.read(buf),
            ByteSource::Stdin(reader) => reader.read(buf),
            ByteSource::Boxed(reader) => reader.read(buf),
        }
    }
}

impl BufRead for ByteSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            ByteSource::File { reader, .. } => reader.fill_buf(),
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { cursor, .. } => cursor.fill_buf(),
            ByteSource::Stdin(reader) => reader.fill_buf(),
            ByteSource::Boxed(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            ByteSource::File { reader, .. } => reader.consume(amt),
            #[cfg(feature = "mmap")]
            ByteSource::Mapped { cursor, .. } => cursor.consume(amt),
            ByteSource::Stdin(reader) => reader.consume(amt),
            ByteSource::Boxed(reader) => reader.consume(amt),
        }
    }
}

/// A writable endpoint
pub enum ByteSink {
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
    Stdout(BufWriter<io::Stdout>),
    Boxed(BufWriter<Box<dyn Write>>),
    /// Temporary sink for an in-place rewrite; the switch happens in
    /// [`ByteSink::finish`]
    InPlace {
        writer: BufWriter<File>,
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

impl ByteSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(ByteSink::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn stdout() -> Self {
        ByteSink::Stdout(BufWriter::new(io::stdout()))
    }

    pub fn from_writer(writer: Box<dyn Write>) -> Self {
        ByteSink::Boxed(BufWriter::new(writer))
    }

    /// Create a temporary sink that will atomically replace `path` on
    /// [`ByteSink::finish`], leaving the previous contents at `path~`
    pub fn create_in_place(path: impl AsRef<Path>) -> Result<Self> {
        let final_path = path.as_ref().to_path_buf();
        let temp_path = sibling_with_suffix(&final_path, ".tmp");
        let file = File::create(&temp_path)?;
        Ok(ByteSink::InPlace {
            writer: BufWriter::new(file),
            temp_path,
            final_path,
        })
    }

    /// Path of the final output file, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            ByteSink::File { path, .. } => Some(path),
            ByteSink::InPlace { final_path, .. } => Some(final_path),
            _ => None,
        }
    }

    /// Flush and close, performing the in-place switch if one is pending
    ///
    /// The original input is untouched unless every step before the final
    /// rename succeeded.
    pub fn finish(self) -> Result<()> {
        match self {
            ByteSink::File { mut writer, .. } => {
                writer.flush()?;
                Ok(())
            }
            ByteSink::Stdout(mut writer) => {
                writer.flush()?;
                Ok(())
            }
            ByteSink::Boxed(mut writer) => {
                writer.flush()?;
                Ok(())
            }
            ByteSink::InPlace {
                mut writer,
                temp_path,
                final_path,
            } => {
                let outcome = (|| -> Result<()> {
                    writer.flush()?;
                    drop(writer);
                    let backup = sibling_with_suffix(&final_path, "~");
                    if final_path.exists() {
                        std::fs::rename(&final_path, &backup)?;
                    }
                    std::fs::rename(&temp_path, &final_path)?;
                    Ok(())
                })();
                if outcome.is_err() {
                    let _ = std::fs::remove_file(&temp_path);
                }
                outcome
            }
        }
    }

    /// Abandon the sink, cleaning up any temporary file
    pub fn discard(self) {
        if let ByteSink::InPlace { writer, temp_path, .. } = self {
            drop(writer);
            let _ = std::fs::remove_file(&temp_path);
        }
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

impl Write for ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ByteSink::File { writer, .. } => writer.write(buf),
            ByteSink::Stdout(writer) => writer.write(buf),
            ByteSink::Boxed(writer) => writer.write(buf),
            ByteSink::InPlace { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ByteSink::File { writer, .. } => writer.flush(),
            ByteSink::Stdout(writer) => writer.flush(),
            ByteSink::Boxed(writer) => writer.flush(),
            ByteSink::InPlace { writer, .. } => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_place_rewrite_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sdf");
        std::fs::write(&path, b"old contents").unwrap();

        let mut sink = ByteSink::create_in_place(&path).unwrap();
        sink.write_all(b"new contents").unwrap();
        sink.finish().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new contents");
        assert_eq!(
            std::fs::read(dir.path().join("data.sdf~")).unwrap(),
            b"old contents"
        );
    }

    #[test]
    fn test_discard_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sdf");
        std::fs::write(&path, b"old").unwrap();
        let sink = ByteSink::create_in_place(&path).unwrap();
        let temp = dir.path().join("data.sdf.tmp");
        assert!(temp.exists());
        sink.discard();
        assert!(!temp.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn test_seekable_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut src = ByteSource::open(&path).unwrap();
        assert!(src.is_seekable());
        let mut buf = [0u8; 4];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(src.position().unwrap(), Some(4));
        src.seek_to(1).unwrap();
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"1234");
    }
}
