//! The backing image: one file or block device, opened once, read-only.

use std::fs::{File, Metadata};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::chunk::{Geometry, GeometryError};

/// Startup failure while opening the image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stat {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("query size of block device {}", path.display())]
    DeviceSize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bad geometry for {}", path.display())]
    Geometry {
        path: PathBuf,
        #[source]
        source: GeometryError,
    },
}

/// Read handle plus geometry for the mounted image.
///
/// Shared between request handlers; all reads are positioned so the handle's
/// cursor is never relied on.
#[derive(Debug)]
pub struct BackingImage {
    path: PathBuf,
    file: File,
    geometry: Geometry,
}

impl BackingImage {
    /// Open `path` read-only and cut it into `chunk_size` byte chunks.
    ///
    /// Regular files are sized from their metadata, block devices by asking
    /// the device.
    pub fn open(path: impl AsRef<Path>, chunk_size: u64) -> Result<Self, ImageError> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|source| ImageError::Open {
            path: path.clone(),
            source,
        })?;
        let meta = file.metadata().map_err(|source| ImageError::Stat {
            path: path.clone(),
            source,
        })?;

        let total_size = if meta.file_type().is_block_device() {
            device_size(&file).map_err(|source| ImageError::DeviceSize {
                path: path.clone(),
                source,
            })?
        } else {
            meta.len()
        };

        let geometry = Geometry::new(chunk_size, total_size).map_err(|source| {
            ImageError::Geometry {
                path: path.clone(),
                source,
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            block_device = meta.file_type().is_block_device(),
            total_size,
            chunk_size,
            chunk_count = geometry.chunk_count(),
            "opened backing image"
        );

        Ok(Self {
            path,
            file,
            geometry,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Fresh metadata of the image (owner, mode, timestamps).
    pub fn metadata(&self) -> io::Result<Metadata> {
        self.file.metadata()
    }

    /// Single positioned read. May return fewer bytes than `buf` holds.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }
}

/// `_IOR(0x12, 114, u64)`; the read direction bit differs across arches.
#[cfg(all(
    target_os = "linux",
    any(
        target_arch = "powerpc",
        target_arch = "powerpc64",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "sparc64"
    )
))]
const BLKGETSIZE64: libc::c_ulong = 0x4008_1272;
#[cfg(all(
    target_os = "linux",
    not(any(
        target_arch = "powerpc",
        target_arch = "powerpc64",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "sparc64"
    ))
))]
const BLKGETSIZE64: libc::c_ulong = 0x8008_1272;

/// Size in bytes of a block device, as reported by the kernel.
#[cfg(target_os = "linux")]
fn device_size(file: &File) -> io::Result<u64> {
    use std::os::fd::AsRawFd;

    let mut size: u64 = 0;
    // SAFETY: the fd is open for the duration of the call and BLKGETSIZE64
    // writes exactly one u64 through the pointer.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size as *mut u64) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size)
}

/// Size of a block device: the offset of its end.
#[cfg(not(target_os = "linux"))]
fn device_size(file: &File) -> io::Result<u64> {
    use std::io::{Seek, SeekFrom};

    let mut file = file;
    let size = file.seek(SeekFrom::End(0))?;
    file.rewind()?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image_with(len: usize) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_open_regular_file() {
        let tmp = image_with(25);
        let image = BackingImage::open(tmp.path(), 10).unwrap();
        assert_eq!(image.geometry().total_size(), 25);
        assert_eq!(image.geometry().chunk_count(), 3);
        assert_eq!(image.path(), tmp.path());
    }

    #[test]
    fn test_read_at_is_positioned() {
        let tmp = image_with(25);
        let image = BackingImage::open(tmp.path(), 10).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(image.read_at(20, &mut buf).unwrap(), 4);
        assert_eq!(buf, [20, 21, 22, 23]);

        // Earlier offset after a later one: no cursor involved.
        assert_eq!(image.read_at(1, &mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BackingImage::open(dir.path().join("nope.img"), 10).unwrap_err();
        assert!(matches!(err, ImageError::Open { .. }));
        assert!(err.to_string().contains("nope.img"));
    }

    #[test]
    fn test_open_rejects_zero_chunk_size() {
        let tmp = image_with(4);
        let err = BackingImage::open(tmp.path(), 0).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Geometry {
                source: GeometryError::InvalidChunkSize,
                ..
            }
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_device_size_asks_the_kernel() {
        // Regular files do not answer the block device size query.
        let tmp = image_with(123);
        let file = File::open(tmp.path()).unwrap();
        let err = device_size(&file).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_device_size_of_regular_file() {
        let tmp = image_with(123);
        let file = File::open(tmp.path()).unwrap();
        assert_eq!(device_size(&file).unwrap(), 123);
    }
}
