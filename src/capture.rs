use std::fs::File;
use std::path::Path;

use bytes::Bytes;
use memmap2::Mmap;
use tracing::debug;

use crate::buffer::{PayloadType, RawBuffer};
use crate::error::{DecodeError, Result};

/// A recorded acquisition dump mapped read-only from disk.
///
/// Replays captured buffers through the same trailer and pixel paths a live
/// transport would feed, without copying the file into memory.
pub struct CaptureFile {
    data: Bytes,
}

impl CaptureFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(DecodeError::InvalidArgument(
                "cannot map an empty capture file".to_string(),
            ));
        }

        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(target_os = "linux")]
        {
            use memmap2::Advice;
            let _ = mmap.advise(Advice::Sequential);
        }

        debug!("mapped capture of {len} bytes from {:?}", path.as_ref());
        Ok(Self {
            data: Bytes::from_owner(mmap),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Presents the whole capture as one delivered buffer.
    pub fn buffer(&self, image_extent: usize, payload_type: PayloadType) -> Result<RawBuffer> {
        RawBuffer::new(self.data.clone(), self.data.len(), image_extent, payload_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_and_expose_as_buffer() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x42u8; 96]).unwrap();
        file.flush().unwrap();

        let capture = CaptureFile::open(file.path()).unwrap();
        assert_eq!(capture.len(), 96);

        let buffer = capture.buffer(64, PayloadType::Image).unwrap();
        assert_eq!(buffer.filled(), 96);
        assert_eq!(buffer.trailer_bytes().len(), 32);
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(CaptureFile::open(file.path()).is_err());
    }

    #[test]
    fn test_bad_extent_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        file.flush().unwrap();

        let capture = CaptureFile::open(file.path()).unwrap();
        assert!(capture.buffer(11, PayloadType::Image).is_err());
    }
}
