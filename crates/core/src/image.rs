//! Image detection and pixel-size lookup.

use std::path::Path;

use crate::errors::ImageError;

/// File extensions treated as bitmap images.
const IMAGE_EXTENSIONS: &[&str] = &["png", "gif", "jpg", "jpeg", "bmp", "ico", "webp"];

/// Reads image metadata for the icon candidate filter.
pub trait ImageInspector: Send + Sync {
    /// Whether `file` looks like an image at all.
    fn is_image(&self, file: &Path) -> bool;

    /// Pixel `(width, height)`, or `None` when the file has no usable size.
    fn dimensions(&self, file: &Path) -> Result<Option<(u64, u64)>, ImageError>;
}

/// Inspector that reads only the format header via `imagesize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderInspector;

impl ImageInspector for HeaderInspector {
    fn is_image(&self, file: &Path) -> bool {
        file.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    fn dimensions(&self, file: &Path) -> Result<Option<(u64, u64)>, ImageError> {
        let size = imagesize::size(file).map_err(|e| ImageError::Undecodable {
            path: file.display().to_string(),
            detail: e.to_string(),
        })?;
        if size.width == 0 || size.height == 0 {
            return Ok(None);
        }
        Ok(Some((size.width as u64, size.height as u64)))
    }
}

/// Bytes of a PNG whose header declares `width` x `height`.
#[cfg(test)]
pub(crate) fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    // bit depth, colour type, compression, filter, interlace, crc
    bytes.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_by_extension() {
        let inspector = HeaderInspector;
        assert!(inspector.is_image(Path::new("icons/a.png")));
        assert!(inspector.is_image(Path::new("icons/A.PNG")));
        assert!(inspector.is_image(Path::new("icons/b.gif")));
        assert!(!inspector.is_image(Path::new("icons/c.svg")));
        assert!(!inspector.is_image(Path::new("README")));
    }

    #[test]
    fn test_dimensions_from_png_header() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("icon.png");
        std::fs::write(&file, png_header(16, 24)).unwrap();
        assert_eq!(HeaderInspector.dimensions(&file).unwrap(), Some((16, 24)));
    }

    #[test]
    fn test_dimensions_of_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.png");
        std::fs::write(&file, b"not an image").unwrap();
        assert!(matches!(
            HeaderInspector.dimensions(&file),
            Err(ImageError::Undecodable { .. })
        ));
    }
}
