//! Image uploads to object storage.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::UploadError;
use crate::gateway::Gateway;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

lazy_static! {
    static ref SECTION_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static regex");
}

/// An image that passed every check and is ready to store.
#[derive(Debug)]
pub struct CheckedImage {
    pub path: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Validates an upload and names it `<section>/<unix millis>.<ext>`.
pub fn check_image(
    section: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<CheckedImage, UploadError> {
    if !SECTION_REGEX.is_match(section) {
        return Err(UploadError::InvalidSection(section.to_string()));
    }
    let ext = extension_of(file_name).ok_or(UploadError::UnsupportedType)?;
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(UploadError::TooLarge);
    }
    let content_type = sniff_image_type(&bytes).ok_or(UploadError::ContentMismatch)?;

    Ok(CheckedImage {
        path: format!("{}/{}.{}", section, Utc::now().timestamp_millis(), ext),
        content_type,
        bytes,
    })
}

/// Where a stored image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub path: String,
    pub size: usize,
    pub content_type: &'static str,
}

pub async fn store_image<G: Gateway>(
    gateway: &G,
    bucket: &str,
    image: CheckedImage,
) -> Result<StoredImage, UploadError> {
    let size = image.bytes.len();
    let url = gateway
        .upload(bucket, &image.path, image.bytes, image.content_type)
        .await?;
    tracing::info!(path = %image.path, size, "Image uploaded");
    Ok(StoredImage {
        url,
        path: image.path,
        size,
        content_type: image.content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_path_is_section_prefixed() {
        let image = check_image("about", "Me.PNG", PNG.to_vec()).unwrap();
        assert!(image.path.starts_with("about/"));
        assert!(image.path.ends_with(".png"));
        assert_eq!(image.content_type, "image/png");
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = check_image("about", "notes.txt", PNG.to_vec()).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType));
        let err = check_image("about", "no-extension", PNG.to_vec()).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType));
    }

    #[test]
    fn test_rejects_content_that_is_not_an_image() {
        let err = check_image("hero", "x.jpg", b"hello world".to_vec()).unwrap_err();
        assert!(matches!(err, UploadError::ContentMismatch));
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(matches!(
            check_image("hero", "x.jpg", vec![]).unwrap_err(),
            UploadError::Empty
        ));
        let mut big = PNG.to_vec();
        big.resize(MAX_FILE_SIZE + 1, 0);
        assert!(matches!(
            check_image("hero", "x.png", big).unwrap_err(),
            UploadError::TooLarge
        ));
    }

    #[test]
    fn test_rejects_path_like_sections() {
        let err = check_image("../etc", "x.png", PNG.to_vec()).unwrap_err();
        assert!(matches!(err, UploadError::InvalidSection(_)));
    }
}
