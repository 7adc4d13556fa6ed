//! Validation of uploaded X-ray images.
//!
//! An upload is accepted only if its bytes really decode as a JPEG or PNG
//! image, whatever the client claims in its filename or content type. The
//! filename is reduced to its last path component before being stored.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::{GenericImageView, ImageFormat};

use crate::utils::validation::{MAX_FILE_SIZE, MAX_IMAGE_DIMENSIONS};

/// A validated image upload.
#[derive(Debug, Clone)]
pub struct FileInput {
    content: Vec<u8>,
    filename: String,
    format: ImageFormat,
    dimensions: (u32, u32),
}

impl FileInput {
    /// Validates the raw bytes and the client-supplied filename of an upload.
    ///
    /// The checks run from the cheapest to the most expensive: size, filename,
    /// extension, magic bytes, then a full decode of the image.
    pub fn new(content: &[u8], filename: &str) -> Result<Self> {
        Self::validate_file_size(content)?;

        let filename = Self::sanitize_filename(filename).context("Failed to process filename")?;
        let extension =
            Self::get_file_extension(&filename).context("Failed to get file extension")?;

        let expected = match extension.as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            _ => bail!("File must have a .jpg, .jpeg or .png extension"),
        };

        let format =
            Self::validate_image_format(content).context("Failed to validate image format")?;
        if format != expected {
            bail!("File extension does not match its content");
        }

        let dimensions = Self::validate_image_integrity(content, format)
            .context("Failed to validate image integrity")?;

        Ok(Self {
            content: content.to_vec(),
            filename,
            format,
            dimensions,
        })
    }

    fn validate_file_size(content: &[u8]) -> Result<()> {
        if content.is_empty() {
            bail!("File content cannot be empty");
        }
        if content.len() > MAX_FILE_SIZE {
            bail!("File size exceeds maximum allowed size of {MAX_FILE_SIZE} bytes");
        }
        Ok(())
    }

    /// Keeps only the final path component
    fn sanitize_filename(filename: &str) -> Result<String> {
        let filename = filename.trim();
        if filename.is_empty() {
            bail!("Filename cannot be empty");
        }

        Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid filename"))
    }

    fn get_file_extension(filename: &str) -> Result<String> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .ok_or_else(|| anyhow!("Missing file extension"))
    }

    fn validate_image_format(content: &[u8]) -> Result<ImageFormat> {
        match image::guess_format(content) {
            Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(format),
            Ok(_) => bail!("File must be a JPEG or PNG image"),
            Err(_) => bail!("Unable to determine file format"),
        }
    }

    fn validate_image_integrity(content: &[u8], format: ImageFormat) -> Result<(u32, u32)> {
        let img = image::load_from_memory_with_format(content, format)
            .context("Failed to load image")?;
        let (width, height) = img.dimensions();

        if width > MAX_IMAGE_DIMENSIONS.0 || height > MAX_IMAGE_DIMENSIONS.1 {
            bail!(
                "Image dimensions ({width} x {height}) exceed maximum allowed ({} x {})",
                MAX_IMAGE_DIMENSIONS.0,
                MAX_IMAGE_DIMENSIONS.1
            );
        }

        Ok((width, height))
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the sanitized filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// MIME type matching the decoded format
    pub fn mime(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded_image(format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::new(64, 48);
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .expect("Failed to create test image");
        buffer
    }

    #[test]
    fn test_jpeg_and_png_are_accepted() {
        let jpeg = FileInput::new(&encoded_image(ImageFormat::Jpeg), "wrist.jpg").unwrap();
        assert_eq!(jpeg.mime(), "image/jpeg");
        assert_eq!(jpeg.dimensions(), (64, 48));

        let png = FileInput::new(&encoded_image(ImageFormat::Png), "wrist.PNG").unwrap();
        assert_eq!(png.mime(), "image/png");
        assert_eq!(png.filename(), "wrist.PNG");
    }

    #[test]
    fn test_filename_sanitization() {
        let content = encoded_image(ImageFormat::Jpeg);

        let cases = vec![
            ("xray.jpg", true),
            ("../../etc/xray.jpg", true),
            ("xray.jpeg", true),
            ("xray.png", false), // extension does not match the bytes
            ("xray.gif", false),
            ("", false),
            ("xray", false),
        ];

        for (filename, should_succeed) in cases {
            assert_eq!(
                FileInput::new(&content, filename).is_ok(),
                should_succeed,
                "Failed for filename: {filename}"
            );
        }

        let file = FileInput::new(&content, "../../etc/xray.jpg").unwrap();
        assert_eq!(file.filename(), "xray.jpg");
    }

    #[test]
    fn test_file_size_limits() {
        assert!(FileInput::new(&[], "xray.jpg").is_err());

        let large_content = vec![0; MAX_FILE_SIZE + 1];
        assert!(FileInput::new(&large_content, "xray.jpg").is_err());
    }

    #[test]
    fn test_image_integrity() {
        assert!(FileInput::new(&[0u8; 100], "xray.jpg").is_err());

        let mut content = encoded_image(ImageFormat::Jpeg);
        content[0] = 0x00;
        assert!(FileInput::new(&content, "xray.jpg").is_err());

        let mut content = encoded_image(ImageFormat::Png);
        content.truncate(content.len() / 2);
        assert!(FileInput::new(&content, "xray.png").is_err());
    }

    #[test]
    fn test_other_formats_are_rejected() {
        let bmp = encoded_image(ImageFormat::Bmp);
        assert!(FileInput::new(&bmp, "xray.jpg").is_err());
        assert!(FileInput::new(&bmp, "xray.bmp").is_err());
    }
}
