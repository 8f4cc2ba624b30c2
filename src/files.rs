use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// JPEG quality factor for both the staging copy and the permanent copy
pub const JPEG_QUALITY: u8 = 90;

/// Fixed filename of the staging copy written before identification
pub const STAGING_FILENAME: &str = "plant_tmp.jpg";

/// Manages plant image storage: a staging area for the copy uploaded to the
/// identification service and a permanent per-app directory for the copies
/// referenced by discovery records.
pub struct ImageFileManager {
    images_dir: PathBuf,
    staging_dir: PathBuf,
}

impl ImageFileManager {
    /// Create a new ImageFileManager instance
    ///
    /// Resolves the platform-specific data and cache directories and creates
    /// the "plant_images" and staging subdirectories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The app data or cache directory cannot be determined
    /// - Either directory cannot be created
    pub fn new() -> Result<Self, String> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| "Failed to determine app data directory".to_string())?;
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| "Failed to determine app cache directory".to_string())?;

        let images_dir = data_dir.join("com.mybloom.app").join("plant_images");
        let staging_dir = cache_dir.join("com.mybloom.app");

        Self::new_with_dirs(images_dir, staging_dir)
    }

    /// Create an ImageFileManager over explicit directories
    ///
    /// This is primarily used for testing but is also used internally by new().
    pub fn new_with_dirs(images_dir: PathBuf, staging_dir: PathBuf) -> Result<Self, String> {
        std::fs::create_dir_all(&images_dir)
            .map_err(|e| format!("Failed to create plant images directory: {}", e))?;
        std::fs::create_dir_all(&staging_dir)
            .map_err(|e| format!("Failed to create staging directory: {}", e))?;

        Ok(Self {
            images_dir,
            staging_dir,
        })
    }

    /// Get the path to the permanent plant images directory
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Encode the captured image as JPEG into the fixed staging file and
    /// return its path. The staging file is overwritten on every run.
    pub fn stage_image(&self, image: &DynamicImage) -> Result<PathBuf, String> {
        let path = self.staging_dir.join(STAGING_FILENAME);
        Self::write_jpeg(image, &path)?;
        Ok(path)
    }

    /// Encode the captured image as a permanent JPEG copy named
    /// `plant_<epoch-millis>.jpg` and return its absolute path.
    pub fn persist_image(&self, image: &DynamicImage) -> Result<PathBuf, String> {
        let filename = format!("plant_{}.jpg", chrono::Utc::now().timestamp_millis());
        let path = self.images_dir.join(filename);
        Self::write_jpeg(image, &path)?;
        Ok(path)
    }

    /// Best-effort removal of an image file. A missing file is not an error.
    pub fn delete_image(path: &Path) -> Result<(), String> {
        if path.exists() {
            std::fs::remove_file(path)
                .map_err(|e| format!("Failed to delete image {:?}: {}", path, e))?;
        }
        Ok(())
    }

    fn write_jpeg(image: &DynamicImage, path: &Path) -> Result<(), String> {
        let file = std::fs::File::create(path)
            .map_err(|e| format!("Failed to create image file {:?}: {}", path, e))?;
        let mut writer = std::io::BufWriter::new(file);

        // JPEG has no alpha channel, so encode from RGB
        let rgb = image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        rgb.write_with_encoder(encoder)
            .map_err(|e| format!("Failed to encode JPEG {:?}: {}", path, e))?;

        Ok(())
    }
}
