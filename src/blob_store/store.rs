/// Image store backed by the `image` table
use crate::{
    blob_store::ImageUpload,
    db::content::Image,
    error::{AppError, AppResult},
};
use chrono::Utc;
use image::ImageFormat;
use sqlx::{SqliteConnection, SqlitePool};

const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Reads and validates images
#[derive(Clone)]
pub struct ImageStore {
    db: SqlitePool,
    max_size: usize,
}

impl ImageStore {
    pub fn new(db: SqlitePool, max_size: usize) -> Self {
        Self { db, max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Check size, declared type and actual content of an upload
    pub fn validate(&self, data: Vec<u8>, declared_mime: Option<&str>) -> AppResult<ImageUpload> {
        if data.is_empty() {
            return Err(AppError::Validation("Uploaded image is empty".to_string()));
        }

        if data.len() > self.max_size {
            return Err(AppError::Validation(format!(
                "Image exceeds maximum size of {} MB",
                self.max_size / (1024 * 1024)
            )));
        }

        if let Some(mime) = declared_mime {
            if !mime.starts_with("image/") {
                return Err(AppError::Validation("Only image files are allowed".to_string()));
            }
        }

        let format = image::guess_format(&data)
            .map_err(|_| AppError::Validation("File is not a recognized image".to_string()))?;

        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(AppError::Validation(
                "Images must be JPEG, PNG, GIF or WebP".to_string(),
            ));
        }

        Ok(ImageUpload {
            data,
            mime_type: format.to_mime_type().to_string(),
        })
    }

    /// Fetch an image by id
    pub async fn get(&self, id: i64) -> AppResult<Image> {
        sqlx::query_as::<_, Image>(
            "SELECT id, data, mime_type, created_at FROM image WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))
    }
}

/// Insert a validated image and return its id
pub async fn insert_image(conn: &mut SqliteConnection, upload: &ImageUpload) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO image (data, mime_type, created_at) VALUES (?1, ?2, ?3)")
        .bind(&upload.data)
        .bind(&upload.mime_type)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Delete an image; the owning row must no longer reference it
pub async fn delete_image(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM image WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn png_bytes() -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    data.extend_from_slice(&[0u8; 32]);
    data
}
