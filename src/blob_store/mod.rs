/// Image blob storage
///
/// Article covers, category banners and profile pictures are stored as
/// database blobs keyed by id. Writes take a connection so callers can keep
/// the blob and its owner in the same transaction.

pub mod store;

pub use store::{delete_image, insert_image, ImageStore};

/// Validated image ready to be stored
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    /// MIME type sniffed from the content
    pub mime_type: String,
}
