/// Form helpers shared by the page handlers
use crate::{
    blob_store::{ImageStore, ImageUpload},
    error::{AppError, AppResult},
    validation,
};
use askama::Template;
use axum::{extract::Multipart, response::Html};
use std::collections::HashMap;

/// Render a page template
pub fn render<T: Template>(page: &T) -> AppResult<Html<String>> {
    Ok(Html(page.render()?))
}

/// Parsed `multipart/form-data` body
///
/// Text fields keep every value so repeated inputs (category checkboxes)
/// survive. File fields are buffered whole; the body limit on the router
/// bounds them.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, UploadedFile>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?
        {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            if field.file_name().is_some() {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Upload failed: {}", e)))?;

                // Browsers submit an empty part when no file was chosen
                if !data.is_empty() {
                    form.files.insert(
                        name,
                        UploadedFile {
                            data: data.to_vec(),
                            content_type,
                        },
                    );
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    /// First value of a text field, or empty
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_default()
    }

    /// Trimmed value, `None` when blank or absent
    pub fn optional(&self, name: &str) -> Option<String> {
        validation::non_empty(self.fields.get(name).and_then(|values| values.first()).cloned())
    }

    /// Checkbox state
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|values| values.iter().any(|v| is_checked(v)))
            .unwrap_or(false)
    }

    /// Every value of a repeated numeric field; unparsable values are dropped
    pub fn ids(&self, name: &str) -> Vec<i64> {
        self.fields
            .get(name)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validated image from a file field
    pub fn image(&self, name: &str, store: &ImageStore) -> AppResult<Option<ImageUpload>> {
        match self.files.get(name) {
            Some(file) => Ok(Some(
                store.validate(file.data.clone(), file.content_type.as_deref())?,
            )),
            None => Ok(None),
        }
    }
}

/// Checkbox values as browsers and scripts send them
pub fn is_checked(value: &str) -> bool {
    matches!(value.trim(), "true" | "on" | "1" | "yes")
}

/// Listing URL with the current filters, ending where `page=` goes
pub fn page_link(path: &str, params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}&", key, urlencoding::encode(value)))
        .collect();

    format!("{}?{}", path, query.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_link() {
        assert_eq!(page_link("/news", &[]), "/news?");
        assert_eq!(
            page_link("/search", &[("q", "gta vi"), ("role", "")]),
            "/search?q=gta%20vi&"
        );
    }

    #[test]
    fn test_field_accessors() {
        let mut form = MultipartForm::default();
        form.fields.insert("title".to_string(), vec!["  Hello ".to_string()]);
        form.fields.insert("slug".to_string(), vec!["   ".to_string()]);
        form.fields
            .insert("category_ids".to_string(), vec!["1".to_string(), "x".to_string(), "3".to_string()]);
        form.fields.insert("publish".to_string(), vec!["on".to_string()]);

        assert_eq!(form.text("title"), "  Hello ");
        assert_eq!(form.optional("title").as_deref(), Some("Hello"));
        assert_eq!(form.optional("slug"), None);
        assert_eq!(form.optional("missing"), None);
        assert_eq!(form.ids("category_ids"), vec![1, 3]);
        assert!(form.flag("publish"));
        assert!(!form.flag("comments_enabled"));
    }
}
