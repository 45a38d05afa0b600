/// News content
///
/// Articles with their publication state, categories, tags, favorites and
/// the access log.

pub mod articles;
pub mod slug;
pub mod taxonomy;

pub use articles::ArticleManager;
pub use taxonomy::TaxonomyManager;

use crate::{
    blob_store::ImageUpload,
    db::content::{Article, Category, Tag},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Article form as submitted by staff
#[derive(Debug, Clone, Default, Validate)]
pub struct ArticleInput {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    /// Custom slug; derived from the title when blank
    pub slug: Option<String>,
    #[validate(length(max = 500, message = "Summary cannot exceed 500 characters"))]
    pub summary: String,
    #[validate(length(min = 1, message = "Article body is required"))]
    pub body: String,
    pub category_ids: Vec<i64>,
    /// Comma-separated tag names, found or created
    pub tags: String,
    pub publish: bool,
    pub comments_enabled: bool,
    pub image: Option<ImageUpload>,
    pub remove_image: bool,
}

impl ArticleInput {
    fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.body = self.body.trim().to_string();
        self
    }

    /// Tag names from the comma-separated field, blanks dropped
    pub fn tag_names(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Staff article listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleFilter {
    pub published: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
}

/// Article with author and taxonomy, as shown on its page
#[derive(Debug, Clone, Serialize)]
pub struct ArticleDetail {
    pub article: Article,
    pub author_name: String,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

impl ArticleDetail {
    pub fn has_category(&self, id: &i64) -> bool {
        self.categories.iter().any(|c| c.id == *id)
    }

    /// Tags joined back into the form field value
    pub fn tag_list(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Category form
#[derive(Debug, Clone, Default, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name must be between 1 and 100 characters"))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<ImageUpload>,
    pub remove_image: bool,
}

/// Tag form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TagInput {
    #[validate(length(min = 1, max = 100, message = "Tag name must be between 1 and 100 characters"))]
    pub name: String,
    pub slug: Option<String>,
}
