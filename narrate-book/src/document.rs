// EPUB loading

use crate::error::{PipelineError, Result};
use std::path::Path;

/// Title used when the EPUB carries no `title` metadata.
pub const FALLBACK_TITLE: &str = "Audiobook";

/// One content document of the book, in reading order.
#[derive(Debug, Clone)]
pub struct ContentItem {
    /// Manifest identifier of the resource
    pub id: String,
    /// Raw (X)HTML markup
    pub markup: String,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            markup: markup.into(),
        }
    }
}

/// Source document handed to the extractor.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub items: Vec<ContentItem>,
}

impl Document {
    #[cfg(test)]
    pub fn new(title: impl Into<String>, items: Vec<ContentItem>) -> Self {
        Self {
            title: title.into(),
            items,
        }
    }

    /// Open an EPUB and collect its spine documents in reading order.
    pub fn open(path: &Path) -> Result<Self> {
        let mut doc = epub::doc::EpubDoc::new(path).map_err(|e| PipelineError::Document {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let title = doc
            .mdata("title")
            .map(|m| m.value.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());

        let mut items = Vec::new();
        let spine = doc.spine.clone();

        for spine_item in spine.iter() {
            match doc.get_resource(&spine_item.idref) {
                Some((content_bytes, _mime)) => {
                    let markup = String::from_utf8_lossy(&content_bytes).to_string();
                    items.push(ContentItem::new(spine_item.idref.clone(), markup));
                }
                None => log::warn!("Spine entry {} has no resource, skipping", spine_item.idref),
            }
        }

        log::debug!("Loaded \"{}\" with {} content items", title, items.len());

        Ok(Self { title, items })
    }

    /// Output file name derived from the title: spaces and path separators become underscores.
    pub fn output_file_name(&self) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                _ => c,
            })
            .collect();
        format!("{}.m4b", stem)
    }
}
