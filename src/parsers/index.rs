use crate::descriptor::{Category, FileDescriptor};
use crate::error::IndexError;
use crate::parsers::visible_text;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("numeric id pattern is valid"));

/// Where the index page keeps its categories and files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSelectors {
    /// Category header elements; their class attribute carries the category id
    #[serde(default = "default_category_selector")]
    pub category: String,

    /// Selectable file inputs; their value is the file id
    #[serde(default = "default_file_selector")]
    pub file: String,

    /// Tags of the enclosing element whose class names the file's category
    #[serde(default = "default_group_tags")]
    pub group_tags: Vec<String>,
}

fn default_category_selector() -> String {
    ".CategoryHeader".to_string()
}

fn default_file_selector() -> String {
    "input.SelectedFile".to_string()
}

fn default_group_tags() -> Vec<String> {
    vec!["p".to_string(), "div".to_string(), "li".to_string()]
}

impl Default for IndexSelectors {
    fn default() -> Self {
        Self {
            category: default_category_selector(),
            file: default_file_selector(),
            group_tags: default_group_tags(),
        }
    }
}

/// Parses index page markup into the ordered list of files it offers
pub fn extract(html: &str, selectors: &IndexSelectors) -> Result<Vec<FileDescriptor>, IndexError> {
    let doc = Html::parse_document(html);

    let categories = extract_categories(&doc, selectors)?;
    ::log::debug!("Index page lists {} categories", categories.len());

    let file_selector = parse_selector(&selectors.file)?;
    let mut files = Vec::new();

    for input in doc.select(&file_selector) {
        let Some(id) = input.value().attr("value").filter(|v| !v.is_empty()) else {
            ::log::warn!("Skipping file input without a value");
            continue;
        };

        let title = input
            .parent()
            .and_then(ElementRef::wrap)
            .map(visible_text)
            .unwrap_or_default();

        let key = group_category_id(input, &selectors.group_tags);
        let category = key
            .and_then(|k| categories.get(&k))
            .ok_or_else(|| IndexError::UnknownCategory {
                file: id.to_string(),
                category: key,
            })?;

        files.push(FileDescriptor::new(id, Arc::clone(category), title));
    }

    ::log::debug!("Index page lists {} files", files.len());
    Ok(files)
}

/// Builds the category lookup from the header elements
fn extract_categories(
    doc: &Html,
    selectors: &IndexSelectors,
) -> Result<HashMap<u32, Arc<Category>>, IndexError> {
    let selector = parse_selector(&selectors.category)?;
    let mut categories = HashMap::new();

    for header in doc.select(&selector) {
        let Some(id) = header.value().attr("class").and_then(numeric_id) else {
            ::log::warn!("Skipping category header without a numeric class");
            continue;
        };
        categories.insert(id, Arc::new(Category::new(id, visible_text(header))));
    }

    Ok(categories)
}

/// Category id from the nearest paragraph-like ancestor with a numeric class
fn group_category_id(element: ElementRef<'_>, group_tags: &[String]) -> Option<u32> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|e| group_tags.iter().any(|t| t == e.value().name()))
        .find_map(|e| e.value().attr("class").and_then(numeric_id))
}

/// First run of digits in a class attribute
fn numeric_id(class: &str) -> Option<u32> {
    NUMERIC_ID.find(class).and_then(|m| m.as_str().parse().ok())
}

fn parse_selector(selector: &str) -> Result<Selector, IndexError> {
    Selector::parse(selector).map_err(|e| IndexError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
