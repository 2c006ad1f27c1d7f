//! Signature template records

use crate::error::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Category assigned when the caller does not pick one
pub const DEFAULT_CATEGORY: &str = "default";

/// Unique name of a template, the key in both the local and remote stores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateName(String);

impl TemplateName {
    /// Create a name, rejecting blank input
    pub fn new(name: impl Into<String>) -> std::result::Result<Self, TemplateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        Ok(TemplateName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TemplateName {
    type Error = TemplateError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        TemplateName::new(s)
    }
}

impl TryFrom<&str> for TemplateName {
    type Error = TemplateError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        TemplateName::new(s)
    }
}

impl From<TemplateName> for String {
    fn from(name: TemplateName) -> Self {
        name.0
    }
}

impl AsRef<str> for TemplateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A stored email signature
///
/// The serialized field names are shared by the local payload and the remote
/// table rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateRecord {
    /// Unique identifier
    pub name: TemplateName,

    /// HTML markup
    pub content: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Set on every save
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TemplateRecord {
    /// Create a record in the default category, stamped with the current time
    pub fn new(name: TemplateName, content: impl Into<String>) -> Self {
        TemplateRecord {
            name,
            content: content.into(),
            category: default_category(),
            tags: Vec::new(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Create a new record builder
    pub fn builder(name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(name)
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Refresh `updated_at` to now
    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Builder for template records
#[derive(Debug)]
pub struct TemplateBuilder {
    name: String,
    content: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
}

impl TemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TemplateBuilder {
            name: name.into(),
            content: None,
            category: None,
            tags: Vec::new(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Build the record, stamping `updated_at` with the current time
    pub fn build(self) -> Result<TemplateRecord> {
        let name = TemplateName::new(self.name)?;
        let content = self.content.ok_or(TemplateError::MissingContent)?;

        Ok(TemplateRecord {
            name,
            content,
            category: self.category.unwrap_or_else(default_category),
            tags: self.tags,
            updated_at: OffsetDateTime::now_utc(),
        })
    }
}
