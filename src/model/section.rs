/**
 * Content sections
 * Named free-form documents (hero text, footer layout, SEO metadata...)
 */
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SECTIONS_TABLE: &str = "content_sections";
pub const SECTION_KEY: &str = "section_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Hero,
    About,
    Header,
    Footer,
    Contact,
    Reviews,
    Seo,
}

impl SectionName {
    pub const ALL: [SectionName; 7] = [
        SectionName::Hero,
        SectionName::About,
        SectionName::Header,
        SectionName::Footer,
        SectionName::Contact,
        SectionName::Reviews,
        SectionName::Seo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Hero => "hero",
            SectionName::About => "about",
            SectionName::Header => "header",
            SectionName::Footer => "footer",
            SectionName::Contact => "contact",
            SectionName::Reviews => "reviews",
            SectionName::Seo => "seo",
        }
    }

    /// Content served until the section has a stored row.
    pub fn default_content(&self) -> Value {
        match self {
            SectionName::Hero => json!({
                "title": "Building modern digital experiences",
                "subtitle": "Design, development and consulting for growing businesses",
                "ctaText": "View Portfolio",
                "ctaLink": "/portfolio",
                "backgroundImage": ""
            }),
            SectionName::About => json!({
                "title": "About Me",
                "description": "A passionate developer building modern web applications.",
                "image": "",
                "stats": []
            }),
            SectionName::Header => json!({
                "logoText": "Portfolio",
                "navItems": [
                    { "label": "Home", "href": "/" },
                    { "label": "Services", "href": "/services" },
                    { "label": "Portfolio", "href": "/portfolio" },
                    { "label": "Contact", "href": "/contact" }
                ]
            }),
            SectionName::Footer => json!({
                "copyright": "All rights reserved.",
                "links": [],
                "socialLinks": []
            }),
            SectionName::Contact => json!({
                "email": "hello@example.com",
                "phone": "",
                "address": "Remote"
            }),
            SectionName::Reviews => json!([]),
            SectionName::Seo => json!({
                "title": "Portfolio",
                "description": "Portfolio and services",
                "keywords": []
            }),
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section '{}'", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl FromStr for SectionName {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        SectionName::ALL
            .into_iter()
            .find(|name| name.as_str() == lower)
            .ok_or(UnknownSection(s.to_string()))
    }
}

/// `content_sections` table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    pub section_name: String,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentSection {
    pub fn new(name: SectionName, content: Value) -> Self {
        Self {
            section_name: name.as_str().to_string(),
            content,
            updated_at: None,
        }
    }

    pub fn name(&self) -> Option<SectionName> {
        self.section_name.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_names_parse_case_insensitively() {
        assert_eq!("SEO".parse::<SectionName>(), Ok(SectionName::Seo));
        assert_eq!(" hero ".parse::<SectionName>(), Ok(SectionName::Hero));
        assert!("skills".parse::<SectionName>().is_err());
    }

    #[test]
    fn test_every_section_has_default_content() {
        for name in SectionName::ALL {
            assert!(!name.default_content().is_null(), "{} has no default", name);
        }
    }

    #[test]
    fn test_row_serializes_with_section_key() {
        let row = serde_json::to_value(ContentSection::new(SectionName::About, json!({ "a": 1 })))
            .unwrap();
        assert_eq!(row, json!({ "section_name": "about", "content": { "a": 1 } }));
    }
}
