use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{merge_field, merge_text, non_empty, require, require_if_set, string_list, Entity, PartialRow};
use crate::error::ValidationError;
use crate::gateway::Order;

/// `projects` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub technologies: Option<Vec<String>>,
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub technologies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub link: Option<String>,
}

impl Entity for Project {
    type Row = ProjectRow;
    type Draft = NewProject;
    type Patch = ProjectPatch;

    const TABLE: &'static str = "projects";
    const LABEL: &'static str = "project";
    const ORDER: &'static [Order] = &[Order::desc("created_at")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: ProjectRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            image_url: row.image_url.unwrap_or_default(),
            technologies: row.technologies.unwrap_or_default(),
            link: non_empty(row.link),
            created_at: row.created_at,
        }
    }

    fn to_row(&self) -> ProjectRow {
        ProjectRow {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            category: Some(self.category.clone()),
            description: Some(self.description.clone()),
            image_url: Some(self.image_url.clone()),
            technologies: Some(self.technologies.clone()),
            link: self.link.clone(),
            created_at: self.created_at,
        }
    }

    fn draft_row(draft: &NewProject) -> Value {
        PartialRow::new()
            .put("title", &draft.title.trim())
            .put("category", &draft.category)
            .put("description", &draft.description)
            .put("image_url", &draft.image_url)
            .put("technologies", &draft.technologies)
            .put("link", &non_empty(draft.link.clone()))
            .into_value()
    }

    fn echo(local_id: String, draft: &NewProject) -> Self {
        Self {
            id: local_id,
            title: draft.title.trim().to_string(),
            category: draft.category.clone(),
            description: draft.description.clone(),
            image_url: draft.image_url.clone(),
            technologies: draft.technologies.clone(),
            link: non_empty(draft.link.clone()),
            created_at: Some(Utc::now()),
        }
    }

    fn patch_row(patch: &ProjectPatch) -> Value {
        PartialRow::new()
            .set("title", &patch.title)
            .set("category", &patch.category)
            .set("description", &patch.description)
            .set("image_url", &patch.image_url)
            .set("technologies", &patch.technologies)
            .set_text("link", &patch.link)
            .into_value()
    }

    fn apply(&mut self, patch: &ProjectPatch) {
        merge_field(&mut self.title, &patch.title);
        merge_field(&mut self.category, &patch.category);
        merge_field(&mut self.description, &patch.description);
        merge_field(&mut self.image_url, &patch.image_url);
        merge_field(&mut self.technologies, &patch.technologies);
        merge_text(&mut self.link, &patch.link);
    }

    fn validate_draft(draft: &NewProject) -> Result<(), ValidationError> {
        require("title", &draft.title)
    }

    fn validate_patch(patch: &ProjectPatch) -> Result<(), ValidationError> {
        require_if_set("title", &patch.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode;
    use serde_json::json;

    #[test]
    fn test_from_row_applies_defaults() {
        let project: Project = decode(json!({ "id": "p1", "title": "Site" })).unwrap();
        assert_eq!(project.description, "");
        assert!(project.technologies.is_empty());
        assert_eq!(project.link, None);
    }

    #[test]
    fn test_round_trip_preserves_row_fields() {
        let row = json!({
            "id": "p1",
            "title": "Site",
            "category": "Web",
            "description": "A site",
            "image_url": "https://img/1.png",
            "technologies": ["Rust", "Axum"],
            "link": "https://example.com",
            "created_at": "2024-05-01T10:00:00Z"
        });
        let project: Project = decode(row.clone()).unwrap();
        let back = serde_json::to_value(project.to_row()).unwrap();
        assert_eq!(back, row);

        let again = Project::from_row(project.to_row());
        assert_eq!(again, project);
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut project: Project = decode(json!({
            "id": "p1", "title": "Old", "category": "Web", "link": "https://x"
        }))
        .unwrap();

        let patch = ProjectPatch {
            title: Some("New".to_string()),
            link: Some(String::new()),
            ..Default::default()
        };
        project.apply(&patch);

        assert_eq!(project.title, "New");
        assert_eq!(project.category, "Web");
        assert_eq!(project.link, None);
        assert_eq!(
            Project::patch_row(&patch),
            json!({ "title": "New", "link": null })
        );
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let draft = NewProject {
            title: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Project::validate_draft(&draft),
            Err(ValidationError::Required("title"))
        );
    }
}
