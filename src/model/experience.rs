use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    merge_field, merge_nullable, merge_text, non_empty, nullable, require, require_if_set,
    string_list, Entity, PartialRow,
};
use crate::error::ValidationError;
use crate::gateway::Order;

const PRESENT: &str = "Present";

/// `experiences` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "super::date_column")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::date_column")]
    pub end_date: Option<NaiveDate>,
    pub is_current: Option<bool>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub technologies: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_date: NaiveDate,
    /// Stored value; may be stale when `is_current` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub technologies: Vec<String>,
}

impl Experience {
    pub fn is_ongoing(&self) -> bool {
        self.is_current
    }

    /// End date as displayed: always `None` for a current position.
    pub fn effective_end_date(&self) -> Option<NaiveDate> {
        if self.is_current {
            None
        } else {
            self.end_date
        }
    }

    /// "Mar 2021 - Present", "Jan 2019 - Feb 2021".
    pub fn period_label(&self) -> String {
        let start = self.start_date.format("%b %Y");
        match self.effective_end_date() {
            Some(end) => format!("{} - {}", start, end.format("%b %Y")),
            None if self.is_current => format!("{} - {}", start, PRESENT),
            None => start.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExperience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperiencePatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// `null` clears the end date.
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<NaiveDate>>,
    pub is_current: Option<bool>,
    pub description: Option<String>,
    pub technologies: Option<Vec<String>>,
}

fn check_period(
    start: NaiveDate,
    end: Option<NaiveDate>,
    is_current: bool,
) -> Result<(), ValidationError> {
    match end {
        Some(end) if !is_current && end < start => Err(ValidationError::invalid(
            "endDate",
            "cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

impl Entity for Experience {
    type Row = ExperienceRow;
    type Draft = NewExperience;
    type Patch = ExperiencePatch;

    const TABLE: &'static str = "experiences";
    const LABEL: &'static str = "experience";
    const ORDER: &'static [Order] = &[Order::desc("start_date")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: ExperienceRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            company: row.company.unwrap_or_default(),
            location: non_empty(row.location),
            start_date: row.start_date.unwrap_or_else(super::epoch_date),
            end_date: row.end_date,
            is_current: row.is_current.unwrap_or(false),
            description: non_empty(row.description),
            technologies: row.technologies.unwrap_or_default(),
        }
    }

    fn to_row(&self) -> ExperienceRow {
        ExperienceRow {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            company: Some(self.company.clone()),
            location: self.location.clone(),
            start_date: Some(self.start_date),
            end_date: self.end_date,
            is_current: Some(self.is_current),
            description: self.description.clone(),
            technologies: Some(self.technologies.clone()),
        }
    }

    fn draft_row(draft: &NewExperience) -> Value {
        PartialRow::new()
            .put("title", &draft.title.trim())
            .put("company", &draft.company.trim())
            .put("location", &non_empty(draft.location.clone()))
            .put("start_date", &draft.start_date)
            .put(
                "end_date",
                &if draft.is_current { None } else { draft.end_date },
            )
            .put("is_current", &draft.is_current)
            .put("description", &non_empty(draft.description.clone()))
            .put("technologies", &draft.technologies)
            .into_value()
    }

    fn echo(local_id: String, draft: &NewExperience) -> Self {
        Self {
            id: local_id,
            title: draft.title.trim().to_string(),
            company: draft.company.trim().to_string(),
            location: non_empty(draft.location.clone()),
            start_date: draft.start_date,
            end_date: if draft.is_current { None } else { draft.end_date },
            is_current: draft.is_current,
            description: non_empty(draft.description.clone()),
            technologies: draft.technologies.clone(),
        }
    }

    fn patch_row(patch: &ExperiencePatch) -> Value {
        PartialRow::new()
            .set("title", &patch.title)
            .set("company", &patch.company)
            .set_text("location", &patch.location)
            .set("start_date", &patch.start_date)
            .set_nullable("end_date", &patch.end_date)
            .set("is_current", &patch.is_current)
            .set_text("description", &patch.description)
            .set("technologies", &patch.technologies)
            .into_value()
    }

    fn apply(&mut self, patch: &ExperiencePatch) {
        merge_field(&mut self.title, &patch.title);
        merge_field(&mut self.company, &patch.company);
        merge_text(&mut self.location, &patch.location);
        merge_field(&mut self.start_date, &patch.start_date);
        merge_nullable(&mut self.end_date, &patch.end_date);
        merge_field(&mut self.is_current, &patch.is_current);
        merge_text(&mut self.description, &patch.description);
        merge_field(&mut self.technologies, &patch.technologies);
    }

    fn validate_draft(draft: &NewExperience) -> Result<(), ValidationError> {
        require("title", &draft.title)?;
        require("company", &draft.company)?;
        check_period(draft.start_date, draft.end_date, draft.is_current)
    }

    fn validate_patch(patch: &ExperiencePatch) -> Result<(), ValidationError> {
        require_if_set("title", &patch.title)?;
        require_if_set("company", &patch.company)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_period(self.start_date, self.end_date, self.is_current)
    }
}
