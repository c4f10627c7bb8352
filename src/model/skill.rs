use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{merge_field, require, require_if_set, Entity, PartialRow};
use crate::error::ValidationError;
use crate::gateway::Order;

/// `skills` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub proficiency_level: Option<u8>,
    pub years_experience: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSkill {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub proficiency_level: Option<u8>,
    #[serde(default)]
    pub years_experience: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub proficiency_level: Option<u8>,
    pub years_experience: Option<u32>,
}

fn check_level(level: Option<u8>) -> Result<(), ValidationError> {
    match level {
        Some(l) if !(1..=5).contains(&l) => Err(ValidationError::invalid(
            "proficiencyLevel",
            "must be between 1 and 5",
        )),
        _ => Ok(()),
    }
}

impl Entity for Skill {
    type Row = SkillRow;
    type Draft = NewSkill;
    type Patch = SkillPatch;

    const TABLE: &'static str = "skills";
    const LABEL: &'static str = "skill";
    const ORDER: &'static [Order] = &[Order::asc("category"), Order::asc("name")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: SkillRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            proficiency_level: row.proficiency_level,
            years_experience: row.years_experience,
        }
    }

    fn to_row(&self) -> SkillRow {
        SkillRow {
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            category: Some(self.category.clone()),
            proficiency_level: self.proficiency_level,
            years_experience: self.years_experience,
        }
    }

    fn draft_row(draft: &NewSkill) -> Value {
        PartialRow::new()
            .put("name", &draft.name.trim())
            .put("category", &draft.category.trim())
            .put("proficiency_level", &draft.proficiency_level)
            .put("years_experience", &draft.years_experience)
            .into_value()
    }

    fn echo(local_id: String, draft: &NewSkill) -> Self {
        Self {
            id: local_id,
            name: draft.name.trim().to_string(),
            category: draft.category.trim().to_string(),
            proficiency_level: draft.proficiency_level,
            years_experience: draft.years_experience,
        }
    }

    fn patch_row(patch: &SkillPatch) -> Value {
        PartialRow::new()
            .set("name", &patch.name)
            .set("category", &patch.category)
            .set("proficiency_level", &patch.proficiency_level)
            .set("years_experience", &patch.years_experience)
            .into_value()
    }

    fn apply(&mut self, patch: &SkillPatch) {
        merge_field(&mut self.name, &patch.name);
        merge_field(&mut self.category, &patch.category);
        if patch.proficiency_level.is_some() {
            self.proficiency_level = patch.proficiency_level;
        }
        if patch.years_experience.is_some() {
            self.years_experience = patch.years_experience;
        }
    }

    fn validate_draft(draft: &NewSkill) -> Result<(), ValidationError> {
        require("name", &draft.name)?;
        require("category", &draft.category)?;
        check_level(draft.proficiency_level)
    }

    fn validate_patch(patch: &SkillPatch) -> Result<(), ValidationError> {
        require_if_set("name", &patch.name)?;
        require_if_set("category", &patch.category)?;
        check_level(patch.proficiency_level)
    }
}

/// Groups skills by category, keeping first-seen category order and the
/// skills' own order within each group.
pub fn group_by_category(skills: &[Skill]) -> Vec<(String, Vec<Skill>)> {
    let mut groups: Vec<(String, Vec<Skill>)> = Vec::new();
    for skill in skills {
        match groups.iter_mut().find(|(category, _)| *category == skill.category) {
            Some((_, members)) => members.push(skill.clone()),
            None => groups.push((skill.category.clone(), vec![skill.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, category: &str) -> Skill {
        Skill::echo(
            name.to_string(),
            &NewSkill {
                name: name.to_string(),
                category: category.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_proficiency_outside_range_is_rejected() {
        let draft = NewSkill {
            name: "Rust".to_string(),
            category: "Backend".to_string(),
            proficiency_level: Some(6),
            years_experience: None,
        };
        assert!(Skill::validate_draft(&draft).is_err());

        let patch = SkillPatch {
            proficiency_level: Some(0),
            ..Default::default()
        };
        assert!(Skill::validate_patch(&patch).is_err());
    }

    #[test]
    fn test_group_by_category_keeps_order() {
        let skills = vec![
            skill("Go", "Backend"),
            skill("CSS", "Frontend"),
            skill("Rust", "Backend"),
        ];
        let groups = group_by_category(&skills);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Backend");
        let names: Vec<_> = groups[0].1.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Go", "Rust"]);
    }
}
