use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    merge_field, merge_nullable, merge_text, non_empty, nullable, require, require_if_set, Entity,
    PartialRow,
};
use crate::error::ValidationError;
use crate::gateway::Order;

/// `certifications` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificationRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub issuing_organization: Option<String>,
    #[serde(default, deserialize_with = "super::date_column")]
    pub issue_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::date_column")]
    pub expiry_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub id: String,
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationStatus {
    Active,
    Expired,
}

impl Certification {
    /// Expired when the expiry date (taken at 00:00 UTC) is strictly before
    /// `now`. No expiry date means it never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date {
            Some(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|start| Utc.from_utc_datetime(&start) < now)
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> CertificationStatus {
        if self.is_expired(now) {
            CertificationStatus::Expired
        } else {
            CertificationStatus::Active
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertification {
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub credential_id: Option<String>,
    #[serde(default)]
    pub credential_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationPatch {
    pub name: Option<String>,
    pub issuing_organization: Option<String>,
    pub issue_date: Option<NaiveDate>,
    /// `null` clears the expiry date.
    #[serde(default, deserialize_with = "nullable")]
    pub expiry_date: Option<Option<NaiveDate>>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub description: Option<String>,
}

fn check_dates(issue: NaiveDate, expiry: Option<NaiveDate>) -> Result<(), ValidationError> {
    match expiry {
        Some(expiry) if expiry < issue => Err(ValidationError::invalid(
            "expiryDate",
            "cannot be before the issue date",
        )),
        _ => Ok(()),
    }
}

impl Entity for Certification {
    type Row = CertificationRow;
    type Draft = NewCertification;
    type Patch = CertificationPatch;

    const TABLE: &'static str = "certifications";
    const LABEL: &'static str = "certification";
    const ORDER: &'static [Order] = &[Order::desc("issue_date")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: CertificationRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            issuing_organization: row.issuing_organization.unwrap_or_default(),
            issue_date: row.issue_date.unwrap_or_else(super::epoch_date),
            expiry_date: row.expiry_date,
            credential_id: non_empty(row.credential_id),
            credential_url: non_empty(row.credential_url),
            description: non_empty(row.description),
        }
    }

    fn to_row(&self) -> CertificationRow {
        CertificationRow {
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            issuing_organization: Some(self.issuing_organization.clone()),
            issue_date: Some(self.issue_date),
            expiry_date: self.expiry_date,
            credential_id: self.credential_id.clone(),
            credential_url: self.credential_url.clone(),
            description: self.description.clone(),
        }
    }

    fn draft_row(draft: &NewCertification) -> Value {
        PartialRow::new()
            .put("name", &draft.name.trim())
            .put("issuing_organization", &draft.issuing_organization.trim())
            .put("issue_date", &draft.issue_date)
            .put("expiry_date", &draft.expiry_date)
            .put("credential_id", &non_empty(draft.credential_id.clone()))
            .put("credential_url", &non_empty(draft.credential_url.clone()))
            .put("description", &non_empty(draft.description.clone()))
            .into_value()
    }

    fn echo(local_id: String, draft: &NewCertification) -> Self {
        Self {
            id: local_id,
            name: draft.name.trim().to_string(),
            issuing_organization: draft.issuing_organization.trim().to_string(),
            issue_date: draft.issue_date,
            expiry_date: draft.expiry_date,
            credential_id: non_empty(draft.credential_id.clone()),
            credential_url: non_empty(draft.credential_url.clone()),
            description: non_empty(draft.description.clone()),
        }
    }

    fn patch_row(patch: &CertificationPatch) -> Value {
        PartialRow::new()
            .set("name", &patch.name)
            .set("issuing_organization", &patch.issuing_organization)
            .set("issue_date", &patch.issue_date)
            .set_nullable("expiry_date", &patch.expiry_date)
            .set_text("credential_id", &patch.credential_id)
            .set_text("credential_url", &patch.credential_url)
            .set_text("description", &patch.description)
            .into_value()
    }

    fn apply(&mut self, patch: &CertificationPatch) {
        merge_field(&mut self.name, &patch.name);
        merge_field(&mut self.issuing_organization, &patch.issuing_organization);
        merge_field(&mut self.issue_date, &patch.issue_date);
        merge_nullable(&mut self.expiry_date, &patch.expiry_date);
        merge_text(&mut self.credential_id, &patch.credential_id);
        merge_text(&mut self.credential_url, &patch.credential_url);
        merge_text(&mut self.description, &patch.description);
    }

    fn validate_draft(draft: &NewCertification) -> Result<(), ValidationError> {
        require("name", &draft.name)?;
        require("issuingOrganization", &draft.issuing_organization)?;
        check_dates(draft.issue_date, draft.expiry_date)
    }

    fn validate_patch(patch: &CertificationPatch) -> Result<(), ValidationError> {
        require_if_set("name", &patch.name)?;
        require_if_set("issuingOrganization", &patch.issuing_organization)?;
        match (patch.issue_date, patch.expiry_date) {
            (Some(issue), Some(expiry)) => check_dates(issue, expiry),
            _ => Ok(()),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_dates(self.issue_date, self.expiry_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode;
    use serde_json::json;

    fn cert(expiry: Option<&str>) -> Certification {
        decode(json!({
            "id": "c1",
            "name": "Cloud Practitioner",
            "issuing_organization": "AWS",
            "issue_date": "2022-01-10",
            "expiry_date": expiry,
        }))
        .unwrap()
    }

    #[test]
    fn test_expiry_strictly_before_now_is_expired() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert!(cert(Some("2025-02-28")).is_expired(now));
        assert_eq!(cert(Some("2025-02-28")).status(now), CertificationStatus::Expired);
        assert!(!cert(Some("2026-01-01")).is_expired(now));
    }

    #[test]
    fn test_expiry_equal_to_now_or_absent_is_not_expired() {
        let midnight = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(!cert(Some("2025-03-01")).is_expired(midnight));
        assert!(!cert(None).is_expired(midnight));
        assert_eq!(cert(None).status(midnight), CertificationStatus::Active);
    }

    #[test]
    fn test_round_trip_keeps_dates() {
        let c = cert(Some("2025-02-28"));
        let row = serde_json::to_value(c.to_row()).unwrap();
        assert_eq!(row["issue_date"], "2022-01-10");
        assert_eq!(row["expiry_date"], "2025-02-28");
        assert_eq!(Certification::from_row(c.to_row()), c);
    }

    #[test]
    fn test_expiry_before_issue_is_rejected() {
        let draft = NewCertification {
            name: "X".to_string(),
            issuing_organization: "Y".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            credential_id: None,
            credential_url: None,
            description: None,
        };
        assert!(Certification::validate_draft(&draft).is_err());
    }

    #[test]
    fn test_null_expiry_in_patch_clears_it() {
        let patch: CertificationPatch =
            serde_json::from_value(json!({ "expiryDate": null })).unwrap();
        assert_eq!(patch.expiry_date, Some(None));
        assert_eq!(Certification::patch_row(&patch), json!({ "expiry_date": null }));

        let mut c = cert(Some("2025-02-28"));
        c.apply(&patch);
        assert_eq!(c.expiry_date, None);

        let untouched: CertificationPatch =
            serde_json::from_value(json!({ "name": "Renamed" })).unwrap();
        let mut c = cert(Some("2025-02-28"));
        c.apply(&untouched);
        assert_eq!(c.expiry_date, NaiveDate::from_ymd_opt(2025, 2, 28));
    }

    #[test]
    fn test_expiry_patch_is_checked_against_stored_issue_date() {
        let patch = CertificationPatch {
            expiry_date: Some(NaiveDate::from_ymd_opt(2021, 12, 31)),
            ..Default::default()
        };
        assert!(Certification::validate_patch(&patch).is_ok());

        let mut merged = cert(None);
        merged.apply(&patch);
        assert!(matches!(
            merged.validate(),
            Err(ValidationError::Invalid { field: "expiryDate", .. })
        ));
    }

    #[test]
    fn test_timestamp_issue_date_decodes() {
        let c: Certification = decode(json!({
            "id": "c2",
            "name": "Kubernetes",
            "issuing_organization": "CNCF",
            "issue_date": "2024-01-01T00:00:00+00:00",
        }))
        .unwrap();
        assert_eq!(c.issue_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
