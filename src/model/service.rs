use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{merge_field, require, require_if_set, string_list, Entity, PartialRow};
use crate::error::ValidationError;
use crate::gateway::Order;

/// Icon shown when a service row has none.
pub const DEFAULT_ICON: &str = "help-circle";

/// `services` table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub price: Option<f64>,
    pub featured: Option<bool>,
    #[serde(default, deserialize_with = "string_list")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub price: f64,
    pub featured: bool,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub price: Option<f64>,
    pub featured: Option<bool>,
    pub features: Option<Vec<String>>,
}

fn icon_or_default(icon: Option<String>) -> String {
    icon.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_string())
}

fn check_price(price: f64) -> Result<(), ValidationError> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid("price", "must be zero or more"))
    }
}

impl Entity for Service {
    type Row = ServiceRow;
    type Draft = NewService;
    type Patch = ServicePatch;

    const TABLE: &'static str = "services";
    const LABEL: &'static str = "service";
    const ORDER: &'static [Order] = &[Order::asc("created_at")];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: ServiceRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            icon: icon_or_default(row.icon),
            price: row.price.unwrap_or_default(),
            featured: row.featured.unwrap_or(false),
            features: row.features.unwrap_or_default(),
            created_at: row.created_at,
        }
    }

    fn to_row(&self) -> ServiceRow {
        ServiceRow {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            icon: Some(self.icon.clone()),
            price: Some(self.price),
            featured: Some(self.featured),
            features: Some(self.features.clone()),
            created_at: self.created_at,
        }
    }

    fn draft_row(draft: &NewService) -> Value {
        PartialRow::new()
            .put("title", &draft.title.trim())
            .put("description", &draft.description)
            .put("icon", &icon_or_default(draft.icon.clone()))
            .put("price", &draft.price)
            .put("featured", &draft.featured)
            .put("features", &draft.features)
            .into_value()
    }

    fn echo(local_id: String, draft: &NewService) -> Self {
        Self {
            id: local_id,
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            icon: icon_or_default(draft.icon.clone()),
            price: draft.price,
            featured: draft.featured,
            features: draft.features.clone(),
            created_at: Some(Utc::now()),
        }
    }

    fn patch_row(patch: &ServicePatch) -> Value {
        PartialRow::new()
            .set("title", &patch.title)
            .set("description", &patch.description)
            .set("icon", &patch.icon.clone().map(|i| icon_or_default(Some(i))))
            .set("price", &patch.price)
            .set("featured", &patch.featured)
            .set("features", &patch.features)
            .into_value()
    }

    fn apply(&mut self, patch: &ServicePatch) {
        merge_field(&mut self.title, &patch.title);
        merge_field(&mut self.description, &patch.description);
        if let Some(icon) = &patch.icon {
            self.icon = icon_or_default(Some(icon.clone()));
        }
        merge_field(&mut self.price, &patch.price);
        merge_field(&mut self.featured, &patch.featured);
        merge_field(&mut self.features, &patch.features);
    }

    fn validate_draft(draft: &NewService) -> Result<(), ValidationError> {
        require("title", &draft.title)?;
        check_price(draft.price)
    }

    fn validate_patch(patch: &ServicePatch) -> Result<(), ValidationError> {
        require_if_set("title", &patch.title)?;
        match patch.price {
            Some(price) => check_price(price),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode;
    use serde_json::json;

    #[test]
    fn test_missing_icon_uses_sentinel() {
        let service: Service = decode(json!({ "id": "s1", "title": "Design", "price": 100 })).unwrap();
        assert_eq!(service.icon, DEFAULT_ICON);
        assert!(service.features.is_empty());
        assert!(!service.featured);
        assert_eq!(service.price, 100.0);
    }

    #[test]
    fn test_features_decode_from_text_column() {
        let service: Service = decode(json!({
            "id": "s1", "title": "Design", "features": "Logo, Branding"
        }))
        .unwrap();
        assert_eq!(service.features, vec!["Logo", "Branding"]);
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let patch = ServicePatch {
            price: Some(-1.0),
            ..Default::default()
        };
        assert!(Service::validate_patch(&patch).is_err());

        let draft = NewService {
            title: "Audit".to_string(),
            price: 0.0,
            ..Default::default()
        };
        assert!(Service::validate_draft(&draft).is_ok());
    }

    #[test]
    fn test_domain_survives_row_round_trip() {
        let service = Service::echo(
            "s1".to_string(),
            &NewService {
                title: "Web".to_string(),
                description: "Sites".to_string(),
                icon: Some("globe".to_string()),
                price: 499.5,
                featured: true,
                features: vec!["SEO".to_string()],
            },
        );
        assert_eq!(Service::from_row(service.to_row()), service);
    }
}
