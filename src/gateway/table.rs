//! Typed per-entity gateway operations, going through the mapping layer.

use super::{Filter, Gateway, GatewayResult, Order};
use crate::model::section::{ContentSection, SectionName, SECTIONS_TABLE, SECTION_KEY};
use crate::model::{decode, Entity};

/// Decodes each row on its own; rows that do not fit the entity are logged
/// and left out so one bad row does not hide the rest of the table.
fn decode_rows<E: Entity>(rows: Vec<serde_json::Value>) -> Vec<E> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.get("id").map(|id| id.to_string()).unwrap_or_default();
        match decode::<E>(row) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!(table = E::TABLE, id = %id, error = %e, "Skipping undecodable row");
            }
        }
    }
    items
}

/// All rows of `E`, in `order` or the entity's default order.
pub async fn list_all<E: Entity, G: Gateway>(
    gateway: &G,
    order: Option<&[Order]>,
) -> GatewayResult<Vec<E>> {
    let rows = gateway
        .select(E::TABLE, None, order.unwrap_or(E::ORDER))
        .await?;
    Ok(decode_rows::<E>(rows))
}

pub async fn get_by_id<E: Entity, G: Gateway>(gateway: &G, id: &str) -> GatewayResult<E> {
    let row = gateway.select_one(E::TABLE, id).await?;
    Ok(decode::<E>(row)?)
}

pub async fn find_by<E: Entity, G: Gateway>(
    gateway: &G,
    column: &str,
    value: &str,
) -> GatewayResult<Vec<E>> {
    let rows = gateway
        .select(E::TABLE, Some(&Filter::eq(column, value)), E::ORDER)
        .await?;
    Ok(decode_rows::<E>(rows))
}

pub async fn create<E: Entity, G: Gateway>(gateway: &G, draft: &E::Draft) -> GatewayResult<E> {
    let row = gateway.insert(E::TABLE, E::draft_row(draft)).await?;
    Ok(decode::<E>(row)?)
}

pub async fn update<E: Entity, G: Gateway>(
    gateway: &G,
    id: &str,
    patch: &E::Patch,
) -> GatewayResult<E> {
    let row = gateway.update(E::TABLE, id, E::patch_row(patch)).await?;
    Ok(decode::<E>(row)?)
}

pub async fn delete<E: Entity, G: Gateway>(gateway: &G, id: &str) -> GatewayResult<()> {
    gateway.delete(E::TABLE, id).await
}

/// Every stored section row whose name is known; unknown names are skipped.
pub async fn list_sections<G: Gateway>(gateway: &G) -> GatewayResult<Vec<ContentSection>> {
    let rows = gateway.select(SECTIONS_TABLE, None, &[]).await?;
    let mut sections = Vec::with_capacity(rows.len());
    for row in rows {
        let section: ContentSection = match serde_json::from_value(row) {
            Ok(section) => section,
            Err(e) => {
                tracing::warn!(table = SECTIONS_TABLE, error = %e, "Skipping undecodable row");
                continue;
            }
        };
        if section.name().is_some() {
            sections.push(section);
        } else {
            tracing::debug!(section = %section.section_name, "Skipping unknown content section");
        }
    }
    Ok(sections)
}

pub async fn upsert_section<G: Gateway>(
    gateway: &G,
    name: SectionName,
    content: serde_json::Value,
) -> GatewayResult<ContentSection> {
    let row = serde_json::to_value(ContentSection::new(name, content))?;
    let stored = gateway.upsert(SECTIONS_TABLE, SECTION_KEY, row).await?;
    Ok(serde_json::from_value(stored)?)
}
