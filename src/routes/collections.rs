/**
 * Collection Routes
 * The same list/get/create/update/delete/refresh endpoints for every entity
 * collection held by the content store
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{AdminSession, ApiError, WriteQuery};
use crate::gateway::SiteGateway;
use crate::model::{self, Certification, Entity, Experience, Message, Project, Service, Skill, UserRole};
use crate::state::SharedState;
use crate::store::notify::capitalize;
use crate::store::{Collection, ContentStore};

/// An entity collection exposed over HTTP.
pub trait Routed: Entity + Serialize {
    /// Whether anonymous visitors may list and read the collection.
    const PUBLIC_READ: bool = true;

    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self>;
}

impl Routed for Project {
    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.projects()
    }
}

impl Routed for Service {
    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.services()
    }
}

impl Routed for Skill {
    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.skills()
    }
}

impl Routed for Certification {
    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.certifications()
    }
}

impl Routed for Experience {
    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.experiences()
    }
}

impl Routed for UserRole {
    const PUBLIC_READ: bool = false;

    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.user_roles()
    }
}

impl Routed for Message {
    const PUBLIC_READ: bool = false;

    fn collection(store: &ContentStore<SiteGateway>) -> &Collection<SiteGateway, Self> {
        store.messages()
    }
}

fn not_found<E: Entity>() -> ApiError {
    ApiError::NotFound(capitalize(E::LABEL))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// GET /api/{collection}
pub async fn list<E: Routed>(State(state): State<SharedState>) -> Json<Vec<E>> {
    Json(E::collection(&state.store).get_all())
}

/// GET /api/{collection} for admin-only collections
pub async fn admin_list<E: Routed>(
    State(state): State<SharedState>,
    _admin: AdminSession,
) -> Json<Vec<E>> {
    Json(E::collection(&state.store).get_all())
}

/// GET /api/{collection}/{id}
pub async fn get_one<E: Routed>(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<E>, ApiError> {
    E::collection(&state.store)
        .get(&id)
        .map(Json)
        .ok_or_else(not_found::<E>)
}

/// GET /api/{collection}/{id} for admin-only collections
pub async fn admin_get_one<E: Routed>(
    state: State<SharedState>,
    _admin: AdminSession,
    id: Path<String>,
) -> Result<Json<E>, ApiError> {
    get_one::<E>(state, id).await
}

/// POST /api/{collection}
///
/// Answers 202 with the local echo, or 201 with the stored entity when
/// `?wait=true`.
pub async fn create<E>(
    State(state): State<SharedState>,
    _admin: AdminSession,
    Query(query): Query<WriteQuery>,
    Json(draft): Json<E::Draft>,
) -> Result<(StatusCode, Json<E>), ApiError>
where
    E: Routed,
    E::Draft: DeserializeOwned,
{
    let collection = E::collection(&state.store);
    let pending = collection.add(draft)?;

    if !query.wait {
        if let Some(echo) = collection.get(pending.id()) {
            return Ok((StatusCode::ACCEPTED, Json(echo)));
        }
    }

    let local_id = pending.id().to_string();
    let stored_id = pending.settled().await?;
    collection
        .get(&stored_id)
        .or_else(|| collection.get(&local_id))
        .map(|entity| (StatusCode::CREATED, Json(entity)))
        .ok_or_else(not_found::<E>)
}

/// PATCH /api/{collection}/{id}
pub async fn update<E>(
    State(state): State<SharedState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Query(query): Query<WriteQuery>,
    Json(patch): Json<E::Patch>,
) -> Result<(StatusCode, Json<E>), ApiError>
where
    E: Routed,
    E::Patch: DeserializeOwned,
{
    let collection = E::collection(&state.store);
    let pending = collection.update(&id, patch)?.ok_or_else(not_found::<E>)?;

    if !query.wait {
        return collection
            .get(&id)
            .map(|entity| (StatusCode::ACCEPTED, Json(entity)))
            .ok_or_else(not_found::<E>);
    }

    // An update on an echo lands on the id the create stored it under.
    let stored_id = pending.settled().await?;
    collection
        .get(&stored_id)
        .or_else(|| collection.get(&id))
        .map(|entity| (StatusCode::OK, Json(entity)))
        .ok_or_else(not_found::<E>)
}

/// DELETE /api/{collection}/{id}
pub async fn remove<E: Routed>(
    State(state): State<SharedState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Query(query): Query<WriteQuery>,
) -> Result<StatusCode, ApiError> {
    let pending = E::collection(&state.store)
        .remove(&id)
        .ok_or_else(not_found::<E>)?;

    if query.wait {
        pending.settled().await?;
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::ACCEPTED)
    }
}

/// POST /api/{collection}/refresh
pub async fn refresh<E: Routed>(
    State(state): State<SharedState>,
    _admin: AdminSession,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = E::collection(&state.store).refresh().await?;
    Ok(Json(RefreshResponse { count }))
}

#[derive(Debug, Serialize)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<Skill>,
}

/// GET /api/skills/grouped
pub async fn grouped_skills(State(state): State<SharedState>) -> Json<Vec<SkillGroup>> {
    let skills = state.store.skills().get_all();
    Json(
        model::skill::group_by_category(&skills)
            .into_iter()
            .map(|(category, skills)| SkillGroup { category, skills })
            .collect(),
    )
}

/// Every endpoint for one collection mounted under `path`.
pub fn routes<E>(path: &str) -> Router<SharedState>
where
    E: Routed,
    E::Draft: DeserializeOwned,
    E::Patch: DeserializeOwned,
{
    let (list_route, item_route): (MethodRouter<SharedState>, MethodRouter<SharedState>) =
        if E::PUBLIC_READ {
            (get(list::<E>), get(get_one::<E>))
        } else {
            (get(admin_list::<E>), get(admin_get_one::<E>))
        };

    Router::new()
        .route(path, list_route.post(create::<E>))
        .route(
            &format!("{}/{{id}}", path),
            item_route.patch(update::<E>).delete(remove::<E>),
        )
        .route(&format!("{}/refresh", path), post(refresh::<E>))
}
