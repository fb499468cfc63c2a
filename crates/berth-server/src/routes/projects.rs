//! Project, environment, and resource creation routes.
//!
//! Every handler works on the caller's own hierarchy document. Mutations go
//! through [`HierarchyStore::update`](berth_core::store::HierarchyStore::update),
//! so a failed edit writes nothing.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use berth_core::hierarchy::{Environment, Project, ProjectSummary, Resource};
use berth_core::session::Session;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

/// Request body for creating a project.
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for creating an environment.
#[derive(Debug, Deserialize)]
pub struct CreateEnvironmentRequest {
    pub name: String,
}

/// Request body for creating a resource.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    #[serde(default)]
    pub server_id: Option<Uuid>,
}

/// Query for the resource creation link. An empty `serverId` means none.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLinkQuery {
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Response for project listing.
#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
    pub revision: u64,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub href: String,
}

/// Build the projects router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).delete(delete_project),
        )
        .route(
            "/projects/{project_id}/environments",
            post(create_environment),
        )
        .route(
            "/projects/{project_id}/environments/{environment_id}",
            delete(delete_environment),
        )
        .route(
            "/projects/{project_id}/environments/{environment_id}/resources",
            post(create_resource),
        )
        .route(
            "/projects/{project_id}/environments/{environment_id}/resources/new-link",
            get(new_resource_link),
        )
}

/// `GET /projects`: summaries plus the document revision.
async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<ProjectListResponse>, AppError> {
    let snapshot = state.hierarchy.load(&session).await?;
    Ok(Json(ProjectListResponse {
        projects: snapshot.hierarchy.list_projects(),
        revision: snapshot.revision,
    }))
}

/// `POST /projects`: create an empty project.
async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    AppJson(body): AppJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let (project, _) = state
        .hierarchy
        .update(&session, |tree| {
            tree.create_project(&body.name, &body.description)
                .cloned()
                .map_err(AppError::from)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /projects/{project_id}`: the full project tree.
async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let snapshot = state.hierarchy.load(&session).await?;
    let project = snapshot.hierarchy.project(project_id)?.clone();
    Ok(Json(project))
}

/// `DELETE /projects/{project_id}`: remove a project and everything in it.
async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .hierarchy
        .update(&session, |tree| {
            tree.delete_project(project_id).map_err(AppError::from)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /projects/{project_id}/environments`: add an environment.
async fn create_environment(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(project_id): Path<Uuid>,
    AppJson(body): AppJson<CreateEnvironmentRequest>,
) -> Result<(StatusCode, Json<Environment>), AppError> {
    let (environment, _) = state
        .hierarchy
        .update(&session, |tree| {
            tree.create_environment(project_id, &body.name)
                .cloned()
                .map_err(AppError::from)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(environment)))
}

/// `DELETE /projects/{project_id}/environments/{environment_id}`
async fn delete_environment(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((project_id, environment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .hierarchy
        .update(&session, |tree| {
            tree.delete_environment(project_id, environment_id)
                .map_err(AppError::from)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /projects/{project_id}/environments/{environment_id}/resources`
async fn create_resource(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((project_id, environment_id)): Path<(Uuid, Uuid)>,
    AppJson(body): AppJson<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), AppError> {
    let (resource, _) = state
        .hierarchy
        .update(&session, |tree| {
            tree.create_resource(project_id, environment_id, body.server_id)
                .cloned()
                .map_err(AppError::from)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// `GET /projects/{project_id}/environments/{environment_id}/resources/new-link`
async fn new_resource_link(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((project_id, environment_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<NewLinkQuery>,
) -> Result<Json<LinkResponse>, AppError> {
    let server_id = match query.server_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<Uuid>()
                .map_err(|_| AppError::BadRequest(format!("invalid serverId '{raw}'")))?,
        ),
    };

    let snapshot = state.hierarchy.load(&session).await?;
    let href = snapshot
        .hierarchy
        .new_resource_link(project_id, environment_id, server_id)?;
    Ok(Json(LinkResponse { href }))
}
