//! Resource and variable editor routes.
//!
//! Each editor operation returns the full new variable snapshot together
//! with the document revision it was saved at. Out-of-range indices leave
//! the variables unchanged.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch};
use axum::{Extension, Json, Router};
use berth_core::hierarchy::{DomainHierarchy, ResourceState};
use berth_core::resource_config::DeploymentEnv;
use berth_core::session::Session;
use berth_core::variables::{VariableDraft, VariableSet, VariableUpdate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

/// Request body for replacing a resource's variables.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceVariablesRequest {
    pub variables: Vec<VariableDraft>,
    /// Revision the client edited; omitted means "whatever is current".
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

/// A resource's variables at a given revision.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesResponse {
    pub resource_id: Uuid,
    pub revision: u64,
    pub state: ResourceState,
    pub variables: VariableSet,
}

/// Build the resources router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resources/{resource_id}", delete(delete_resource))
        .route(
            "/resources/{resource_id}/variables",
            get(get_variables)
                .put(replace_variables)
                .post(add_variable),
        )
        .route(
            "/resources/{resource_id}/variables/{index}",
            patch(update_variable).delete(remove_variable),
        )
        .route("/resources/{resource_id}/env", get(deployment_env))
}

/// `DELETE /resources/{resource_id}`: remove a resource and its config.
async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(resource_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .hierarchy
        .update(&session, |tree| {
            tree.delete_resource(resource_id).map_err(AppError::from)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /resources/{resource_id}/variables`
async fn get_variables(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<VariablesResponse>, AppError> {
    let snapshot = state.hierarchy.load(&session).await?;
    let resource = snapshot.hierarchy.resource(resource_id)?;
    Ok(Json(VariablesResponse {
        resource_id,
        revision: snapshot.revision,
        state: resource.state(),
        variables: resource.config.variables().clone(),
    }))
}

/// `PUT /resources/{resource_id}/variables`: replace the whole set.
///
/// Drafts carrying the id of an existing variable keep that variable's
/// identity. With `expectedRevision` the save fails with 409 if anything
/// else wrote the document since the client loaded it.
async fn replace_variables(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(resource_id): Path<Uuid>,
    AppJson(body): AppJson<ReplaceVariablesRequest>,
) -> Result<Json<VariablesResponse>, AppError> {
    let ReplaceVariablesRequest {
        variables: drafts,
        expected_revision,
    } = body;
    let count = drafts.len();
    let response = edit_variables(&state, &session, resource_id, expected_revision, |vars| {
        vars.reconcile(drafts)
    })
    .await?;

    debug!(%resource_id, count, revision = response.revision, "variables replaced");
    Ok(response)
}

/// `POST /resources/{resource_id}/variables`: append a blank variable.
async fn add_variable(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(resource_id): Path<Uuid>,
) -> Result<(StatusCode, Json<VariablesResponse>), AppError> {
    let response = edit_variables(&state, &session, resource_id, None, VariableSet::add).await?;
    Ok((StatusCode::CREATED, response))
}

/// `PATCH /resources/{resource_id}/variables/{index}`: edit one field.
async fn update_variable(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((resource_id, index)): Path<(Uuid, usize)>,
    AppJson(update): AppJson<VariableUpdate>,
) -> Result<Json<VariablesResponse>, AppError> {
    debug!(%resource_id, index, field = update.field(), "variable field update");
    edit_variables(&state, &session, resource_id, None, |vars| {
        vars.update_field(index, update)
    })
    .await
}

/// `DELETE /resources/{resource_id}/variables/{index}`
async fn remove_variable(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((resource_id, index)): Path<(Uuid, usize)>,
) -> Result<Json<VariablesResponse>, AppError> {
    edit_variables(&state, &session, resource_id, None, |vars| {
        vars.remove_at(index)
    })
    .await
}

/// `GET /resources/{resource_id}/env`: the flattened deployment env.
async fn deployment_env(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<DeploymentEnv>, AppError> {
    let snapshot = state.hierarchy.load(&session).await?;
    let env = snapshot.hierarchy.resource_config(resource_id)?.serialize()?;
    Ok(Json(env))
}

/// Apply `edit` to the resource's current set and save the result.
///
/// Without an expected revision the whole cycle runs under the store's
/// write lock; with one, the save is rejected if the document moved on.
async fn edit_variables(
    state: &AppState,
    session: &Session,
    resource_id: Uuid,
    expected_revision: Option<u64>,
    edit: impl FnOnce(&VariableSet) -> VariableSet,
) -> Result<Json<VariablesResponse>, AppError> {
    let apply = |tree: &mut DomainHierarchy| {
        let next = edit(tree.resource_config(resource_id)?.variables());
        let resource = tree.set_resource_variables(resource_id, next)?;
        Ok::<_, AppError>((resource.config.variables().clone(), resource.state()))
    };

    let ((variables, resource_state), revision) = match expected_revision {
        None => state.hierarchy.update(session, apply).await?,
        Some(expected) => {
            let mut tree = state.hierarchy.load(session).await?.hierarchy;
            let output = apply(&mut tree)?;
            (output, state.hierarchy.save(session, expected, &tree).await?)
        }
    };

    Ok(Json(VariablesResponse {
        resource_id,
        revision,
        state: resource_state,
        variables,
    }))
}
