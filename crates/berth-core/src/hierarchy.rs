//! The project → environment → resource tree.
//!
//! [`DomainHierarchy`] owns every node and is the only way to mutate them,
//! which keeps containment strict: an environment lives in exactly one
//! project, a resource in exactly one environment, and a resource's
//! configuration lives and dies with the resource. Callers only ever get
//! shared references back.
//!
//! Every mutation validates before it touches the tree, so a failed call
//! leaves the hierarchy exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::HierarchyError;
use crate::resource_config::ResourceConfig;
use crate::variables::VariableSet;

/// Top-level grouping of deployable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub environments: Vec<Environment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Resources across all environments.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.environments.iter().map(|e| e.resources.len()).sum()
    }

    fn environment_index(&self, environment_id: Uuid) -> Option<usize> {
        self.environments.iter().position(|e| e.id == environment_id)
    }
}

/// A named deployment context inside a project (staging, production, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub resources: Vec<Resource>,
    pub created_at: DateTime<Utc>,
}

/// A deployable unit, optionally pinned to a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    pub environment_id: Uuid,
    /// Server reference; the server registry lives elsewhere.
    pub server_id: Option<Uuid>,
    pub config: ResourceConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    #[must_use]
    pub fn state(&self) -> ResourceState {
        if self.config.is_configured() {
            ResourceState::Configured
        } else {
            ResourceState::Draft
        }
    }
}

/// Configuration readiness of a resource. Deployment states come later and
/// are tracked outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// No variable with a non-empty key yet.
    Draft,
    /// At least one variable has a key.
    Configured,
}

/// Listing row for one project, with the counts the dashboard badges show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub environment_count: usize,
    pub resource_count: usize,
    pub environments: Vec<EnvironmentSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSummary {
    pub id: Uuid,
    pub name: String,
    pub resource_count: usize,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            environment_count: project.environments.len(),
            resource_count: project.resource_count(),
            environments: project
                .environments
                .iter()
                .map(|e| EnvironmentSummary {
                    id: e.id,
                    name: e.name.clone(),
                    resource_count: e.resources.len(),
                })
                .collect(),
            created_at: project.created_at,
        }
    }
}

/// Position of a resource inside the tree.
#[derive(Debug, Clone, Copy)]
struct ResourcePath {
    project: usize,
    environment: usize,
    resource: usize,
}

/// The whole tree for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHierarchy {
    projects: Vec<Project>,
}

impl DomainHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects in creation order.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Summaries in creation order.
    #[must_use]
    pub fn list_projects(&self) -> Vec<ProjectSummary> {
        self.projects.iter().map(ProjectSummary::from).collect()
    }

    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown id.
    pub fn project(&self, project_id: Uuid) -> Result<&Project, HierarchyError> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| HierarchyError::not_found("project", project_id))
    }

    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown id.
    pub fn resource(&self, resource_id: Uuid) -> Result<&Resource, HierarchyError> {
        let path = self.locate_resource(resource_id)?;
        Ok(self.resource_at(path))
    }

    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown resource.
    pub fn resource_config(&self, resource_id: Uuid) -> Result<&ResourceConfig, HierarchyError> {
        self.resource(resource_id).map(|r| &r.config)
    }

    /// Append an empty project.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] if `name` is blank.
    pub fn create_project(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<&Project, HierarchyError> {
        let name = required("name", name)?;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name,
            description: description.trim().to_owned(),
            environments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!(project_id = %project.id, "project created");
        self.projects.push(project);
        Ok(&self.projects[self.projects.len() - 1])
    }

    /// Append an empty environment to a project.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Validation`] for a blank name and
    /// [`HierarchyError::NotFound`] for an unknown project.
    pub fn create_environment(
        &mut self,
        project_id: Uuid,
        name: &str,
    ) -> Result<&Environment, HierarchyError> {
        let name = required("name", name)?;
        let p = self.project_index(project_id)?;
        let now = Utc::now();
        let project = &mut self.projects[p];
        project.environments.push(Environment {
            id: Uuid::new_v4(),
            project_id,
            name,
            resources: Vec::new(),
            created_at: now,
        });
        project.updated_at = now;
        let environment = &project.environments[project.environments.len() - 1];
        debug!(%project_id, environment_id = %environment.id, "environment created");
        Ok(environment)
    }

    /// Append a resource with an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] if the project is unknown or the
    /// environment does not belong to it.
    pub fn create_resource(
        &mut self,
        project_id: Uuid,
        environment_id: Uuid,
        server_id: Option<Uuid>,
    ) -> Result<&Resource, HierarchyError> {
        let (p, e) = self.environment_path(project_id, environment_id)?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let project = &mut self.projects[p];
        project.updated_at = now;
        let environment = &mut project.environments[e];
        environment.resources.push(Resource {
            id,
            environment_id,
            server_id,
            config: ResourceConfig::new(id),
            created_at: now,
            updated_at: now,
        });
        debug!(%project_id, %environment_id, resource_id = %id, "resource created");
        Ok(&environment.resources[environment.resources.len() - 1])
    }

    /// Replace a resource's variables with a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown resource.
    pub fn set_resource_variables(
        &mut self,
        resource_id: Uuid,
        variables: VariableSet,
    ) -> Result<&Resource, HierarchyError> {
        let path = self.locate_resource(resource_id)?;
        let now = Utc::now();
        let project = &mut self.projects[path.project];
        project.updated_at = now;
        let resource = &mut project.environments[path.environment].resources[path.resource];
        resource.config.set_variables(variables);
        resource.updated_at = now;
        Ok(resource)
    }

    /// Remove a project with all its environments, resources, and configs.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown project.
    pub fn delete_project(&mut self, project_id: Uuid) -> Result<Project, HierarchyError> {
        let p = self.project_index(project_id)?;
        let removed = self.projects.remove(p);
        debug!(
            %project_id,
            environments = removed.environments.len(),
            resources = removed.resource_count(),
            "project deleted"
        );
        Ok(removed)
    }

    /// Remove an environment and its resources.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] if the environment is not in
    /// that project.
    pub fn delete_environment(
        &mut self,
        project_id: Uuid,
        environment_id: Uuid,
    ) -> Result<Environment, HierarchyError> {
        let (p, e) = self.environment_path(project_id, environment_id)?;
        let project = &mut self.projects[p];
        project.updated_at = Utc::now();
        Ok(project.environments.remove(e))
    }

    /// Remove a resource and its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] for an unknown resource.
    pub fn delete_resource(&mut self, resource_id: Uuid) -> Result<Resource, HierarchyError> {
        let path = self.locate_resource(resource_id)?;
        let project = &mut self.projects[path.project];
        project.updated_at = Utc::now();
        Ok(project.environments[path.environment]
            .resources
            .remove(path.resource))
    }

    /// Route a "new resource" action hands to navigation, after checking
    /// that the environment exists in the project.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotFound`] if the pair does not resolve.
    pub fn new_resource_link(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
        server_id: Option<Uuid>,
    ) -> Result<String, HierarchyError> {
        self.environment_path(project_id, environment_id)?;
        Ok(new_resource_link(project_id, environment_id, server_id))
    }

    fn project_index(&self, project_id: Uuid) -> Result<usize, HierarchyError> {
        self.projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or_else(|| HierarchyError::not_found("project", project_id))
    }

    fn environment_path(
        &self,
        project_id: Uuid,
        environment_id: Uuid,
    ) -> Result<(usize, usize), HierarchyError> {
        let p = self.project_index(project_id)?;
        let e = self.projects[p]
            .environment_index(environment_id)
            .ok_or_else(|| HierarchyError::not_found("environment", environment_id))?;
        Ok((p, e))
    }

    fn locate_resource(&self, resource_id: Uuid) -> Result<ResourcePath, HierarchyError> {
        for (p, project) in self.projects.iter().enumerate() {
            for (e, environment) in project.environments.iter().enumerate() {
                if let Some(r) = environment.resources.iter().position(|r| r.id == resource_id) {
                    return Ok(ResourcePath {
                        project: p,
                        environment: e,
                        resource: r,
                    });
                }
            }
        }
        Err(HierarchyError::not_found("resource", resource_id))
    }

    fn resource_at(&self, path: ResourcePath) -> &Resource {
        &self.projects[path.project].environments[path.environment].resources[path.resource]
    }
}

/// `/projects/{pid}/environments/{eid}/new?server={sid}&returnTo=/projects/{pid}`
#[must_use]
pub fn new_resource_link(project_id: Uuid, environment_id: Uuid, server_id: Option<Uuid>) -> String {
    let server = server_id.map(|id| id.to_string()).unwrap_or_default();
    let return_to = format!("/projects/{project_id}");
    format!(
        "/projects/{project_id}/environments/{environment_id}/new?server={}&returnTo={}",
        urlencoding::encode(&server),
        urlencoding::encode(&return_to),
    )
}

fn required(field: &'static str, value: &str) -> Result<String, HierarchyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HierarchyError::Validation {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}
