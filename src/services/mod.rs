//! Service layer for Research Hub.
//!
//! Contains the business logic behind the HTTP handlers:
//! - Auth (OAuth sign-in, user registration, sessions)
//! - Projects (project documents and their embedded arrays)

mod auth;
mod projects;

pub use auth::{AuthService, AuthorizationUrl, ProviderInfo, ProviderUser, SignIn};
pub use projects::{NewProject, NewResource, NewTask, ProjectService};
