//! Identity collaborator boundary.
//!
//! User identity is owned elsewhere; the lifecycle only needs an existence
//! check before a send or create mutates anything.

use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, username: &str) -> AppResult<bool>;
}

/// Fixed roster of known usernames (seeded from config, or from tests).
pub struct StaticUserDirectory {
    users: HashSet<String>,
}

impl StaticUserDirectory {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn user_exists(&self, username: &str) -> AppResult<bool> {
        Ok(self.users.contains(username))
    }
}

/// Directory used when no identity source is configured: any non-empty
/// username passes.
pub struct OpenUserDirectory;

#[async_trait]
impl UserDirectory for OpenUserDirectory {
    async fn user_exists(&self, username: &str) -> AppResult<bool> {
        Ok(!username.trim().is_empty())
    }
}
