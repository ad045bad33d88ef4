//! The external directory: group membership and the full user listing.
//!
//! Parlor doesn't manage groups or user accounts. It asks a [`Directory`]
//! which usernames belong to a group and who all the known users are.
//! Production deployments back this with whatever owns the accounts;
//! [`MemoryDirectory`] covers demos and tests.

use std::collections::HashMap;
use std::future::Future;

use parlor_protocol::{User, Username};

use crate::RegistryError;

/// Resolves groups and lists users.
///
/// `Send + Sync + 'static` because one directory is shared by every
/// session task through the registry.
pub trait Directory: Send + Sync + 'static {
    /// Members of `group`. Unknown groups resolve to an empty list.
    fn group_members(
        &self,
        group: &str,
    ) -> impl Future<Output = Result<Vec<Username>, RegistryError>> + Send;

    /// Every registered user, online or not.
    fn all_users(
        &self,
    ) -> impl Future<Output = Result<Vec<User>, RegistryError>> + Send;
}

/// A fixed, in-memory [`Directory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    users: Vec<User>,
    groups: HashMap<String, Vec<Username>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user to the full listing.
    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Defines a group and its members.
    pub fn with_group<I, U>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Username>,
    {
        self.groups.insert(
            name.to_owned(),
            members.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl Directory for MemoryDirectory {
    async fn group_members(
        &self,
        group: &str,
    ) -> Result<Vec<Username>, RegistryError> {
        Ok(self.groups.get(group).cloned().unwrap_or_default())
    }

    async fn all_users(&self) -> Result<Vec<User>, RegistryError> {
        Ok(self.users.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_members_known_and_unknown() {
        let dir = MemoryDirectory::new().with_group("team", ["alice", "bob"]);

        let members = dir.group_members("team").await.unwrap();
        assert_eq!(members, vec![Username::new("alice"), Username::new("bob")]);

        assert!(dir.group_members("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_users_lists_in_insertion_order() {
        let dir = MemoryDirectory::new()
            .with_user(User::new("bob"))
            .with_user(User::new("alice"));

        let users = dir.all_users().await.unwrap();
        assert_eq!(users[0].username.as_str(), "bob");
        assert_eq!(users.len(), 2);
    }
}
