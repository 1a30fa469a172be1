//! Node state guard: preconditions checked before any transition step runs.

use anyhow::{Context, Result};
use nodeops_core::config::NodePaths;
use nodeops_core::error::NodeError;

use crate::store;

/// Lifecycle state as read at transition entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Initialized,
}

impl NodeState {
    /// The allocation file is only written at the successful end of a
    /// provisioning transition, so its presence is the initialization witness.
    pub fn read(paths: &NodePaths) -> Self {
        if paths.resource_allocation().exists() {
            NodeState::Initialized
        } else {
            NodeState::Uninitialized
        }
    }

    pub fn require_inited(self) -> Result<(), NodeError> {
        match self {
            NodeState::Initialized => Ok(()),
            NodeState::Uninitialized => Err(NodeError::NotInited),
        }
    }

    pub fn require_not_inited(self) -> Result<(), NodeError> {
        match self {
            NodeState::Uninitialized => Ok(()),
            NodeState::Initialized => Err(NodeError::AlreadyInited),
        }
    }
}

pub fn is_node_inited(paths: &NodePaths) -> bool {
    NodeState::read(paths) == NodeState::Initialized
}

pub fn check_inited(paths: &NodePaths) -> Result<(), NodeError> {
    NodeState::read(paths).require_inited()
}

pub fn check_not_inited(paths: &NodePaths) -> Result<(), NodeError> {
    NodeState::read(paths).require_not_inited()
}

/// Passes for the superuser, for the recorded uid, or when no uid is recorded yet.
pub fn check_user(paths: &NodePaths, uid: u32) -> Result<()> {
    if uid == 0 {
        return Ok(());
    }
    let Some(recorded) = store::read_value(&paths.authorized_user())? else {
        return Ok(());
    };
    let expected: u32 = recorded
        .parse()
        .with_context(|| format!("Corrupt authorized user record: {recorded}"))?;
    if expected != uid {
        return Err(NodeError::BadUser {
            expected,
            actual: uid,
        }
        .into());
    }
    Ok(())
}

/// Remember `uid` as the operator allowed to run transitions.
pub fn record_user(paths: &NodePaths, uid: u32) -> Result<()> {
    store::write_value(&paths.authorized_user(), &uid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inited_follows_allocation_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());
        std::fs::create_dir_all(paths.node_data_dir()).unwrap();
        std::fs::write(paths.meta(), "{}").unwrap();
        std::fs::write(paths.node_options(), "{}").unwrap();
        assert!(!is_node_inited(&paths));

        std::fs::write(paths.resource_allocation(), "{}").unwrap();
        assert!(is_node_inited(&paths));

        std::fs::remove_file(paths.resource_allocation()).unwrap();
        assert!(!is_node_inited(&paths));
    }

    #[test]
    fn test_state_guards() {
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());
        assert!(matches!(check_inited(&paths), Err(NodeError::NotInited)));
        assert!(check_not_inited(&paths).is_ok());

        std::fs::create_dir_all(paths.node_data_dir()).unwrap();
        std::fs::write(paths.resource_allocation(), "{}").unwrap();
        assert!(check_inited(&paths).is_ok());
        assert!(matches!(check_not_inited(&paths), Err(NodeError::AlreadyInited)));
    }

    #[test]
    fn test_check_user() {
        let dir = tempfile::tempdir().unwrap();
        let paths = NodePaths::new(dir.path());

        // nothing recorded yet
        assert!(check_user(&paths, 1000).is_ok());

        record_user(&paths, 1000).unwrap();
        assert!(check_user(&paths, 1000).is_ok());
        assert!(check_user(&paths, 0).is_ok());

        let err = check_user(&paths, 1001).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NodeError>(),
            Some(NodeError::BadUser {
                expected: 1000,
                actual: 1001
            })
        ));
    }
}
