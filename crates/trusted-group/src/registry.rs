/// MembershipRegistry — the owner-controlled member set.
///
/// Grow-only for the lifetime of a group: the owner is fixed at creation,
/// members are added by the owner and never removed. Access checks are
/// pure functions over `(caller, operation)`.
use std::collections::HashSet;

use crate::types::{AccountId, Operation};
use crate::GroupError;

/// Why a caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    NotMember,
}

/// Result of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied(DenyReason),
}

impl Permission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Permission::Granted)
    }
}

/// Authoritative membership state of one group.
#[derive(Debug, Clone)]
pub struct MembershipRegistry {
    owner: AccountId,
    /// Added members in insertion order (owner excluded).
    added: Vec<AccountId>,
    index: HashSet<AccountId>,
}

impl MembershipRegistry {
    /// Create a group owned by `owner`.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            added: Vec::new(),
            index: HashSet::new(),
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn is_owner(&self, id: &AccountId) -> bool {
        *id == self.owner
    }

    /// The owner is always a member.
    pub fn is_member(&self, id: &AccountId) -> bool {
        self.is_owner(id) || self.index.contains(id)
    }

    /// All members, owner first, then in the order they were added.
    pub fn members(&self) -> Vec<AccountId> {
        std::iter::once(self.owner.clone())
            .chain(self.added.iter().cloned())
            .collect()
    }

    pub fn member_count(&self) -> usize {
        1 + self.added.len()
    }

    /// Check whether `caller` may perform `operation`.
    pub fn authorize(&self, caller: &AccountId, operation: Operation) -> Permission {
        match operation {
            Operation::AddMember | Operation::SendToken => {
                if self.is_owner(caller) {
                    Permission::Granted
                } else {
                    Permission::Denied(DenyReason::NotOwner)
                }
            }
            Operation::RequestToken | Operation::Communicate => {
                if self.is_member(caller) {
                    Permission::Granted
                } else {
                    Permission::Denied(DenyReason::NotMember)
                }
            }
        }
    }

    /// `authorize` as a `Result`, for the mutating entry points.
    pub fn require(&self, caller: &AccountId, operation: Operation) -> Result<(), GroupError> {
        match self.authorize(caller, operation) {
            Permission::Granted => Ok(()),
            Permission::Denied(_) => Err(GroupError::PermissionDenied {
                caller: caller.clone(),
                operation,
            }),
        }
    }

    /// Add a member. Owner only.
    ///
    /// Returns `true` if the set changed; adding a present member is a
    /// no-op, not an error.
    pub fn add_member(&mut self, caller: &AccountId, id: AccountId) -> Result<bool, GroupError> {
        self.require(caller, Operation::AddMember)?;
        if self.is_member(&id) {
            return Ok(false);
        }
        self.index.insert(id.clone());
        self.added.push(id);
        Ok(true)
    }
}
