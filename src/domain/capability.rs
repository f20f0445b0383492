//! Role to capability mapping.
//!
//! One data table consulted by the gate, instead of boolean checks spread
//! across call sites. Inactive admins never reach this table: the gate
//! treats them as having no role at all.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Owner,
    Operator,
    Auditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Access,
    ApprovePayments,
    ManageBalances,
    ManageUsers,
    ManageWallets,
    ManageConfig,
    Broadcast,
}

pub const ALL_CAPABILITIES: [Capability; 7] = [
    Capability::Access,
    Capability::ApprovePayments,
    Capability::ManageBalances,
    Capability::ManageUsers,
    Capability::ManageWallets,
    Capability::ManageConfig,
    Capability::Broadcast,
];

impl AdminRole {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            AdminRole::Owner => &ALL_CAPABILITIES,
            AdminRole::Operator => &[Capability::Access, Capability::ApprovePayments],
            AdminRole::Auditor => &[Capability::Access],
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_holds_every_capability() {
        for cap in ALL_CAPABILITIES {
            assert!(AdminRole::Owner.grants(cap), "owner must grant {cap:?}");
        }
    }

    #[test]
    fn operator_approves_but_never_manages() {
        assert!(AdminRole::Operator.grants(Capability::Access));
        assert!(AdminRole::Operator.grants(Capability::ApprovePayments));
        for cap in [
            Capability::ManageBalances,
            Capability::ManageUsers,
            Capability::ManageWallets,
            Capability::ManageConfig,
            Capability::Broadcast,
        ] {
            assert!(!AdminRole::Operator.grants(cap), "operator must not grant {cap:?}");
        }
    }

    #[test]
    fn auditor_only_reads() {
        for cap in ALL_CAPABILITIES {
            let expected = cap == Capability::Access;
            assert_eq!(AdminRole::Auditor.grants(cap), expected, "{cap:?}");
        }
    }
}
