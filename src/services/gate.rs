//! Admin capability gate.
//!
//! Resolves a calling actor to an `admins` row and checks the role's
//! capability table. Every mutating ledger entry point except `create`
//! consults this before opening a store transaction, so a denial never
//! partially applies a mutation.

use sqlx::PgPool;

use crate::db::models::Admin;
use crate::db::queries;
use crate::domain::capability::Capability;
use crate::error::LedgerError;

/// Identity invoking a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Background processes (the reaper). Trusted, bypasses resolution.
    System,
    /// An admin identified by handle, resolved against the admins table.
    Handle(String),
}

impl Actor {
    /// Name recorded in audit entries and webhook payloads.
    pub fn audit_name(&self) -> String {
        match self {
            Actor::System => "system".to_string(),
            Actor::Handle(handle) => format!("@{}", handle.trim_start_matches('@')),
        }
    }
}

#[derive(Clone)]
pub struct CapabilityGate {
    pool: PgPool,
}

impl CapabilityGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks up an admin by handle. Inactive admins resolve to `None`:
    /// they hold no capabilities at all.
    pub async fn resolve(&self, handle: &str) -> Result<Option<Admin>, LedgerError> {
        let handle = handle.trim_start_matches('@');
        let admin = queries::get_admin_by_handle(&self.pool, handle).await?;
        Ok(admin.filter(|a| a.active))
    }

    /// Returns the resolved admin when the actor holds `capability`,
    /// `Denied` otherwise. `Actor::System` passes without a record.
    pub async fn require(
        &self,
        actor: &Actor,
        capability: Capability,
    ) -> Result<Option<Admin>, LedgerError> {
        match actor {
            Actor::System => Ok(None),
            Actor::Handle(handle) => {
                let admin = self.resolve(handle).await?.ok_or(LedgerError::Denied)?;
                if admin.role.grants(capability) {
                    Ok(Some(admin))
                } else {
                    tracing::warn!(
                        handle = %admin.handle,
                        role = ?admin.role,
                        capability = ?capability,
                        "capability denied"
                    );
                    Err(LedgerError::Denied)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_name_normalizes_handles() {
        assert_eq!(Actor::System.audit_name(), "system");
        assert_eq!(Actor::Handle("ops".into()).audit_name(), "@ops");
        assert_eq!(Actor::Handle("@ops".into()).audit_name(), "@ops");
    }
}
