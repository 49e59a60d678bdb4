//! Payee service
//!
//! Payees are created on demand by name: manual entry and import commit both
//! resolve a typed payee name to an existing payee or make a new one.

use uuid::Uuid;

use crate::audit::{AuditEntry, EntityType};
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{Payee, PayeeId, PayeeRecord};
use crate::storage::Storage;

/// Service for payee management
pub struct PayeeService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

impl<'a> PayeeService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    pub fn get(&self, id: PayeeId) -> StrongboxResult<Option<Payee>> {
        self.storage
            .payees
            .get(id)?
            .map(|record| record.open(self.session))
            .transpose()
    }

    pub fn list(&self) -> StrongboxResult<Vec<Payee>> {
        let mut payees = self
            .storage
            .payees
            .all()?
            .iter()
            .map(|record| record.open(self.session))
            .collect::<StrongboxResult<Vec<_>>>()?;
        payees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(payees)
    }

    /// Exact-name lookup
    pub fn find_by_name(&self, name: &str) -> StrongboxResult<Option<Payee>> {
        let name = name.trim();
        for record in self.storage.payees.all()? {
            let payee = record.open(self.session)?;
            if payee.name == name {
                return Ok(Some(payee));
            }
        }
        Ok(None)
    }

    /// Return the payee with this name, creating it if needed
    pub fn find_or_create(&self, name: &str, batch_id: Option<Uuid>) -> StrongboxResult<Payee> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StrongboxError::Validation("Payee name cannot be empty".into()));
        }
        if let Some(existing) = self.find_by_name(name)? {
            return Ok(existing);
        }

        let record = self.storage.payees.insert(PayeeRecord::seal(self.session, name)?)?;
        self.storage.log(
            &AuditEntry::create(EntityType::Payee, record.id.to_string()).in_batch(batch_id),
        )?;
        record.open(self.session)
    }
}
