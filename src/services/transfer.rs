//! Transfer service
//!
//! Maintains the bidirectional links between the two legs of a transfer.
//! Both legs are rewritten in a single atomic store write, so a link is
//! either fully present or absent on disk. `repair_links` clears one-sided
//! links found in data written by anything that did not hold to that.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, EntityType};
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{
    KindTag, LinkStatus, Transaction, TransactionId, TransactionKind, TransactionRecord,
};
use crate::storage::{RecordGuard, Storage};

/// Service for linking transfer legs
pub struct TransferService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

/// A selected transfer that auto-link could not pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTransfer {
    pub id: TransactionId,
    /// Number of matching candidates: zero or more than one
    pub candidates: usize,
}

impl UnresolvedTransfer {
    pub fn to_error(&self) -> StrongboxError {
        StrongboxError::AmbiguousMatch {
            id: self.id.to_string(),
            candidates: self.candidates,
        }
    }
}

/// Outcome of an auto-link run
#[derive(Debug, Clone, Default)]
pub struct AutoLinkReport {
    /// Pairs linked by this run, selected leg first
    pub linked: Vec<(TransactionId, TransactionId)>,
    /// Selected transfers left unlinked because the match was not unique
    pub unresolved: Vec<UnresolvedTransfer>,
    /// Selected ids that were not unlinked transfers when their turn came
    pub skipped: Vec<TransactionId>,
}

/// A link that pointed at a partner which did not point back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialLinkFinding {
    pub id: TransactionId,
    pub partner: TransactionId,
}

impl PartialLinkFinding {
    pub fn to_error(&self) -> StrongboxError {
        StrongboxError::PartialLink {
            id: self.id.to_string(),
            partner: self.partner.to_string(),
        }
    }
}

impl<'a> TransferService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    /// Load a record that must be a transfer, with its current link state
    fn load_transfer(&self, id: TransactionId) -> StrongboxResult<(TransactionRecord, LinkStatus)> {
        let record = self.storage.transactions.require(id)?;
        match record.open_kind(self.session)? {
            TransactionKind::Transfer(status) => Ok((record, status)),
            _ => Err(StrongboxError::Validation(format!(
                "Transaction {} is not a transfer",
                id
            ))),
        }
    }

    fn link_entry(id: TransactionId, summary: String) -> AuditEntry {
        AuditEntry::update(EntityType::Transaction, id.to_string()).with_summary(summary)
    }

    fn audit_link(&self, id: TransactionId, summary: String) -> StrongboxResult<()> {
        self.storage.log(&Self::link_entry(id, summary))
    }

    /// Link two unlinked transfers to each other
    ///
    /// Linking a pair that is already linked to each other is a no-op.
    /// Either leg being linked elsewhere is an error; use `set_link_target`
    /// to move a link.
    pub fn link(&self, a: TransactionId, b: TransactionId) -> StrongboxResult<()> {
        if a == b {
            return Err(StrongboxError::Validation(
                "A transfer cannot be linked to itself".into(),
            ));
        }

        let _guard = self.storage.locks().acquire(&[a, b])?;
        let (mut record_a, status_a) = self.load_transfer(a)?;
        let (mut record_b, status_b) = self.load_transfer(b)?;

        if status_a == LinkStatus::LinkedTo(b) && status_b == LinkStatus::LinkedTo(a) {
            return Ok(());
        }
        for (id, status, other) in [(a, status_a, b), (b, status_b, a)] {
            if let LinkStatus::LinkedTo(partner) = status {
                if partner != other {
                    return Err(StrongboxError::Validation(format!(
                        "Transaction {} is already linked to {}; unlink it first",
                        id, partner
                    )));
                }
            }
        }

        record_a.reseal_link(self.session, LinkStatus::LinkedTo(b))?;
        record_b.reseal_link(self.session, LinkStatus::LinkedTo(a))?;
        self.storage.transactions.update_many(vec![record_a, record_b])?;

        self.storage.log_batch(&[
            Self::link_entry(a, format!("linked to {}", b)),
            Self::link_entry(b, format!("linked to {}", a)),
        ])?;
        info!(a = %a, b = %b, "Linked transfer pair");
        Ok(())
    }

    /// Hold `id` together with its current link partner
    ///
    /// The partner is read, both ids are locked, and the record is read
    /// again; if the link moved in between, the lock is released and the
    /// whole step repeats. The returned record is current for as long as
    /// the guard lives.
    pub(crate) fn lock_with_partner(
        &self,
        id: TransactionId,
    ) -> StrongboxResult<(RecordGuard<'a>, TransactionRecord, Option<TransactionId>)> {
        loop {
            let partner = self
                .storage
                .transactions
                .require(id)?
                .open_kind(self.session)?
                .link_partner();

            let mut ids = vec![id];
            ids.extend(partner);
            let guard = self.storage.locks().acquire(&ids)?;

            let record = self.storage.transactions.require(id)?;
            if record.open_kind(self.session)?.link_partner() == partner {
                return Ok((guard, record, partner));
            }
            debug!(id = %id, "Link changed while waiting for the lock");
        }
    }

    /// Clear a transfer's link and its partner's link back
    ///
    /// Returns the former partner, if there was one. A partner that does not
    /// point back is left untouched.
    pub fn unlink(&self, id: TransactionId) -> StrongboxResult<Option<TransactionId>> {
        let (_guard, record, _) = self.lock_with_partner(id)?;
        self.unlink_locked(record)
    }

    /// `unlink` for a caller that already holds the record and its partner
    pub(crate) fn unlink_locked(&self, mut record: TransactionRecord) -> StrongboxResult<Option<TransactionId>> {
        let id = record.id;
        let TransactionKind::Transfer(status) = record.open_kind(self.session)? else {
            return Err(StrongboxError::Validation(format!(
                "Transaction {} is not a transfer",
                id
            )));
        };
        let Some(partner) = status.partner() else {
            return Ok(None);
        };
        debug_assert!(self.storage.locks().is_held(id) && self.storage.locks().is_held(partner));

        record.reseal_link(self.session, LinkStatus::Unlinked)?;
        let mut updates = vec![record];
        match self.storage.transactions.get(partner)? {
            Some(mut other)
                if other.kind == KindTag::Transfer
                    && other.open_kind(self.session)?
                        == TransactionKind::Transfer(LinkStatus::LinkedTo(id)) =>
            {
                other.reseal_link(self.session, LinkStatus::Unlinked)?;
                updates.push(other);
            }
            _ => warn!(id = %id, partner = %partner, "Partner did not link back"),
        }
        let both = updates.len() == 2;
        self.storage.transactions.update_many(updates)?;

        let mut entries = vec![Self::link_entry(id, format!("unlinked from {}", partner))];
        if both {
            entries.push(Self::link_entry(partner, format!("unlinked from {}", id)));
        }
        self.storage.log_batch(&entries)?;
        info!(id = %id, partner = %partner, "Unlinked transfer pair");
        Ok(Some(partner))
    }

    /// Point a transfer at a new partner, or at none
    ///
    /// Runs as three explicit steps: find the previous partner, unlink it if
    /// the target changed, then link the new partner (first releasing the
    /// new partner from any other link it held).
    pub fn set_link_target(
        &self,
        id: TransactionId,
        target: Option<TransactionId>,
    ) -> StrongboxResult<()> {
        let (_, status) = self.load_transfer(id)?;
        let previous = status.partner();
        if previous == target {
            return Ok(());
        }

        if let Some(target) = target {
            // Fail before touching anything if the target is unusable
            if target == id {
                return Err(StrongboxError::Validation(
                    "A transfer cannot be linked to itself".into(),
                ));
            }
            self.load_transfer(target)?;
        }

        if previous.is_some() {
            self.unlink(id)?;
        }

        if let Some(target) = target {
            let (_, target_status) = self.load_transfer(target)?;
            if target_status.partner().is_some() {
                self.unlink(target)?;
            }
            self.link(id, target)?;
        }
        Ok(())
    }

    /// Every transfer that currently has no partner
    pub fn unlinked_transfers(&self) -> StrongboxResult<Vec<Transaction>> {
        let mut result = Vec::new();
        for record in self.storage.transactions.all()? {
            if record.kind != KindTag::Transfer {
                continue;
            }
            let txn = record.open(self.session)?;
            if txn.is_unlinked_transfer() {
                result.push(txn);
            }
        }
        Ok(result)
    }

    /// Pair each selected transfer with its unique match, if it has one
    ///
    /// A candidate is any other unlinked transfer with the same absolute
    /// amount, a different account, and a date within `window_days`. A
    /// selected row is linked only when exactly one candidate exists; zero
    /// or several are reported as unresolved.
    pub fn auto_link_selected(
        &self,
        selected: &[TransactionId],
        window_days: i64,
    ) -> StrongboxResult<AutoLinkReport> {
        let pool = self.unlinked_transfers()?;
        let mut taken: HashSet<TransactionId> = HashSet::new();
        let mut report = AutoLinkReport::default();

        for &id in selected {
            if taken.contains(&id) {
                continue;
            }
            let Some(subject) = pool.iter().find(|t| t.id == id) else {
                report.skipped.push(id);
                continue;
            };

            let candidates: Vec<&Transaction> = pool
                .iter()
                .filter(|other| other.id != id && !taken.contains(&other.id))
                .filter(|other| is_transfer_match(subject, other, window_days))
                .collect();

            match candidates.as_slice() {
                [partner] => {
                    self.link(id, partner.id)?;
                    taken.insert(id);
                    taken.insert(partner.id);
                    report.linked.push((id, partner.id));
                }
                _ => {
                    debug!(id = %id, candidates = candidates.len(), "Transfer match not unique");
                    report.unresolved.push(UnresolvedTransfer {
                        id,
                        candidates: candidates.len(),
                    });
                }
            }
        }

        info!(
            linked = report.linked.len(),
            unresolved = report.unresolved.len(),
            skipped = report.skipped.len(),
            "Auto-link finished"
        );
        Ok(report)
    }

    /// Clear every link whose partner does not link back
    ///
    /// Running it twice finds nothing the second time.
    pub fn repair_links(&self) -> StrongboxResult<Vec<PartialLinkFinding>> {
        let mut findings = Vec::new();

        for record in self.storage.transactions.all()? {
            if record.kind != KindTag::Transfer {
                continue;
            }
            let TransactionKind::Transfer(LinkStatus::LinkedTo(partner)) =
                record.open_kind(self.session)?
            else {
                continue;
            };

            let _guard = self.storage.locks().acquire(&[record.id, partner])?;
            let partner_links_back = match self.storage.transactions.get(partner)? {
                Some(other) if other.kind == KindTag::Transfer => {
                    other.open_kind(self.session)?
                        == TransactionKind::Transfer(LinkStatus::LinkedTo(record.id))
                }
                _ => false,
            };
            if partner_links_back {
                continue;
            }

            // Re-read under the lock before clearing
            let (mut current, status) = self.load_transfer(record.id)?;
            if status != LinkStatus::LinkedTo(partner) {
                continue;
            }
            current.reseal_link(self.session, LinkStatus::Unlinked)?;
            self.storage.transactions.update(current)?;
            self.audit_link(record.id, format!("cleared one-sided link to {}", partner))?;

            let finding = PartialLinkFinding {
                id: record.id,
                partner,
            };
            warn!(error = %finding.to_error(), "Repaired one-sided transfer link");
            findings.push(finding);
        }

        Ok(findings)
    }
}

/// Whether `other` is an auto-link candidate for `subject`
fn is_transfer_match(subject: &Transaction, other: &Transaction, window_days: i64) -> bool {
    if !subject.amount.same_magnitude(&other.amount) {
        return false;
    }
    if subject.account == other.account {
        return false;
    }
    match (subject.parsed_date(), other.parsed_date()) {
        (Some(a), Some(b)) => (a - b).num_days().abs() <= window_days,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::StrongboxPaths;
    use crate::crypto::session::test_support::unlocked_session;
    use crate::models::{Amount, TransactionDraft};
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        (temp_dir, storage)
    }

    fn add_transfer(
        storage: &Storage,
        session: &AuthSession,
        date: &str,
        amount: &str,
        account: &str,
    ) -> TransactionId {
        let draft = TransactionDraft {
            date: date.into(),
            amount: Amount::parse(amount).unwrap(),
            description: "TRANSFER".into(),
            account: account.into(),
            note: None,
            kind: TransactionKind::Transfer(LinkStatus::Unlinked),
            payee_id: None,
        };
        storage
            .transactions
            .insert(draft.seal(session).unwrap())
            .unwrap()
            .id
    }

    fn partner_of(storage: &Storage, session: &AuthSession, id: TransactionId) -> Option<TransactionId> {
        storage
            .transactions
            .require(id)
            .unwrap()
            .open(session)
            .unwrap()
            .link_partner()
    }

    #[test]
    fn test_link_and_unlink_are_symmetric() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");

        service.link(a, b).unwrap();
        assert_eq!(partner_of(&storage, &session, a), Some(b));
        assert_eq!(partner_of(&storage, &session, b), Some(a));

        assert_eq!(service.unlink(a).unwrap(), Some(b));
        assert_eq!(partner_of(&storage, &session, a), None);
        assert_eq!(partner_of(&storage, &session, b), None);

        assert_eq!(service.unlink(a).unwrap(), None);
        assert!(!storage.locks().is_held(a));

        let summaries: Vec<_> = storage
            .audit_log()
            .read_all()
            .unwrap()
            .into_iter()
            .filter_map(|entry| entry.summary)
            .collect();
        assert_eq!(
            summaries,
            [
                format!("linked to {}", b),
                format!("linked to {}", a),
                format!("unlinked from {}", b),
                format!("unlinked from {}", a),
            ]
        );
    }

    #[test]
    fn test_link_survives_reload() {
        let (temp, storage) = create_test_storage();
        let session = unlocked_session();
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");
        TransferService::new(&storage, &session).link(a, b).unwrap();

        let reopened =
            Storage::open(StrongboxPaths::with_base_dir(temp.path().to_path_buf())).unwrap();
        assert_eq!(partner_of(&reopened, &session, a), Some(b));
        assert_eq!(partner_of(&reopened, &session, b), Some(a));
    }

    #[test]
    fn test_link_rejects_non_transfer_and_taken_legs() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");
        let c = add_transfer(&storage, &session, "2024-01-06", "100", "brokerage");

        assert!(service.link(a, a).unwrap_err().is_validation());

        let plain = TransactionDraft {
            date: "2024-01-05".into(),
            amount: Amount::parse("-3").unwrap(),
            description: "COFFEE".into(),
            account: "checking".into(),
            note: None,
            kind: TransactionKind::Uncategorized,
            payee_id: None,
        };
        let plain = storage.transactions.insert(plain.seal(&session).unwrap()).unwrap();
        assert!(service.link(a, plain.id).unwrap_err().is_validation());

        service.link(a, b).unwrap();
        service.link(a, b).unwrap();
        assert!(service.link(c, a).unwrap_err().is_validation());
        assert_eq!(partner_of(&storage, &session, c), None);
    }

    #[test]
    fn test_set_link_target_moves_link() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");
        let c = add_transfer(&storage, &session, "2024-01-06", "100", "brokerage");
        let d = add_transfer(&storage, &session, "2024-01-07", "-100", "cash");

        service.link(a, b).unwrap();
        service.link(c, d).unwrap();

        // a moves from b to c; c's old partner d is released
        service.set_link_target(a, Some(c)).unwrap();
        assert_eq!(partner_of(&storage, &session, a), Some(c));
        assert_eq!(partner_of(&storage, &session, c), Some(a));
        assert_eq!(partner_of(&storage, &session, b), None);
        assert_eq!(partner_of(&storage, &session, d), None);

        service.set_link_target(a, None).unwrap();
        assert_eq!(partner_of(&storage, &session, a), None);
        assert_eq!(partner_of(&storage, &session, c), None);
    }

    #[test]
    fn test_auto_link_is_conservative() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);

        // a <-> b is the only 250.00 pair
        let a = add_transfer(&storage, &session, "2024-03-01", "-250.00", "checking");
        let b = add_transfer(&storage, &session, "2024-03-03", "250", "savings");
        // c has two equally good partners
        let c = add_transfer(&storage, &session, "2024-03-01", "-40.00", "checking");
        let d = add_transfer(&storage, &session, "2024-03-02", "40.00", "savings");
        let e = add_transfer(&storage, &session, "2024-03-02", "40.00", "brokerage");

        let report = service.auto_link_selected(&[a, c], 10).unwrap();

        assert_eq!(report.linked, vec![(a, b)]);
        assert_eq!(
            report.unresolved,
            vec![UnresolvedTransfer { id: c, candidates: 2 }]
        );
        assert!(matches!(
            report.unresolved[0].to_error(),
            StrongboxError::AmbiguousMatch { candidates: 2, .. }
        ));
        assert_eq!(partner_of(&storage, &session, a), Some(b));
        for id in [c, d, e] {
            assert_eq!(partner_of(&storage, &session, id), None);
        }
    }

    #[test]
    fn test_auto_link_respects_window_and_account() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);

        let a = add_transfer(&storage, &session, "2024-03-01", "-75", "checking");
        // Same account never matches
        add_transfer(&storage, &session, "2024-03-02", "75", "checking");
        // Eleven days out
        add_transfer(&storage, &session, "2024-03-12", "75", "savings");
        // Unparseable date
        add_transfer(&storage, &session, "sometime", "75", "savings");

        let report = service.auto_link_selected(&[a], 10).unwrap();
        assert!(report.linked.is_empty());
        assert_eq!(report.unresolved, vec![UnresolvedTransfer { id: a, candidates: 0 }]);

        let f = add_transfer(&storage, &session, "2024-03-11", "75.00", "savings");
        let report = service.auto_link_selected(&[a], 10).unwrap();
        assert_eq!(report.linked, vec![(a, f)]);
    }

    #[test]
    fn test_auto_link_compares_every_decimal_digit() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);

        let a = add_transfer(&storage, &session, "2024-03-01", "-10.001", "checking");
        let b = add_transfer(&storage, &session, "2024-03-01", "10.009", "savings");

        let report = service.auto_link_selected(&[a], 10).unwrap();
        assert!(report.linked.is_empty());
        assert_eq!(report.unresolved, vec![UnresolvedTransfer { id: a, candidates: 0 }]);
        assert_eq!(partner_of(&storage, &session, b), None);

        let c = add_transfer(&storage, &session, "2024-03-02", "10.0010", "savings");
        let report = service.auto_link_selected(&[a], 10).unwrap();
        assert_eq!(report.linked, vec![(a, c)]);
    }

    #[test]
    fn test_auto_link_skips_already_linked_and_unknown() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-03-01", "-10", "checking");
        let b = add_transfer(&storage, &session, "2024-03-01", "10", "savings");

        // b is consumed by a's link and not processed again
        let report = service
            .auto_link_selected(&[a, b, TransactionId::from_raw(99)], 10)
            .unwrap();
        assert_eq!(report.linked, vec![(a, b)]);
        assert_eq!(report.skipped, vec![TransactionId::from_raw(99)]);
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_repair_clears_one_sided_link() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");

        // Simulate a crash after the first of two writes
        let mut record = storage.transactions.require(a).unwrap();
        record.reseal_link(&session, LinkStatus::LinkedTo(b)).unwrap();
        storage.transactions.update(record).unwrap();

        let findings = service.repair_links().unwrap();
        assert_eq!(findings, vec![PartialLinkFinding { id: a, partner: b }]);
        assert!(matches!(
            findings[0].to_error(),
            StrongboxError::PartialLink { .. }
        ));
        assert_eq!(partner_of(&storage, &session, a), None);

        assert!(service.repair_links().unwrap().is_empty());
    }

    #[test]
    fn test_repair_leaves_symmetric_links() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransferService::new(&storage, &session);
        let a = add_transfer(&storage, &session, "2024-01-05", "-100", "checking");
        let b = add_transfer(&storage, &session, "2024-01-06", "100", "savings");
        service.link(a, b).unwrap();

        assert!(service.repair_links().unwrap().is_empty());
        assert_eq!(partner_of(&storage, &session, a), Some(b));
    }
}
