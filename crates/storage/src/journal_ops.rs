// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence-layer journal operations (`spec.md` §4.2), grounded verbatim
//! on `data_access/journal.py`.

use snapd_core::{CoreError, CoreResult, JournalToken, OperationType};

use crate::models::{Journal, NewJournal};
use crate::store::{Store, StoreEvent, Transaction};

impl Store {
    /// Fetches a journal row by its surrogate id.
    pub fn journal_by_id(&self, id: u64) -> Option<Journal> {
        self.read().journals.get(&id).cloned()
    }

    /// Fetches a journal row by its unique token.
    pub fn journal_by_token(&self, token: JournalToken) -> Option<Journal> {
        let state = self.read();
        let id = state.journal_by_token.get(&token)?;
        state.journals.get(id).cloned()
    }

    /// Rows ordered ascending by id, optionally filtered by operation type
    /// and/or restricted to ids strictly less than `before_id`.
    pub fn query_unconsumed_journals(
        &self,
        operation_type: Option<OperationType>,
        before_id: Option<u64>,
    ) -> Vec<Journal> {
        let state = self.read();
        let mut rows: Vec<Journal> = state
            .journals
            .values()
            .filter(|j| !j.is_consumed())
            .filter(|j| operation_type.map(|t| t == j.operation_type).unwrap_or(true))
            .filter(|j| before_id.map(|b| j.id < b).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|j| j.id);
        rows
    }
}

impl<'a> Transaction<'a> {
    /// Inserts a new journal row. Fails if the token already exists.
    pub fn journal_create(&mut self, new: NewJournal) -> CoreResult<Journal> {
        if self.store().journal_by_token(new.token).is_some() {
            return Err(CoreError::state_conflict(format!(
                "journal token already exists: {}",
                new.token
            )));
        }
        let id = self.store().next_journal_id();
        let row = Journal {
            id,
            token: new.token,
            operation_type: new.operation_type,
            operation_str: new.operation_str,
            produced_timestamp: self.now,
            consumed_timestamp: None,
            children_idents: Vec::new(),
        };
        self.record(StoreEvent::JournalCreated(row.clone()));
        Ok(row)
    }

    /// Marks a journal row consumed. Asserts it is not already consumed.
    pub fn journal_consume(&mut self, row: &Journal) -> CoreResult<Journal> {
        let current = self
            .journal_by_id(row.id)
            .ok_or_else(|| CoreError::not_found(format!("journal id {}", row.id)))?;
        if current.is_consumed() {
            return Err(CoreError::state_conflict(format!(
                "journal {} already consumed",
                current.token
            )));
        }
        self.record(StoreEvent::JournalConsumed { id: row.id, consumed_timestamp: self.now });
        let mut updated = current;
        updated.consumed_timestamp = Some(self.now);
        Ok(updated)
    }

    /// Rewrites a CREATE journal's `children_idents` list.
    pub fn journal_alter_children(
        &mut self,
        row: &Journal,
        children_idents: Vec<snapd_core::StorageIdent>,
    ) -> CoreResult<Journal> {
        let current = self
            .journal_by_id(row.id)
            .ok_or_else(|| CoreError::not_found(format!("journal id {}", row.id)))?;
        self.record(StoreEvent::JournalChildrenAltered {
            id: row.id,
            children_idents: children_idents.clone(),
        });
        let mut updated = current;
        updated.children_idents = children_idents;
        Ok(updated)
    }
}

#[cfg(test)]
#[path = "journal_ops_tests.rs"]
mod tests;
