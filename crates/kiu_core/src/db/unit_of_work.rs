//! Explicit transaction boundary for multi-row writes.
//!
//! # Invariants
//! - A unit of work always starts as `IMMEDIATE`, so concurrent writers on
//!   the same database serialize instead of interleaving.
//! - Dropping an uncommitted unit of work rolls every statement back.

use super::DbResult;
use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// One atomic write scope over a borrowed connection.
///
/// Writers that must be all-or-nothing (access matrix replacement, user
/// registration, bulk mark-read) take `&UnitOfWork` instead of opening
/// their own transaction, which keeps the atomicity boundary visible to
/// the caller.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> UnitOfWork<'conn> {
    /// Begins an immediate transaction on `conn`.
    ///
    /// Fails when `conn` already has an open transaction.
    pub fn begin(conn: &'conn Connection) -> DbResult<Self> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        Ok(Self { tx })
    }

    /// Connection view that executes inside this unit of work.
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Commits every statement executed through this unit of work.
    pub fn commit(self) -> DbResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Rolls back explicitly. Equivalent to dropping the unit of work.
    pub fn rollback(self) -> DbResult<()> {
        debug!("event=uow_rollback module=db status=ok");
        self.tx.rollback()?;
        Ok(())
    }
}
