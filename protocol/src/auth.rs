//! # Authorization Collaborator
//!
//! The ledger never verifies signatures itself. It asks an [`Authority`]
//! three questions: did principal P authorize this invocation, did P
//! co-sign it (used to pick who pays for a new balance record), and does
//! identity A resolve to a real account.
//!
//! Two implementations cover the invocation graph:
//!
//! - [`Signatures`] is the authority of a top-level invocation: the set
//!   of principals whose signatures the host already verified.
//! - [`Delegated`] is the authority of an inline follow-up invocation.
//!   It carries exactly the one permission the parent operation attached
//!   to the follow-up. An issue forwards under the issuer's permission, a
//!   withdrawal pays out under the contract's own permission, and a stake
//!   adjusts the dependent cap under the base contract's permission.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::asset::AccountName;
use crate::error::{LedgerError, LedgerResult};

/// The questions the ledger asks about the principals of an invocation.
pub trait Authority {
    /// Did `principal` authorize this invocation?
    fn is_authorized(&self, principal: &AccountName) -> bool;

    /// Did `principal` co-sign this invocation? Used to choose the
    /// storage-cost payer for a newly created balance record.
    fn has_authorized(&self, principal: &AccountName) -> bool {
        self.is_authorized(principal)
    }

    /// Does `identity` resolve to an externally-authenticated account?
    fn account_exists(&self, identity: &AccountName) -> bool;
}

/// Fails with [`LedgerError::MissingAuthority`] unless `principal` signed.
pub fn require(auth: &dyn Authority, principal: &AccountName) -> LedgerResult<()> {
    if auth.is_authorized(principal) {
        Ok(())
    } else {
        Err(LedgerError::MissingAuthority(principal.clone()))
    }
}

// ---------------------------------------------------------------------------
// AccountDirectory
// ---------------------------------------------------------------------------

/// The set of identities that resolve as externally-authenticated accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDirectory {
    accounts: BTreeSet<AccountName>,
}

impl AccountDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity. Returns `false` if it was already known.
    pub fn register(&mut self, account: AccountName) -> bool {
        self.accounts.insert(account)
    }

    /// Returns `true` if the identity is known.
    pub fn contains(&self, account: &AccountName) -> bool {
        self.accounts.contains(account)
    }

    /// Number of known identities.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no identities are registered.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates known identities in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AccountName> {
        self.accounts.iter()
    }
}

impl FromIterator<AccountName> for AccountDirectory {
    fn from_iter<I: IntoIterator<Item = AccountName>>(iter: I) -> Self {
        Self {
            accounts: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Authority of a top-level invocation: the verified signer set.
#[derive(Debug, Clone)]
pub struct Signatures<'d> {
    signers: BTreeSet<AccountName>,
    directory: &'d AccountDirectory,
}

impl<'d> Signatures<'d> {
    /// Creates the authority for an invocation signed by `signers`.
    pub fn new<I>(directory: &'d AccountDirectory, signers: I) -> Self
    where
        I: IntoIterator<Item = AccountName>,
    {
        Self {
            signers: signers.into_iter().collect(),
            directory,
        }
    }

    /// The principals that signed.
    pub fn signers(&self) -> impl Iterator<Item = &AccountName> {
        self.signers.iter()
    }
}

impl Authority for Signatures<'_> {
    fn is_authorized(&self, principal: &AccountName) -> bool {
        self.signers.contains(principal)
    }

    fn account_exists(&self, identity: &AccountName) -> bool {
        self.directory.contains(identity)
    }
}

// ---------------------------------------------------------------------------
// Delegated
// ---------------------------------------------------------------------------

/// Authority of an inline follow-up invocation.
///
/// Only the single attached permission is authorized. Signers of the
/// parent invocation do not leak into the follow-up, which is what makes
/// the payer of an issue-forwarded record the issuer rather than the
/// recipient.
pub struct Delegated<'p> {
    permission: AccountName,
    parent: &'p dyn Authority,
}

impl<'p> Delegated<'p> {
    /// Attaches `permission` to a follow-up spawned under `parent`.
    pub fn new(permission: AccountName, parent: &'p dyn Authority) -> Self {
        Self { permission, parent }
    }

    /// The attached permission.
    pub fn permission(&self) -> &AccountName {
        &self.permission
    }
}

impl Authority for Delegated<'_> {
    fn is_authorized(&self, principal: &AccountName) -> bool {
        *principal == self.permission
    }

    fn account_exists(&self, identity: &AccountName) -> bool {
        self.parent.account_exists(identity)
    }
}
