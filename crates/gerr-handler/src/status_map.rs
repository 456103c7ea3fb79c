// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application-to-transport status code tables.

use std::collections::HashMap;
use std::hash::Hash;
use tonic::Code;

/// Static table from application status codes to transport codes.
///
/// Codes missing from the table resolve to an explicit fallback. There is no
/// implicit default: [`StatusCodeMap::new`] takes the fallback as an argument.
/// Only the [`FromIterator`] impl picks one, [`Code::Internal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeMap<C: Eq + Hash> {
    table: HashMap<C, Code>,
    fallback: Code,
}

impl<C: Eq + Hash> StatusCodeMap<C> {
    /// Empty table resolving every code to `fallback`.
    pub fn new(fallback: Code) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, code: C, mapped: Code) -> Option<Code> {
        self.table.insert(code, mapped)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, code: C, mapped: Code) -> Self {
        self.table.insert(code, mapped);
        self
    }

    /// Replace the fallback code.
    pub fn with_fallback(mut self, fallback: Code) -> Self {
        self.fallback = fallback;
        self
    }

    /// Transport code for `code`.
    pub fn resolve(&self, code: &C) -> Code {
        self.table.get(code).copied().unwrap_or(self.fallback)
    }

    /// Transport code for `code`, or `None` when it is not in the table.
    pub fn get(&self, code: &C) -> Option<Code> {
        self.table.get(code).copied()
    }

    /// Code used for entries missing from the table.
    pub fn fallback(&self) -> Code {
        self.fallback
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table has no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<C: Eq + Hash> FromIterator<(C, Code)> for StatusCodeMap<C> {
    fn from_iter<I: IntoIterator<Item = (C, Code)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().collect(),
            fallback: Code::Internal,
        }
    }
}

impl<C: Eq + Hash> Extend<(C, Code)> for StatusCodeMap<C> {
    fn extend<I: IntoIterator<Item = (C, Code)>>(&mut self, iter: I) {
        self.table.extend(iter);
    }
}
