//! Table alias allocation.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};

/// Convert an entity or relation name to snake case (`lastDocument` -> `last_document`).
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            out.push('_');
            prev_lower = false;
        }
    }
    out
}

/// Alias base for a relation path: `account.owner` -> `account__owner`.
pub fn path_alias(path: &str) -> String {
    path.split('.').map(snake_case).collect::<Vec<_>>().join("__")
}

fn truncate(name: &str, max_len: usize) -> String {
    name.chars().take(max_len).collect()
}

/// Hands out unique aliases within one statement.
#[derive(Debug, Clone)]
pub struct AliasAllocator {
    max_len: usize,
    max_suffix: u32,
    used: HashSet<String>,
}

impl AliasAllocator {
    /// Create an allocator with an identifier length limit and suffix budget.
    pub fn new(max_len: usize, max_suffix: u32) -> Self {
        Self {
            max_len,
            max_suffix,
            used: HashSet::new(),
        }
    }

    /// Allocate an alias derived from `base`.
    ///
    /// The base is truncated to the length limit; collisions get `_1`, `_2`,
    /// ... until the suffix budget runs out.
    pub fn allocate(&mut self, base: &str) -> QueryResult<String> {
        let base = truncate(base, self.max_len);
        if self.used.insert(base.clone()) {
            return Ok(base);
        }

        for n in 1..=self.max_suffix {
            let suffix = format!("_{}", n);
            let room = self.max_len.saturating_sub(suffix.len());
            let candidate = format!("{}{}", truncate(&base, room), suffix);
            if self.used.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(QueryError::alias_collision(base, self.max_suffix))
    }

    /// Check if an alias is taken.
    pub fn contains(&self, alias: &str) -> bool {
        self.used.contains(alias)
    }
}
