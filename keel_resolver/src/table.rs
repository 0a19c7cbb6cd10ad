//! The per-module type table
//!
//! Appends each distinct written type encountered during lowering, then is
//! reduced (sorted and deduplicated) before the runtime type information
//! arrays are emitted. A record's index is its stable identity once
//! reduced.

use keel_parser::TypeExpr;

/// One type table record. `I` is the lowered IR type handle, filled in when
/// the runtime type table is emitted.
#[derive(Debug, Clone)]
pub struct TypeRecord<I> {
    pub name: String,
    pub ast_type: TypeExpr,
    pub ir_type: Option<I>,
    pub is_alias: bool,
}

/// The ordered set of distinct written types of one module.
#[derive(Debug, Clone)]
pub struct TypeTable<I> {
    records: Vec<TypeRecord<I>>,
    reduced: bool,
}

impl<I> Default for TypeTable<I> {
    fn default() -> Self {
        Self { records: Vec::new(), reduced: false }
    }
}

impl<I> TypeTable<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a written type. The formatted type string is the record key.
    pub fn add(&mut self, ast_type: TypeExpr, is_alias: bool) {
        debug_assert!(!self.reduced, "type table must not grow after reduction");
        self.records.push(TypeRecord {
            name: ast_type.to_string(),
            ast_type,
            ir_type: None,
            is_alias,
        });
    }

    /// Sort records by name and drop duplicates. Alias records win over
    /// non-alias duplicates of the same name so the flag survives.
    pub fn reduce(&mut self) {
        if self.reduced {
            return;
        }
        self.records
            .sort_by(|a, b| a.name.cmp(&b.name).then(b.is_alias.cmp(&a.is_alias)));
        self.records.dedup_by(|next, kept| next.name == kept.name);
        self.reduced = true;
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Binary search by name. Only meaningful after reduction.
    pub fn find(&self, name: &str) -> Option<usize> {
        debug_assert!(self.reduced, "type table lookup requires reduction");
        self.records
            .binary_search_by(|record| record.name.as_str().cmp(name))
            .ok()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TypeRecord<I>] {
        &self.records
    }

    pub fn record_mut(&mut self, index: usize) -> &mut TypeRecord<I> {
        &mut self.records[index]
    }
}
