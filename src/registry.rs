//! Keyed store of tables and their buffered rows, in creation order.

use std::collections::HashMap;

use crate::{
    assemble::AssembledRow, column::normalize_name, config::TableFormat, error::ConversionError,
    schema::Table,
};

#[derive(Debug, Clone)]
pub struct TableEntry {
    pub table: Table,
    pub rows: Vec<AssembledRow>,
}

#[derive(Debug, Default)]
pub struct TableRegistry {
    positions: HashMap<String, usize>,
    entries: Vec<TableEntry>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table `name`; a second claim on the same normalized name fails.
    pub fn claim(
        &mut self,
        name: &str,
        format: &TableFormat,
    ) -> Result<&mut TableEntry, ConversionError> {
        let table = Table::new(name, format.clone());
        if self.positions.contains_key(table.name()) {
            return Err(ConversionError::DuplicateTable(table.quoted_name()));
        }
        self.positions
            .insert(table.name().to_string(), self.entries.len());
        self.entries.push(TableEntry {
            table,
            rows: Vec::new(),
        });
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    /// Looks up a table created earlier in the run.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut TableEntry, ConversionError> {
        let key = normalize_name(name);
        match self.positions.get(&key) {
            Some(&position) => Ok(&mut self.entries[position]),
            None => Err(ConversionError::TableNotFound(format!("\"{key}\""))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TableEntry> {
        self.entries.iter_mut()
    }

    pub fn into_entries(self) -> Vec<TableEntry> {
        self.entries
    }
}

#[cfg(test)]
impl TableRegistry {
    pub(crate) fn find(&self, name: &str) -> Option<&TableEntry> {
        let position = *self.positions.get(&normalize_name(name))?;
        self.entries.get(position)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_are_unique_by_normalized_name() {
        let mut registry = TableRegistry::new();
        let format = TableFormat::default();
        registry.claim("Crème", &format).unwrap();
        registry.claim("Other", &format).unwrap();
        assert_eq!(
            registry.claim(" Creme", &format).unwrap_err(),
            ConversionError::DuplicateTable("\"Creme\"".to_string())
        );
        let order: Vec<&str> = registry.iter().map(|entry| entry.table.name()).collect();
        assert_eq!(order, vec!["Creme", "Other"]);
    }

    #[test]
    fn lookups_report_missing_tables() {
        let mut registry = TableRegistry::new();
        registry.claim("Sales", &TableFormat::default()).unwrap();
        assert!(registry.find(" Sales").is_some());
        assert!(registry.get_mut("Sales").is_ok());
        assert_eq!(
            registry.get_mut("Stock").unwrap_err(),
            ConversionError::TableNotFound("\"Stock\"".to_string())
        );
        assert_eq!(registry.len(), 1);
    }
}
