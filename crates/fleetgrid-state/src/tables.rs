//! redb table definitions for the audit store.

use redb::TableDefinition;

/// Fired elections keyed by `{epoch_millis:020}:{seq:010}`.
pub const ELECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("elections");
