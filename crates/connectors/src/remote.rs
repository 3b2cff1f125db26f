use crate::error::RemoteError;
use async_trait::async_trait;
use model::{
    execution::write::{QueryResult, WriteOperation, WriteOutcome},
    records::record::Record,
    schema::describe::EntityDescribe,
};

/// Schema introspection against the remote store.
#[async_trait]
pub trait RemoteSchema: Send + Sync {
    async fn describe(&self, entity: &str) -> Result<EntityDescribe, RemoteError>;
}

/// Data access against the remote store.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Runs a point query and returns the matching rows.
    async fn query(&self, soql: &str) -> Result<QueryResult, RemoteError>;

    /// Writes `records` in one call.
    ///
    /// The response is positional: entry `i` describes `records[i]`. An `Err`
    /// means the call failed as a whole and no record outcome is known.
    async fn bulk_write(
        &self,
        entity: &str,
        operation: WriteOperation,
        external_id_field: Option<&str>,
        records: &[Record],
    ) -> Result<Vec<WriteOutcome>, RemoteError>;
}

/// A single live connection offering both schema and data access.
pub trait RemoteConnection: RemoteSchema + RemoteClient {}

impl<T: RemoteSchema + RemoteClient> RemoteConnection for T {}

/// Opens independent connections.
///
/// The client behind a connection is not assumed to be safe for concurrent
/// use, so every worker asks the factory for its own and never shares it.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError>;
}

/// Escapes a literal for interpolation into a single-quoted query string.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `SELECT Id FROM <entity> WHERE <field> = '<value>'`
pub fn point_lookup_query(entity: &str, field: &str, value: &str) -> String {
    format!(
        "SELECT Id FROM {entity} WHERE {field} = '{}'",
        escape_literal(value)
    )
}
