//! An in-memory org that behaves like the remote store closely enough to
//! exercise the whole engine without a network.

use crate::{
    error::RemoteError,
    remote::{ConnectionFactory, RemoteClient, RemoteConnection, RemoteSchema},
};
use async_trait::async_trait;
use model::{
    execution::write::{QueryResult, RecordError, WriteOperation, WriteOutcome},
    records::record::Record,
    schema::describe::EntityDescribe,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Clone)]
enum Fault {
    Call(usize),
    Error { field: String, value: String },
    Panic { field: String, value: String },
}

#[derive(Debug, Default)]
struct Entity {
    describe: EntityDescribe,
    rows: Vec<Record>,
}

#[derive(Debug, Default)]
struct Inner {
    entities: HashMap<String, Entity>,
    faults: Vec<Fault>,
    next_id: u64,
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicUsize,
    queries: AtomicUsize,
    write_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Shared in-memory remote store. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrg {
    inner: Arc<Mutex<Inner>>,
    counters: Arc<Counters>,
    write_delay: Option<Duration>,
}

impl MemoryOrg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every bulk write, so concurrent calls overlap.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn add_entity(&self, describe: EntityDescribe) {
        let mut inner = self.lock();
        inner.entities.insert(
            describe.name.clone(),
            Entity {
                describe,
                rows: Vec::new(),
            },
        );
    }

    /// Seeds a row and returns its generated id.
    pub fn seed(&self, entity: &str, record: Record) -> String {
        let mut inner = self.lock();
        let id = inner.allocate_id();
        let mut record = record;
        record.set("Id", id.clone());
        inner
            .entities
            .entry(entity.to_string())
            .or_default()
            .rows
            .push(record);
        id
    }

    /// Bulk writes containing a record with `field == value` fail as a whole.
    pub fn fail_writes_containing(&self, field: &str, value: &str) {
        self.lock().faults.push(Fault::Error {
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    /// The `n`-th bulk write call (1-based) fails as a whole.
    pub fn fail_write_call(&self, n: usize) {
        self.lock().faults.push(Fault::Call(n));
    }

    /// Bulk writes containing a record with `field == value` panic.
    pub fn panic_on_writes_containing(&self, field: &str, value: &str) {
        self.lock().faults.push(Fault::Panic {
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    pub fn rows(&self, entity: &str) -> Vec<Record> {
        self.lock()
            .entities
            .get(entity)
            .map(|e| e.rows.clone())
            .unwrap_or_default()
    }

    pub fn connections_opened(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    pub fn queries_run(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.counters.write_calls.load(Ordering::SeqCst)
    }

    /// Highest number of bulk writes observed in flight at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicking fault may poison the lock; the data stays consistent
        // because faults fire before any mutation.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Inner {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("001{:012}AAA", self.next_id)
    }

    fn check_faults(&self, call: usize, records: &[Record]) -> Result<(), RemoteError> {
        for fault in &self.faults {
            let (field, value, panics) = match fault {
                Fault::Call(n) if *n == call => {
                    return Err(RemoteError::Connectivity(format!(
                        "connection reset during write call {call}"
                    )));
                }
                Fault::Call(_) => continue,
                Fault::Error { field, value } => (field, value, false),
                Fault::Panic { field, value } => (field, value, true),
            };
            let hit = records
                .iter()
                .any(|r| r.get_value(field).comparable_text() == *value);
            if hit && panics {
                panic!("injected panic for {field}={value}");
            }
            if hit {
                return Err(RemoteError::Connectivity(format!(
                    "connection reset while writing {field}={value}"
                )));
            }
        }
        Ok(())
    }

    fn write_record(
        &mut self,
        entity: &str,
        operation: WriteOperation,
        external_id_field: Option<&str>,
        record: &Record,
    ) -> WriteOutcome {
        let Some(target) = self.entities.get(entity) else {
            return WriteOutcome::rejected(vec![error("INVALID_TYPE", "unknown entity", &[])]);
        };

        let mut errors = Vec::new();
        for field in &record.fields {
            let Some(meta) = target.describe.field(&field.name) else {
                errors.push(error(
                    "INVALID_FIELD",
                    &format!("No such column '{}' on entity '{entity}'", field.name),
                    &[field.name.as_str()],
                ));
                continue;
            };
            let text = field.value.comparable_text();
            if meta.is_picklist()
                && !text.is_empty()
                && !meta.active_picklist_values().contains(&text.as_str())
            {
                errors.push(error(
                    "INVALID_OR_NULL_FOR_RESTRICTED_PICKLIST",
                    &format!("bad value for restricted picklist field: {text}"),
                    &[field.name.as_str()],
                ));
            }
        }
        if !errors.is_empty() {
            return WriteOutcome::rejected(errors);
        }

        let existing = match (operation, external_id_field) {
            (WriteOperation::Upsert, Some(ext)) => {
                let key = record.get_value(ext).comparable_text();
                target
                    .rows
                    .iter()
                    .position(|r| !key.is_empty() && r.get_value(ext).comparable_text() == key)
            }
            _ => None,
        };

        for meta in target.describe.unique_fields() {
            let text = record.get_value(&meta.name).comparable_text();
            if text.is_empty() {
                continue;
            }
            let clash = target.rows.iter().enumerate().any(|(i, r)| {
                Some(i) != existing && r.get_value(&meta.name).comparable_text() == text
            });
            if clash {
                return WriteOutcome::rejected(vec![error(
                    "DUPLICATE_VALUE",
                    &format!("duplicate value found: {} duplicates value {text}", meta.name),
                    &[meta.name.as_str()],
                )]);
            }
        }

        match existing {
            Some(pos) => {
                let id = self.entities[entity].rows[pos].get_value("Id").comparable_text();
                let Some(row) = self
                    .entities
                    .get_mut(entity)
                    .and_then(|e| e.rows.get_mut(pos))
                else {
                    return WriteOutcome::rejected(vec![error("UNKNOWN", "row vanished", &[])]);
                };
                for field in &record.fields {
                    row.set(&field.name, field.value.clone());
                }
                WriteOutcome {
                    id: Some(id),
                    success: true,
                    created: Some(false),
                    errors: Vec::new(),
                }
            }
            None => {
                let id = self.allocate_id();
                let mut row = record.clone();
                row.set("Id", id.clone());
                if let Some(e) = self.entities.get_mut(entity) {
                    e.rows.push(row);
                }
                WriteOutcome::ok(id)
            }
        }
    }
}

fn error(code: &str, message: &str, fields: &[&str]) -> RecordError {
    RecordError {
        status_code: code.to_string(),
        message: message.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

/// Parses `SELECT Id FROM <entity> WHERE <field> = '<literal>'`.
fn parse_point_query(soql: &str) -> Option<(String, String, String)> {
    let rest = soql.trim().strip_prefix("SELECT Id FROM ")?;
    let (entity, rest) = rest.split_once(" WHERE ")?;
    let (field, literal) = rest.split_once(" = ")?;
    let literal = literal.trim().strip_prefix('\'')?.strip_suffix('\'')?;

    let mut value = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            value.push(chars.next()?);
        } else {
            value.push(c);
        }
    }
    Some((entity.trim().to_string(), field.trim().to_string(), value))
}

/// One connection to a [`MemoryOrg`].
pub struct MemoryConnection {
    org: MemoryOrg,
}

#[async_trait]
impl RemoteSchema for MemoryConnection {
    async fn describe(&self, entity: &str) -> Result<EntityDescribe, RemoteError> {
        self.org
            .lock()
            .entities
            .get(entity)
            .map(|e| e.describe.clone())
            .ok_or_else(|| RemoteError::UnknownEntity(entity.to_string()))
    }
}

#[async_trait]
impl RemoteClient for MemoryConnection {
    async fn query(&self, soql: &str) -> Result<QueryResult, RemoteError> {
        self.org.counters.queries.fetch_add(1, Ordering::SeqCst);
        let (entity, field, value) = parse_point_query(soql)
            .ok_or_else(|| RemoteError::Query(format!("unsupported query: {soql}")))?;

        let inner = self.org.lock();
        let target = inner
            .entities
            .get(&entity)
            .ok_or_else(|| RemoteError::Query(format!("sObject type '{entity}' is not supported")))?;
        if field != "Id" && target.describe.field(&field).is_none() {
            return Err(RemoteError::Query(format!(
                "No such column '{field}' on entity '{entity}'"
            )));
        }

        let records: Vec<_> = target
            .rows
            .iter()
            .filter(|r| r.get_value(&field).comparable_text() == value)
            .map(|r| {
                let mut obj = serde_json::Map::new();
                obj.insert("Id".to_string(), r.get_value("Id").to_json());
                obj
            })
            .collect();

        Ok(QueryResult {
            total_size: records.len(),
            done: true,
            records,
        })
    }

    async fn bulk_write(
        &self,
        entity: &str,
        operation: WriteOperation,
        external_id_field: Option<&str>,
        records: &[Record],
    ) -> Result<Vec<WriteOutcome>, RemoteError> {
        let counters = &self.org.counters;
        let call = counters.write_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.org.write_delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut inner = self.org.lock();
            inner.check_faults(call, records).map(|_| {
                records
                    .iter()
                    .map(|r| inner.write_record(entity, operation, external_id_field, r))
                    .collect()
            })
        };

        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ConnectionFactory for MemoryOrg {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        self.counters.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection { org: self.clone() }))
    }
}
