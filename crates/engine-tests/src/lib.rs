#![allow(dead_code)]

use connectors::memory::MemoryOrg;
use engine_config::settings::SyncSettings;
use engine_core::{context::RunContext, retry::RetryPolicy};
use engine_runtime::execution::{SyncRun, TransformRun};
use model::{
    core::value::Value,
    records::record::{Dataset, Record},
    schema::describe::{EntityDescribe, FieldDescribe, FieldType},
};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;

pub mod integration;
pub mod utils;

pub const ORG: &str = "test-org";
pub const CONTACT: &str = "Contact";
pub const ACCOUNT: &str = "Account";

/// An org with `Account` and `Contact` entities.
///
/// `Contact.Email` is unique, `Contact.Status__c` is a picklist of `A`/`B`,
/// `Contact.AccountName` references `Account`.
pub fn memory_org() -> MemoryOrg {
    let org = MemoryOrg::new();
    org.add_entity(EntityDescribe::new(
        ACCOUNT,
        vec![
            FieldDescribe::new("Name", FieldType::String),
            FieldDescribe::new("AccountNumber", FieldType::String).unique(),
        ],
    ));
    org.add_entity(EntityDescribe::new(
        CONTACT,
        vec![
            FieldDescribe::new("Id", FieldType::Id),
            FieldDescribe::new("LastName", FieldType::String),
            FieldDescribe::new("Email", FieldType::Email).unique(),
            FieldDescribe::new("Status__c", FieldType::Picklist).with_picklist(["A", "B"]),
            FieldDescribe::new("AccountName", FieldType::Reference).references(ACCOUNT),
            FieldDescribe::new("External_Id__c", FieldType::String).external_id(),
            FieldDescribe::new("Active__c", FieldType::Boolean),
        ],
    ));
    org
}

pub fn seed_account(org: &MemoryOrg, name: &str, number: &str) -> String {
    org.seed(
        ACCOUNT,
        Record::from_pairs([
            ("Name", Value::from(name)),
            ("AccountNumber", Value::from(number)),
        ]),
    )
}

pub fn contacts(rows: Vec<Vec<(&str, &str)>>) -> Dataset {
    Dataset::from_records(
        CONTACT,
        rows.into_iter()
            .map(|pairs| Record::from_pairs(pairs.into_iter().map(|(k, v)| (k, Value::from(v)))))
            .collect(),
    )
}

/// `count` contacts with distinct last names and emails.
pub fn numbered_contacts(count: usize) -> Dataset {
    Dataset::from_records(
        CONTACT,
        (0..count)
            .map(|i| {
                Record::from_pairs([
                    ("LastName", Value::from(format!("Contact {i}"))),
                    ("Email", Value::from(format!("c{i}@example.com"))),
                ])
            })
            .collect(),
    )
}

pub fn settings(out: &Path, batch_size: usize, parallelism: usize) -> SyncSettings {
    SyncSettings {
        batch_size: Some(batch_size),
        parallelism,
        output_root: out.to_path_buf(),
        ..SyncSettings::default()
    }
}

pub fn context(out: &Path) -> RunContext {
    RunContext::new(ORG, CONTACT, out)
}

pub fn sync_run(org: &MemoryOrg, out: &TempDir, settings: SyncSettings) -> SyncRun {
    SyncRun::new(context(out.path()), settings, Arc::new(org.clone())).with_retry(RetryPolicy::none())
}

pub fn transform_run(org: &MemoryOrg, out: &TempDir) -> TransformRun {
    TransformRun::new(context(out.path()), Arc::new(org.clone())).with_retry(RetryPolicy::none())
}
