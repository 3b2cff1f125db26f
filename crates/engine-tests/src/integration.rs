#[cfg(test)]
mod tests {
    use crate::{
        ACCOUNT, CONTACT, contacts, memory_org, numbered_contacts, seed_account, settings,
        sync_run, transform_run,
        utils::{assert_file_exists, cell, file_header, file_row_count, load_csv},
    };
    use engine_config::settings::error::SettingsError;
    use engine_core::layout::{ArtifactLayout, BatchArtifact};
    use engine_processing::{
        error::{LookupError, MappingError},
        lookup::{ReviewDecision, ScriptedReview},
    };
    use engine_runtime::error::SyncError;
    use model::{
        core::value::Value,
        execution::{outcome::ClassificationStatus, write::WriteOperation},
        records::batch::{BatchStatus, ERRORS_COLUMN},
        transform::mapping::ColumnMapping,
    };
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    fn layout(out: &TempDir) -> ArtifactLayout {
        ArtifactLayout::new(out.path(), crate::ORG, CONTACT)
    }

    // Scenario: three contacts reference two distinct account names, one of
    // which does not exist remotely.
    // Expected Outcome:
    // - the two rows naming the existing account carry its id
    // - the third row keeps its name and is classified FAILURE
    #[traced_test]
    #[tokio::test]
    async fn tc01_lookup_resolution_flags_unresolved_rows() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        let acme = seed_account(&org, "Acme", "A-1");

        let data = contacts(vec![
            vec![("LastName", "Ada"), ("Email", "ada@x.com"), ("AccountName", "Acme")],
            vec![("LastName", "Bob"), ("Email", "bob@x.com"), ("AccountName", "Acme")],
            vec![("LastName", "Cy"), ("Email", "cy@x.com"), ("AccountName", "Missing Co")],
        ]);

        let report = sync_run(&org, &out, settings(out.path(), 10, 1))
            .execute(data)
            .await
            .unwrap();

        let lookup = &report.lookups[0];
        assert_eq!(lookup.field, "AccountName");
        assert_eq!(lookup.related_entity, ACCOUNT);
        assert_eq!(lookup.resolved, 1);
        assert_eq!(lookup.unresolved, 1);

        let written: Vec<String> = org
            .rows(CONTACT)
            .iter()
            .map(|r| r.get_value("AccountName").comparable_text())
            .collect();
        assert_eq!(written, vec![acme.clone(), acme, "Missing Co".to_string()]);

        let verdicts: Vec<ClassificationStatus> =
            report.classification.iter().map(|c| c.status).collect();
        assert_eq!(
            verdicts,
            vec![
                ClassificationStatus::Success,
                ClassificationStatus::Success,
                ClassificationStatus::Failure
            ]
        );
        assert_eq!(
            report.classification[2].reasons,
            vec!["unchanged lookup field AccountName"]
        );
        assert!(logs_contain("Lookup summary"));
    }

    // Scenario: batch size 2 over 5 records with two workers.
    // Expected Outcome:
    // - 3 batches, reported in index order
    // - success + error == 5 and nothing is left unprocessed
    // - one connection per worker plus the control connection
    #[traced_test]
    #[tokio::test]
    async fn tc02_parallel_dispatch_accounts_for_every_record() {
        let out = TempDir::new().unwrap();
        let org = memory_org().with_write_delay(Duration::from_millis(20));

        let report = sync_run(&org, &out, settings(out.path(), 2, 2))
            .execute(numbered_contacts(5))
            .await
            .unwrap();

        let indices: Vec<usize> = report.batches.iter().map(|b| b.batch_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(report.summary.batch_count, 3);
        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.success + report.summary.error, 5);
        assert_eq!(report.summary.unprocessed, 0);
        assert!(report.summary.is_balanced());
        assert!(report.summary.is_parallel());
        assert!(report.batches.iter().all(|b| b.is_balanced()));

        assert_eq!(org.rows(CONTACT).len(), 5);
        assert_eq!(org.write_calls(), 3);
        assert_eq!(org.connections_opened(), 3);
        assert!(org.max_concurrent_writes() <= 2);

        let layout = layout(&out);
        for index in 1..=3 {
            assert_file_exists(&layout.batch_file(index, BatchArtifact::Source), true);
            assert_file_exists(&layout.batch_file(index, BatchArtifact::Success), true);
            assert_file_exists(&layout.batch_file(index, BatchArtifact::Error), false);
        }
        assert_eq!(
            file_row_count(&layout.batch_file(3, BatchArtifact::Source)),
            1
        );
        assert_eq!(file_row_count(&layout.summary_dir().join("success.csv")), 5);
        assert_eq!(file_row_count(&layout.summary_dir().join("error.csv")), 0);
        assert_eq!(
            file_row_count(&layout.logs_dir().join("batch_processing_details.csv")),
            3
        );
    }

    // Scenario: a transform-only run over a picklist column with active
    // values A and B.
    // Expected Outcome: the row holding C fails with C in the reason, the row
    // holding A passes; nothing is written remotely.
    #[traced_test]
    #[tokio::test]
    async fn tc03_transform_run_flags_invalid_picklist_values() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let data = contacts(vec![
            vec![("LastName", "Ada"), ("Status__c", "C")],
            vec![("LastName", "Bob"), ("Status__c", "A")],
        ]);

        let report = transform_run(&org, &out).execute(data).await.unwrap();

        assert!(report.classification[0].is_failure());
        assert!(report.classification[0].reason_text().contains("C"));
        assert_eq!(
            report.classification[0].reasons,
            vec!["invalid picklist value Status__c=C"]
        );
        assert!(!report.classification[1].is_failure());
        assert_eq!(org.write_calls(), 0);

        assert_eq!(report.outputs.failure_rows, 1);
        assert_eq!(report.outputs.success_rows, 1);
        assert_eq!(file_row_count(&report.outputs.failure_file), 1);
        assert_eq!(file_row_count(&report.outputs.transformed_file), 2);

        let header = file_header(&report.outputs.success_file);
        assert!(header.iter().any(|c| c == "Transform_Status"));
        assert!(header.iter().any(|c| c == "Transform_Reason"));
        assert_eq!(
            cell(&report.outputs.success_file, 0, "Transform_Reason"),
            "All validations passed"
        );
    }

    // Scenario: the remote store rejects the invalid picklist value too.
    // Expected Outcome: a partial batch whose error row carries the remote
    // error code in its errors column.
    #[traced_test]
    #[tokio::test]
    async fn tc04_remote_rejection_becomes_error_row() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let data = contacts(vec![
            vec![("LastName", "Ada"), ("Status__c", "C")],
            vec![("LastName", "Bob"), ("Status__c", "A")],
        ]);

        let report = sync_run(&org, &out, settings(out.path(), 10, 1))
            .execute(data)
            .await
            .unwrap();

        let batch = &report.batches[0];
        assert_eq!(batch.status(), BatchStatus::Partial);
        assert_eq!(batch.success_count(), 1);
        assert!(
            batch.error_rows[0]
                .get_value(ERRORS_COLUMN)
                .comparable_text()
                .contains("INVALID_OR_NULL_FOR_RESTRICTED_PICKLIST")
        );

        let layout = layout(&out);
        let error_file = layout.batch_file(1, BatchArtifact::Error);
        assert!(file_header(&error_file).contains(&ERRORS_COLUMN.to_string()));
        assert_eq!(cell(&error_file, 0, "LastName"), "Ada");
    }

    // Scenario: two rows share a value in a column flagged unique.
    // Expected Outcome: both rows fail classification, each naming the
    // other's index; the remote store accepts only the first.
    #[traced_test]
    #[tokio::test]
    async fn tc05_duplicate_unique_values_flag_both_rows() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let data = contacts(vec![
            vec![("LastName", "Ada"), ("Email", "same@x.com")],
            vec![("LastName", "Bob"), ("Email", "other@x.com")],
            vec![("LastName", "Cy"), ("Email", "same@x.com")],
        ]);

        let report = sync_run(&org, &out, settings(out.path(), 10, 1))
            .execute(data)
            .await
            .unwrap();

        assert_eq!(
            report.classification[0].reasons,
            vec!["duplicate unique field Email=same@x.com (rows 2)"]
        );
        assert_eq!(
            report.classification[2].reasons,
            vec!["duplicate unique field Email=same@x.com (rows 0)"]
        );
        assert!(!report.classification[1].is_failure());
        assert_eq!(report.classification_failures(), 2);

        let batch = &report.batches[0];
        assert_eq!(batch.success_count(), 2);
        assert_eq!(batch.error_count(), 1);
        assert!(
            batch.error_rows[0]
                .get_value(ERRORS_COLUMN)
                .comparable_text()
                .starts_with("DUPLICATE_VALUE")
        );

        let transformed = layout(&out).transformed_dir();
        let failures = transformed.join("transform_failure.csv");
        assert_eq!(file_row_count(&failures), 2);
        assert_eq!(cell(&failures, 0, "LastName"), "Ada");
        assert_eq!(cell(&failures, 1, "LastName"), "Cy");
        assert_eq!(cell(&failures, 0, "Transform_Status"), "FAILURE");
        assert!(cell(&failures, 1, "Transform_Reason").contains("duplicate unique field Email"));
        assert_eq!(file_row_count(&transformed.join("transform_success.csv")), 1);
    }

    // Scenario: the second bulk write call drops its connection.
    // Expected Outcome: every record of batch 2 is an error row, batches 1
    // and 3 are untouched.
    #[traced_test]
    #[tokio::test]
    async fn tc06_failed_bulk_call_only_fails_its_batch() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        org.fail_write_call(2);

        let report = sync_run(&org, &out, settings(out.path(), 2, 1))
            .execute(numbered_contacts(6))
            .await
            .unwrap();

        let failed = &report.batches[1];
        assert_eq!(failed.batch_index, 2);
        assert_eq!(failed.error_count(), failed.total_records);
        assert_eq!(failed.success_count(), 0);
        assert_eq!(failed.status(), BatchStatus::Failed);
        assert!(
            failed.error_rows[0]
                .get_value(ERRORS_COLUMN)
                .comparable_text()
                .starts_with("Batch processing failed:")
        );

        for ok in [&report.batches[0], &report.batches[2]] {
            assert_eq!(ok.success_count(), 2);
            assert_eq!(ok.error_count(), 0);
        }
        assert_eq!(report.summary.success, 4);
        assert_eq!(report.summary.error, 2);
        assert_eq!(report.summary.unprocessed, 0);
        assert_eq!(report.metrics.batches_failed, 1);

        let details = layout(&out).logs_dir().join("batch_processing_details.csv");
        assert_eq!(cell(&details, 1, "Batch_Status"), "FAILED");
        assert_eq!(cell(&details, 0, "Batch_Status"), "SUCCESS");
    }

    // Scenario: a worker panics in the middle of a bulk write while other
    // workers run in parallel.
    // Expected Outcome: the panicking batch becomes all errors, the run still
    // completes and accounts for every record.
    #[traced_test]
    #[tokio::test]
    async fn tc07_worker_panic_is_contained_to_its_batch() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        org.panic_on_writes_containing("LastName", "Contact 4");

        let report = sync_run(&org, &out, settings(out.path(), 2, 3))
            .execute(numbered_contacts(6))
            .await
            .unwrap();

        assert_eq!(report.batches.len(), 3);
        assert_eq!(report.batches[2].error_count(), 2);
        assert!(
            report.batches[2]
                .error_detail
                .as_deref()
                .unwrap()
                .contains("injected panic")
        );
        assert_eq!(report.batches[0].success_count(), 2);
        assert_eq!(report.batches[1].success_count(), 2);
        assert!(report.summary.is_balanced());
        assert_eq!(report.summary.unprocessed, 0);
    }

    // Scenario: upsert requested without an external id column.
    // Expected Outcome: configuration error before anything is written.
    #[traced_test]
    #[tokio::test]
    async fn tc08_upsert_without_external_id_is_rejected() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        let mut cfg = settings(out.path(), 10, 1);
        cfg.operation = WriteOperation::Upsert;

        let err = sync_run(&org, &out, cfg)
            .execute(numbered_contacts(2))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Config(SettingsError::ValidationFailed(_))));
        assert_eq!(org.write_calls(), 0);
    }

    // Scenario: upsert keyed on an external id column, run twice.
    // Expected Outcome: the second run updates the rows from the first.
    #[traced_test]
    #[tokio::test]
    async fn tc09_upsert_updates_existing_rows() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        let mut cfg = settings(out.path(), 10, 1);
        cfg.operation = WriteOperation::Upsert;
        cfg.external_id_field = Some("External_Id__c".into());

        let first = contacts(vec![
            vec![("External_Id__c", "E1"), ("LastName", "Ada")],
            vec![("External_Id__c", "E2"), ("LastName", "Bob")],
        ]);
        let second = contacts(vec![vec![("External_Id__c", "E1"), ("LastName", "Ada Lovelace")]]);

        sync_run(&org, &out, cfg.clone()).execute(first).await.unwrap();
        let report = sync_run(&org, &out, cfg).execute(second).await.unwrap();

        assert_eq!(report.summary.success, 1);
        let rows = org.rows(CONTACT);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_value("LastName").comparable_text(), "Ada Lovelace");
    }

    // Scenario: the reviewer cancels at the first lookup checkpoint.
    // Expected Outcome: the run stops before dispatch and leaves the raw
    // dataset behind.
    #[traced_test]
    #[tokio::test]
    async fn tc10_review_cancel_aborts_before_dispatch() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        seed_account(&org, "Acme", "A-1");

        let data = contacts(vec![vec![("LastName", "Ada"), ("AccountName", "Acme")]]);
        let err = sync_run(&org, &out, settings(out.path(), 10, 1))
            .with_review(Arc::new(ScriptedReview::new([ReviewDecision::Cancel])))
            .execute(data)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Lookup(LookupError::Cancelled { .. })));
        assert!(err.is_cancellation());
        assert_eq!(org.write_calls(), 0);
        assert_file_exists(&layout(&out).summary_dir().join("raw.csv"), true);
    }

    // Scenario: the reviewer switches the match field to AccountNumber.
    // Expected Outcome: the column is restored and resolved again by number.
    #[traced_test]
    #[tokio::test]
    async fn tc11_reselect_resolves_against_new_match_field() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        let acme = seed_account(&org, "Acme", "A-1");

        let data = contacts(vec![vec![("LastName", "Ada"), ("AccountName", "A-1")]]);
        let review = Arc::new(ScriptedReview::new([ReviewDecision::Reselect(
            "AccountNumber".into(),
        )]));

        let report = transform_run(&org, &out)
            .with_review(review.clone())
            .execute(data)
            .await
            .unwrap();

        let checkpoints = review.checkpoints();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0], ("AccountName".to_string(), "Name".to_string(), 0));
        assert_eq!(
            checkpoints[1],
            ("AccountName".to_string(), "AccountNumber".to_string(), 1)
        );

        assert_eq!(report.lookups[0].match_field, "AccountNumber");
        assert_eq!(
            report.transformed.records[0].get_value("AccountName").comparable_text(),
            acme
        );
        assert!(!report.classification[0].is_failure());
    }

    // Scenario: cancellation is requested before the run starts dispatching.
    // Expected Outcome: Cancelled error and no bulk writes.
    #[traced_test]
    #[tokio::test]
    async fn tc12_cancelled_run_dispatches_nothing() {
        let out = TempDir::new().unwrap();
        let org = memory_org();
        let token = CancellationToken::new();
        token.cancel();

        let ctx = crate::context(out.path()).with_cancellation(token);
        let err = engine_runtime::execution::SyncRun::new(
            ctx,
            settings(out.path(), 10, 1),
            Arc::new(org.clone()),
        )
        .execute(numbered_contacts(3))
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(org.write_calls(), 0);

        let transformed = layout(&out).transformed_dir();
        assert_eq!(file_row_count(&transformed.join("transform_success.csv")), 3);
        assert_file_exists(&transformed.join("transform_failure.csv"), true);
    }

    // Scenario: boolean and messy text cells in a full run.
    // Expected Outcome: the payload carries coerced booleans and trimmed
    // text, while the audit files keep the source values.
    #[traced_test]
    #[tokio::test]
    async fn tc13_payload_is_sanitized_and_coerced() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let data = contacts(vec![
            vec![("LastName", "  Ada  "), ("Active__c", "yes")],
            vec![("LastName", "Bob"), ("Active__c", "nan")],
        ]);

        let report = sync_run(&org, &out, settings(out.path(), 10, 1))
            .execute(data)
            .await
            .unwrap();
        assert_eq!(report.summary.success, 2);

        let rows = org.rows(CONTACT);
        assert_eq!(rows[0].get_value("LastName").comparable_text(), "Ada");
        assert_eq!(rows[0].get_value("Active__c"), Value::Boolean(true));
        assert!(rows[1].get_value("Active__c").is_null());

        let raw = load_csv(&layout(&out).summary_dir().join("raw.csv"));
        assert_eq!(raw.records[1].get_value("Active__c").comparable_text(), "nan");
    }

    // Scenario: a complete run writes its logs.
    // Expected Outcome: processing summary and JSON summary agree with the
    // returned report.
    #[traced_test]
    #[tokio::test]
    async fn tc14_run_summary_artifacts() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let report = sync_run(&org, &out, settings(out.path(), 3, 1))
            .execute(numbered_contacts(4))
            .await
            .unwrap();

        let logs = layout(&out).logs_dir();
        let summary_csv = logs.join("processing_summary.csv");
        assert_eq!(file_row_count(&summary_csv), 1);
        assert_eq!(cell(&summary_csv, 0, "Total_Records"), "4");
        assert_eq!(cell(&summary_csv, 0, "Total_Batches"), "2");
        assert_eq!(cell(&summary_csv, 0, "Operation"), "insert");

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(logs.join("run_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["summary"]["run_id"], report.summary.run_id.as_str());
        assert_eq!(json["summary"]["success"], 4);
        assert_eq!(json["metrics"]["batches_processed"], 2);
        assert!(logs_contain("Synchronization run finished"));
    }

    // Scenario: the input file uses its own headers and a column mapping
    // names the entity fields, with one entry for a column the file lacks.
    // Expected Outcome: rows land under the mapped fields, the unmapped
    // column is dropped and the stale entry is only warned about.
    #[traced_test]
    #[tokio::test]
    async fn tc15_column_mapping_renames_before_sync() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let data = contacts(vec![
            vec![("Surname", "Ada"), ("Mail", "ada@x.com"), ("Scratch", "ignore")],
            vec![("Surname", "Bob"), ("Mail", "bob@x.com"), ("Scratch", "")],
        ]);
        let mapping = ColumnMapping::new([
            ("Surname", "LastName"),
            ("Mail", "Email"),
            ("Fax Number", "Fax"),
        ]);

        let report = sync_run(&org, &out, settings(out.path(), 10, 1))
            .with_mapping(mapping)
            .execute(data)
            .await
            .unwrap();
        assert_eq!(report.summary.success, 2);

        let rows = org.rows(CONTACT);
        assert_eq!(rows[1].get_value("LastName").comparable_text(), "Bob");
        assert_eq!(rows[0].get_value("Email").comparable_text(), "ada@x.com");
        assert!(rows[0].get("Scratch").is_none());

        let raw = layout(&out).summary_dir().join("raw.csv");
        assert_eq!(file_header(&raw), vec!["LastName", "Email"]);
        assert!(logs_contain("Mapping entries not found in the data were ignored"));
    }

    // Scenario: a mapping that shares no column with the input.
    // Expected Outcome: the run stops with a mapping error before any
    // write.
    #[traced_test]
    #[tokio::test]
    async fn tc16_mapping_without_matching_columns_is_rejected() {
        let out = TempDir::new().unwrap();
        let org = memory_org();

        let err = sync_run(&org, &out, settings(out.path(), 10, 1))
            .with_mapping(ColumnMapping::new([("Fax Number", "Fax")]))
            .execute(numbered_contacts(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Mapping(MappingError::NoMatchingColumns)
        ));
        assert_eq!(org.write_calls(), 0);
    }
}
