use crate::settings::{
    RATE_LIMIT_PARALLELISM, SyncSettings, batch_size::BatchSizePolicy, error::SettingsError,
    fields::FieldValidation, validated::ValidatedSettings,
};
use crate::report::finding::Finding;
use model::{
    execution::write::WriteOperation, records::record::Dataset, schema::describe::EntityDescribe,
};
use tracing::{info, warn};

/// Checks a run's settings against the dataset and target schema before
/// anything is written.
pub struct SettingsValidator<'a> {
    dataset: &'a Dataset,
    describe: &'a EntityDescribe,
}

impl<'a> SettingsValidator<'a> {
    pub fn new(dataset: &'a Dataset, describe: &'a EntityDescribe) -> Self {
        Self { dataset, describe }
    }

    pub fn validate(&self, settings: &SyncSettings) -> Result<ValidatedSettings, SettingsError> {
        let mut errors: Vec<String> = Vec::new();
        let mut findings: Vec<Finding> = Vec::new();

        let batch_size = self.validate_batch_size(settings, &mut errors);
        self.validate_parallelism(settings, &mut errors, &mut findings);
        let external_id_field = self.validate_external_id(settings, &mut errors);

        let fields = FieldValidation::check(
            self.describe,
            self.dataset.columns.iter().map(String::as_str),
        );
        for (column, field_type) in &fields.complex {
            errors.push(format!(
                "column {column} maps to compound field type {field_type}"
            ));
        }
        findings.extend(
            fields
                .findings(&self.describe.name)
                .into_iter()
                .filter(|f| !f.is_error()),
        );

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = ValidatedSettings {
            batch_size,
            parallelism: settings.parallelism,
            operation: settings.operation,
            external_id_field,
            request_timeout: settings.request_timeout,
            coerce_booleans: settings.coerce_booleans,
            fields,
            findings,
        };
        self.log_validated_settings(&validated);
        Ok(validated)
    }

    fn validate_batch_size(&self, settings: &SyncSettings, errors: &mut Vec<String>) -> usize {
        if settings.batch_size == Some(0) {
            errors.push("batch_size must be at least 1".to_string());
            return 1;
        }

        let policy = BatchSizePolicy::new(settings.batch_size);
        let size = policy.resolve(self.dataset.len());
        if !policy.is_explicit() {
            info!(
                rows = self.dataset.len(),
                batch_size = size,
                "Batch size selected from dataset size"
            );
        }
        size
    }

    fn validate_parallelism(
        &self,
        settings: &SyncSettings,
        errors: &mut Vec<String>,
        findings: &mut Vec<Finding>,
    ) {
        if settings.parallelism == 0 {
            errors.push("parallelism must be at least 1".to_string());
        } else if settings.parallelism > RATE_LIMIT_PARALLELISM {
            warn!(
                parallelism = settings.parallelism,
                "High parallelism may trigger remote API rate limits"
            );
            findings.push(Finding::rate_limit(settings.parallelism));
        }
    }

    fn validate_external_id(
        &self,
        settings: &SyncSettings,
        errors: &mut Vec<String>,
    ) -> Option<String> {
        if settings.operation != WriteOperation::Upsert {
            if settings.external_id_field.is_some() {
                warn!("external_id_field is ignored for insert");
            }
            return None;
        }

        let Some(column) = settings
            .external_id_field
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            errors.push("upsert requires an external_id_field".to_string());
            return None;
        };

        if !self.dataset.has_column(column) {
            errors.push(format!("external id column {column} is not in the dataset"));
        }

        match self.describe.field(column) {
            Some(field) if field.external_id || field.name == "Id" => {}
            Some(_) => errors.push(format!(
                "{column} is not an external id field on {}",
                self.describe.name
            )),
            None => errors.push(format!(
                "external id field {column} does not exist on {}",
                self.describe.name
            )),
        }

        Some(column.to_string())
    }

    fn log_validated_settings(&self, settings: &ValidatedSettings) {
        info!(
            entity = %self.describe.name,
            rows = self.dataset.len(),
            batch_size = settings.batch_size,
            batches = settings.batch_count(self.dataset.len()),
            parallelism = settings.parallelism,
            operation = %settings.operation,
            external_id = settings.external_id_field.as_deref().unwrap_or("-"),
            timeout_secs = settings.request_timeout.as_secs(),
            "Settings validated"
        );
        for finding in &settings.findings {
            warn!(code = %finding.code, "{}", finding.message);
        }
    }
}
