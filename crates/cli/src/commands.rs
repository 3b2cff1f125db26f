use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Load a CSV file into a remote entity
    Sync {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, help = "Rows per batch; derived from the row count when omitted")]
        batch_size: Option<usize>,

        #[arg(long, help = "Number of batches written concurrently")]
        parallelism: Option<usize>,

        #[arg(long, help = "Write operation: insert or upsert")]
        operation: Option<String>,

        #[arg(long, help = "External id field used to match records on upsert")]
        external_id: Option<String>,

        #[arg(long, help = "Per-request timeout in seconds")]
        timeout_secs: Option<u64>,

        #[arg(long, help = "Leave boolean-typed columns as they appear in the file")]
        no_bool_coercion: bool,

        #[arg(long, help = "JSON settings file; command line flags take precedence")]
        settings: Option<PathBuf>,

        #[arg(long, help = "Print the run summary as JSON")]
        json: bool,
    },
    /// Resolve lookups and classify rows without writing anything
    Transform {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the remote schema of an entity
    Describe {
        #[arg(long)]
        entity: String,

        #[arg(
            long,
            help = "If specified, writes the schema to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Check that the configured credentials reach the remote store
    CheckConn {
        #[arg(long, default_value = "Account", help = "Entity described as a probe")]
        entity: String,
    },
}

#[derive(Args)]
pub struct InputArgs {
    #[arg(long, help = "CSV file to load")]
    pub file: PathBuf,

    #[arg(long, help = "Target entity name")]
    pub entity: String,

    #[arg(long, help = "Root directory for run artifacts")]
    pub output_root: Option<PathBuf>,

    #[arg(
        long = "lookup",
        value_name = "COLUMN=FIELD",
        help = "Match a reference column on FIELD instead of the default"
    )]
    pub lookups: Vec<String>,

    #[arg(
        long,
        value_name = "JSON",
        help = "JSON object mapping file columns to entity fields; unmapped columns are dropped"
    )]
    pub mapping: Option<PathBuf>,

    #[arg(long, help = "Review each lookup resolution before continuing")]
    pub interactive: bool,
}
