use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cbe")]
#[command(about = "Catering billing consistency engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Generate a milestone schedule for a total payable amount
    Schedule {
        #[arg(long)]
        total_cents: i64,

        /// Lead time from today (or --generated-on) to the event
        #[arg(long)]
        days_until_due: i64,

        /// Tax-exempt contract (single net-term milestone)
        #[arg(long, default_value_t = false)]
        exempt: bool,

        /// Generation date (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        generated_on: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Waterfall a paid total (or payment events) over milestones from a JSON file
    Allocate {
        /// JSON file: {"milestones": [...], "total_paid_cents": N} or
        /// {"milestones": [...], "payments": [...]}
        #[arg(long)]
        file: String,
    },

    /// Compute the order key for moving one item
    Reorder {
        /// Current keys in visual order, comma separated (e.g. 10,20,30)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        keys: Vec<i64>,

        /// Source visual index
        #[arg(long)]
        from: usize,

        /// Destination visual index
        #[arg(long)]
        to: usize,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Change log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a JSONL change log
    Verify {
        /// Log path; defaults to /audit/log_path from --config
        #[arg(long)]
        path: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Diff two quote JSON files and append the attributed change records
    Record {
        #[arg(long)]
        path: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Previous quote facts (JSON)
        #[arg(long)]
        old: String,

        /// New quote facts (JSON)
        #[arg(long)]
        new: String,

        #[arg(long, default_value = "event_order")]
        entity_type: String,

        #[arg(long)]
        entity_id: String,

        #[arg(long)]
        document_id: Option<String>,

        /// Operator identity
        #[arg(long = "by")]
        attribution: String,

        /// phone | email | portal_request | in_person | internal_adjustment
        #[arg(long)]
        source: String,

        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        note: Option<String>,

        /// Replace the generated customer summary
        #[arg(long)]
        summary: Option<String>,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => commands::config_hash(&paths),
        Commands::Schedule {
            total_cents,
            days_until_due,
            exempt,
            generated_on,
            config_paths,
        } => commands::billing::schedule(
            total_cents,
            days_until_due,
            exempt,
            generated_on,
            &config_paths,
        ),
        Commands::Allocate { file } => commands::billing::allocate(&file),
        Commands::Reorder {
            keys,
            from,
            to,
            config_paths,
        } => commands::billing::reorder(&keys, from, to, &config_paths),
        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path, config_paths } => {
                commands::audit::verify(path, &config_paths)
            }
            AuditCmd::Record {
                path,
                config_paths,
                old,
                new,
                entity_type,
                entity_id,
                document_id,
                attribution,
                source,
                contact,
                note,
                summary,
            } => commands::audit::record(commands::audit::RecordArgs {
                path,
                config_paths,
                old,
                new,
                entity_type,
                entity_id,
                document_id,
                attribution,
                source,
                contact,
                note,
                summary,
            }),
        },
    }
}

/// Logs go to stderr; stdout carries the `key=value` results.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
