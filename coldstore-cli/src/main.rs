/*!
Coldstore CLI - command-line interface for the data retention engine.

Runs the retention engines against a JSON state file and a local blob
directory, so policies, archives and deletion requests survive between
invocations without a database.
*/

use anyhow::Context;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use coldstore_core::store::{ArchiveFilter, DeletionFilter, Page, PolicyFilter, RetentionStore};
use coldstore_core::{
    DataType, DateRange, DeletionInput, DeletionStatus, EngineConfig, LocalBlobStore,
    MemoryDataSource, MemoryStore, PolicyInput, RestoreInput, RetentionPolicy, RetentionService,
    SourceRegistry, SourceRow, StoreState, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "coldstore")]
#[command(about = "CLI for the coldstore data retention engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path of the JSON state file
    #[arg(long, global = true, default_value = "./coldstore.json")]
    state: PathBuf,

    /// Directory archived blobs are written under
    #[arg(long, global = true, default_value = "./archives")]
    blobs: PathBuf,

    /// Acting user recorded on requests
    #[arg(long, global = true, default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage retention policies
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
    /// Run and inspect archive jobs
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },
    /// Request a restore of an archived batch
    Restore {
        /// Archive record id
        archive_id: Uuid,
        /// Why the restore is needed
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Manage deletion requests
    Deletion {
        #[command(subcommand)]
        command: DeletionCommands,
    },
    /// Print the storage metrics rollup as JSON
    Metrics,
    /// Seed demo rows into a domain table
    Seed {
        /// Data type to seed
        data_type: DataType,
        /// Number of rows, spread over the last 90 days
        #[arg(long, default_value_t = 100)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Create a retention policy
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        data_type: DataType,
        #[arg(long, default_value_t = 30)]
        hot_days: u32,
        #[arg(long, default_value_t = 90)]
        warm_days: u32,
        #[arg(long, default_value_t = 365)]
        cold_days: u32,
        /// Forbid deletion requests under this policy
        #[arg(long)]
        protect: bool,
        /// Let deletion requests skip the approval step
        #[arg(long)]
        no_approval: bool,
        #[arg(long, default_value_t = 1)]
        approval_level: u8,
        /// Archive schedule, e.g. "@daily" or "every 2 weeks"
        #[arg(long)]
        schedule: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List policies
    List {
        #[arg(long)]
        data_type: Option<DataType>,
        /// Only active policies
        #[arg(long)]
        active: bool,
    },
    /// Show one policy in full
    Show { id: Uuid },
    /// Delete a policy without active archives or deletion requests
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum ArchiveCommands {
    /// Archive a policy's rows over a date range
    Run {
        policy_id: Uuid,
        /// Range start, YYYY-MM-DD (inclusive)
        #[arg(long)]
        from: String,
        /// Range end, YYYY-MM-DD (inclusive)
        #[arg(long)]
        to: String,
    },
    /// List archive records
    List {
        #[arg(long)]
        policy_id: Option<Uuid>,
    },
}

#[derive(Subcommand)]
enum DeletionCommands {
    /// Create a deletion request
    Create {
        policy_id: Uuid,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve a pending request
    Approve { id: Uuid },
    /// Reject a pending request
    Reject {
        id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Execute an approved request (backs up, then deletes)
    Execute { id: Uuid },
    /// List deletion requests
    List,
}

/// Everything the CLI persists between invocations.
#[derive(Serialize, Deserialize, Default)]
struct CliState {
    store: StoreState,
    /// Domain rows per data type slug.
    sources: BTreeMap<String, Vec<SourceRow>>,
}

#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Data Type")]
    data_type: String,
    #[tabled(rename = "Hot/Warm/Cold")]
    tiers: String,
    #[tabled(rename = "Protected")]
    protected: bool,
    #[tabled(rename = "Approval")]
    approval: bool,
    #[tabled(rename = "Active")]
    active: bool,
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Data Type")]
    data_type: String,
    #[tabled(rename = "Records")]
    records: u64,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Archived")]
    archived_at: String,
}

#[derive(Tabled)]
struct DeletionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Data Type")]
    data_type: String,
    #[tabled(rename = "Records")]
    records: u64,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Requested By")]
    requested_by: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let state = load_state(&cli.state)?;
    let store = Arc::new(MemoryStore::from_state(state.store));

    let mut registry = SourceRegistry::new();
    let mut sources: Vec<(DataType, Arc<MemoryDataSource>)> = Vec::new();
    for &data_type in DataType::all() {
        let rows = state
            .sources
            .get(data_type.slug())
            .cloned()
            .unwrap_or_default();
        let source = Arc::new(MemoryDataSource::from_rows(
            data_type,
            table_name(data_type),
            rows,
        ));
        registry.register(source.clone());
        sources.push((data_type, source));
    }

    let config = EngineConfig::default_local(cli.blobs.clone());
    let blob = Arc::new(LocalBlobStore::new(&cli.blobs));
    let service = RetentionService::new(
        store.clone(),
        blob,
        Arc::new(registry),
        Arc::new(SystemClock),
        &config,
    );

    run_command(&cli, &service, &store, &sources).await?;

    let state = CliState {
        store: store.state(),
        sources: sources
            .iter()
            .map(|(data_type, source)| (data_type.slug().to_string(), source.rows()))
            .collect(),
    };
    save_state(&cli.state, &state)?;
    Ok(())
}

async fn run_command(
    cli: &Cli,
    service: &RetentionService,
    store: &Arc<MemoryStore>,
    sources: &[(DataType, Arc<MemoryDataSource>)],
) -> Result<(), anyhow::Error> {
    match &cli.command {
        Commands::Policy { command } => run_policy(cli, service, command).await,
        Commands::Archive { command } => run_archive(service, store, command).await,
        Commands::Restore {
            archive_id,
            reason,
            notes,
        } => {
            let outcome = service
                .restore
                .restore_from_archive(
                    RestoreInput {
                        archive_record_id: *archive_id,
                        reason: reason.clone(),
                        notes: notes.clone(),
                    },
                    cli.actor.clone(),
                )
                .await?;
            println!("Restore request {}", outcome.request_id);
            println!("  Status: {:?}", outcome.status);
            println!("  Estimated wait: {}s", outcome.estimated_wait_secs);
            if let Some(url) = &outcome.restored_blob_url {
                println!("  URL: {url}");
            }
            if let Some(expires_at) = outcome.expires_at {
                println!("  Expires: {}", expires_at.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(error) = &outcome.error {
                println!("  Error: {error}");
            }
            Ok(())
        }
        Commands::Deletion { command } => run_deletion(cli, service, store, command).await,
        Commands::Metrics => {
            let metrics = service.metrics.storage_metrics().await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        }
        Commands::Seed { data_type, count } => {
            let source = sources
                .iter()
                .find(|(dt, _)| dt == data_type)
                .map(|(_, s)| s)
                .context("unknown data type")?;
            let now = Utc::now();
            for i in 0..*count {
                source.push(
                    now - chrono::Duration::days((i % 90) as i64)
                        - chrono::Duration::minutes(i as i64),
                    serde_json::json!({ "seed": true, "seq": i }),
                );
            }
            println!("Seeded {count} rows into {}", table_name(*data_type));
            Ok(())
        }
    }
}

async fn run_policy(
    cli: &Cli,
    service: &RetentionService,
    command: &PolicyCommands,
) -> Result<(), anyhow::Error> {
    match command {
        PolicyCommands::Create {
            name,
            data_type,
            hot_days,
            warm_days,
            cold_days,
            protect,
            no_approval,
            approval_level,
            schedule,
            description,
        } => {
            let policy = service
                .policies
                .create_policy(
                    PolicyInput {
                        name: name.clone(),
                        description: description.clone(),
                        data_type: *data_type,
                        hot_storage_days: *hot_days,
                        warm_storage_days: *warm_days,
                        cold_storage_days: *cold_days,
                        deletion_protection: *protect,
                        require_approval: !no_approval,
                        min_approval_level: *approval_level,
                        archive_schedule: schedule.clone(),
                    },
                    Some(cli.actor.clone()),
                )
                .await?;
            println!("Created policy {}", policy.id);
            Ok(())
        }
        PolicyCommands::List { data_type, active } => {
            let filter = PolicyFilter {
                data_type: *data_type,
                is_active: active.then_some(true),
            };
            let policies = service.policies.list_policies(&filter, Page::default()).await?;
            if policies.is_empty() {
                println!("No policies found");
                return Ok(());
            }
            let rows: Vec<PolicyRow> = policies
                .iter()
                .map(|p| PolicyRow {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    data_type: p.data_type.to_string(),
                    tiers: format!(
                        "{}/{}/{}",
                        p.hot_storage_days, p.warm_storage_days, p.cold_storage_days
                    ),
                    protected: p.deletion_protection,
                    approval: p.require_approval,
                    active: p.is_active,
                })
                .collect();
            println!("{}", Table::new(rows));
            Ok(())
        }
        PolicyCommands::Show { id } => {
            let policy = service.policies.policy(*id).await?;
            print_policy(&policy);
            Ok(())
        }
        PolicyCommands::Delete { id } => {
            service.policies.delete_policy(*id).await?;
            println!("Deleted policy {id}");
            Ok(())
        }
    }
}

async fn run_archive(
    service: &RetentionService,
    store: &Arc<MemoryStore>,
    command: &ArchiveCommands,
) -> Result<(), anyhow::Error> {
    match command {
        ArchiveCommands::Run {
            policy_id,
            from,
            to,
        } => {
            let range = parse_range(from, to)?;
            let result = service.archive.run_archive_job(*policy_id, range).await?;
            if result.success {
                println!("Archive {} complete", result.archive_id);
                println!("  Records: {}", result.record_count);
                println!(
                    "  Size: {} -> {} ({:.0}% saved)",
                    format_size(result.original_size_bytes),
                    format_size(result.compressed_size_bytes),
                    (1.0 - result.compression_ratio) * 100.0
                );
                if let Some(checksum) = &result.checksum {
                    println!("  Checksum: {checksum}");
                }
                if let Some(url) = &result.blob_url {
                    println!("  Blob: {url}");
                }
            } else {
                println!(
                    "Archive {} failed: {}",
                    result.archive_id,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }
        ArchiveCommands::List { policy_id } => {
            let filter = ArchiveFilter {
                policy_id: *policy_id,
                ..Default::default()
            };
            let archives = store.archives(&filter, Page::default()).await?;
            if archives.is_empty() {
                println!("No archive records found");
                return Ok(());
            }
            let rows: Vec<ArchiveRow> = archives
                .iter()
                .map(|a| ArchiveRow {
                    id: a.id.to_string(),
                    data_type: a.data_type.to_string(),
                    records: a.record_count,
                    size: a
                        .compressed_size_bytes
                        .map(format_size)
                        .unwrap_or_else(|| "-".to_string()),
                    tier: a.storage_tier.to_string(),
                    status: format!("{:?}", a.status),
                    archived_at: a
                        .archived_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            println!("{}", Table::new(rows));
            Ok(())
        }
    }
}

async fn run_deletion(
    cli: &Cli,
    service: &RetentionService,
    store: &Arc<MemoryStore>,
    command: &DeletionCommands,
) -> Result<(), anyhow::Error> {
    match command {
        DeletionCommands::Create {
            policy_id,
            from,
            to,
            reason,
            notes,
        } => {
            let range = parse_range(from, to)?;
            let request = service
                .deletion
                .create_deletion_request(
                    DeletionInput {
                        policy_id: *policy_id,
                        range,
                        reason: reason.clone(),
                        notes: notes.clone(),
                    },
                    cli.actor.clone(),
                )
                .await?;
            println!(
                "Deletion request {} ({:?}, {} records affected)",
                request.id, request.status, request.record_count
            );
            Ok(())
        }
        DeletionCommands::Approve { id } => {
            let request = service
                .deletion
                .approve_deletion_request(*id, true, cli.actor.clone(), None)
                .await?;
            println!("Approved deletion request {} by {}", request.id, cli.actor);
            Ok(())
        }
        DeletionCommands::Reject { id, reason } => {
            let request = service
                .deletion
                .approve_deletion_request(*id, false, cli.actor.clone(), reason.clone())
                .await?;
            println!("Rejected deletion request {}", request.id);
            Ok(())
        }
        DeletionCommands::Execute { id } => {
            let outcome = service.deletion.execute_deletion(*id).await?;
            if outcome.success {
                println!("Deleted {} records", outcome.deleted_record_count);
                if let Some(backup_id) = outcome.backup_archive_id {
                    println!("  Backup archive: {backup_id}");
                }
            } else {
                println!(
                    "Deletion failed: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }
        DeletionCommands::List => {
            let deletions = store
                .deletions(&DeletionFilter::default(), Page::default())
                .await?;
            if deletions.is_empty() {
                println!("No deletion requests found");
                return Ok(());
            }
            let rows: Vec<DeletionRow> = deletions
                .iter()
                .map(|d| DeletionRow {
                    id: d.id.to_string(),
                    data_type: d.data_type.to_string(),
                    records: d.record_count,
                    status: format!("{:?}", d.status),
                    requested_by: d.requested_by.clone(),
                    reason: d.reason.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
            print_pending_hint(&deletions.iter().map(|d| d.status).collect::<Vec<_>>());
            Ok(())
        }
    }
}

fn print_policy(policy: &RetentionPolicy) {
    println!("Policy Details:");
    println!("  ID: {}", policy.id);
    println!("  Name: {}", policy.name);
    if let Some(description) = &policy.description {
        println!("  Description: {description}");
    }
    println!("  Data Type: {}", policy.data_type);
    println!(
        "  Tiers: hot {}d, warm {}d, cold {}d",
        policy.hot_storage_days, policy.warm_storage_days, policy.cold_storage_days
    );
    println!("  Deletion Protection: {}", policy.deletion_protection);
    println!(
        "  Approval: required={} (level {})",
        policy.require_approval, policy.min_approval_level
    );
    if let Some(schedule) = &policy.archive_schedule {
        println!("  Schedule: {schedule}");
    }
    if let Some(next) = policy.next_archive_at {
        println!("  Next Archive: {}", next.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(last) = policy.last_archive_at {
        println!("  Last Archive: {}", last.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  Active: {}", policy.is_active);
}

fn print_pending_hint(statuses: &[DeletionStatus]) {
    let pending = statuses
        .iter()
        .filter(|s| **s == DeletionStatus::Pending)
        .count();
    if pending > 0 {
        println!("{pending} request(s) awaiting approval");
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_state(path: &PathBuf) -> Result<CliState, anyhow::Error> {
    if !path.exists() {
        return Ok(CliState::default());
    }
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse state file {}", path.display()))
}

fn save_state(path: &PathBuf, state: &CliState) -> Result<(), anyhow::Error> {
    let data = serde_json::to_vec_pretty(state)?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write state file {}", path.display()))
}

fn table_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::AuditLog => "audit_logs",
        DataType::ChangeHistory => "change_history",
        DataType::UsageLog => "usage_logs",
        DataType::UserSession => "user_sessions",
        DataType::Document => "documents",
        DataType::Notification => "notifications",
    }
}

fn parse_range(from: &str, to: &str) -> Result<DateRange, anyhow::Error> {
    let from = parse_day(from)?;
    let to = parse_day(to)?;
    let start = Utc.from_utc_datetime(&from.and_hms_opt(0, 0, 0).context("invalid time")?);
    let end = Utc.from_utc_datetime(&to.and_hms_opt(23, 59, 59).context("invalid time")?);
    let range = DateRange::new(start, end);
    range.validate()?;
    Ok(range)
}

fn parse_day(s: &str) -> Result<NaiveDate, anyhow::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
