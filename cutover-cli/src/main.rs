//! `cutover` - offline migration tools.
//!
//! Configuration comes from the environment (after loading `.env.local` and
//! `.env`). Each command prints its report as pretty JSON on stdout; logs go
//! to stderr.
//!
//! Exit codes: 0 on success, 1 on any error, 2 when a non-dry-run backfill
//! finishes with missing or mismatched documents.

mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cutover_core::{
    format_timestamp, CollectionName, CutoverError, MigrationConfig, OrgId, PathResolver,
    PhaseFlags, Report, StoreConfig, Timestamp,
};
use cutover_engine::{
    BackfillOptions, BackfillRunner, ParityOptions, ParityReporter, RetirementArchiver,
    RetirementOptions, SeedLayout, StagingSeeder,
};
use cutover_storage::LmdbStore;

const EXIT_FAILURE: u8 = 1;
const EXIT_PARITY_ISSUES: u8 = 2;
const DEFAULT_SEED_ORG: &str = "stgPilotOrgA";

#[derive(Parser, Debug)]
#[command(
    name = "cutover",
    version,
    about = "Tenant collection migration: backfill, read cutover report, legacy retirement",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy legacy collections into the module namespace and verify the copy.
    Backfill(BackfillArgs),
    /// Compare legacy and module records without writing anything.
    ReadCutoverReport(ReportArgs),
    /// Archive legacy collections and, with --force, delete the originals.
    RetireLegacy(RetireArgs),
    /// Write the staging pilot dataset for one organisation.
    SeedStaging(SeedArgs),
}

#[derive(Args, Debug)]
struct TenantArgs {
    /// Process only this organisation (default: every organisation).
    #[arg(long, value_parser = parse_org)]
    org: Option<OrgId>,

    /// Organisations processed at once.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,
}

#[derive(Args, Debug)]
struct BackfillArgs {
    #[command(flatten)]
    tenants: TenantArgs,

    /// Count and verify without writing.
    #[arg(long)]
    dry_run: bool,

    /// Documents compared field by field per collection.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    sample_size: u32,

    /// Maximum documents moved per collection.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[command(flatten)]
    tenants: TenantArgs,

    /// Documents compared field by field per organisation.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    sample_size: u32,

    /// Compare this collection instead of training records.
    #[arg(long, value_parser = parse_collection)]
    collection: Option<CollectionName>,
}

#[derive(Args, Debug)]
struct RetireArgs {
    #[command(flatten)]
    tenants: TenantArgs,

    /// Count without archiving or deleting.
    #[arg(long)]
    dry_run: bool,

    /// Archive but keep the legacy originals.
    #[arg(long)]
    archive_only: bool,

    /// Delete legacy originals after archiving them.
    #[arg(long)]
    force: bool,

    /// Maximum documents retired per collection.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,
}

impl RetireArgs {
    fn options(&self) -> RetirementOptions {
        RetirementOptions {
            dry_run: self.dry_run,
            archive_only: self.archive_only,
            force: self.force,
            limit: self.limit.map(|n| n as usize),
            concurrency: self.tenants.concurrency as usize,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    /// Training collections under the module namespace.
    Module,
    /// Training collections at legacy tenant-root paths.
    Legacy,
}

impl From<LayoutArg> for SeedLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Module => SeedLayout::Module,
            LayoutArg::Legacy => SeedLayout::Legacy,
        }
    }
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Organisation to seed.
    #[arg(long, default_value = DEFAULT_SEED_ORG, value_parser = parse_org)]
    org: OrgId,

    /// Prepare the dataset without writing.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, value_enum, default_value_t = LayoutArg::Module)]
    layout: LayoutArg,

    /// Also write the summary as a timestamped JSON file here.
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

fn parse_org(raw: &str) -> Result<OrgId, String> {
    OrgId::parse(raw).map_err(|e| e.to_string())
}

fn parse_collection(raw: &str) -> Result<CollectionName, String> {
    CollectionName::parse(raw).map_err(|e| e.to_string())
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Cutover(#[from] CutoverError),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    fn is_fatal_config(&self) -> bool {
        matches!(self, CliError::Cutover(e) if e.is_fatal_config())
    }
}

/// Load `.env.local` then `.env`. Variables already set are never replaced.
fn load_env_files() {
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_filename(file) {
            if !e.not_found() {
                eprintln!("Ignoring unreadable {}: {}", file, e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    load_env_files();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = telemetry::init_tracing() {
        eprintln!("{}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            if e.is_fatal_config() {
                tracing::error!(error = %e, "Configuration error, aborting before any store access");
            } else {
                tracing::error!(error = %e, "Command failed");
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let store_config = StoreConfig::from_env()?;
    let flags = PhaseFlags::from_env()?;
    execute(cli, &store_config, flags).await
}

/// Run a parsed command. Option and config checks happen before the store
/// directory is created or opened.
async fn execute(cli: Cli, store_config: &StoreConfig, flags: PhaseFlags) -> Result<ExitCode, CliError> {
    if let Command::RetireLegacy(args) = &cli.command {
        args.options().validate()?;
    }
    let config = MigrationConfig::default();
    config.validate()?;
    let resolver = PathResolver::new(config.module_id.clone(), flags);
    tracing::info!(
        module_id = %config.module_id,
        read_mode = %resolver.resolve_read_mode(),
        write_targets = ?resolver.resolve_write_targets().modes(),
        "Migration phase"
    );

    let path = store_config.require_path()?;
    let store = Arc::new(LmdbStore::open(path, store_config.map_size_mb).map_err(CutoverError::from)?);
    let config = Arc::new(config);
    let project_id = store_config.project_id.clone();

    match cli.command {
        Command::Backfill(args) => {
            let options = BackfillOptions {
                dry_run: args.dry_run,
                sample_size: args.sample_size as usize,
                limit: args.limit.map(|n| n as usize),
                concurrency: args.tenants.concurrency as usize,
            };
            let report = BackfillRunner::new(store, config)
                .run(args.tenants.org.as_ref(), &options)
                .await?;
            let parity_failed = !report.dry_run && report.has_parity_issues();
            print_report(&Report::Backfill(report))?;
            if parity_failed {
                return Ok(ExitCode::from(EXIT_PARITY_ISSUES));
            }
        }
        Command::ReadCutoverReport(args) => {
            let options = ParityOptions {
                sample_size: args.sample_size as usize,
                collection: args.collection,
                concurrency: args.tenants.concurrency as usize,
            };
            let report = ParityReporter::new(store, config, project_id)
                .read_cutover_report(args.tenants.org.as_ref(), &options)
                .await?;
            print_report(&Report::ReadCutover(report))?;
        }
        Command::RetireLegacy(args) => {
            let options = args.options();
            let report = RetirementArchiver::new(store, config, project_id)
                .retire_legacy(args.tenants.org.as_ref(), &options)
                .await?;
            print_report(&Report::Retirement(report))?;
        }
        Command::SeedStaging(args) => {
            let summary = StagingSeeder::new(store, config, project_id)
                .seed(&args.org, args.layout.into(), args.dry_run)
                .await?;
            if let Some(dir) = &args.report_dir {
                let path = write_seed_report(dir, &Report::Seed(summary.clone()), &summary.written_at)?;
                tracing::info!(path = %path.display(), "Wrote seed report");
            }
            print_report(&Report::Seed(summary))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &Report) -> Result<(), CliError> {
    println!("{}", report.to_pretty_json()?);
    Ok(())
}

/// `staging-seed-2026-02-15-120000000.json` for `2026-02-15T12:00:00.000Z`.
fn seed_report_file_name(written_at: &Timestamp) -> String {
    let stamp: String = format_timestamp(*written_at)
        .chars()
        .filter(|c| !matches!(c, ':' | '.' | 'Z'))
        .map(|c| if c == 'T' { '-' } else { c })
        .collect();
    format!("staging-seed-{}.json", stamp)
}

fn write_seed_report(dir: &Path, report: &Report, written_at: &Timestamp) -> Result<PathBuf, CliError> {
    let path = dir.join(seed_report_file_name(written_at));
    let body = report.to_pretty_json()?;
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&path, format!("{}\n", body)))
        .map_err(|source| CliError::WriteReport {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use cutover_core::ValidationError;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_retire_flags_parse() {
        let cli = Cli::try_parse_from(["cutover", "retire-legacy", "--org", "orgA", "--force"]).unwrap();
        match cli.command {
            Command::RetireLegacy(args) => {
                assert!(args.force);
                assert!(!args.archive_only);
                assert_eq!(args.tenants.org.unwrap().as_str(), "orgA");
                assert_eq!(args.tenants.concurrency, 1);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_sample_size_must_be_positive() {
        assert!(Cli::try_parse_from(["cutover", "backfill", "--sample-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["cutover", "backfill", "--limit", "0"]).is_err());
        let cli = Cli::try_parse_from(["cutover", "backfill"]).unwrap();
        match cli.command {
            Command::Backfill(args) => {
                assert_eq!(args.sample_size, 10);
                assert!(args.limit.is_none());
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bare_retire_rejected_before_store_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_path = dir.path().join("store");
        let store_config = StoreConfig {
            path: Some(store_path.clone()),
            ..StoreConfig::default()
        };
        let cli = Cli::try_parse_from(["cutover", "retire-legacy", "--org", "orgA"]).unwrap();

        let err = execute(cli, &store_config, PhaseFlags::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Cutover(CutoverError::Validation(ValidationError::UnsafeRetirement))
        ));
        assert!(!store_path.exists());
    }

    #[tokio::test]
    async fn test_archive_only_retire_opens_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_path = dir.path().join("store");
        let store_config = StoreConfig {
            path: Some(store_path.clone()),
            map_size_mb: 16,
            ..StoreConfig::default()
        };
        let cli = Cli::try_parse_from(["cutover", "retire-legacy", "--org", "orgA", "--archive-only"])
            .unwrap();

        execute(cli, &store_config, PhaseFlags::default())
            .await
            .unwrap();
        assert!(store_path.exists());
    }

    #[test]
    fn test_org_with_slash_rejected() {
        assert!(Cli::try_parse_from(["cutover", "backfill", "--org", "a/b"]).is_err());
    }

    #[test]
    fn test_seed_defaults() {
        let cli = Cli::try_parse_from(["cutover", "seed-staging"]).unwrap();
        match cli.command {
            Command::SeedStaging(args) => {
                assert_eq!(args.org.as_str(), DEFAULT_SEED_ORG);
                assert!(matches!(args.layout, LayoutArg::Module));
                assert!(args.report_dir.is_none());
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_seed_report_file_name() {
        let ts = DateTime::parse_from_rfc3339("2026-02-15T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(
            seed_report_file_name(&ts),
            "staging-seed-2026-02-15-120000000.json"
        );
    }

    #[test]
    fn test_write_seed_report_creates_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("reports");
        let ts = DateTime::parse_from_rfc3339("2026-02-15T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let report = Report::Seed(cutover_core::SeedSummary {
            version: "v1".to_string(),
            project_id: "stg".to_string(),
            dry_run: true,
            org_id: OrgId::parse("stgPilotOrgA").unwrap(),
            totals: Default::default(),
            written_at: ts,
        });
        let path = write_seed_report(&nested, &report, &ts).unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("\"orgId\": \"stgPilotOrgA\""));
    }
}
