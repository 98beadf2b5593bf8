//! Herse — federated API schema composition.
//!
//! Reads per-service manifests, composes every declared schema into one
//! unified document per protocol, and writes the results to disk.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use herse_composer::{
    ConflictStrategy, Coordinator, MergeOptions, MultiProtocolResult, SchemaFetcher,
    SchemaLocation, ServiceManifest,
};
use herse_spec_parser::{parse_document, Protocol};

mod fetcher;
mod logging;

use fetcher::FileFetcher;

#[derive(Parser, Debug)]
#[command(name = "herse", about = "Federated API schema composition", version)]
struct Cli {
    /// Log level.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log format (json or pretty).
    #[arg(long, default_value = "pretty", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose service manifests into one unified spec per protocol.
    Compose {
        /// Input manifest file(s) (YAML or JSON).
        #[arg(short, long, required = true, num_args = 1..)]
        manifest: Vec<String>,

        /// Output directory for the unified <protocol>.json documents.
        #[arg(short, long, default_value = "merged")]
        out_dir: String,

        /// Title of the merged documents.
        #[arg(long, default_value = "Federated API")]
        title: String,

        /// Description of the merged documents.
        #[arg(long)]
        description: Option<String>,

        /// Version of the merged documents.
        #[arg(long, default_value = "1.0.0")]
        doc_version: String,

        /// Default conflict strategy (error, skip, overwrite, prefix, merge).
        #[arg(long, default_value = "skip")]
        strategy: String,
    },

    /// Parse-check every schema the manifests reference, without composing.
    Check {
        /// Input manifest file(s) (YAML or JSON).
        #[arg(short, long, required = true, num_args = 1..)]
        manifest: Vec<String>,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, &cli.log_format) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = match cli.command {
        Commands::Compose {
            manifest,
            out_dir,
            title,
            description,
            doc_version,
            strategy,
        } => run_compose(&manifest, &out_dir, title, description, doc_version, &strategy),
        Commands::Check { manifest, format } => run_check(&manifest, &format),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_compose(
    manifest_paths: &[String],
    out_dir: &str,
    title: String,
    description: Option<String>,
    doc_version: String,
    strategy: &str,
) -> Result<ExitCode, String> {
    let default_strategy: ConflictStrategy = strategy.parse()?;
    let manifests = load_manifests(manifest_paths)?;
    tracing::info!(
        manifests = manifests.len(),
        strategy = default_strategy.as_str(),
        "composing"
    );

    let options = MergeOptions {
        title,
        description,
        version: doc_version,
        default_strategy,
    };
    let fetcher = FileFetcher;
    let result = Coordinator::new(&fetcher, options)
        .compose(&manifests)
        .map_err(|e| e.to_string())?;

    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("failed to create {}: {}", out_dir, e))?;

    for (protocol, merged) in &result.results {
        let out_path = Path::new(out_dir).join(format!("{}.json", protocol));
        let json = serde_json::to_string_pretty(&merged.document)
            .map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json)
            .map_err(|e| format!("failed to write {}: {}", out_path.display(), e))?;
        println!(
            "{}: {} service(s) merged, {} excluded -> {}",
            protocol,
            merged.included_services.len(),
            merged.excluded_services.len(),
            out_path.display()
        );
        for conflict in &merged.conflicts {
            println!(
                "  conflict [{}] '{}' ({} vs {}): {}",
                conflict.namespace,
                conflict.key,
                conflict.first_service,
                conflict.second_service,
                conflict.resolution
            );
        }
    }

    print_warnings(&result);
    Ok(ExitCode::SUCCESS)
}

fn print_warnings(result: &MultiProtocolResult) {
    for warning in &result.warnings {
        match &warning.location {
            Some(location) => {
                println!("  warning {} ({}): {}", warning.code, location, warning.message)
            }
            None => println!("  warning {}: {}", warning.code, warning.message),
        }
    }
}

/// Per-schema parse report for `check`.
struct CheckReport {
    service: String,
    protocol: String,
    location: String,
    error: Option<String>,
}

fn run_check(manifest_paths: &[String], format: &str) -> Result<ExitCode, String> {
    let manifests = load_manifests(manifest_paths)?;
    let fetcher = FileFetcher;

    let mut reports = Vec::new();
    for manifest in &manifests {
        for descriptor in &manifest.schemas {
            let location = descriptor.location.describe();
            let error = check_schema(&fetcher, descriptor.location.clone(), &descriptor.protocol);
            reports.push(CheckReport {
                service: manifest.name.clone(),
                protocol: descriptor.protocol.clone(),
                location,
                error,
            });
        }
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();

    match format {
        "json" => {
            let entries: Vec<serde_json::Value> = reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "service": r.service,
                        "protocol": r.protocol,
                        "location": r.location,
                        "status": if r.error.is_some() { "failed" } else { "ok" },
                        "error": r.error,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "schemas": entries,
                    "failed": failed,
                }))
                .map_err(|e| e.to_string())?
            );
        }
        "text" => {
            for report in &reports {
                match &report.error {
                    None => println!(
                        "ok     {} [{}] {}",
                        report.service, report.protocol, report.location
                    ),
                    Some(error) => println!(
                        "failed {} [{}] {}: {}",
                        report.service, report.protocol, report.location, error
                    ),
                }
            }
            println!("{} schema(s) checked, {} failed", reports.len(), failed);
        }
        other => return Err(format!("unknown output format '{}' (expected text or json)", other)),
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_schema(
    fetcher: &FileFetcher,
    location: SchemaLocation,
    protocol_name: &str,
) -> Option<String> {
    let Some(protocol) = Protocol::from_name(protocol_name) else {
        return Some(format!("unsupported protocol type '{}'", protocol_name));
    };
    let document = match fetcher.fetch(&location) {
        Ok(document) => document,
        Err(e) => return Some(e.to_string()),
    };
    match parse_document(protocol, &document) {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    }
}

/// Load manifests and resolve relative `path:` schema locations against
/// each manifest's own directory.
fn load_manifests(paths: &[String]) -> Result<Vec<ServiceManifest>, String> {
    let mut manifests = Vec::new();
    for path in paths {
        let path = Path::new(path);
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let mut manifest: ServiceManifest = serde_yaml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
        resolve_locations(&mut manifest, path.parent().unwrap_or(Path::new(".")));
        manifests.push(manifest);
    }
    Ok(manifests)
}

fn resolve_locations(manifest: &mut ServiceManifest, base: &Path) {
    for descriptor in &mut manifest.schemas {
        if let SchemaLocation::Path { path } = &mut descriptor.location {
            let resolved: PathBuf = if Path::new(path.as_str()).is_absolute() {
                PathBuf::from(path.as_str())
            } else {
                base.join(path.as_str())
            };
            *path = resolved.display().to_string();
        }
    }
}
