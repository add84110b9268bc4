use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use ifc_converter::{read_records, ConvertError, Converter, ConverterConfig, CreationStatus};
use ifc_mapping::UnmappedRecord;
use serde_json::json;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(name = "ifc-convert")]
#[command(about = "Convert mapped building records into an IFC file")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(flatten)]
    worker: WorkerArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct WorkerArgs {
    /// Embedded runtime directory holding the worker interpreter.
    #[arg(long, global = true)]
    runtime_dir: Option<PathBuf>,
    /// Worker script passed to the interpreter.
    #[arg(long, global = true)]
    script: Option<PathBuf>,
    /// Launch this executable instead of the runtime's interpreter.
    #[arg(long, global = true)]
    executable: Option<PathBuf>,
    /// Fail a conversion the worker has not answered within this many milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

impl WorkerArgs {
    fn apply(self, config: &mut ConverterConfig) {
        if let Some(dir) = self.runtime_dir {
            config.worker.runtime_dir = dir;
        }
        if let Some(script) = self.script {
            config.worker.script = script;
        }
        if let Some(executable) = self.executable {
            config.worker.executable = Some(executable);
        }
        if let Some(ms) = self.timeout_ms {
            config.worker.request_timeout_ms = Some(ms);
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Map the target data and have the worker write the IFC file.
    Run(RunArgs),
    /// Validate a mapping document and list its rules.
    Check {
        #[arg(long)]
        mapping: PathBuf,
    },
    /// Map the target data without starting the worker and print the result as JSON.
    Map {
        #[arg(long)]
        mapping: PathBuf,
        #[arg(long)]
        data: PathBuf,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    mapping: PathBuf,
    #[arg(long)]
    data: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long)]
    project_name: Option<String>,
    #[arg(long)]
    site_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ConvertError> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ConverterConfig::resolve(cli.config.as_deref())?;
    cli.worker.apply(&mut config);

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::Check { mapping } => check(&config, &mapping),
        Command::Map { mapping, data } => map(&config, &mapping, &data),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(mut config: ConverterConfig, args: RunArgs) -> Result<(), ConvertError> {
    if let Some(name) = args.project_name {
        config.project.project_name = name;
    }
    if let Some(name) = args.site_name {
        config.project.site_name = name;
    }

    let mut converter = Converter::from_config(&config);
    converter.load_mapping_file(&args.mapping)?;
    let records = read_records(&args.data)?;
    converter.set_output_path(args.output);

    let mut print_progress = |status: &CreationStatus| {
        println!("{:>5.1}% {}", status.percent, status.message);
    };
    let report = match converter.run_conversion(&records, &mut print_progress).await {
        Ok(report) => report,
        Err(err) => {
            print_unmapped(err.unmapped());
            return Err(err);
        }
    };

    println!("wrote {} ({} entities)", report.output_file, report.mapped_count);
    print_unmapped(&report.unmapped);
    Ok(())
}

fn print_unmapped(records: &[UnmappedRecord]) {
    for unmapped in records {
        println!(
            "unmapped {:?}: {}",
            unmapped.original.user_key, unmapped.reason
        );
    }
}

fn check(config: &ConverterConfig, mapping: &Path) -> Result<(), ConvertError> {
    let mut converter = Converter::from_config(config);
    converter.load_mapping_file(mapping)?;

    for rule in converter.store().rules() {
        let fields: Vec<String> = rule
            .field_map()
            .iter()
            .map(|(param, field)| format!("{param}<-{field}"))
            .collect();
        println!("{} userKey={} {}", rule.kind(), rule.user_key(), fields.join(", "));
    }
    Ok(())
}

fn map(config: &ConverterConfig, mapping: &Path, data: &Path) -> Result<(), ConvertError> {
    let mut converter = Converter::from_config(config);
    converter.load_mapping_file(mapping)?;
    let records = read_records(data)?;
    let outcome = converter.map_records(&records);

    let unmapped: Vec<_> = outcome
        .unmapped
        .iter()
        .map(|record| {
            json!({
                "original": record.original,
                "reason": record.reason,
                "message": record.reason.message(),
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&json!({
        "mapped": outcome.mapped,
        "unmapped": unmapped,
    }))
    .map_err(|source| ConvertError::Report { source })?;
    println!("{rendered}");
    Ok(())
}
