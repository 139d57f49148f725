use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use protmap::config::{ConfigLoader, ResolvedConfig};
use protmap::details::UniprotDetailHttpClient;
use protmap::enrich::{EnrichmentSummary, ProteinEnrichmentService};
use protmap::error::ProtmapError;
use protmap::index::{CatalogSearchService, IndexWriteService};
use protmap::ipi::IpiLookupTable;
use protmap::mapping::{HttpMappingTransport, MappingServiceClient};
use protmap::resolver::MappingResolver;
use protmap::store::FileCatalogRepository;

type HttpEnrichmentService = ProteinEnrichmentService<
    MappingServiceClient<HttpMappingTransport>,
    UniprotDetailHttpClient,
    FileCatalogRepository,
>;

#[derive(Parser)]
#[command(name = "protmap")]
#[command(about = "Cross-database accession mapping enrichment for a protein catalog index")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    catalog_root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve cross-database mappings for catalog records")]
    Mappings(ModeArgs),
    #[command(about = "Fetch protein names, descriptions and inferred sequences")]
    Details(ModeArgs),
    #[command(about = "Delete every record in the catalog")]
    Clear,
}

#[derive(Args)]
struct ModeArgs {
    #[arg(value_enum)]
    mode: UpdateMode,
}

#[derive(Clone, Copy, ValueEnum)]
enum UpdateMode {
    /// Full re-scan over every record
    All,
    /// Only records still missing the relevant fields
    Inc,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ProtmapError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ProtmapError) -> u8 {
    match error {
        ProtmapError::MappingHttp(_)
        | ProtmapError::MappingStatus { .. }
        | ProtmapError::DetailHttp(_)
        | ProtmapError::DetailStatus { .. } => 3,
        ProtmapError::ConfigRead(_) | ProtmapError::ConfigParse(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    if let Some(root) = cli.catalog_root {
        config.catalog_root = root.into();
    }

    let repository = FileCatalogRepository::new(config.catalog_root.clone());

    match cli.command {
        Commands::Mappings(args) => {
            let service = build_service(&config, repository).into_diagnostic()?;
            let summary = match args.mode {
                UpdateMode::All => service.enrich_mappings_for_all(),
                UpdateMode::Inc => service.enrich_mappings_for_missing(),
            };
            print_summary(&summary).into_diagnostic()
        }
        Commands::Details(args) => {
            let service = build_service(&config, repository).into_diagnostic()?;
            let summary = match args.mode {
                UpdateMode::All => service.enrich_details_for_all(),
                UpdateMode::Inc => service.enrich_details_for_missing(),
            };
            print_summary(&summary).into_diagnostic()
        }
        Commands::Clear => {
            let index = IndexWriteService::new(repository);
            index.delete_all().into_diagnostic()
        }
    }
}

fn build_service(
    config: &ResolvedConfig,
    repository: FileCatalogRepository,
) -> Result<HttpEnrichmentService, ProtmapError> {
    let transport = HttpMappingTransport::new(config.mapping_service_url.clone())?;
    let mapping_client = MappingServiceClient::new(transport);
    let ipi = match &config.ipi_file {
        Some(path) => IpiLookupTable::from_path(path),
        None => IpiLookupTable::empty(),
    };
    let resolver = MappingResolver::new(mapping_client, ipi);
    let details = UniprotDetailHttpClient::new(config.detail_service_url.clone())?;
    let search = CatalogSearchService::new(repository.clone());
    let index = IndexWriteService::new(repository);
    Ok(
        ProteinEnrichmentService::new(resolver, details, search, index)
            .with_page_size(config.page_size),
    )
}

fn print_summary(summary: &EnrichmentSummary) -> io::Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    let mut stdout = io::stdout();
    stdout.write_all(json.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}
