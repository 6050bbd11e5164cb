mod aggregator;
mod config;
mod identity;
mod model;
mod report;
mod service;
mod transport;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use config::{Config, TransportKind};
use service::{DataService, ExtensionDataService, RestDataService, TfsDataService};
use transport::{ExtensionTransport, FixtureTransport, RestTransport};

/// PR Dashboard: lists active pull requests on a TFS / Azure DevOps server,
/// split into the ones you created, the ones waiting on you or your groups,
/// and everything else.
#[derive(Parser, Debug)]
#[command(name = "pr-dashboard", version, about)]
struct Cli {
    /// List pull requests across all projects instead of the default project
    #[arg(long)]
    all_projects: bool,

    /// Backend to use; overrides `transport` in .pr-dashboard.toml
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Only show pull requests created by or assigned to you
    #[arg(long)]
    mine: bool,

    /// Optional output file path for a markdown dashboard
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use built-in sample data for demo purposes (no server needed)
    #[arg(long)]
    r#mock: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let service: Box<dyn DataService> = if cli.r#mock {
        info!("using sample data for demo");
        build_mock_service()?
    } else {
        info!("loading configuration");
        let config = Config::load()?;
        build_service(&config, cli.transport.unwrap_or(config.transport))?
    };

    let span = info_span!("dashboard", all_projects = cli.all_projects);
    info!("fetching user, pull requests and repositories");
    let (user, pull_requests, repositories) = async {
        tokio::try_join!(
            service.get_current_user(),
            service.get_pull_requests(cli.all_projects),
            service.get_repositories(cli.all_projects),
        )
    }
    .instrument(span)
    .await?;
    info!(
        groups = user.member_of.len(),
        pull_requests = pull_requests.len(),
        repositories = repositories.len(),
        "fetched dashboard data"
    );

    let dashboard = report::build(&user, pull_requests, &repositories, cli.mine);
    report::output(&dashboard, cli.output.as_deref())?;
    info!(total = dashboard.total(), "done");

    Ok(())
}

fn build_service(
    config: &Config,
    kind: TransportKind,
) -> Result<Box<dyn DataService>, Box<dyn std::error::Error>> {
    let endpoint = config.api_endpoint()?;
    let project = config.default_project()?;
    debug!(?kind, endpoint, project, "configuring transport");

    let service: Box<dyn DataService> = match kind {
        TransportKind::Rest => Box::new(RestDataService::new(RestTransport::new(
            endpoint,
            project,
            config.token(),
        )?)),
        TransportKind::Extension => Box::new(ExtensionDataService::new(ExtensionTransport::new(
            endpoint,
            project,
            config.extension_user()?,
            config.extension.hosted,
            config.token(),
        )?)),
    };
    Ok(service)
}

/// Serve the embedded sample document instead of a live server.
fn build_mock_service() -> Result<Box<dyn DataService>, Box<dyn std::error::Error>> {
    let json = include_str!("../tests/fixtures/sample_dashboard.json");
    Ok(Box::new(TfsDataService::new(FixtureTransport::from_json(json)?)))
}
