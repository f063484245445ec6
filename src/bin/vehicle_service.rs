//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// vehicle-service: vehicles CRUD and the USER_CREATED consumer that creates placeholder vehicles.
//--------------------------------------------------------------------------------------------------
// cargo run --bin vehicle-service
// cargo run --bin vehicle-service -- --port 5100 --in-memory
//--------------------------------------------------------------------------------------------------

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fleet_platform::{
    Config,
    service::{ServiceOptions, run_vehicle_service},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Vehicle service of the fleet platform")]
struct Args {
    /// Port to listen on, overrides VEHICLE_SERVICE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep vehicles in memory instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::try_from_env()?;

    let options = ServiceOptions {
        port: args.port,
        in_memory: args.in_memory,
    };
    if let Err(err) = run_vehicle_service(config, options).await {
        error!("vehicle-service failed: {:#}", err);
        return Err(err);
    }
    Ok(())
}
