//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// user-service: users CRUD, login, and USER_CREATED publishing on `user_events`.
//--------------------------------------------------------------------------------------------------
// cargo run --bin user-service
// cargo run --bin user-service -- --port 4100 --in-memory
//--------------------------------------------------------------------------------------------------

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fleet_platform::{
    Config,
    service::{ServiceOptions, run_user_service},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "User service of the fleet platform")]
struct Args {
    /// Port to listen on, overrides USER_SERVICE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep users in memory instead of Postgres
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
    if let Err(err) = run_user_service(config, options).await {
        error!("user-service failed: {:#}", err);
        return Err(err);
    }
    Ok(())
}
