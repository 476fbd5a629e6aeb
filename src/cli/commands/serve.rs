//! Serve command - run the HTTP read path

use crate::app::App;
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::HerdResult;
use crate::server;
use tracing::info;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> HerdResult<()> {
    let app = App::build(config).await?;

    let seed = args.seed.unwrap_or(config.store.seed);
    let seeded = app.store.seed_customers(seed).await;
    info!("Customers table populated with {} seed records", seeded.len());
    for customer in &seeded {
        println!("{}  {}", customer.id, customer.status);
    }

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    server::serve(app, &bind).await
}
