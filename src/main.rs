use commuto::config::Config;
use commuto::db::{MemoryStore, PgStore};
use commuto::engine::Engine;
use commuto::error::Error;
use commuto::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    match &config.database_url {
        Some(url) => {
            let store = PgStore::new(url, config.max_connections).await?;
            serve(Engine::new(store)?, config.listen_addr).await
        }
        None => {
            tracing::warn!("no database configured, rides are kept in memory");
            serve(Engine::new(MemoryStore::new())?, config.listen_addr).await
        }
    }
}
