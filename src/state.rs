use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    db,
    market::{FmpClient, MarketData},
    services::TradingService,
    store::{Ledger, MemoryLedger, PgLedger},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn Ledger>,
    pub market: Arc<dyn MarketData>,
    pub trading: Arc<TradingService>,
}

impl AppState {
    pub fn new(config: Config, ledger: Arc<dyn Ledger>, market: Arc<dyn MarketData>, trading: TradingService) -> Self {
        Self {
            config,
            ledger,
            market,
            trading: Arc::new(trading),
        }
    }
}

/// Connects storage and the market data provider described by `config`.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let ledger: Arc<dyn Ledger> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.db_max_connections).await?;
            db::migrate(&pool).await?;
            info!("Connected to database, migrations applied");
            Arc::new(PgLedger::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage; data is lost on restart");
            Arc::new(MemoryLedger::new())
        }
    };

    let fmp = Arc::new(FmpClient::new(
        config.fmp_base_url.clone(),
        config.fmp_api_key.clone(),
        config.market_data_timeout,
    )?);

    let trading = TradingService::new(fmp.clone(), ledger.clone(), config.trade_max_retries);

    Ok(AppState::new(config.clone(), ledger, fmp, trading))
}
