// DANS : src/main.rs

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use sniper::{
    config::Config,
    execution::{
        bundle::BundleSubmitter,
        correlator::BundleResultCorrelator,
        relay::{BlockEngineClient, BundleRelay},
    },
    feeds::{accounts::AccountFeed, logs::LogFeed},
    filtering::{lookup::MintLookup, removal::RemovalDetector},
    monitoring,
    rpc::ResilientRpcClient,
    state::{balances::BalanceResolver, pending::PendingBundles, tracker::Tracker},
    strategies::trigger::TriggerEngine,
    trader::Trader,
};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    monitoring::logging::setup_logging();
    let config = Config::load()?;

    let commitment = config.commitment_config()?;
    let reference_mint = config.reference_mint_pubkey()?;
    let excluded_stable_mint = config.excluded_stable_mint_pubkey()?;
    let payer = Arc::new(config.payer_keypair()?);
    info!(operator = %payer.pubkey(), reference = %reference_mint, "Démarrage du sniper.");

    tokio::spawn(monitoring::metrics::start_metrics_server());

    // --- Les collaborateurs externes ---
    let rpc_client = Arc::new(ResilientRpcClient::new(
        config.solana_rpc_url.clone(),
        commitment,
        config.rpc_max_retries,
        config.rpc_retry_delay_ms,
    ));
    let relay: Arc<dyn BundleRelay> =
        Arc::new(BlockEngineClient::new(config.block_engine_endpoints()));

    // --- L'état partagé du cœur de décision ---
    let tracker = Arc::new(Tracker::new(reference_mint));
    let pending = Arc::new(PendingBundles::new());
    let balances = Arc::new(BalanceResolver::new(rpc_client.clone(), payer.pubkey()));

    let submitter = Arc::new(BundleSubmitter::new(
        relay.clone(),
        pending.clone(),
        payer.clone(),
        config.tip_percent,
        config.default_tip_lamports,
        config.min_sol_trigger_lamports,
    ));
    let engine = TriggerEngine::new(config.trade_size_lamports, config.min_sol_trigger_lamports);

    // --- Un canal borné par flux, un consommateur dédié par canal ---
    let (account_sender, account_receiver) = mpsc::channel(1024);
    let (log_sender, log_receiver) = mpsc::channel(1024);

    let trader = Trader::new(
        reference_mint,
        payer.clone(),
        rpc_client.clone(),
        tracker.clone(),
        pending.clone(),
        balances,
        engine,
        submitter,
    );
    let lookup = MintLookup::new(
        rpc_client.clone(),
        reference_mint,
        excluded_stable_mint,
        config.mint_lookup_interval(),
        config.mint_lookup_deadline(),
    );
    let detector = RemovalDetector::new(lookup, tracker.clone());
    let correlator = BundleResultCorrelator::new(
        relay.clone(),
        pending.clone(),
        tracker.clone(),
        config.bundle_poll_interval(),
    );

    let account_feed = AccountFeed::new(config.solana_ws_url.clone(), commitment);
    let log_feed = LogFeed::new(config.solana_ws_url.clone(), commitment);

    // --- Démarrage des services ---
    let correlator_handle = correlator.start();
    let trader_handle = tokio::spawn(trader.run(account_receiver));
    let detector_handle = tokio::spawn(detector.run(log_receiver));
    let account_feed_handle =
        tokio::spawn(async move { account_feed.run_with_reconnect(account_sender).await });
    let log_feed_handle = tokio::spawn(async move { log_feed.run_with_reconnect(log_sender).await });

    let _ = tokio::try_join!(
        correlator_handle,
        trader_handle,
        detector_handle,
        account_feed_handle,
        log_feed_handle,
    );
    Ok(())
}
