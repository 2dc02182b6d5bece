// DANS : src/monitoring/metrics.rs

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};
use warp::Filter;

lazy_static! {
    // --- Flux d'entrée ---
    pub static ref ACCOUNT_EVENTS_RECEIVED: IntCounter = register_int_counter!(
        "sniper_account_events_total", "Nombre de mises à jour de comptes de pools reçues"
    ).unwrap();
    pub static ref LOG_EVENTS_RECEIVED: IntCounter = register_int_counter!(
        "sniper_log_events_total", "Nombre de lots de logs de transactions reçus"
    ).unwrap();

    // --- Suivi des pools ---
    pub static ref POOLS_TRACKED: IntGauge = register_int_gauge!(
        "sniper_pools_tracked", "Nombre d'actifs actuellement suivis par le tracker"
    ).unwrap();
    pub static ref REMOVALS_DETECTED: IntCounter = register_int_counter!(
        "sniper_liquidity_removals_total", "Signatures de retrait de liquidité détectées et résolues"
    ).unwrap();
    pub static ref MINT_LOOKUP_TIMEOUTS: IntCounter = register_int_counter!(
        "sniper_mint_lookup_timeouts_total", "Résolutions de mint abandonnées à l'échéance"
    ).unwrap();

    // --- Décisions & Exécution ---
    pub static ref BUYS_SUBMITTED: IntCounter = register_int_counter!(
        "sniper_buys_submitted_total", "Bundles d'achat soumis au relay"
    ).unwrap();
    pub static ref SELLS_SUBMITTED: IntCounter = register_int_counter!(
        "sniper_sells_submitted_total", "Bundles de vente soumis au relay"
    ).unwrap();
    pub static ref BUNDLES_ACCEPTED: IntCounter = register_int_counter!(
        "sniper_bundles_accepted_total", "Bundles inclus par le relay (état commité)"
    ).unwrap();
    pub static ref BUNDLES_REJECTED: IntCounter = register_int_counter!(
        "sniper_bundles_rejected_total", "Bundles rejetés ou expirés (état spéculatif abandonné)"
    ).unwrap();
}

pub async fn start_metrics_server() {
    let metrics_route = warp::path!("metrics").map(|| {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&prometheus::gather(), &mut buffer).unwrap();
        warp::reply::with_header(buffer, "content-type", "text/plain; version=0.0.4")
    });
    println!("[Monitoring] Serveur de métriques exposé sur http://0.0.0.0:9102/metrics");
    warp::serve(metrics_route).run(([0, 0, 0, 0], 9102)).await;
}
