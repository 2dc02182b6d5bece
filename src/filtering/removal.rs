// DANS : src/filtering/removal.rs

use crate::error::SniperError;
use crate::feeds::logs::LogEvent;
use crate::filtering::lookup::MintLookup;
use crate::monitoring::metrics;
use crate::state::tracker::Tracker;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Classification d'une ligne de log par sous-chaîne. Tout ce qui n'est ni
/// un transfert ni un burn est ignoré.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSymbol {
    Transfer,
    Burn,
}

pub fn classify_line(line: &str) -> Option<LogSymbol> {
    if line.contains("Transfer") {
        Some(LogSymbol::Transfer)
    } else if line.contains("Burn") {
        Some(LogSymbol::Burn)
    } else {
        None
    }
}

/// La signature canonique d'un retrait de liquidité sur ce programme : les
/// deux vaults sont vidés puis les jetons LP sont brûlés. La séquence
/// compacte des symboles doit être EXACTEMENT Transfer, Transfer, Burn.
pub fn has_withdraw_signature(logs: &[String]) -> bool {
    let symbols: Vec<LogSymbol> = logs.iter().filter_map(|l| classify_line(l)).collect();
    symbols == [LogSymbol::Transfer, LogSymbol::Transfer, LogSymbol::Burn]
}

/// Le détecteur de retraits : consomme le flux de logs, reconnaît la
/// signature de retrait, résout l'actif concerné et le signale au tracker.
pub struct RemovalDetector {
    lookup: MintLookup,
    tracker: Arc<Tracker>,
}

impl RemovalDetector {
    pub fn new(lookup: MintLookup, tracker: Arc<Tracker>) -> Self {
        Self { lookup, tracker }
    }

    /// Boucle de consommation du flux de logs. Chaque échec est absorbé et
    /// loggé : la boucle ne s'arrête que si le canal se ferme.
    pub async fn run(self, mut receiver: mpsc::Receiver<LogEvent>) {
        info!("[RemovalDetector] Démarrage de la détection de retraits de liquidité.");
        while let Some(event) = receiver.recv().await {
            self.handle_event(&event).await;
        }
        info!("[RemovalDetector] Canal fermé, arrêt du détecteur.");
    }

    async fn handle_event(&self, event: &LogEvent) {
        if !has_withdraw_signature(&event.logs) {
            return;
        }

        let signature = match Signature::from_str(&event.signature) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(signature = %event.signature, error = %e, "Signature illisible, retrait ignoré.");
                return;
            }
        };

        info!(signature = %signature, "Signature de retrait de liquidité repérée, résolution du mint...");
        match self.lookup.resolve_removed_mint(&signature).await {
            Ok(Some(mint)) => {
                if self.tracker.mark_removed(mint).await {
                    metrics::REMOVALS_DETECTED.inc();
                    info!(mint = %mint, signature = %signature, "Retrait de liquidité signalé au tracker.");
                } else {
                    debug!(mint = %mint, "Retrait déjà signalé pour cet actif.");
                }
            }
            Ok(None) => {
                debug!(signature = %signature, "Résolution écartée (contrepartie ou stablecoin).");
            }
            Err(SniperError::LookupTimeout(after)) => {
                metrics::MINT_LOOKUP_TIMEOUTS.inc();
                warn!(signature = %signature, ?after, "Résolution du mint abandonnée ; le retrait restera non signalé.");
            }
            Err(e) => {
                warn!(signature = %signature, error = %e, "Erreur inattendue pendant la résolution du mint.");
            }
        }
    }
}
