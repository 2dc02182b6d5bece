// DANS : src/execution/correlator.rs

use crate::execution::relay::{BundleRelay, BundleStatus};
use crate::monitoring::metrics;
use crate::state::pending::PendingBundles;
use crate::state::tracker::Tracker;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// Au-delà de cette attente, un bundle sans résolution est considéré perdu :
// le relay ne signale pas toujours les bundles abandonnés.
const BUNDLE_TIMEOUT_SECS: u64 = 90;

/// Le corrélateur de résultats de bundles : l'unique consommateur des
/// acceptations/rejets du relay, et l'unique endroit où une transition
/// spéculative devient l'état commité du tracker.
pub struct BundleResultCorrelator {
    relay: Arc<dyn BundleRelay>,
    pending: Arc<PendingBundles>,
    tracker: Arc<Tracker>,
    poll_interval: Duration,
}

impl BundleResultCorrelator {
    pub fn new(
        relay: Arc<dyn BundleRelay>,
        pending: Arc<PendingBundles>,
        tracker: Arc<Tracker>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            relay,
            pending,
            tracker,
            poll_interval,
        }
    }

    /// Démarre la boucle de corrélation dans une tâche dédiée. Les erreurs
    /// d'interrogation sont absorbées et loggées : la boucle ne meurt jamais.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[Correlator] Démarrage du suivi des résultats de bundles.");
            let mut interval = tokio::time::interval(self.poll_interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.poll_once().await {
                    warn!(error = %e, "[Correlator] Interrogation des statuts échouée, on continue.");
                }
            }
        })
    }

    async fn poll_once(&self) -> Result<()> {
        let ids = self.pending.bundle_ids().await;
        if !ids.is_empty() {
            let statuses = self.relay.bundle_statuses(&ids).await?;
            for status in statuses {
                self.apply_status(status).await;
            }
        }

        // Purge des bundles trop vieux pour espérer une résolution.
        let cutoff = Instant::now() - Duration::from_secs(BUNDLE_TIMEOUT_SECS);
        for bundle_id in self.pending.stale_ids(cutoff).await {
            if let Some(stale) = self.pending.resolve(&bundle_id).await {
                metrics::BUNDLES_REJECTED.inc();
                warn!(
                    bundle_id = %bundle_id,
                    mint = %stale.mint,
                    "Bundle sans résolution après l'échéance, considéré perdu."
                );
            }
        }
        Ok(())
    }

    /// Applique un statut rapporté par le relay. Accepté : la transition
    /// spéculative est commitée. Rejeté : elle est abandonnée et l'actif
    /// redevient éligible. Identifiant inconnu : no-op.
    pub async fn apply_status(&self, status: BundleStatus) {
        match status.status.as_str() {
            "Landed" => {
                if let Some(pending) = self.pending.resolve(&status.bundle_id).await {
                    info!(
                        bundle_id = %status.bundle_id,
                        mint = %pending.mint,
                        slot = ?status.landed_slot,
                        "Bundle accepté : état commité."
                    );
                    self.tracker.commit(pending.intended).await;
                    metrics::BUNDLES_ACCEPTED.inc();
                }
            }
            "Failed" | "Invalid" => {
                if let Some(pending) = self.pending.resolve(&status.bundle_id).await {
                    metrics::BUNDLES_REJECTED.inc();
                    warn!(
                        bundle_id = %status.bundle_id,
                        mint = %pending.mint,
                        "Bundle rejeté : état spéculatif abandonné."
                    );
                }
            }
            // "Pending" : toujours en vol, on attend.
            _ => {}
        }
    }
}
