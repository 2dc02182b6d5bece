// DANS : src/state/pending.rs

use crate::state::tracker::IntendedState;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tokio::sync::Mutex;

/// Un bundle soumis au relay et pas encore résolu : l'identifiant retourné
/// par le relay, l'actif concerné, et la transition d'état que son
/// acceptation déclenchera. Créé à la soumission, consommé exactement une
/// fois à l'acceptation ou au rejet.
#[derive(Debug)]
pub struct PendingBundle {
    pub bundle_id: String,
    pub mint: Pubkey,
    pub intended: IntendedState,
    pub submitted_at: Instant,
}

#[derive(Default)]
struct PendingInner {
    /// Au plus un bundle par identifiant (les ids du relay sont uniques).
    by_id: HashMap<String, PendingBundle>,
    /// Les mints dont un pipeline déclencheur→soumission est en vol. La
    /// revendication est posée AVANT le premier point d'attente du pipeline :
    /// deux déclencheurs concurrents pour le même actif ne peuvent pas
    /// avancer tous les deux.
    in_flight: HashSet<Pubkey>,
}

/// La table des bundles en vol, partagée entre les handlers d'événements et
/// le corrélateur de résultats. Un seul verrou : revendication, inscription
/// et résolution sont atomiques.
#[derive(Default)]
pub struct PendingBundles {
    inner: Mutex<PendingInner>,
}

impl PendingBundles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revendique l'actif pour un pipeline. Retourne false si un autre
    /// pipeline est déjà en vol pour ce mint : l'appelant doit renoncer.
    pub async fn claim(&self, mint: Pubkey) -> bool {
        self.inner.lock().await.in_flight.insert(mint)
    }

    /// Libère une revendication dont le pipeline a échoué avant soumission
    /// (relay indisponible, solde indisponible, erreur de construction).
    pub async fn release(&self, mint: &Pubkey) {
        self.inner.lock().await.in_flight.remove(mint);
    }

    /// Inscrit le bundle soumis sous son identifiant relay. Le mint doit
    /// avoir été revendiqué par l'appelant.
    pub async fn register(&self, pending: PendingBundle) {
        self.inner
            .lock()
            .await
            .by_id
            .insert(pending.bundle_id.clone(), pending);
    }

    /// Identifiants de tous les bundles en attente de résolution.
    pub async fn bundle_ids(&self) -> Vec<String> {
        self.inner.lock().await.by_id.keys().cloned().collect()
    }

    /// Consomme le bundle : le retire de la table et libère l'actif.
    /// Un identifiant inconnu est un no-op (None).
    pub async fn resolve(&self, bundle_id: &str) -> Option<PendingBundle> {
        let mut inner = self.inner.lock().await;
        let pending = inner.by_id.remove(bundle_id)?;
        inner.in_flight.remove(&pending.mint);
        Some(pending)
    }

    /// Les bundles soumis avant `cutoff` et toujours sans résolution : le
    /// relay ne signale pas toujours les bundles abandonnés, il faut purger
    /// pour ne pas bloquer l'actif indéfiniment.
    pub async fn stale_ids(&self, cutoff: Instant) -> Vec<String> {
        self.inner
            .lock()
            .await
            .by_id
            .values()
            .filter(|p| p.submitted_at < cutoff)
            .map(|p| p.bundle_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tracker::AssetTrackingState;
    use std::time::Duration;

    fn sample_intended(mint: Pubkey) -> IntendedState {
        IntendedState::PositionSold {
            mint,
            state: AssetTrackingState {
                mint,
                asset_is_coin: true,
                decimals: 6,
                last_reference_in: 0,
                last_reference_out: 0,
                last_asset_in: 0,
                last_asset_out: 0,
            },
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let pending = PendingBundles::new();
        let mint = Pubkey::new_unique();

        assert!(pending.claim(mint).await);
        assert!(!pending.claim(mint).await);
        pending.release(&mint).await;
        assert!(pending.claim(mint).await);
    }

    #[tokio::test]
    async fn resolve_consumes_exactly_once_and_releases_the_claim() {
        let pending = PendingBundles::new();
        let mint = Pubkey::new_unique();

        assert!(pending.claim(mint).await);
        pending
            .register(PendingBundle {
                bundle_id: "b-1".to_string(),
                mint,
                intended: sample_intended(mint),
                submitted_at: Instant::now(),
            })
            .await;
        assert_eq!(pending.bundle_ids().await, vec!["b-1".to_string()]);

        let resolved = pending.resolve("b-1").await.unwrap();
        assert_eq!(resolved.mint, mint);
        // Consommé une seule fois, et l'actif redevient éligible.
        assert!(pending.resolve("b-1").await.is_none());
        assert!(pending.claim(mint).await);
    }

    #[tokio::test]
    async fn unknown_bundle_id_is_a_noop() {
        let pending = PendingBundles::new();
        assert!(pending.resolve("jamais-vu").await.is_none());
    }

    #[tokio::test]
    async fn stale_bundles_are_reported() {
        let pending = PendingBundles::new();
        let mint = Pubkey::new_unique();
        assert!(pending.claim(mint).await);
        pending
            .register(PendingBundle {
                bundle_id: "vieux".to_string(),
                mint,
                intended: sample_intended(mint),
                submitted_at: Instant::now() - Duration::from_secs(120),
            })
            .await;

        let stale = pending.stale_ids(Instant::now() - Duration::from_secs(60)).await;
        assert_eq!(stale, vec!["vieux".to_string()]);
    }
}
