// DANS : src/state/tracker.rs

use crate::decoders::raydium::amm_v4::{DecodedPool, TrackedPoolKeys};
use crate::error::SniperError;
use solana_sdk::pubkey::Pubkey;
use std::collections::{hash_map::Entry, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// L'état de suivi d'un actif (un mint). Les compteurs `last_*` sont les
/// volumes cumulés du pool au dernier échantillon COMMITÉ : ils n'avancent
/// qu'à l'acceptation d'un bundle, jamais sur une simple observation.
/// Un état n'est jamais supprimé : l'ensemble des comptes surveillés par un
/// run est borné par l'abonnement.
#[derive(Debug, Clone)]
pub struct AssetTrackingState {
    pub mint: Pubkey,
    /// Côté du pool occupé par l'actif (coin ou pc).
    pub asset_is_coin: bool,
    pub decimals: u8,
    pub last_reference_in: u128,
    pub last_reference_out: u128,
    pub last_asset_in: u128,
    pub last_asset_out: u128,
}

/// Le résultat d'une observation : les compteurs courants orientés
/// référence/actif, le delta de volume entrant depuis le dernier échantillon
/// commité, et les drapeaux consultés par le moteur de décision.
#[derive(Debug, Clone)]
pub struct PoolObservation {
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub asset_is_coin: bool,
    pub decimals: u8,
    pub reference_in: u128,
    pub reference_out: u128,
    pub asset_in: u128,
    pub asset_out: u128,
    pub reference_in_delta: u128,
    /// Premier passage de ce pool id dans le tracker.
    pub is_new_pool: bool,
    /// Le pool a déjà fait l'objet d'un achat commité.
    pub pool_observed: bool,
    /// Le retrait de liquidité de cet actif a été signalé.
    pub removed: bool,
}

impl PoolObservation {
    /// L'état de suivi tel qu'il sera commité si le bundle en cours
    /// d'élaboration est accepté.
    pub fn tracking_state(&self) -> AssetTrackingState {
        AssetTrackingState {
            mint: self.mint,
            asset_is_coin: self.asset_is_coin,
            decimals: self.decimals,
            last_reference_in: self.reference_in,
            last_reference_out: self.reference_out,
            last_asset_in: self.asset_in,
            last_asset_out: self.asset_out,
        }
    }
}

/// La transition d'état qu'un bundle en vol représente. Elle n'est appliquée
/// que par `Tracker::commit`, à l'acceptation du bundle : c'est l'unique
/// endroit où l'état spéculatif devient l'état commité.
#[derive(Debug, Clone)]
pub enum IntendedState {
    PoolBought {
        pool: Pubkey,
        mint: Pubkey,
        keys: Arc<TrackedPoolKeys>,
        state: AssetTrackingState,
    },
    PositionSold {
        mint: Pubkey,
        state: AssetTrackingState,
    },
}

impl IntendedState {
    pub fn mint(&self) -> Pubkey {
        match self {
            IntendedState::PoolBought { mint, .. } => *mint,
            IntendedState::PositionSold { mint, .. } => *mint,
        }
    }
}

#[derive(Default)]
struct TrackerInner {
    /// État de suivi par mint.
    states: HashMap<Pubkey, AssetTrackingState>,
    /// Pool ids déjà rencontrés (pour signaler les nouveaux pools).
    seen_pools: HashSet<Pubkey>,
    /// Pool ids déjà achetés (anti double-achat, rempli au commit).
    observed_pools: HashSet<Pubkey>,
    /// Mints dont le retrait de liquidité a été signalé.
    removed_pools: HashSet<Pubkey>,
    /// Descripteurs de routage, un par mint, créés au premier achat.
    pool_keys: HashMap<Pubkey, Arc<TrackedPoolKeys>>,
}

/// Le propriétaire exclusif de tout l'état de suivi. Un seul verrou
/// sérialise toutes les mutations ; aucune section critique ne traverse un
/// point d'attente.
pub struct Tracker {
    reference_mint: Pubkey,
    inner: Mutex<TrackerInner>,
}

impl Tracker {
    pub fn new(reference_mint: Pubkey) -> Self {
        Self {
            reference_mint,
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    /// Intègre une nouvelle lecture de l'état d'un pool.
    ///
    /// L'orientation est déterminée en comparant chaque côté du pool à
    /// l'actif de référence ; un pool dont aucun côté n'est la référence est
    /// invalorisable. Les compteurs cumulés ne décroissent jamais ; si une
    /// décroissance est observée (réinitialisation du pool), on repart sur
    /// une base fraîche avec un delta nul plutôt que d'échouer.
    pub async fn observe(&self, pool: &DecodedPool) -> Result<PoolObservation, SniperError> {
        let asset_is_coin = if pool.coin_mint == self.reference_mint {
            false
        } else if pool.pc_mint == self.reference_mint {
            true
        } else {
            return Err(SniperError::Configuration {
                coin: pool.coin_mint,
                pc: pool.pc_mint,
            });
        };

        // Les compteurs "référence" sont ceux du côté opposé à l'actif.
        let (reference_in, reference_out, asset_in, asset_out, decimals) = if asset_is_coin {
            (pool.swap_pc_in, pool.swap_pc_out, pool.swap_coin_in, pool.swap_coin_out, pool.coin_decimals)
        } else {
            (pool.swap_coin_in, pool.swap_coin_out, pool.swap_pc_in, pool.swap_pc_out, pool.pc_decimals)
        };
        let mint = if asset_is_coin { pool.coin_mint } else { pool.pc_mint };

        let mut inner = self.inner.lock().await;
        let is_new_pool = inner.seen_pools.insert(pool.address);

        let reference_in_delta = match inner.states.entry(mint) {
            Entry::Vacant(vacant) => {
                // Première observation : on pose la base, le delta est nul.
                vacant.insert(AssetTrackingState {
                    mint,
                    asset_is_coin,
                    decimals,
                    last_reference_in: reference_in,
                    last_reference_out: reference_out,
                    last_asset_in: asset_in,
                    last_asset_out: asset_out,
                });
                0
            }
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                if reference_in < state.last_reference_in {
                    // Compteur qui recule : pool réinitialisé. Base fraîche.
                    state.last_reference_in = reference_in;
                    state.last_reference_out = reference_out;
                    state.last_asset_in = asset_in;
                    state.last_asset_out = asset_out;
                    0
                } else {
                    reference_in - state.last_reference_in
                }
            }
        };

        Ok(PoolObservation {
            pool: pool.address,
            mint,
            asset_is_coin,
            decimals,
            reference_in,
            reference_out,
            asset_in,
            asset_out,
            reference_in_delta,
            is_new_pool,
            pool_observed: inner.observed_pools.contains(&pool.address),
            removed: inner.removed_pools.contains(&mint),
        })
    }

    /// Applique la transition d'état d'un bundle accepté. Unique point de
    /// passage de l'état spéculatif vers l'état commité.
    pub async fn commit(&self, intended: IntendedState) {
        let mut inner = self.inner.lock().await;
        match intended {
            IntendedState::PoolBought { pool, mint, keys, state } => {
                inner.observed_pools.insert(pool);
                inner.pool_keys.insert(mint, keys);
                inner.states.insert(mint, state);
            }
            IntendedState::PositionSold { mint, state } => {
                inner.states.insert(mint, state);
            }
        }
    }

    /// Signale le retrait de liquidité d'un actif. Retourne false si le
    /// retrait était déjà signalé.
    pub async fn mark_removed(&self, mint: Pubkey) -> bool {
        self.inner.lock().await.removed_pools.insert(mint)
    }

    pub async fn keys_for(
        &self,
        mint: &Pubkey,
    ) -> Option<Arc<TrackedPoolKeys>> {
        self.inner.lock().await.pool_keys.get(mint).cloned()
    }

    pub async fn tracked_assets(&self) -> usize {
        self.inner.lock().await.states.len()
    }

    #[cfg(test)]
    pub async fn state_of(
        &self,
        mint: &Pubkey,
    ) -> Option<AssetTrackingState> {
        self.inner.lock().await.states.get(mint).cloned()
    }

    #[cfg(test)]
    pub async fn pool_is_observed(&self, pool: &Pubkey) -> bool {
        self.inner.lock().await.observed_pools.contains(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_mint() -> Pubkey {
        Pubkey::new_unique()
    }

    fn pool_with_counters(
        address: Pubkey,
        reference: Pubkey,
        mint: Pubkey,
        ref_in: u128,
        ref_out: u128,
    ) -> DecodedPool {
        // L'actif occupe le côté coin, la référence le côté pc.
        DecodedPool {
            address,
            status: 6,
            coin_mint: mint,
            pc_mint: reference,
            coin_decimals: 6,
            pc_decimals: 9,
            coin_vault: Pubkey::new_unique(),
            pc_vault: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            market_program_id: Pubkey::new_unique(),
            swap_coin_in: 0,
            swap_coin_out: 0,
            swap_pc_in: ref_in,
            swap_pc_out: ref_out,
        }
    }

    #[tokio::test]
    async fn unpriceable_pool_is_a_configuration_error() {
        let tracker = Tracker::new(reference_mint());
        let pool = pool_with_counters(
            Pubkey::new_unique(),
            Pubkey::new_unique(), // ni coin ni pc n'est la référence
            Pubkey::new_unique(),
            0,
            0,
        );
        let err = tracker.observe(&pool).await.unwrap_err();
        assert!(matches!(err, SniperError::Configuration { .. }));
    }

    #[tokio::test]
    async fn orientation_follows_the_reference_side() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let tracker = Tracker::new(reference);

        // Référence côté pc : l'actif est le coin.
        let pool = pool_with_counters(Pubkey::new_unique(), reference, mint, 5, 7);
        let obs = tracker.observe(&pool).await.unwrap();
        assert!(obs.asset_is_coin);
        assert_eq!(obs.reference_in, 5);
        assert_eq!(obs.reference_out, 7);
        assert_eq!(obs.mint, mint);

        // Référence côté coin : l'actif est le pc.
        let mut flipped = pool_with_counters(Pubkey::new_unique(), reference, mint, 0, 0);
        std::mem::swap(&mut flipped.coin_mint, &mut flipped.pc_mint);
        flipped.swap_coin_in = 11;
        flipped.swap_pc_in = 0;
        let obs = tracker.observe(&flipped).await.unwrap();
        assert!(!obs.asset_is_coin);
        assert_eq!(obs.reference_in, 11);
    }

    #[tokio::test]
    async fn first_observation_baselines_with_zero_delta() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let tracker = Tracker::new(reference);
        let pool = pool_with_counters(Pubkey::new_unique(), reference, mint, 5_000_000, 0);

        let obs = tracker.observe(&pool).await.unwrap();
        assert!(obs.is_new_pool);
        assert_eq!(obs.reference_in_delta, 0);
        assert_eq!(tracker.tracked_assets().await, 1);
    }

    #[tokio::test]
    async fn delta_accrues_until_commit() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let tracker = Tracker::new(reference);

        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 0, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 0);

        // Le volume monte : le delta est mesuré contre la base commitée,
        // pas contre l'observation précédente.
        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 700, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 700);
        assert!(!obs.is_new_pool);

        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 1_200, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 1_200);

        // Après commit de la vente, une observation identique redonne un
        // delta nul : pas de double vente possible.
        tracker
            .commit(IntendedState::PositionSold {
                mint,
                state: obs.tracking_state(),
            })
            .await;
        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 1_200, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 0);
    }

    #[tokio::test]
    async fn counter_regression_rebaselines_instead_of_failing() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let tracker = Tracker::new(reference);

        tracker
            .observe(&pool_with_counters(address, reference, mint, 900, 0))
            .await
            .unwrap();
        // Le compteur recule (pool réinitialisé) : base fraîche, delta nul.
        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 100, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 0);
        assert_eq!(
            tracker.state_of(&mint).await.unwrap().last_reference_in,
            100
        );
        // La base est bien repartie de 100.
        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 180, 0))
            .await
            .unwrap();
        assert_eq!(obs.reference_in_delta, 80);
    }

    #[tokio::test]
    async fn buy_commit_marks_the_pool_observed() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let tracker = Tracker::new(reference);

        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 0, 0))
            .await
            .unwrap();
        assert!(!obs.pool_observed);

        tracker
            .commit(IntendedState::PoolBought {
                pool: address,
                mint,
                keys: Arc::new(TrackedPoolKeys::sample_for_tests()),
                state: obs.tracking_state(),
            })
            .await;

        assert!(tracker.pool_is_observed(&address).await);
        assert!(tracker.keys_for(&mint).await.is_some());
        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 0, 0))
            .await
            .unwrap();
        assert!(obs.pool_observed);
    }

    #[tokio::test]
    async fn removal_flag_is_visible_in_observations() {
        let reference = reference_mint();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let tracker = Tracker::new(reference);

        assert!(tracker.mark_removed(mint).await);
        assert!(!tracker.mark_removed(mint).await); // déjà signalé

        let obs = tracker
            .observe(&pool_with_counters(address, reference, mint, 0, 0))
            .await
            .unwrap();
        assert!(obs.removed);
    }
}
