// DANS : src/strategies/trigger.rs

use crate::state::tracker::PoolObservation;
use solana_sdk::pubkey::Pubkey;

/// La décision produite par une observation : acheter, vendre, ou rien.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeDecision {
    /// Pool fraîchement initialisé, jamais tradé : on entre avec la taille
    /// configurée.
    Buy {
        pool: Pubkey,
        mint: Pubkey,
        size_lamports: u64,
    },
    /// Retrait de liquidité signalé et volume entrant suffisant : on sort
    /// la totalité de la position.
    Sell {
        mint: Pubkey,
        expected_profit_lamports: u64,
    },
}

/// Le moteur de décision. Fonction pure d'une observation vers une décision :
/// la garde de concurrence (revendication de l'actif) est posée par
/// l'appelant immédiatement après, avant tout point d'attente.
pub struct TriggerEngine {
    pub trade_size_lamports: u64,
    pub min_sol_trigger_lamports: u64,
}

impl TriggerEngine {
    pub fn new(trade_size_lamports: u64, min_sol_trigger_lamports: u64) -> Self {
        Self {
            trade_size_lamports,
            min_sol_trigger_lamports,
        }
    }

    /// Évalue une observation. La branche d'achat (pool à volume nul) est
    /// évaluée en premier ; les deux branches sont disjointes par
    /// construction (volume nul contre delta non nul), l'ordre ne sert que
    /// de départage théorique.
    pub fn evaluate(&self, obs: &PoolObservation) -> Option<TradeDecision> {
        // Un pool dont les deux compteurs de référence sont exactement à
        // zéro n'a jamais été tradé : c'est la fenêtre d'entrée. Un pool
        // déjà acheté ne se rachète jamais.
        if obs.reference_in == 0 && obs.reference_out == 0 && !obs.pool_observed {
            return Some(TradeDecision::Buy {
                pool: obs.pool,
                mint: obs.mint,
                size_lamports: self.trade_size_lamports,
            });
        }

        // La vente exige le signalement du retrait ET un delta de volume
        // entrant à la fois non nul (aucun mouvement → aucun re-déclenchement)
        // et au-dessus du seuil anti-bruit.
        if obs.removed
            && obs.reference_in_delta > 0
            && obs.reference_in_delta >= u128::from(self.min_sol_trigger_lamports)
        {
            let expected_profit_lamports =
                u64::try_from(obs.reference_in_delta).unwrap_or(u64::MAX);
            return Some(TradeDecision::Sell {
                mint: obs.mint,
                expected_profit_lamports,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::raydium::amm_v4::{DecodedPool, TrackedPoolKeys};
    use crate::state::tracker::{IntendedState, Tracker};
    use std::sync::Arc;

    fn observation(
        reference_in: u128,
        reference_out: u128,
        delta: u128,
        pool_observed: bool,
        removed: bool,
    ) -> PoolObservation {
        PoolObservation {
            pool: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            asset_is_coin: true,
            decimals: 6,
            reference_in,
            reference_out,
            asset_in: 0,
            asset_out: 0,
            reference_in_delta: delta,
            is_new_pool: true,
            pool_observed,
            removed,
        }
    }

    #[test]
    fn zero_volume_pool_triggers_a_buy() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        let decision = engine.evaluate(&observation(0, 0, 0, false, false));
        assert!(matches!(
            decision,
            Some(TradeDecision::Buy { size_lamports: 10_000_000, .. })
        ));
    }

    #[test]
    fn an_already_bought_pool_never_rebuys() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        // Peu importe combien d'observations à volume nul arrivent encore.
        for _ in 0..3 {
            assert_eq!(engine.evaluate(&observation(0, 0, 0, true, false)), None);
        }
    }

    #[test]
    fn a_traded_pool_does_not_trigger_a_buy() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        assert_eq!(engine.evaluate(&observation(1, 0, 0, false, false)), None);
        assert_eq!(engine.evaluate(&observation(0, 1, 0, false, false)), None);
    }

    #[test]
    fn sell_requires_the_removal_flag() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        assert_eq!(
            engine.evaluate(&observation(5_000_000, 0, 5_000_000, true, false)),
            None
        );
    }

    #[test]
    fn sell_requires_the_threshold_and_a_nonzero_delta() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        // Sous le seuil : rien.
        assert_eq!(
            engine.evaluate(&observation(500_000, 0, 500_000, true, true)),
            None
        );
        // Delta nul : rien, même avec un seuil à zéro.
        let permissive = TriggerEngine::new(10_000_000, 0);
        assert_eq!(
            engine.evaluate(&observation(5_000_000, 0, 0, true, true)),
            None
        );
        assert_eq!(
            permissive.evaluate(&observation(5_000_000, 0, 0, true, true)),
            None
        );
    }

    #[test]
    fn sell_reports_the_delta_as_expected_profit() {
        let engine = TriggerEngine::new(10_000_000, 1_000_000);
        let decision = engine.evaluate(&observation(2_000_000, 0, 2_000_000, true, true));
        assert!(matches!(
            decision,
            Some(TradeDecision::Sell { expected_profit_lamports: 2_000_000, .. })
        ));
    }

    // Le scénario de bout en bout au niveau tracker + moteur : achat sur
    // pool neuf, signalement du retrait, vente sur le delta qualifiant,
    // puis plus rien sur une observation identique une fois la vente
    // commitée.
    #[tokio::test]
    async fn full_lifecycle_buy_removal_sell() {
        let reference = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let tracker = Tracker::new(reference);
        let engine = TriggerEngine::new(10_000_000, 1_000_000);

        let pool_at = |ref_in: u128| DecodedPool {
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
            swap_pc_out: 0,
        };

        // 1. Premier passage, volume nul : achat.
        let obs = tracker.observe(&pool_at(0)).await.unwrap();
        let decision = engine.evaluate(&obs).unwrap();
        assert!(matches!(decision, TradeDecision::Buy { .. }));
        tracker
            .commit(IntendedState::PoolBought {
                pool: address,
                mint,
                keys: Arc::new(TrackedPoolKeys::sample_for_tests()),
                state: obs.tracking_state(),
            })
            .await;

        // 2. Nouvelle observation à volume nul : pas de second achat.
        let obs = tracker.observe(&pool_at(0)).await.unwrap();
        assert_eq!(engine.evaluate(&obs), None);

        // 3. Retrait signalé, puis volume entrant au-dessus du seuil : vente
        //    avec le delta pour profit attendu.
        tracker.mark_removed(mint).await;
        let obs = tracker.observe(&pool_at(2_000_000)).await.unwrap();
        let decision = engine.evaluate(&obs).unwrap();
        assert_eq!(
            decision,
            TradeDecision::Sell {
                mint,
                expected_profit_lamports: 2_000_000
            }
        );

        // 4. Vente commitée : une observation identique redonne un delta nul
        //    et ne déclenche plus rien.
        tracker
            .commit(IntendedState::PositionSold {
                mint,
                state: obs.tracking_state(),
            })
            .await;
        let obs = tracker.observe(&pool_at(2_000_000)).await.unwrap();
        assert_eq!(obs.reference_in_delta, 0);
        assert_eq!(engine.evaluate(&obs), None);
    }
}
