// DANS : src/trader.rs

use crate::decoders::raydium::amm_v4::{decode_pool, resolve_pool_keys, DecodedPool};
use crate::error::SniperError;
use crate::execution::bundle::BundleSubmitter;
use crate::execution::swap::{build_swap_transaction, SwapDirection};
use crate::feeds::accounts::AccountEvent;
use crate::monitoring::metrics;
use crate::rpc::ResilientRpcClient;
use crate::state::balances::BalanceResolver;
use crate::state::pending::PendingBundles;
use crate::state::tracker::{IntendedState, PoolObservation, Tracker};
use crate::strategies::trigger::{TradeDecision, TriggerEngine};
use anyhow::Result;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// L'orchestrateur du flux de comptes : observation, décision, puis
/// pipeline d'exécution. Chaque événement est traité isolément ; aucun échec
/// ne remonte jusqu'à la boucle de consommation.
pub struct Trader {
    reference_mint: Pubkey,
    payer: Arc<Keypair>,
    rpc_client: Arc<ResilientRpcClient>,
    tracker: Arc<Tracker>,
    pending: Arc<PendingBundles>,
    balances: Arc<BalanceResolver>,
    engine: TriggerEngine,
    submitter: Arc<BundleSubmitter>,
}

impl Trader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reference_mint: Pubkey,
        payer: Arc<Keypair>,
        rpc_client: Arc<ResilientRpcClient>,
        tracker: Arc<Tracker>,
        pending: Arc<PendingBundles>,
        balances: Arc<BalanceResolver>,
        engine: TriggerEngine,
        submitter: Arc<BundleSubmitter>,
    ) -> Self {
        Self {
            reference_mint,
            payer,
            rpc_client,
            tracker,
            pending,
            balances,
            engine,
            submitter,
        }
    }

    /// Boucle de consommation du flux de comptes, un événement à la fois.
    pub async fn run(self, mut receiver: mpsc::Receiver<AccountEvent>) {
        info!("[Trader] Démarrage du traitement des mises à jour de pools.");
        while let Some(event) = receiver.recv().await {
            self.handle_account_event(&event).await;
        }
        info!("[Trader] Canal fermé, arrêt du trader.");
    }

    async fn handle_account_event(&self, event: &AccountEvent) {
        // Les comptes illisibles et les pools invalorisables sont des cas
        // attendus du flux : on saute l'observation, sans bruit.
        let pool = match decode_pool(&event.pool, &event.data) {
            Ok(pool) => pool,
            Err(e) => {
                debug!(pool = %event.pool, error = %e, "Observation sautée.");
                return;
            }
        };
        let observation = match self.tracker.observe(&pool).await {
            Ok(observation) => observation,
            Err(e) => {
                debug!(pool = %event.pool, error = %e, "Pool ignoré.");
                return;
            }
        };

        if observation.is_new_pool {
            metrics::POOLS_TRACKED.set(self.tracker.tracked_assets().await as i64);
            info!(
                pool = %observation.pool,
                mint = %observation.mint,
                reference_in = observation.reference_in as u64,
                "Nouveau pool suivi."
            );
        }

        let Some(decision) = self.engine.evaluate(&observation) else {
            return;
        };

        // Revendication atomique de l'actif AVANT tout point d'attente du
        // pipeline : deux déclencheurs concurrents pour le même mint ne
        // peuvent pas avancer tous les deux.
        if !self.pending.claim(observation.mint).await {
            debug!(mint = %observation.mint, "Un bundle est déjà en vol pour cet actif.");
            return;
        }

        let result = match decision {
            TradeDecision::Buy { size_lamports, .. } => {
                self.execute_buy(&pool, &observation, size_lamports).await
            }
            TradeDecision::Sell {
                expected_profit_lamports,
                ..
            } => self.execute_sell(&observation, expected_profit_lamports).await,
        };

        if let Err(e) = result {
            // La revendication ne survit jamais à un pipeline avorté.
            self.pending.release(&observation.mint).await;
            match e.downcast_ref::<SniperError>() {
                Some(SniperError::BalanceUnavailable(_)) => info!(
                    mint = %observation.mint,
                    "Solde indisponible : vente différée à la prochaine observation qualifiante."
                ),
                Some(SniperError::RelayUnavailable) => warn!(
                    mint = %observation.mint,
                    "Relay indisponible : déclencheur perdu pour cette observation."
                ),
                _ => warn!(
                    mint = %observation.mint,
                    error = %e,
                    "Pipeline d'exécution échoué."
                ),
            }
        }
    }

    async fn execute_buy(
        &self,
        pool: &DecodedPool,
        observation: &PoolObservation,
        size_lamports: u64,
    ) -> Result<()> {
        // Le descripteur de routage est résolu une seule fois par pool ;
        // les ventes suivantes le réutilisent par référence.
        let keys = match self.tracker.keys_for(&observation.mint).await {
            Some(keys) => keys,
            None => Arc::new(resolve_pool_keys(&self.rpc_client, pool).await?),
        };

        let recent_blockhash = self.rpc_client.get_latest_blockhash().await?;
        let swap_transaction = build_swap_transaction(
            &self.payer,
            &keys,
            &self.reference_mint,
            SwapDirection::Buy,
            size_lamports,
            0,
            recent_blockhash,
        )?;

        info!(
            pool = %observation.pool,
            mint = %observation.mint,
            size_lamports,
            "ACHAT déclenché : pool fraîchement initialisé, jamais tradé."
        );

        let intended = IntendedState::PoolBought {
            pool: observation.pool,
            mint: observation.mint,
            keys,
            state: observation.tracking_state(),
        };
        self.submitter
            .submit(swap_transaction, 0, intended, recent_blockhash)
            .await?;
        metrics::BUYS_SUBMITTED.inc();
        Ok(())
    }

    async fn execute_sell(
        &self,
        observation: &PoolObservation,
        expected_profit_lamports: u64,
    ) -> Result<()> {
        let Some(keys) = self.tracker.keys_for(&observation.mint).await else {
            // Actif jamais acheté par ce processus : rien à vendre.
            self.pending.release(&observation.mint).await;
            debug!(mint = %observation.mint, "Aucun descripteur de routage, vente ignorée.");
            return Ok(());
        };

        // Totalité de la position, en unités de base de l'actif.
        let held_balance = self.balances.held_balance(&observation.mint).await?;

        let recent_blockhash = self.rpc_client.get_latest_blockhash().await?;
        let swap_transaction = build_swap_transaction(
            &self.payer,
            &keys,
            &self.reference_mint,
            SwapDirection::Sell,
            held_balance,
            0,
            recent_blockhash,
        )?;

        info!(
            mint = %observation.mint,
            held_balance,
            expected_profit_lamports,
            "VENTE déclenchée : retrait de liquidité signalé et volume qualifiant."
        );

        let intended = IntendedState::PositionSold {
            mint: observation.mint,
            state: observation.tracking_state(),
        };
        self.submitter
            .submit(swap_transaction, expected_profit_lamports, intended, recent_blockhash)
            .await?;
        metrics::SELLS_SUBMITTED.inc();
        Ok(())
    }
}
