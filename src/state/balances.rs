// DANS : src/state/balances.rs

use crate::error::SniperError;
use crate::rpc::ResilientRpcClient;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Résout le solde détenu d'un actif (en unités de base) via l'ATA de
/// l'opérateur, et met en cache le premier solde non nul pour toute la vie
/// du processus.
///
/// Simplification assumée : le solde ne bouge que par les trades émis par ce
/// processus ; le cache n'est donc jamais invalidé. Risque de péremption
/// connu si le portefeuille est mouvementé par ailleurs.
pub struct BalanceResolver {
    rpc_client: Arc<ResilientRpcClient>,
    owner: Pubkey,
    cache: Mutex<HashMap<Pubkey, u64>>,
}

impl BalanceResolver {
    pub fn new(rpc_client: Arc<ResilientRpcClient>, owner: Pubkey) -> Self {
        Self {
            rpc_client,
            owner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn held_balance(&self, mint: &Pubkey) -> Result<u64, SniperError> {
        if let Some(cached) = self.cache.lock().await.get(mint) {
            return Ok(*cached);
        }

        let ata = get_associated_token_address(&self.owner, mint);
        let amount = self
            .rpc_client
            .get_token_account_balance(&ata)
            .await
            .map_err(|e| {
                debug!(mint = %mint, error = %e, "Solde introuvable");
                SniperError::BalanceUnavailable(*mint)
            })?;

        let base_units: u64 = amount
            .amount
            .parse()
            .map_err(|_| SniperError::BalanceUnavailable(*mint))?;
        if base_units == 0 {
            return Err(SniperError::BalanceUnavailable(*mint));
        }

        self.cache.lock().await.insert(*mint, base_units);
        Ok(base_units)
    }

    #[cfg(test)]
    pub async fn prime_for_tests(&self, mint: Pubkey, base_units: u64) {
        self.cache.lock().await.insert(mint, base_units);
    }
}
