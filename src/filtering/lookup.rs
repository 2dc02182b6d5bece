// DANS : src/filtering/lookup.rs

use crate::error::SniperError;
use crate::rpc::ResilientRpcClient;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Résout l'actif touché par une transaction, à partir de sa signature, en
/// relisant les soldes de jetons de la transaction confirmée. Le service
/// d'indexation peut être en retard sur le flux de logs : on re-tente à
/// cadence fixe jusqu'à une échéance murale, puis on abandonne.
pub struct MintLookup {
    rpc_client: Arc<ResilientRpcClient>,
    reference_mint: Pubkey,
    excluded_stable_mint: Pubkey,
    interval: Duration,
    deadline: Duration,
}

enum Probe {
    /// L'actif est résolu et qualifié.
    Resolved(Pubkey),
    /// La transaction est lisible mais ne désigne aucun actif acceptable :
    /// inutile de re-tenter.
    Unqualified,
    /// La transaction n'est pas encore indexée : on re-tentera.
    NotYetAvailable,
}

impl MintLookup {
    pub fn new(
        rpc_client: Arc<ResilientRpcClient>,
        reference_mint: Pubkey,
        excluded_stable_mint: Pubkey,
        interval: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            rpc_client,
            reference_mint,
            excluded_stable_mint,
            interval,
            deadline,
        }
    }

    /// Ok(Some(mint)) : actif résolu. Ok(None) : résolution écartée
    /// (contrepartie absente ou stablecoin). Err(LookupTimeout) : le service
    /// n'a rien retourné avant l'échéance — non fatal pour l'appelant.
    pub async fn resolve_removed_mint(
        &self,
        signature: &Signature,
    ) -> Result<Option<Pubkey>, SniperError> {
        let deadline = Instant::now() + self.deadline;
        loop {
            match self.probe(signature).await {
                Probe::Resolved(mint) => return Ok(Some(mint)),
                Probe::Unqualified => return Ok(None),
                Probe::NotYetAvailable => {}
            }
            if Instant::now() + self.interval >= deadline {
                return Err(SniperError::LookupTimeout(self.deadline));
            }
            sleep(self.interval).await;
        }
    }

    async fn probe(&self, signature: &Signature) -> Probe {
        let tx = match self.rpc_client.get_transaction_parsed(signature).await {
            Ok(tx) => tx,
            Err(e) => {
                debug!(signature = %signature, error = %e, "Transaction pas encore disponible");
                return Probe::NotYetAvailable;
            }
        };
        let Some(meta) = tx.transaction.meta else {
            return Probe::NotYetAvailable;
        };
        // OptionSerializer -> Option, la seule manière sûre d'extraire.
        let balances: Option<Vec<_>> = meta.post_token_balances.into();
        let Some(balances) = balances else {
            return Probe::NotYetAvailable;
        };
        if balances.is_empty() {
            return Probe::NotYetAvailable;
        }

        let mints: Vec<Pubkey> = balances
            .iter()
            .filter_map(|b| Pubkey::from_str(&b.mint).ok())
            .collect();
        match select_candidate(&mints, &self.reference_mint, &self.excluded_stable_mint) {
            Some(mint) => Probe::Resolved(mint),
            None => Probe::Unqualified,
        }
    }
}

/// Choisit l'actif désigné par une liste de mints : il doit avoir l'actif de
/// référence pour contrepartie, et le stablecoin configuré est exclu
/// d'office (filtrage volontaire du marché de cotation).
fn select_candidate(
    mints: &[Pubkey],
    reference_mint: &Pubkey,
    excluded_stable_mint: &Pubkey,
) -> Option<Pubkey> {
    let saw_reference = mints.iter().any(|m| m == reference_mint);
    if !saw_reference {
        return None;
    }
    mints
        .iter()
        .find(|m| *m != reference_mint && *m != excluded_stable_mint)
        .copied()
}
