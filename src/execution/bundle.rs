// DANS : src/execution/bundle.rs

use crate::execution::relay::BundleRelay;
use crate::state::pending::{PendingBundle, PendingBundles};
use crate::state::tracker::IntendedState;
use anyhow::Result;
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Les comptes de tip du block engine. On tourne dessus pour ne pas écrire
/// toujours sur le même compte.
pub const TIP_ACCOUNTS: [Pubkey; 8] = [
    pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5"),
    pubkey!("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe"),
    pubkey!("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY"),
    pubkey!("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49"),
    pubkey!("DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh"),
    pubkey!("ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt"),
    pubkey!("DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL"),
    pubkey!("3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT"),
];

/// Dimensionne le tip : forfaitaire quand le profit estimé est nul ou sous
/// le seuil de déclenchement, sinon un pourcentage du profit tronqué en
/// lamports entiers.
pub fn compute_tip_lamports(
    expected_profit: u64,
    tip_percent: u64,
    min_trigger: u64,
    default_tip: u64,
) -> u64 {
    if expected_profit == 0 || expected_profit < min_trigger {
        return default_tip;
    }
    ((expected_profit as u128 * tip_percent as u128) / 100) as u64
}

/// Assemble et soumet les bundles : la transaction de swap, une transaction
/// de tip dimensionnée sur le profit attendu, et l'inscription du bundle en
/// vol AVANT de rendre la main.
pub struct BundleSubmitter {
    relay: Arc<dyn BundleRelay>,
    pending: Arc<PendingBundles>,
    payer: Arc<Keypair>,
    tip_percent: u64,
    default_tip_lamports: u64,
    min_sol_trigger_lamports: u64,
    tip_cursor: AtomicUsize,
}

impl BundleSubmitter {
    pub fn new(
        relay: Arc<dyn BundleRelay>,
        pending: Arc<PendingBundles>,
        payer: Arc<Keypair>,
        tip_percent: u64,
        default_tip_lamports: u64,
        min_sol_trigger_lamports: u64,
    ) -> Self {
        Self {
            relay,
            pending,
            payer,
            tip_percent,
            default_tip_lamports,
            min_sol_trigger_lamports,
            tip_cursor: AtomicUsize::new(0),
        }
    }

    /// Soumet [swap, tip] comme un bundle atomique et inscrit le bundle en
    /// vol sous l'identifiant retourné. L'appelant garde la responsabilité
    /// de libérer la revendication de l'actif si cette fonction échoue.
    pub async fn submit(
        &self,
        swap_transaction: VersionedTransaction,
        expected_profit_lamports: u64,
        intended: IntendedState,
        recent_blockhash: Hash,
    ) -> Result<String> {
        let mint = intended.mint();
        let tip_lamports = compute_tip_lamports(
            expected_profit_lamports,
            self.tip_percent,
            self.min_sol_trigger_lamports,
            self.default_tip_lamports,
        );

        let cursor = self.tip_cursor.fetch_add(1, Ordering::Relaxed);
        let tip_account = TIP_ACCOUNTS[cursor % TIP_ACCOUNTS.len()];
        let tip_instruction =
            system_instruction::transfer(&self.payer.pubkey(), &tip_account, tip_lamports);
        let tip_message = v0::Message::try_compile(
            &self.payer.pubkey(),
            &[tip_instruction],
            &[],
            recent_blockhash,
        )?;
        let tip_transaction =
            VersionedTransaction::try_new(VersionedMessage::V0(tip_message), &[self.payer.as_ref()])?;

        let bundle_id = self
            .relay
            .send_bundle(&[swap_transaction, tip_transaction])
            .await?;

        self.pending
            .register(PendingBundle {
                bundle_id: bundle_id.clone(),
                mint,
                intended,
                submitted_at: Instant::now(),
            })
            .await;

        info!(
            bundle_id = %bundle_id,
            mint = %mint,
            tip_lamports,
            expected_profit_lamports,
            "Bundle soumis au relay."
        );
        Ok(bundle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_profit_pays_the_default_tip() {
        assert_eq!(compute_tip_lamports(0, 10, 1_000, 777), 777);
    }

    #[test]
    fn profit_below_the_trigger_pays_the_default_tip() {
        assert_eq!(compute_tip_lamports(999, 10, 1_000, 777), 777);
    }

    #[test]
    fn profit_above_the_trigger_pays_a_percentage() {
        assert_eq!(compute_tip_lamports(1_000_000, 10, 1_000, 777), 100_000);
    }

    #[test]
    fn percentage_is_truncated_to_whole_lamports() {
        // 15 * 33 / 100 = 4.95, tronqué à 4.
        assert_eq!(compute_tip_lamports(15, 33, 1, 0), 4);
    }
}
