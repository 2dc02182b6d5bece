// DANS : src/rpc/resilient_client.rs

use anyhow::{Context, Result};
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcTransactionConfig,
};
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature,
};
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

/// Un wrapper autour du RpcClient de Solana qui ajoute une logique de
/// ré-essai automatique pour les appels qui échouent à cause d'erreurs
/// réseau temporaires. Seuls les appels dont le cœur a réellement besoin
/// sont exposés.
#[derive(Clone)]
pub struct ResilientRpcClient {
    client: Arc<RpcClient>,
    max_retries: u8,
    delay_ms: u64,
}

impl ResilientRpcClient {
    pub fn new(rpc_url: String, commitment: CommitmentConfig, max_retries: u8, delay_ms: u64) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)),
            max_retries,
            delay_ms,
        }
    }

    /// Détermine si une erreur du client est temporaire et mérite une
    /// nouvelle tentative.
    fn is_retryable(error: &ClientError) -> bool {
        matches!(
            error.kind,
            ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) | ClientErrorKind::Io(_)
        )
    }

    /// Récupère les données brutes d'un compte.
    pub async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Vec<u8>> {
        for attempt in 0..=self.max_retries {
            match self.client.get_account_data(pubkey).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e)
                            .with_context(|| format!("Échec final de get_account_data pour {}", pubkey));
                    }
                }
            }
        }
        unreachable!()
    }

    /// Récupère plusieurs comptes en un appel.
    pub async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        for attempt in 0..=self.max_retries {
            match self.client.get_multiple_accounts(pubkeys).await {
                Ok(accounts) => return Ok(accounts),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| "Échec final de get_multiple_accounts");
                    }
                }
            }
        }
        unreachable!()
    }

    /// Récupère le dernier blockhash.
    pub async fn get_latest_blockhash(&self) -> Result<Hash> {
        for attempt in 0..=self.max_retries {
            match self.client.get_latest_blockhash().await {
                Ok(hash) => return Ok(hash),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| "Échec final de get_latest_blockhash");
                    }
                }
            }
        }
        unreachable!()
    }

    /// Solde d'un compte de jetons (montant brut + décimales).
    pub async fn get_token_account_balance(&self, pubkey: &Pubkey) -> Result<UiTokenAmount> {
        for attempt in 0..=self.max_retries {
            match self.client.get_token_account_balance(pubkey).await {
                Ok(amount) => return Ok(amount),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| {
                            format!("Échec final de get_token_account_balance pour {}", pubkey)
                        });
                    }
                }
            }
        }
        unreachable!()
    }

    /// Récupère une transaction confirmée au format jsonParsed. Pas de
    /// ré-essai interne : l'appelant gère sa propre cadence (la transaction
    /// peut simplement ne pas encore être indexée).
    pub async fn get_transaction_parsed(
        &self,
        signature: &Signature,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        self.client
            .get_transaction_with_config(signature, config)
            .await
            .with_context(|| format!("Transaction {} introuvable", signature))
    }
}
