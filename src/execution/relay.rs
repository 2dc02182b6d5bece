// DANS : src/execution/relay.rs

use crate::error::SniperError;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::transaction::VersionedTransaction;
use tracing::warn;

/// Le relay applique une inclusion tout-ou-rien sur des bundles d'au plus
/// cinq transactions.
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// Statut d'un bundle en vol tel que rapporté par le block engine.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleStatus {
    pub bundle_id: String,
    pub status: String,
    pub landed_slot: Option<u64>,
}

/// La couture vers le relay. Un trait pour pouvoir brancher un faux relay
/// dans les tests du corrélateur.
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// Soumet un bundle signé et retourne l'identifiant attribué par le
    /// relay. Échoue avec `RelayUnavailable` si aucun endpoint n'accepte.
    async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String>;

    /// Statuts des bundles encore en vol. Un identifiant inconnu du relay
    /// peut simplement être absent de la réponse.
    async fn bundle_statuses(&self, bundle_ids: &[String]) -> Result<Vec<BundleStatus>>;
}

/// Client JSON-RPC du block engine Jito. Les endpoints sont essayés dans
/// l'ordre de la configuration ; le premier qui répond gagne.
pub struct BlockEngineClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl BlockEngineClient {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} injoignable", endpoint))?
            .error_for_status()
            .with_context(|| format!("{} a répondu en erreur HTTP", endpoint))?
            .json::<Value>()
            .await
            .with_context(|| format!("Réponse de {} illisible", endpoint))?;

        if let Some(error) = response.get("error") {
            bail!("{} a retourné une erreur JSON-RPC : {}", endpoint, error);
        }
        Ok(response)
    }
}

#[async_trait]
impl BundleRelay for BlockEngineClient {
    async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String> {
        if transactions.is_empty() || transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            bail!(
                "un bundle contient entre 1 et {} transactions, pas {}",
                MAX_BUNDLE_TRANSACTIONS,
                transactions.len()
            );
        }

        let encoded: Vec<String> = transactions
            .iter()
            .map(|tx| bincode::serialize(tx).map(|bytes| STANDARD.encode(bytes)))
            .collect::<Result<_, _>>()
            .context("Sérialisation d'une transaction du bundle impossible")?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [encoded, { "encoding": "base64" }],
        });

        for endpoint in &self.endpoints {
            match self.post(endpoint, &body).await {
                Ok(response) => {
                    if let Some(bundle_id) = response.get("result").and_then(Value::as_str) {
                        return Ok(bundle_id.to_string());
                    }
                    warn!(endpoint = %endpoint, "Réponse sendBundle sans identifiant.");
                }
                Err(e) => warn!(endpoint = %endpoint, error = %e, "Endpoint du relay indisponible."),
            }
        }

        Err(SniperError::RelayUnavailable.into())
    }

    async fn bundle_statuses(&self, bundle_ids: &[String]) -> Result<Vec<BundleStatus>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getInflightBundleStatuses",
            "params": [bundle_ids],
        });

        for endpoint in &self.endpoints {
            match self.post(endpoint, &body).await {
                Ok(response) => {
                    let value = response
                        .get("result")
                        .and_then(|r| r.get("value"))
                        .cloned()
                        .ok_or_else(|| anyhow!("réponse getInflightBundleStatuses sans valeur"))?;
                    let statuses: Vec<BundleStatus> = serde_json::from_value(value)
                        .context("Statuts de bundles illisibles")?;
                    return Ok(statuses);
                }
                Err(e) => warn!(endpoint = %endpoint, error = %e, "Endpoint du relay indisponible."),
            }
        }

        Err(SniperError::RelayUnavailable.into())
    }
}
