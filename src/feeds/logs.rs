// DANS : src/feeds/logs.rs

use crate::decoders::raydium::amm_v4::RAYDIUM_AMM_V4_PROGRAM_ID;
use crate::monitoring::metrics;
use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
};
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Les logs d'une transaction touchant le programme AMM.
#[derive(Debug)]
pub struct LogEvent {
    pub signature: String,
    pub logs: Vec<String>,
}

/// L'abonnement aux logs des transactions du programme AMM. Les transactions
/// échouées sont filtrées à la source : leurs logs ne représentent aucun
/// mouvement réel.
pub struct LogFeed {
    ws_url: String,
    commitment: CommitmentConfig,
}

impl LogFeed {
    pub fn new(ws_url: String, commitment: CommitmentConfig) -> Self {
        Self { ws_url, commitment }
    }

    pub async fn run_with_reconnect(&self, sender: mpsc::Sender<LogEvent>) {
        loop {
            match self.run(&sender).await {
                Ok(()) => {
                    info!("[LogFeed] Canal fermé, arrêt du flux de logs.");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "[LogFeed] Flux interrompu, reconnexion dans 3s.");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            }
        }
    }

    async fn run(&self, sender: &mpsc::Sender<LogEvent>) -> Result<()> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .context("Connexion WebSocket impossible")?;

        let (mut stream, _unsubscribe) = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![RAYDIUM_AMM_V4_PROGRAM_ID.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(self.commitment),
                },
            )
            .await
            .context("Abonnement aux logs impossible")?;

        info!(ws_url = %self.ws_url, "[LogFeed] Abonnement aux logs de transactions actif.");

        while let Some(update) = stream.next().await {
            let value = update.value;
            if value.err.is_some() {
                continue;
            }

            metrics::LOG_EVENTS_RECEIVED.inc();
            let event = LogEvent {
                signature: value.signature,
                logs: value.logs,
            };
            if sender.send(event).await.is_err() {
                return Ok(());
            }
        }

        Err(anyhow!("le stream d'abonnement aux logs s'est terminé"))
    }
}
