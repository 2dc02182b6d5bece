// DANS : src/feeds/accounts.rs

use crate::decoders::raydium::amm_v4::{
    MARKET_PROGRAM_ID_OFFSET, OPENBOOK_PROGRAM_ID, POOL_STATE_SIZE, RAYDIUM_AMM_V4_PROGRAM_ID,
};
use crate::monitoring::metrics;
use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Une mise à jour d'un compte de pool : l'adresse du pool et les octets
/// bruts de son état.
#[derive(Debug)]
pub struct AccountEvent {
    pub pool: Pubkey,
    pub data: Vec<u8>,
}

/// L'abonnement aux changements de comptes du programme AMM, filtré côté
/// serveur par la taille exacte du compte et par le program id du marché à
/// son offset fixe : on ne reçoit que des pools AMM v4 adossés à OpenBook.
pub struct AccountFeed {
    ws_url: String,
    commitment: CommitmentConfig,
}

impl AccountFeed {
    pub fn new(ws_url: String, commitment: CommitmentConfig) -> Self {
        Self { ws_url, commitment }
    }

    /// Boucle de consommation avec reconnexion : une coupure du transport
    /// ne doit jamais arrêter le processus. Retourne quand le consommateur
    /// du canal a disparu.
    pub async fn run_with_reconnect(&self, sender: mpsc::Sender<AccountEvent>) {
        loop {
            match self.run(&sender).await {
                Ok(()) => {
                    info!("[AccountFeed] Canal fermé, arrêt du flux de comptes.");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "[AccountFeed] Flux interrompu, reconnexion dans 3s.");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            }
        }
    }

    async fn run(&self, sender: &mpsc::Sender<AccountEvent>) -> Result<()> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .context("Connexion WebSocket impossible")?;

        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(POOL_STATE_SIZE as u64),
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                    MARKET_PROGRAM_ID_OFFSET,
                    OPENBOOK_PROGRAM_ID.to_bytes().to_vec(),
                )),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };

        let (mut stream, _unsubscribe) = client
            .program_subscribe(&RAYDIUM_AMM_V4_PROGRAM_ID, Some(config))
            .await
            .context("Abonnement au programme AMM impossible")?;

        info!(ws_url = %self.ws_url, "[AccountFeed] Abonnement aux comptes de pools actif.");

        while let Some(update) = stream.next().await {
            let keyed = update.value;
            let pool = match Pubkey::from_str(&keyed.pubkey) {
                Ok(pubkey) => pubkey,
                Err(e) => {
                    warn!(pubkey = %keyed.pubkey, error = %e, "Adresse de pool illisible, événement ignoré.");
                    continue;
                }
            };
            let Some(data) = keyed.account.data.decode() else {
                warn!(pool = %pool, "Données de compte non décodables, événement ignoré.");
                continue;
            };

            metrics::ACCOUNT_EVENTS_RECEIVED.inc();
            if sender.send(AccountEvent { pool, data }).await.is_err() {
                // Le consommateur a disparu : arrêt propre.
                return Ok(());
            }
        }

        Err(anyhow!("le stream d'abonnement aux comptes s'est terminé"))
    }
}
