// DANS : src/config.rs

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::Keypair,
    signer::keypair::read_keypair_file,
};
use std::str::FromStr;
use std::time::Duration;

/// La configuration complète du processus, chargée depuis l'environnement
/// (et un éventuel fichier .env). Tous les seuils de décision sont exprimés
/// en lamports pour éviter toute arithmétique flottante dans le cœur.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub solana_rpc_url: String,
    pub solana_ws_url: String,
    pub payer_keypair_path: String,

    /// L'actif de référence (côté "prix" de chaque pool). WSOL par défaut.
    #[serde(default = "default_reference_mint")]
    pub reference_mint: String,

    /// Mint explicitement exclu de la détection de retrait (filtrage
    /// volontaire du stablecoin de cotation).
    #[serde(default = "default_excluded_stable_mint")]
    pub excluded_stable_mint: String,

    /// Endpoints du block engine, séparés par des virgules. Le premier qui
    /// accepte le bundle gagne.
    #[serde(default = "default_block_engine_urls")]
    pub block_engine_urls: String,

    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Taille fixe d'un achat, en lamports de l'actif de référence.
    #[serde(default = "default_trade_size_lamports")]
    pub trade_size_lamports: u64,

    /// Volume entrant minimal (delta) pour qu'une vente se déclenche.
    #[serde(default = "default_min_sol_trigger_lamports")]
    pub min_sol_trigger_lamports: u64,

    /// Pourcentage du profit estimé versé en tip.
    #[serde(default = "default_tip_percent")]
    pub tip_percent: u64,

    /// Tip forfaitaire quand le profit estimé est nul ou sous le seuil.
    #[serde(default = "default_tip_lamports")]
    pub default_tip_lamports: u64,

    /// Cadence de re-tentative de la résolution de mint par signature.
    #[serde(default = "default_mint_lookup_interval_ms")]
    pub mint_lookup_interval_ms: u64,

    /// Échéance murale de la résolution de mint.
    #[serde(default = "default_mint_lookup_deadline_secs")]
    pub mint_lookup_deadline_secs: u64,

    /// Cadence d'interrogation des statuts de bundles en vol.
    #[serde(default = "default_bundle_poll_interval_ms")]
    pub bundle_poll_interval_ms: u64,

    #[serde(default = "default_rpc_max_retries")]
    pub rpc_max_retries: u8,

    #[serde(default = "default_rpc_retry_delay_ms")]
    pub rpc_retry_delay_ms: u64,
}

fn default_reference_mint() -> String {
    "So11111111111111111111111111111111111111112".to_string()
}
fn default_excluded_stable_mint() -> String {
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string()
}
fn default_block_engine_urls() -> String {
    // Amsterdam et Francfort sont les régions les plus proches de notre
    // bare metal ; voir la table des endpoints Jito.
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles,\
https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles"
        .to_string()
}
fn default_commitment() -> String {
    "processed".to_string()
}
fn default_trade_size_lamports() -> u64 {
    10_000_000 // 0.01 SOL
}
fn default_min_sol_trigger_lamports() -> u64 {
    1_000_000_000 // 1 SOL de volume entrant depuis le dernier échantillon commité
}
fn default_tip_percent() -> u64 {
    50
}
fn default_tip_lamports() -> u64 {
    1_000_000 // 0.001 SOL
}
fn default_mint_lookup_interval_ms() -> u64 {
    500
}
fn default_mint_lookup_deadline_secs() -> u64 {
    30
}
fn default_bundle_poll_interval_ms() -> u64 {
    2000
}
fn default_rpc_max_retries() -> u8 {
    3
}
fn default_rpc_retry_delay_ms() -> u64 {
    200
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .context("Configuration invalide dans l'environnement")?;
        Ok(config)
    }

    pub fn reference_mint_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.reference_mint)
            .context("REFERENCE_MINT n'est pas une adresse valide")
    }

    pub fn excluded_stable_mint_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.excluded_stable_mint)
            .context("EXCLUDED_STABLE_MINT n'est pas une adresse valide")
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(anyhow!("Niveau de commitment inconnu : {}", other)),
        }
    }

    pub fn block_engine_endpoints(&self) -> Vec<String> {
        self.block_engine_urls
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn payer_keypair(&self) -> Result<Keypair> {
        read_keypair_file(&self.payer_keypair_path).map_err(|e| {
            anyhow!("Impossible de lire la keypair {} : {}", self.payer_keypair_path, e)
        })
    }

    pub fn mint_lookup_interval(&self) -> Duration {
        Duration::from_millis(self.mint_lookup_interval_ms)
    }

    pub fn mint_lookup_deadline(&self) -> Duration {
        Duration::from_secs(self.mint_lookup_deadline_secs)
    }

    pub fn bundle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bundle_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_env() -> Vec<(String, String)> {
        vec![
            ("SOLANA_RPC_URL".to_string(), "http://localhost:8899".to_string()),
            ("SOLANA_WS_URL".to_string(), "ws://localhost:8900".to_string()),
            ("PAYER_KEYPAIR_PATH".to_string(), "/tmp/payer.json".to_string()),
        ]
    }

    #[test]
    fn block_engine_endpoints_are_split_and_trimmed() {
        let mut env = minimal_env();
        env.push((
            "BLOCK_ENGINE_URLS".to_string(),
            "https://a.example/api/v1/bundles , https://b.example/api/v1/bundles".to_string(),
        ));
        let config = envy::from_iter::<_, Config>(env).unwrap();
        assert_eq!(
            config.block_engine_endpoints(),
            vec![
                "https://a.example/api/v1/bundles".to_string(),
                "https://b.example/api/v1/bundles".to_string()
            ]
        );
    }

    #[test]
    fn defaults_cover_decision_thresholds() {
        let config = envy::from_iter::<_, Config>(minimal_env()).unwrap();
        assert_eq!(config.trade_size_lamports, 10_000_000);
        assert_eq!(config.tip_percent, 50);
        assert!(config.reference_mint_pubkey().is_ok());
        assert!(config.commitment_config().is_ok());
        assert_eq!(config.mint_lookup_deadline(), Duration::from_secs(30));
    }
}
