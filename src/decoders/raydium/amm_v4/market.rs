// DANS : src/decoders/raydium/amm_v4/market.rs

use crate::decoders::raydium::amm_v4::pool::{DecodedPool, RAYDIUM_AMM_V4_PROGRAM_ID};
use crate::error::SniperError;
use crate::rpc::ResilientRpcClient;
use anyhow::Result;
use bytemuck::{from_bytes, Pod, Zeroable};
use solana_sdk::pubkey::Pubkey;
use std::mem::size_of;

// Le compte d'un marché OpenBook commence par 5 octets d'en-tête ("serum"),
// suivis de la struct d'état. On ne décode que le préfixe dont on a besoin.
const MARKET_HEADER_LEN: usize = 5;

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct MarketStateData {
    pub account_flags: u64,
    pub own_address: Pubkey,
    pub vault_signer_nonce: u64,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub coin_vault: Pubkey,
    pub coin_deposits_total: u64,
    pub coin_fees_accrued: u64,
    pub pc_vault: Pubkey,
    pub pc_deposits_total: u64,
    pub pc_fees_accrued: u64,
    pub pc_dust_threshold: u64,
    pub req_q: Pubkey,
    pub event_q: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub fee_rate_bps: u64,
    pub referrer_rebates_accrued: u64,
}

/// Le descripteur de routage complet d'un pool : tout ce qu'il faut pour
/// construire un swap, résolu une seule fois au premier achat puis partagé
/// par référence par toutes les ventes suivantes. Jamais muté.
#[derive(Debug, Clone)]
pub struct TrackedPoolKeys {
    pub pool: Pubkey,
    pub amm_authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub coin_decimals: u8,
    pub pc_decimals: u8,
    pub market_program_id: Pubkey,
    pub market: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
    pub market_coin_vault: Pubkey,
    pub market_pc_vault: Pubkey,
    pub market_vault_signer: Pubkey,
}

/// Résout le descripteur de routage d'un pool : un seul aller-retour RPC
/// pour le compte du marché, plus deux dérivations de PDA.
pub async fn resolve_pool_keys(
    rpc_client: &ResilientRpcClient,
    pool: &DecodedPool,
) -> Result<TrackedPoolKeys> {
    let market_data = rpc_client.get_account_data(&pool.market).await?;
    let market = decode_market(&market_data)?;

    let (amm_authority, _) =
        Pubkey::find_program_address(&[b"amm authority"], &RAYDIUM_AMM_V4_PROGRAM_ID);

    let market_vault_signer = Pubkey::create_program_address(
        &[pool.market.as_ref(), &market.vault_signer_nonce.to_le_bytes()],
        &pool.market_program_id,
    )
    .map_err(|e| SniperError::Decode(format!("vault signer du marché {} : {}", pool.market, e)))?;

    Ok(TrackedPoolKeys {
        pool: pool.address,
        amm_authority,
        open_orders: pool.open_orders,
        target_orders: pool.target_orders,
        coin_vault: pool.coin_vault,
        pc_vault: pool.pc_vault,
        coin_mint: pool.coin_mint,
        pc_mint: pool.pc_mint,
        coin_decimals: pool.coin_decimals,
        pc_decimals: pool.pc_decimals,
        market_program_id: pool.market_program_id,
        market: pool.market,
        market_bids: market.bids,
        market_asks: market.asks,
        market_event_queue: market.event_q,
        market_coin_vault: market.coin_vault,
        market_pc_vault: market.pc_vault,
        market_vault_signer,
    })
}

fn decode_market(data: &[u8]) -> Result<MarketStateData, SniperError> {
    let end = MARKET_HEADER_LEN + size_of::<MarketStateData>();
    let slice = data.get(MARKET_HEADER_LEN..end).ok_or_else(|| {
        SniperError::Decode(format!(
            "compte de marché trop court : {} octets au lieu d'au moins {}",
            data.len(),
            end
        ))
    })?;
    Ok(*from_bytes::<MarketStateData>(slice))
}

#[cfg(test)]
impl TrackedPoolKeys {
    pub fn sample_for_tests() -> Self {
        Self {
            pool: Pubkey::new_unique(),
            amm_authority: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            coin_vault: Pubkey::new_unique(),
            pc_vault: Pubkey::new_unique(),
            coin_mint: Pubkey::new_unique(),
            pc_mint: Pubkey::new_unique(),
            coin_decimals: 9,
            pc_decimals: 6,
            market_program_id: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
            market_coin_vault: Pubkey::new_unique(),
            market_pc_vault: Pubkey::new_unique(),
            market_vault_signer: Pubkey::new_unique(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::bytes_of;

    #[test]
    fn market_prefix_decodes_after_header() {
        let mut raw = MarketStateData::zeroed();
        raw.account_flags = 3;
        raw.vault_signer_nonce = 1;
        raw.bids = Pubkey::new_unique();
        raw.asks = Pubkey::new_unique();
        raw.event_q = Pubkey::new_unique();

        // On reconstitue un compte complet : en-tête, struct, queue.
        let mut account = vec![0u8; MARKET_HEADER_LEN];
        account.extend_from_slice(bytes_of(&raw));
        account.extend_from_slice(&[0u8; 7]);

        let decoded = decode_market(&account).unwrap();
        assert_eq!({ decoded.vault_signer_nonce }, 1);
        assert_eq!({ decoded.bids }, { raw.bids });
        assert_eq!({ decoded.event_q }, { raw.event_q });
    }

    #[test]
    fn market_too_short_is_a_decode_error() {
        let err = decode_market(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, SniperError::Decode(_)));
    }
}
