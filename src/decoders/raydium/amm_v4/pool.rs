// DANS : src/decoders/raydium/amm_v4/pool.rs

use crate::decoders::raydium::amm_v4::market::TrackedPoolKeys;
use crate::error::SniperError;
use bytemuck::{from_bytes, Pod, Zeroable};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
};
use std::mem::{offset_of, size_of};

pub const RAYDIUM_AMM_V4_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
pub const OPENBOOK_PROGRAM_ID: Pubkey = pubkey!("srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX");

/// Taille exacte du compte d'état d'un pool AMM v4. Sert de premier filtre
/// de l'abonnement aux comptes.
pub const POOL_STATE_SIZE: usize = size_of::<AmmInfoData>();

/// Offset du champ `serum_dex` (le program id du marché) dans le compte.
/// Second filtre de l'abonnement : on ne veut que les pools adossés à un
/// marché OpenBook.
pub const MARKET_PROGRAM_ID_OFFSET: usize = offset_of!(AmmInfoData, serum_dex);

// Layouts on-chain. L'ordre et la taille des champs sont imposés par le
// programme AMM ; ne rien réordonner.
#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct Fees {
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct OutPutData {
    pub need_take_pnl_coin: u64,
    pub need_take_pnl_pc: u64,
    pub total_pnl_pc: u64,
    pub total_pnl_coin: u64,
    pub pool_open_time: u64,
    pub punish_pc_amount: u64,
    pub punish_coin_amount: u64,
    pub orderbook_to_init_time: u64,
    // Les quatre compteurs cumulés de volume d'échange. Ils ne décroissent
    // jamais sur la durée de vie du pool : c'est la matière première des
    // deltas du tracker.
    pub swap_coin_in_amount: u128,
    pub swap_pc_out_amount: u128,
    pub swap_take_pc_fee: u64,
    pub swap_pc_in_amount: u128,
    pub swap_coin_out_amount: u128,
    pub swap_take_coin_fee: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct AmmInfoData {
    pub status: u64,
    pub nonce: u64,
    pub order_num: u64,
    pub depth: u64,
    pub coin_decimals: u64,
    pub pc_decimals: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave: u64,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub sys_decimal_value: u64,
    pub fees: Fees,
    pub out_put: OutPutData,
    pub token_coin: Pubkey,
    pub token_pc: Pubkey,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    pub serum_dex: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub token_temp_lp: Pubkey,
    pub amm_owner: Pubkey,
    pub lp_amount: u64,
    pub client_order_id: u64,
    pub padding: [u64; 2],
}

/// La vue typée d'un pool, réduite à ce que le cœur de décision consomme :
/// identité des deux côtés, vaults, références du marché, et les compteurs
/// cumulés de volume.
#[derive(Debug, Clone)]
pub struct DecodedPool {
    pub address: Pubkey,
    pub status: u64,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub coin_decimals: u8,
    pub pc_decimals: u8,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub market: Pubkey,
    pub market_program_id: Pubkey,
    pub swap_coin_in: u128,
    pub swap_coin_out: u128,
    pub swap_pc_in: u128,
    pub swap_pc_out: u128,
}

pub fn decode_pool(address: &Pubkey, data: &[u8]) -> Result<DecodedPool, SniperError> {
    if data.len() < POOL_STATE_SIZE {
        return Err(SniperError::Decode(format!(
            "compte de pool trop court : {} octets au lieu de {}",
            data.len(),
            POOL_STATE_SIZE
        )));
    }
    let raw: &AmmInfoData = from_bytes(&data[..POOL_STATE_SIZE]);
    if raw.status == 0 {
        return Err(SniperError::Decode(format!("pool {} non initialisé", address)));
    }

    Ok(DecodedPool {
        address: *address,
        status: raw.status,
        coin_mint: raw.coin_mint,
        pc_mint: raw.pc_mint,
        coin_decimals: raw.coin_decimals as u8,
        pc_decimals: raw.pc_decimals as u8,
        coin_vault: raw.token_coin,
        pc_vault: raw.token_pc,
        open_orders: raw.open_orders,
        target_orders: raw.target_orders,
        market: raw.market,
        market_program_id: raw.serum_dex,
        swap_coin_in: raw.out_put.swap_coin_in_amount,
        swap_coin_out: raw.out_put.swap_coin_out_amount,
        swap_pc_in: raw.out_put.swap_pc_in_amount,
        swap_pc_out: raw.out_put.swap_pc_out_amount,
    })
}

/// Les comptes de l'utilisateur impliqués dans un swap.
#[derive(Debug, Clone, Copy)]
pub struct UserSwapAccounts {
    pub owner: Pubkey,
    pub source: Pubkey,
    pub destination: Pubkey,
}

/// Construit l'instruction SwapBaseIn (discriminateur 9) avec l'ordre de
/// comptes attendu par le programme AMM v4.
pub fn create_swap_base_in_instruction(
    keys: &TrackedPoolKeys,
    user: &UserSwapAccounts,
    amount_in: u64,
    minimum_amount_out: u64,
) -> Instruction {
    let mut instruction_data = vec![9];
    instruction_data.extend_from_slice(&amount_in.to_le_bytes());
    instruction_data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.pool, false),
        AccountMeta::new_readonly(keys.amm_authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.coin_vault, false),
        AccountMeta::new(keys.pc_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_coin_vault, false),
        AccountMeta::new(keys.market_pc_vault, false),
        AccountMeta::new_readonly(keys.market_vault_signer, false),
        AccountMeta::new(user.source, false),
        AccountMeta::new(user.destination, false),
        AccountMeta::new_readonly(user.owner, true),
    ];

    Instruction {
        program_id: RAYDIUM_AMM_V4_PROGRAM_ID,
        accounts,
        data: instruction_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::bytes_of;

    fn sample_raw_pool() -> AmmInfoData {
        let mut raw = AmmInfoData::zeroed();
        raw.status = 6;
        raw.coin_decimals = 9;
        raw.pc_decimals = 6;
        raw.coin_mint = Pubkey::new_unique();
        raw.pc_mint = Pubkey::new_unique();
        raw.token_coin = Pubkey::new_unique();
        raw.token_pc = Pubkey::new_unique();
        raw.open_orders = Pubkey::new_unique();
        raw.target_orders = Pubkey::new_unique();
        raw.market = Pubkey::new_unique();
        raw.serum_dex = OPENBOOK_PROGRAM_ID;
        raw.out_put.swap_pc_in_amount = 42_000_000;
        raw.out_put.swap_coin_out_amount = 1_234;
        raw
    }

    #[test]
    fn layout_matches_onchain_account() {
        // Le compte AMM v4 fait exactement 752 octets et le program id du
        // marché se trouve à l'offset 560 ; les filtres d'abonnement en
        // dépendent.
        assert_eq!(POOL_STATE_SIZE, 752);
        assert_eq!(MARKET_PROGRAM_ID_OFFSET, 560);
    }

    #[test]
    fn decode_exposes_cumulative_counters() {
        let raw = sample_raw_pool();
        let address = Pubkey::new_unique();
        let decoded = decode_pool(&address, bytes_of(&raw)).unwrap();
        assert_eq!(decoded.address, address);
        assert_eq!(decoded.coin_decimals, 9);
        assert_eq!(decoded.swap_pc_in, 42_000_000);
        assert_eq!(decoded.swap_coin_out, 1_234);
        assert_eq!(decoded.market_program_id, OPENBOOK_PROGRAM_ID);
    }

    #[test]
    fn decode_rejects_short_account() {
        let err = decode_pool(&Pubkey::new_unique(), &[0u8; 100]).unwrap_err();
        assert!(matches!(err, SniperError::Decode(_)));
    }

    #[test]
    fn decode_rejects_uninitialized_pool() {
        let raw = AmmInfoData::zeroed();
        let err = decode_pool(&Pubkey::new_unique(), bytes_of(&raw)).unwrap_err();
        assert!(matches!(err, SniperError::Decode(_)));
    }

    #[test]
    fn swap_instruction_has_expected_shape() {
        let keys = TrackedPoolKeys::sample_for_tests();
        let user = UserSwapAccounts {
            owner: Pubkey::new_unique(),
            source: Pubkey::new_unique(),
            destination: Pubkey::new_unique(),
        };
        let ix = create_swap_base_in_instruction(&keys, &user, 1_000, 1);
        assert_eq!(ix.program_id, RAYDIUM_AMM_V4_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 18);
        assert_eq!(ix.data[0], 9);
        assert_eq!(ix.data.len(), 1 + 8 + 8);
        // Le signataire est le dernier compte.
        assert!(ix.accounts[17].is_signer);
        assert_eq!(ix.accounts[17].pubkey, user.owner);
    }
}
