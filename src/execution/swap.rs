// DANS : src/execution/swap.rs

use crate::decoders::raydium::amm_v4::pool::create_swap_base_in_instruction;
use crate::decoders::raydium::amm_v4::{TrackedPoolKeys, UserSwapAccounts};
use anyhow::Result;
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// Référence → actif.
    Buy,
    /// Actif → référence.
    Sell,
}

/// Construit et signe la transaction de swap d'un trade. À l'achat, l'ATA de
/// l'actif n'existe généralement pas encore (le pool vient de naître) : on
/// préfixe sa création idempotente.
pub fn build_swap_transaction(
    payer: &Keypair,
    keys: &TrackedPoolKeys,
    reference_mint: &Pubkey,
    direction: SwapDirection,
    amount_in: u64,
    minimum_amount_out: u64,
    recent_blockhash: Hash,
) -> Result<VersionedTransaction> {
    let asset_mint = if keys.coin_mint == *reference_mint {
        keys.pc_mint
    } else {
        keys.coin_mint
    };

    let owner = payer.pubkey();
    let reference_ata = get_associated_token_address(&owner, reference_mint);
    let asset_ata = get_associated_token_address(&owner, &asset_mint);
    let (source, destination) = match direction {
        SwapDirection::Buy => (reference_ata, asset_ata),
        SwapDirection::Sell => (asset_ata, reference_ata),
    };

    let mut instructions = Vec::with_capacity(2);
    if direction == SwapDirection::Buy {
        instructions.push(create_associated_token_account_idempotent(
            &owner,
            &owner,
            &asset_mint,
            &spl_token::id(),
        ));
    }
    instructions.push(create_swap_base_in_instruction(
        keys,
        &UserSwapAccounts {
            owner,
            source,
            destination,
        },
        amount_in,
        minimum_amount_out,
    ));

    let message = v0::Message::try_compile(&owner, &instructions, &[], recent_blockhash)?;
    let transaction = VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])?;
    Ok(transaction)
}
