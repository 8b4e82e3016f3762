//! Confidential token ledger
//!
//! Balances are ciphertext handles kept in program-owned accounts. Moving
//! value is a pair of encrypted add/sub operations; clamped transfers move
//! zero instead of failing when the sender is short, so a failed transfer
//! is indistinguishable from a successful one on-chain.

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Transfer};

use crate::state::{ConfidentialAccount, ConfidentialMint, OperatorApproval};
use crate::utils::encryption::{FheType, Handle, SymbolicFhe};
use crate::ErrorCode;

pub fn open_account(
    fhe: &mut SymbolicFhe,
    account: &mut ConfidentialAccount,
    mint: Pubkey,
    owner: Pubkey,
) -> Result<()> {
    require!(!account.balance.is_assigned(), ErrorCode::AlreadyInitialized);
    account.mint = mint;
    account.owner = owner;
    account.balance = fhe.zero(FheType::Uint64)?;
    Ok(())
}

pub fn ensure_account(account: &ConfidentialAccount, mint: &Pubkey, owner: &Pubkey) -> Result<()> {
    require!(
        account.mint == *mint && account.owner == *owner && account.balance.is_assigned(),
        ErrorCode::InvalidAddress
    );
    Ok(())
}

/// A grant that was never created counts as not approved.
pub fn ensure_operator(
    approval: Option<&OperatorApproval>,
    mint: &Pubkey,
    holder: &Pubkey,
    operator: &Pubkey,
    now: i64,
) -> Result<()> {
    let Some(approval) = approval else {
        return err!(ErrorCode::OperatorNotApproved);
    };
    require!(
        approval.mint == *mint
            && approval.holder == *holder
            && approval.operator == *operator
            && approval.is_active(now),
        ErrorCode::OperatorNotApproved
    );
    Ok(())
}

pub fn mint_encrypted(
    fhe: &mut SymbolicFhe,
    mint: &mut ConfidentialMint,
    mint_key: &Pubkey,
    account: &mut ConfidentialAccount,
    amount: Handle,
) -> Result<()> {
    require_keys_eq!(account.mint, *mint_key, ErrorCode::InvalidAddress);
    let balance = fhe.add(account.balance, amount)?;
    let supply = fhe.add(mint.total_supply, amount)?;
    account.balance = balance;
    mint.total_supply = supply;
    Ok(())
}

/// Moves `amount` without a balance check; callers clamp beforehand.
pub fn move_balance(
    fhe: &mut SymbolicFhe,
    from: &mut ConfidentialAccount,
    to: &mut ConfidentialAccount,
    amount: Handle,
) -> Result<()> {
    require_keys_eq!(from.mint, to.mint, ErrorCode::InvalidAddress);
    let debited = fhe.sub(from.balance, amount)?;
    let credited = fhe.add(to.balance, amount)?;
    from.balance = debited;
    to.balance = credited;
    Ok(())
}

/// Moves `amount` if covered by the sender's balance, otherwise zero.
/// Returns the handle of the amount actually moved.
pub fn transfer_encrypted(
    fhe: &mut SymbolicFhe,
    from: &mut ConfidentialAccount,
    to: &mut ConfidentialAccount,
    amount: Handle,
) -> Result<Handle> {
    let covered = fhe.le(amount, from.balance)?;
    let zero = fhe.zero(FheType::Uint64)?;
    let moved = fhe.select(covered, amount, zero)?;
    move_balance(fhe, from, to, moved)?;
    Ok(moved)
}

/// Locks public SPL tokens in the mint's vault; the caller credits the
/// matching encrypted amount.
pub fn lock_underlying<'info>(
    token_program: AccountInfo<'info>,
    source: AccountInfo<'info>,
    vault: AccountInfo<'info>,
    authority: AccountInfo<'info>,
    amount: u64,
) -> Result<()> {
    token::transfer(
        CpiContext::new(
            token_program,
            Transfer {
                from: source,
                to: vault,
                authority,
            },
        ),
        amount,
    )
}
