use anchor_lang::prelude::*;

use crate::queue::{complete, resolve_active};
use crate::state::{
    ConfidentialAccount, LpPosition, Operation, OperatorApproval, PendingOperation, Pool,
    RequestRecord, RequestStatus, ReserveSnapshot,
};
use crate::utils::amm_math::{isqrt, mul_div_public, product_not_decreasing};
use crate::utils::confidential_spl::{ensure_account, ensure_operator, move_balance};
use crate::utils::encryption::{
    decode_cleartexts, verify_decryption_proof, Ed25519Attestation, FheType, Handle, SymbolicFhe,
};
use crate::ErrorCode;

/// Arguments every decryption callback carries.
pub struct Callback<'a> {
    pub program_id: Pubkey,
    pub pool_key: Pubkey,
    pub attestation: &'a Ed25519Attestation,
    pub cleartexts: &'a [u8],
    pub decryption_proof: &'a [u8],
    pub now: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    /// Nothing could be applied against the current pool state; the request
    /// still completes.
    Degenerate,
}

pub struct AddLiquidityAccounts<'a> {
    pub user0: &'a mut ConfidentialAccount,
    pub user1: &'a mut ConfidentialAccount,
    pub vault0: &'a mut ConfidentialAccount,
    pub vault1: &'a mut ConfidentialAccount,
    pub lp_position: &'a mut LpPosition,
    pub approval0: Option<&'a OperatorApproval>,
    pub approval1: Option<&'a OperatorApproval>,
}

pub struct RemoveLiquidityAccounts<'a> {
    pub vault0: &'a mut ConfidentialAccount,
    pub vault1: &'a mut ConfidentialAccount,
    pub destination0: &'a mut ConfidentialAccount,
    pub destination1: &'a mut ConfidentialAccount,
    pub lp_position: &'a mut LpPosition,
}

/// `destination*` is `None` when the swap pays out to the trader's own accounts.
pub struct SwapAccounts<'a> {
    pub user0: &'a mut ConfidentialAccount,
    pub user1: &'a mut ConfidentialAccount,
    pub vault0: &'a mut ConfidentialAccount,
    pub vault1: &'a mut ConfidentialAccount,
    pub destination0: Option<&'a mut ConfidentialAccount>,
    pub destination1: Option<&'a mut ConfidentialAccount>,
    pub approval0: Option<&'a OperatorApproval>,
    pub approval1: Option<&'a OperatorApproval>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddLiquidityOutcome {
    pub request_id: u64,
    pub user: Pubkey,
    pub minted: Handle,
    pub settlement: Settlement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoveLiquidityOutcome {
    pub request_id: u64,
    pub user: Pubkey,
    pub to: Pubkey,
    pub burnt: Handle,
    pub amount0_out: Handle,
    pub amount1_out: Handle,
    pub settlement: Settlement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapOutcome {
    pub request_id: u64,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount0_in: Handle,
    pub amount1_in: Handle,
    pub amount0_out: Handle,
    pub amount1_out: Handle,
    pub settlement: Settlement,
}

/// Resolves the request, checks the KMS attestation over the exact payload
/// and decodes it.
fn open_callback<'r>(
    pool: &Pool,
    pending: &PendingOperation,
    record: Option<&'r mut RequestRecord>,
    expected: Operation,
    callback: &Callback,
) -> Result<(&'r mut RequestRecord, Vec<u128>)> {
    let record = resolve_active(record, pending)?;
    require!(record.operation == expected, ErrorCode::OperationMismatch);
    require_keys_eq!(pending.pool, callback.pool_key, ErrorCode::InvalidAddress);

    verify_decryption_proof(
        callback.attestation,
        &pool.config.kms_signer,
        &callback.program_id,
        record.request_id,
        pending.targets(),
        callback.cleartexts,
        callback.decryption_proof,
    )?;
    let values = decode_cleartexts(callback.cleartexts, expected.decrypted_len())?;
    Ok((record, values))
}

fn ensure_vaults(pool: &Pool, pool_key: &Pubkey, vault0: &ConfidentialAccount, vault1: &ConfidentialAccount) -> Result<()> {
    ensure_account(vault0, &pool.token0, pool_key)?;
    ensure_account(vault1, &pool.token1, pool_key)
}

fn ensure_lp_position(position: &LpPosition, pool_key: &Pubkey, owner: &Pubkey) -> Result<()> {
    require!(
        position.pool == *pool_key && position.owner == *owner && position.balance.is_assigned(),
        ErrorCode::InvalidAddress
    );
    Ok(())
}

/// Encrypted `min(numerator * multiplier / divisor, cap)` narrowed to 64 bits.
fn capped_quotient(
    fhe: &mut SymbolicFhe,
    numerator: Handle,
    multiplier: Handle,
    divisor: u128,
    cap: Handle,
) -> Result<Handle> {
    let quotient = mul_div_public(fhe, numerator, multiplier, divisor)?;
    let cap = fhe.cast(cap, FheType::Uint128)?;
    let bounded = fhe.min(quotient, cap)?;
    fhe.cast(bounded, FheType::Uint64)
}

// ============================================================================
// Add liquidity
// ============================================================================

struct AddEffects {
    moved: [Handle; 2],
    minted: Handle,
    locked: Option<Handle>,
}

pub fn finalize_add_liquidity(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: Option<&mut RequestRecord>,
    callback: &Callback,
    accounts: AddLiquidityAccounts<'_>,
) -> Result<AddLiquidityOutcome> {
    let (record, values) = open_callback(pool, pending, record, Operation::AddLiquidity, callback)?;
    let user = pending.user;
    let pool_key = callback.pool_key;

    ensure_account(accounts.user0, &pool.token0, &user)?;
    ensure_account(accounts.user1, &pool.token1, &user)?;
    ensure_vaults(pool, &pool_key, accounts.vault0, accounts.vault1)?;
    ensure_lp_position(accounts.lp_position, &pool_key, &user)?;
    ensure_operator(accounts.approval0, &pool.token0, &user, &pool_key, callback.now)?;
    ensure_operator(accounts.approval1, &pool.token1, &user, &pool_key, callback.now)?;

    let amounts = pending.inputs;
    let balances = [accounts.user0.balance, accounts.user1.balance];
    let zero = fhe.zero(FheType::Uint64)?;
    let mut empty_pool_detected = false;

    let effects = if pending.bootstrap {
        let root = isqrt(values[0]);
        let minimum = pool.config.minimum_liquidity as u128;
        if pool.has_liquidity || root <= minimum {
            None
        } else {
            let shares = u64::try_from(root - minimum).map_err(|_| error!(ErrorCode::MathOverflow))?;
            let ok = balances_cover(fhe, amounts, balances)?;
            let shares = fhe.trivial_encrypt(shares as u128, FheType::Uint64)?;
            let minimum = fhe.trivial_encrypt(minimum, FheType::Uint64)?;
            Some(AddEffects {
                moved: [
                    fhe.select(ok, amounts[0], zero)?,
                    fhe.select(ok, amounts[1], zero)?,
                ],
                minted: fhe.select(ok, shares, zero)?,
                locked: Some(fhe.select(ok, minimum, zero)?),
            })
        }
    } else if !pool.has_liquidity {
        None
    } else if values[0] == 0 || values[1] == 0 {
        // R_i * r_i is zero only when the reserve itself is zero
        empty_pool_detected = values[0] == 0 && values[1] == 0;
        None
    } else {
        let share0 = mul_div_public(fhe, pending.numerators[0], pending.multipliers[0], values[0])?;
        let share1 = mul_div_public(fhe, pending.numerators[1], pending.multipliers[1], values[1])?;
        let shares = fhe.min(share0, share1)?;
        let ceiling = fhe.trivial_encrypt(u64::MAX as u128, FheType::Uint128)?;
        let shares = fhe.min(shares, ceiling)?;
        let shares = fhe.cast(shares, FheType::Uint64)?;

        let covered = balances_cover(fhe, amounts, balances)?;
        let positive = fhe.lt(zero, shares)?;
        let ok = fhe.and(covered, positive)?;
        Some(AddEffects {
            moved: [
                fhe.select(ok, amounts[0], zero)?,
                fhe.select(ok, amounts[1], zero)?,
            ],
            minted: fhe.select(ok, shares, zero)?,
            locked: None,
        })
    };

    let (minted, settlement) = match effects {
        Some(effects) => {
            move_balance(fhe, accounts.user0, accounts.vault0, effects.moved[0])?;
            move_balance(fhe, accounts.user1, accounts.vault1, effects.moved[1])?;
            let reserve0 = fhe.add(pool.reserve0, effects.moved[0])?;
            let reserve1 = fhe.add(pool.reserve1, effects.moved[1])?;
            let position = fhe.add(accounts.lp_position.balance, effects.minted)?;
            let mut supply = fhe.add(pool.total_lp_supply, effects.minted)?;
            let mut locked_total = pool.locked_liquidity;
            if let Some(locked) = effects.locked {
                supply = fhe.add(supply, locked)?;
                locked_total = fhe.add(locked_total, locked)?;
            }

            accounts.lp_position.balance = position;
            pool.reserve0 = reserve0;
            pool.reserve1 = reserve1;
            pool.total_lp_supply = supply;
            pool.locked_liquidity = locked_total;
            pool.has_liquidity = true;
            pool.reserve_snapshot = ReserveSnapshot {
                obfuscated_reserve0: values[2],
                obfuscated_reserve1: values[3],
                updated_at: callback.now,
            };
            (effects.minted, Settlement::Applied)
        }
        None => {
            if empty_pool_detected {
                pool.has_liquidity = false;
                msg!("Pool reserves are empty, next deposit bootstraps");
            }
            (zero, Settlement::Degenerate)
        }
    };

    let request_id = record.request_id;
    complete(pending, record, RequestStatus::Finalized);
    msg!("Request {} finalized: add liquidity {:?}", request_id, settlement);

    Ok(AddLiquidityOutcome {
        request_id,
        user,
        minted,
        settlement,
    })
}

fn balances_cover(fhe: &mut SymbolicFhe, amounts: [Handle; 2], balances: [Handle; 2]) -> Result<Handle> {
    let ok0 = fhe.le(amounts[0], balances[0])?;
    let ok1 = fhe.le(amounts[1], balances[1])?;
    fhe.and(ok0, ok1)
}

// ============================================================================
// Remove liquidity
// ============================================================================

pub fn finalize_remove_liquidity(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: Option<&mut RequestRecord>,
    callback: &Callback,
    accounts: RemoveLiquidityAccounts<'_>,
) -> Result<RemoveLiquidityOutcome> {
    let (record, values) = open_callback(pool, pending, record, Operation::RemoveLiquidity, callback)?;
    let user = pending.user;
    let to = pending.destination;
    let pool_key = callback.pool_key;

    ensure_vaults(pool, &pool_key, accounts.vault0, accounts.vault1)?;
    ensure_account(accounts.destination0, &pool.token0, &to)?;
    ensure_account(accounts.destination1, &pool.token1, &to)?;
    ensure_lp_position(accounts.lp_position, &pool_key, &user)?;

    let zero = fhe.zero(FheType::Uint64)?;
    let (burnt, out0, out1, settlement) = if !pool.has_liquidity {
        (zero, zero, zero, Settlement::Degenerate)
    } else {
        let out0 = capped_quotient(fhe, pending.numerators[0], pending.multipliers[0], values[0], pool.reserve0)?;
        let out1 = capped_quotient(fhe, pending.numerators[1], pending.multipliers[1], values[1], pool.reserve1)?;
        let held = fhe.le(pending.inputs[0], accounts.lp_position.balance)?;
        let burnt = fhe.select(held, pending.inputs[0], zero)?;
        let out0 = fhe.select(held, out0, zero)?;
        let out1 = fhe.select(held, out1, zero)?;

        let position = fhe.sub(accounts.lp_position.balance, burnt)?;
        let supply = fhe.sub(pool.total_lp_supply, burnt)?;
        let reserve0 = fhe.sub(pool.reserve0, out0)?;
        let reserve1 = fhe.sub(pool.reserve1, out1)?;
        move_balance(fhe, accounts.vault0, accounts.destination0, out0)?;
        move_balance(fhe, accounts.vault1, accounts.destination1, out1)?;

        accounts.lp_position.balance = position;
        pool.total_lp_supply = supply;
        pool.reserve0 = reserve0;
        pool.reserve1 = reserve1;
        (burnt, out0, out1, Settlement::Applied)
    };

    let request_id = record.request_id;
    complete(pending, record, RequestStatus::Finalized);
    msg!("Request {} finalized: remove liquidity {:?}", request_id, settlement);

    Ok(RemoveLiquidityOutcome {
        request_id,
        user,
        to,
        burnt,
        amount0_out: out0,
        amount1_out: out1,
        settlement,
    })
}

// ============================================================================
// Swap
// ============================================================================

pub fn finalize_swap(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: Option<&mut RequestRecord>,
    callback: &Callback,
    accounts: SwapAccounts<'_>,
) -> Result<SwapOutcome> {
    let (record, values) = open_callback(pool, pending, record, Operation::Swap, callback)?;
    let user = pending.user;
    let to = pending.destination;
    let pool_key = callback.pool_key;

    let SwapAccounts {
        user0,
        user1,
        vault0,
        vault1,
        mut destination0,
        mut destination1,
        approval0,
        approval1,
    } = accounts;

    ensure_account(user0, &pool.token0, &user)?;
    ensure_account(user1, &pool.token1, &user)?;
    ensure_vaults(pool, &pool_key, vault0, vault1)?;
    ensure_operator(approval0, &pool.token0, &user, &pool_key, callback.now)?;
    ensure_operator(approval1, &pool.token1, &user, &pool_key, callback.now)?;
    if to == user {
        require!(
            destination0.is_none() && destination1.is_none(),
            ErrorCode::InvalidAddress
        );
    } else {
        let (Some(dest0), Some(dest1)) = (destination0.as_deref(), destination1.as_deref()) else {
            return err!(ErrorCode::InvalidAddress);
        };
        ensure_account(dest0, &pool.token0, &to)?;
        ensure_account(dest1, &pool.token1, &to)?;
    }

    let zero = fhe.zero(FheType::Uint64)?;
    let amounts = pending.inputs;

    if !pool.has_liquidity {
        let request_id = record.request_id;
        complete(pending, record, RequestStatus::Finalized);
        msg!("Request {} finalized: swap against empty pool", request_id);
        return Ok(SwapOutcome {
            request_id,
            from: user,
            to,
            amount0_in: zero,
            amount1_in: zero,
            amount0_out: zero,
            amount1_out: zero,
            settlement: Settlement::Degenerate,
        });
    }

    let out0 = capped_quotient(fhe, pending.numerators[0], pending.multipliers[0], values[0], pool.reserve0)?;
    let out1 = capped_quotient(fhe, pending.numerators[1], pending.multipliers[1], values[1], pool.reserve1)?;

    let covered = balances_cover(fhe, amounts, [user0.balance, user1.balance])?;
    let invariant_holds = product_not_decreasing(fhe, pool, amounts, [out0, out1])?;
    let some_out0 = fhe.lt(zero, out0)?;
    let some_out1 = fhe.lt(zero, out1)?;
    let some_out = fhe.or(some_out0, some_out1)?;
    let ok = fhe.and(covered, invariant_holds)?;
    let ok = fhe.and(ok, some_out)?;

    let in0 = fhe.select(ok, amounts[0], zero)?;
    let in1 = fhe.select(ok, amounts[1], zero)?;
    let pay0 = fhe.select(ok, out0, zero)?;
    let pay1 = fhe.select(ok, out1, zero)?;

    let reserve0_in = fhe.add(pool.reserve0, in0)?;
    let reserve0_next = fhe.sub(reserve0_in, pay0)?;
    let reserve1_in = fhe.add(pool.reserve1, in1)?;
    let reserve1_next = fhe.sub(reserve1_in, pay1)?;

    move_balance(fhe, user0, vault0, in0)?;
    move_balance(fhe, user1, vault1, in1)?;
    match destination0.as_deref_mut() {
        Some(dest) => move_balance(fhe, vault0, dest, pay0)?,
        None => move_balance(fhe, vault0, user0, pay0)?,
    }
    match destination1.as_deref_mut() {
        Some(dest) => move_balance(fhe, vault1, dest, pay1)?,
        None => move_balance(fhe, vault1, user1, pay1)?,
    }
    pool.reserve0 = reserve0_next;
    pool.reserve1 = reserve1_next;

    let request_id = record.request_id;
    complete(pending, record, RequestStatus::Finalized);
    msg!("Request {} finalized: swap", request_id);

    Ok(SwapOutcome {
        request_id,
        from: user,
        to,
        amount0_in: in0,
        amount1_in: in1,
        amount0_out: pay0,
        amount1_out: pay1,
        settlement: Settlement::Applied,
    })
}
