use anchor_lang::prelude::*;

use crate::queue::{dispatch, ensure_admissible, initiate, Dispatch};
use crate::state::{ConfidentialAccount, LpPosition, Operation, PendingOperation, Pool, RequestRecord};
use crate::utils::amm_math::{plan_add_liquidity, plan_remove_liquidity, plan_swap};
use crate::utils::confidential_spl::ensure_account;
use crate::utils::encryption::{intake_inputs, Ed25519Attestation, FheType, Handle, SymbolicFhe};
use crate::ErrorCode;

/// Caller context shared by the three entry points that open a request.
pub struct Initiation<'a> {
    pub program_id: Pubkey,
    pub pool_key: Pubkey,
    pub user: Pubkey,
    pub deadline: i64,
    pub now: i64,
    pub attestation: &'a Ed25519Attestation,
    pub input_proof: &'a [u8],
}

fn accept_inputs(pool: &Pool, init: &Initiation, handles: &[Handle]) -> Result<Vec<Handle>> {
    intake_inputs(
        init.attestation,
        &pool.config.input_verifier,
        &init.program_id,
        &init.user,
        handles,
        init.input_proof,
    )
}

fn ensure_recipient(init: &Initiation, to: &Pubkey) -> Result<()> {
    require!(
        *to != Pubkey::default() && *to != init.pool_key,
        ErrorCode::InvalidAddress
    );
    Ok(())
}

/// A payout recipient must already hold accounts for both pool tokens, or no
/// callback could ever credit it.
fn ensure_recipient_accounts(
    pool: &Pool,
    to: &Pubkey,
    accounts: [Option<&ConfidentialAccount>; 2],
) -> Result<()> {
    let [Some(account0), Some(account1)] = accounts else {
        return err!(ErrorCode::InvalidAddress);
    };
    ensure_account(account0, &pool.token0, to)?;
    ensure_account(account1, &pool.token1, to)
}

pub fn request_add_liquidity(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: &mut RequestRecord,
    lp_position: &mut LpPosition,
    init: &Initiation,
    balances: [Handle; 2],
    amounts: [Handle; 2],
) -> Result<Dispatch> {
    ensure_admissible(pool, pending, init.deadline, init.now)?;
    let inputs = accept_inputs(pool, init, &amounts)?;
    let plan = plan_add_liquidity(fhe, pool, balances, [inputs[0], inputs[1]])?;
    let opening_balance = if lp_position.balance.is_assigned() {
        None
    } else {
        Some(fhe.zero(FheType::Uint64)?)
    };

    initiate(
        pool,
        pending,
        record,
        init.pool_key,
        init.user,
        Operation::AddLiquidity,
        init.deadline,
        init.now,
    )?;
    if let Some(balance) = opening_balance {
        lp_position.pool = init.pool_key;
        lp_position.owner = init.user;
        lp_position.balance = balance;
    }
    dispatch(pending, record, plan, init.user, init.now)
}

pub fn request_remove_liquidity(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: &mut RequestRecord,
    init: &Initiation,
    lp_balance: Handle,
    lp_amount: Handle,
    to: Pubkey,
    recipient_accounts: [Option<&ConfidentialAccount>; 2],
) -> Result<Dispatch> {
    ensure_admissible(pool, pending, init.deadline, init.now)?;
    ensure_recipient(init, &to)?;
    ensure_recipient_accounts(pool, &to, recipient_accounts)?;
    let inputs = accept_inputs(pool, init, &[lp_amount])?;
    let plan = plan_remove_liquidity(fhe, pool, lp_balance, inputs[0])?;

    initiate(
        pool,
        pending,
        record,
        init.pool_key,
        init.user,
        Operation::RemoveLiquidity,
        init.deadline,
        init.now,
    )?;
    dispatch(pending, record, plan, to, init.now)
}

pub fn request_swap(
    fhe: &mut SymbolicFhe,
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: &mut RequestRecord,
    init: &Initiation,
    balances: [Handle; 2],
    amounts: [Handle; 2],
    to: Pubkey,
    recipient_accounts: [Option<&ConfidentialAccount>; 2],
) -> Result<Dispatch> {
    ensure_admissible(pool, pending, init.deadline, init.now)?;
    ensure_recipient(init, &to)?;
    if to != init.user {
        ensure_recipient_accounts(pool, &to, recipient_accounts)?;
    }
    let inputs = accept_inputs(pool, init, &amounts)?;
    let plan = plan_swap(fhe, pool, balances, [inputs[0], inputs[1]])?;

    initiate(
        pool,
        pending,
        record,
        init.pool_key,
        init.user,
        Operation::Swap,
        init.deadline,
        init.now,
    )?;
    dispatch(pending, record, plan, to, init.now)
}
