use anchor_lang::prelude::*;

use crate::state::{Operation, PendingOperation, Pool, RequestRecord, RequestStatus};
use crate::utils::amm_math::DecryptionPlan;
use crate::utils::encryption::Handle;
use crate::ErrorCode;

/// Emitted payload of a dispatched decryption request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub request_id: u64,
    pub operation: Operation,
    pub handles: Vec<Handle>,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefundReceipt {
    pub request_id: u64,
    pub operation: Operation,
    pub user: Pubkey,
}

/// Checks that `user` may start a new operation, without touching state.
pub fn ensure_admissible(pool: &Pool, pending: &PendingOperation, deadline: i64, now: i64) -> Result<()> {
    pool.require_initialized()?;
    require!(!pending.active, ErrorCode::UserHasPendingOperation);
    require!(deadline >= now, ErrorCode::Expired);
    Ok(())
}

/// Opens a request: allocates the next id and records it in the user's
/// slot and in the request registry. Never moves funds.
pub fn initiate(
    pool: &mut Pool,
    pending: &mut PendingOperation,
    record: &mut RequestRecord,
    pool_key: Pubkey,
    user: Pubkey,
    operation: Operation,
    deadline: i64,
    now: i64,
) -> Result<u64> {
    require!(operation != Operation::None, ErrorCode::InvalidInput);
    ensure_admissible(pool, pending, deadline, now)?;
    pending.bind(pool_key, user)?;

    let request_id = pool.allocate_request_id()?;

    pending.request_id = request_id;
    pending.operation = operation;
    pending.created_at = now;
    pending.active = true;

    record.pool = pool_key;
    record.request_id = request_id;
    record.user = user;
    record.operation = operation;
    record.status = RequestStatus::Active;
    record.created_at = now;

    msg!("Request {} opened: {:?}", request_id, operation);
    Ok(request_id)
}

/// Stores the decryption targets for the active request and stamps the
/// dispatch time that starts the refund clock.
pub fn dispatch(
    pending: &mut PendingOperation,
    record: &mut RequestRecord,
    plan: DecryptionPlan,
    destination: Pubkey,
    now: i64,
) -> Result<Dispatch> {
    require!(pending.active, ErrorCode::RequestNotActive);
    require!(
        plan.targets.len() == pending.operation.decrypted_len(),
        ErrorCode::InvalidInput
    );

    let mut handles = [Handle::default(); 4];
    handles[..plan.targets.len()].copy_from_slice(&plan.targets);

    pending.inputs = plan.inputs;
    pending.numerators = plan.numerators;
    pending.multipliers = plan.multipliers;
    pending.handles = handles;
    pending.handle_count = plan.targets.len() as u8;
    pending.bootstrap = plan.bootstrap;
    pending.destination = destination;
    pending.created_at = now;
    record.created_at = now;

    Ok(Dispatch {
        request_id: pending.request_id,
        operation: pending.operation,
        handles: plan.targets,
        created_at: now,
    })
}

/// Resolves the registry entry a callback or refund refers to.
pub fn resolve_active<'r>(
    record: Option<&'r mut RequestRecord>,
    pending: &PendingOperation,
) -> Result<&'r mut RequestRecord> {
    let record = record.ok_or(ErrorCode::RequestNotActive)?;
    require!(record.status == RequestStatus::Active, ErrorCode::RequestNotActive);
    require!(
        pending.active && pending.request_id == record.request_id && pending.user == record.user,
        ErrorCode::RequestNotActive
    );
    Ok(record)
}

/// Terminal transition shared by finalize and refund.
pub fn complete(pending: &mut PendingOperation, record: &mut RequestRecord, status: RequestStatus) {
    record.status = status;
    pending.clear();
}

pub fn refund(
    record: Option<&mut RequestRecord>,
    pending: &mut PendingOperation,
    caller: &Pubkey,
    expected: Operation,
    now: i64,
    max_operation_time: i64,
) -> Result<RefundReceipt> {
    let record = resolve_active(record, pending)?;
    require_keys_eq!(record.user, *caller, ErrorCode::NotRequestOwner);
    require!(record.operation == expected, ErrorCode::OperationMismatch);

    let elapsed = now
        .checked_sub(pending.created_at)
        .ok_or(ErrorCode::MathOverflow)?;
    require!(elapsed >= max_operation_time, ErrorCode::OperationNotExpired);

    let receipt = RefundReceipt {
        request_id: record.request_id,
        operation: record.operation,
        user: record.user,
    };
    complete(pending, record, RequestStatus::Refunded);

    msg!("Request {} refunded after {}s", receipt.request_id, elapsed);
    Ok(receipt)
}
