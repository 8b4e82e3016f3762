use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

pub mod state;
pub use state::*;

pub mod utils;
pub use utils::*;

pub mod finalize;
pub mod queue;
pub mod requests;

use finalize::{
    finalize_add_liquidity, finalize_remove_liquidity, finalize_swap, AddLiquidityAccounts,
    Callback, RemoveLiquidityAccounts, SwapAccounts,
};
use queue::Dispatch;
use requests::{request_add_liquidity, request_remove_liquidity, request_swap, Initiation};

declare_id!("4qJ7mS1Zk3fQ9vYpT2cWnL8bR5xHgD6aUeN1oVjKsC3P");

#[program]
pub mod liquid_swap {
    use super::*;

    // ========================================================================
    // Confidential token ledger
    // ========================================================================

    pub fn create_confidential_mint(
        ctx: Context<CreateConfidentialMint>,
        name: String,
        symbol: String,
        input_verifier: Pubkey,
    ) -> Result<()> {
        require!(
            !name.is_empty() && name.len() <= MAX_NAME_LEN,
            ErrorCode::InvalidInput
        );
        require!(
            !symbol.is_empty() && symbol.len() <= MAX_SYMBOL_LEN,
            ErrorCode::InvalidInput
        );
        require!(input_verifier != Pubkey::default(), ErrorCode::InvalidAddress);

        let mint_key = ctx.accounts.mint.key();
        let mut fhe = SymbolicFhe::new(&[b"create_mint", mint_key.as_ref()]);
        let total_supply = fhe.zero(FheType::Uint64)?;

        let mint = &mut ctx.accounts.mint;
        mint.authority = ctx.accounts.authority.key();
        mint.name = name;
        mint.symbol = symbol;
        mint.decimals = CONFIDENTIAL_DECIMALS;
        mint.total_supply = total_supply;
        mint.underlying = ctx
            .accounts
            .underlying_mint
            .as_ref()
            .map(|m| m.key())
            .unwrap_or_default();
        mint.input_verifier = input_verifier;

        msg!("Confidential mint {} created", mint.symbol);
        emit!(FheComputationEvent {
            context: mint_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    pub fn open_confidential_account(ctx: Context<OpenConfidentialAccount>) -> Result<()> {
        let account_key = ctx.accounts.confidential_account.key();
        let mut fhe = SymbolicFhe::new(&[b"open_account", account_key.as_ref()]);

        open_account(
            &mut fhe,
            &mut ctx.accounts.confidential_account,
            ctx.accounts.mint.key(),
            ctx.accounts.owner.key(),
        )?;
        ctx.accounts.confidential_account.bump = ctx.bumps.confidential_account;

        emit!(FheComputationEvent {
            context: account_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    /// Open faucet: credits an externally encrypted amount to the caller.
    pub fn mint_confidential(
        ctx: Context<MintConfidential>,
        amount: Handle,
        input_proof: Vec<u8>,
    ) -> Result<()> {
        let owner = ctx.accounts.owner.key();
        let mint_key = ctx.accounts.mint.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let inputs = intake_inputs(
            &attestation,
            &ctx.accounts.mint.input_verifier,
            ctx.program_id,
            &owner,
            &[amount],
            &input_proof,
        )?;

        let account_key = ctx.accounts.confidential_account.key();
        let mut fhe = SymbolicFhe::new(&[
            b"mint",
            account_key.as_ref(),
            ctx.accounts.confidential_account.balance.as_bytes(),
        ]);
        mint_encrypted(
            &mut fhe,
            &mut ctx.accounts.mint,
            &mint_key,
            &mut ctx.accounts.confidential_account,
            inputs[0],
        )?;

        emit!(ConfidentialTransferEvent {
            mint: mint_key,
            from: Pubkey::default(),
            to: owner,
            amount: inputs[0],
        });
        emit!(FheComputationEvent {
            context: account_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    /// Clamped transfer between two holders of the same mint; moves zero
    /// when the sender is short.
    pub fn confidential_transfer(
        ctx: Context<ConfidentialTransfer>,
        amount: Handle,
        input_proof: Vec<u8>,
    ) -> Result<()> {
        let owner = ctx.accounts.owner.key();
        let mint_key = ctx.accounts.mint.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let inputs = intake_inputs(
            &attestation,
            &ctx.accounts.mint.input_verifier,
            ctx.program_id,
            &owner,
            &[amount],
            &input_proof,
        )?;

        let source_key = ctx.accounts.source_account.key();
        let mut fhe = SymbolicFhe::new(&[
            b"transfer",
            source_key.as_ref(),
            ctx.accounts.source_account.balance.as_bytes(),
        ]);
        let accounts = &mut *ctx.accounts;
        let moved = transfer_encrypted(
            &mut fhe,
            &mut accounts.source_account,
            &mut accounts.destination_account,
            inputs[0],
        )?;

        emit!(ConfidentialTransferEvent {
            mint: mint_key,
            from: owner,
            to: accounts.destination_account.owner,
            amount: moved,
        });
        emit!(FheComputationEvent {
            context: source_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    pub fn set_operator(ctx: Context<SetOperator>, operator: Pubkey, expiry: i64) -> Result<()> {
        require!(operator != Pubkey::default(), ErrorCode::InvalidAddress);

        let approval = &mut ctx.accounts.operator_approval;
        approval.mint = ctx.accounts.mint.key();
        approval.holder = ctx.accounts.holder.key();
        approval.operator = operator;
        approval.expiry = expiry;
        approval.bump = ctx.bumps.operator_approval;

        msg!("Operator {} valid until {}", operator, expiry);
        Ok(())
    }

    pub fn is_operator(ctx: Context<IsOperator>, _holder: Pubkey, _operator: Pubkey) -> Result<bool> {
        let now = Clock::get()?.unix_timestamp;
        Ok(load_optional::<OperatorApproval>(&ctx.accounts.operator_approval)
            .map(|approval| approval.is_active(now))
            .unwrap_or(false))
    }

    pub fn wrap_to_confidential(ctx: Context<WrapToConfidential>, amount: u64) -> Result<()> {
        require!(amount > 0, ErrorCode::InvalidInput);

        lock_underlying(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.source.to_account_info(),
            ctx.accounts.spl_vault.to_account_info(),
            ctx.accounts.owner.to_account_info(),
            amount,
        )?;

        let owner = ctx.accounts.owner.key();
        let mint_key = ctx.accounts.mint.key();
        let account_key = ctx.accounts.confidential_account.key();
        let mut fhe = SymbolicFhe::new(&[
            b"wrap",
            account_key.as_ref(),
            ctx.accounts.confidential_account.balance.as_bytes(),
        ]);
        let credited = fhe.trivial_encrypt(amount as u128, FheType::Uint64)?;
        mint_encrypted(
            &mut fhe,
            &mut ctx.accounts.mint,
            &mint_key,
            &mut ctx.accounts.confidential_account,
            credited,
        )?;

        msg!("Wrapped {} into confidential balance", amount);
        emit!(ConfidentialTransferEvent {
            mint: mint_key,
            from: Pubkey::default(),
            to: owner,
            amount: credited,
        });
        emit!(FheComputationEvent {
            context: account_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    // ========================================================================
    // Pool setup and administration
    // ========================================================================

    pub fn create_pool(ctx: Context<CreatePool>, seed: u64, params: CreatePoolParams) -> Result<()> {
        let config = PoolConfig::new(ctx.accounts.factory.key(), &params);
        let pool = Pool::new(config, seed, ctx.bumps.pool)?;
        ctx.accounts.pool.set_inner(pool);

        msg!("Pool created by {}", config.factory);
        emit!(ReserveViewersUpdatedEvent {
            pool: ctx.accounts.pool.key(),
            added: vec![config.price_scanner],
            price_scanner: config.price_scanner,
        });
        Ok(())
    }

    pub fn initialize_pool(ctx: Context<InitializePool>) -> Result<()> {
        let pool_key = ctx.accounts.pool.key();
        let token0 = ctx.accounts.token0_mint.key();
        let token1 = ctx.accounts.token1_mint.key();
        let mut fhe = SymbolicFhe::new(&[b"initialize", pool_key.as_ref()]);

        ctx.accounts.pool.initialize(
            &mut fhe,
            &ctx.accounts.factory.key(),
            [token0, token1],
            [ctx.accounts.vault0.key(), ctx.accounts.vault1.key()],
        )?;
        open_account(&mut fhe, &mut ctx.accounts.vault0, token0, pool_key)?;
        open_account(&mut fhe, &mut ctx.accounts.vault1, token1, pool_key)?;
        ctx.accounts.vault0.bump = ctx.bumps.vault0;
        ctx.accounts.vault1.bump = ctx.bumps.vault1;

        emit!(PoolInitializedEvent {
            pool: pool_key,
            token0,
            token1,
            factory: ctx.accounts.factory.key(),
        });
        emit!(FheComputationEvent {
            context: pool_key,
            request_id: 0,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    pub fn set_price_scanner(ctx: Context<AdminPool>, scanner: Pubkey) -> Result<()> {
        let caller = ctx.accounts.factory.key();
        ctx.accounts.pool.set_price_scanner(&caller, scanner)?;

        msg!("Price scanner set to {}", scanner);
        emit!(ReserveViewersUpdatedEvent {
            pool: ctx.accounts.pool.key(),
            added: vec![scanner],
            price_scanner: scanner,
        });
        Ok(())
    }

    pub fn add_reserve_viewer(ctx: Context<AdminPool>, viewer: Pubkey) -> Result<()> {
        let caller = ctx.accounts.factory.key();
        let added = ctx.accounts.pool.add_reserve_viewers(&caller, &[viewer])?;

        emit!(ReserveViewersUpdatedEvent {
            pool: ctx.accounts.pool.key(),
            added,
            price_scanner: ctx.accounts.pool.config.price_scanner,
        });
        Ok(())
    }

    pub fn add_reserve_viewers(ctx: Context<AdminPool>, viewers: Vec<Pubkey>) -> Result<()> {
        let caller = ctx.accounts.factory.key();
        let added = ctx.accounts.pool.add_reserve_viewers(&caller, &viewers)?;

        msg!("{} reserve viewers added", added.len());
        emit!(ReserveViewersUpdatedEvent {
            pool: ctx.accounts.pool.key(),
            added,
            price_scanner: ctx.accounts.pool.config.price_scanner,
        });
        Ok(())
    }

    // ========================================================================
    // Operation entry points
    // ========================================================================

    pub fn add_liquidity(
        ctx: Context<AddLiquidity>,
        amount0: Handle,
        amount1: Handle,
        deadline: i64,
        input_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let user = ctx.accounts.user.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let init = Initiation {
            program_id: *ctx.program_id,
            pool_key,
            user,
            deadline,
            now: clock.unix_timestamp,
            attestation: &attestation,
            input_proof: &input_proof,
        };

        let request_seed = ctx.accounts.pool.next_request_id.to_le_bytes();
        let mut fhe = SymbolicFhe::new(&[b"initiate", pool_key.as_ref(), &request_seed]);
        let balances = [
            ctx.accounts.user_account0.balance,
            ctx.accounts.user_account1.balance,
        ];

        let accounts = &mut *ctx.accounts;
        let sent = request_add_liquidity(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            &mut accounts.request_record,
            &mut accounts.lp_position,
            &init,
            balances,
            [amount0, amount1],
        )?;
        accounts.pending_operation.bump = ctx.bumps.pending_operation;
        accounts.request_record.bump = ctx.bumps.request_record;
        accounts.lp_position.bump = ctx.bumps.lp_position;

        announce_dispatch(pool_key, user, clock.slot, sent, fhe);
        Ok(())
    }

    pub fn remove_liquidity(
        ctx: Context<RemoveLiquidity>,
        lp_amount: Handle,
        to: Pubkey,
        deadline: i64,
        input_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let user = ctx.accounts.user.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let init = Initiation {
            program_id: *ctx.program_id,
            pool_key,
            user,
            deadline,
            now: clock.unix_timestamp,
            attestation: &attestation,
            input_proof: &input_proof,
        };

        let request_seed = ctx.accounts.pool.next_request_id.to_le_bytes();
        let mut fhe = SymbolicFhe::new(&[b"initiate", pool_key.as_ref(), &request_seed]);
        let lp_balance = ctx.accounts.lp_position.balance;
        let recipient0 = load_optional::<ConfidentialAccount>(&ctx.accounts.recipient_account0);
        let recipient1 = load_optional::<ConfidentialAccount>(&ctx.accounts.recipient_account1);

        let accounts = &mut *ctx.accounts;
        let sent = request_remove_liquidity(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            &mut accounts.request_record,
            &init,
            lp_balance,
            lp_amount,
            to,
            [recipient0.as_ref(), recipient1.as_ref()],
        )?;
        accounts.pending_operation.bump = ctx.bumps.pending_operation;
        accounts.request_record.bump = ctx.bumps.request_record;

        announce_dispatch(pool_key, user, clock.slot, sent, fhe);
        Ok(())
    }

    pub fn swap_tokens(
        ctx: Context<SwapTokens>,
        amount0_in: Handle,
        amount1_in: Handle,
        to: Pubkey,
        deadline: i64,
        input_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let user = ctx.accounts.user.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let init = Initiation {
            program_id: *ctx.program_id,
            pool_key,
            user,
            deadline,
            now: clock.unix_timestamp,
            attestation: &attestation,
            input_proof: &input_proof,
        };

        let request_seed = ctx.accounts.pool.next_request_id.to_le_bytes();
        let mut fhe = SymbolicFhe::new(&[b"initiate", pool_key.as_ref(), &request_seed]);
        let balances = [
            ctx.accounts.user_account0.balance,
            ctx.accounts.user_account1.balance,
        ];
        let recipient0 = load_optional::<ConfidentialAccount>(&ctx.accounts.recipient_account0);
        let recipient1 = load_optional::<ConfidentialAccount>(&ctx.accounts.recipient_account1);

        let accounts = &mut *ctx.accounts;
        let sent = request_swap(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            &mut accounts.request_record,
            &init,
            balances,
            [amount0_in, amount1_in],
            to,
            [recipient0.as_ref(), recipient1.as_ref()],
        )?;
        accounts.pending_operation.bump = ctx.bumps.pending_operation;
        accounts.request_record.bump = ctx.bumps.request_record;

        announce_dispatch(pool_key, user, clock.slot, sent, fhe);
        Ok(())
    }

    // ========================================================================
    // Decryption callbacks
    // ========================================================================

    pub fn add_liquidity_callback(
        ctx: Context<AddLiquidityCallback>,
        request_id: u64,
        cleartexts: Vec<u8>,
        decryption_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let callback = Callback {
            program_id: *ctx.program_id,
            pool_key,
            attestation: &attestation,
            cleartexts: &cleartexts,
            decryption_proof: &decryption_proof,
            now: clock.unix_timestamp,
        };
        let mut record = load_optional::<RequestRecord>(&ctx.accounts.request_record);
        let approval0 = load_optional::<OperatorApproval>(&ctx.accounts.operator_approval0);
        let approval1 = load_optional::<OperatorApproval>(&ctx.accounts.operator_approval1);
        let mut fhe = SymbolicFhe::new(&[b"finalize", pool_key.as_ref(), &request_id.to_le_bytes()]);

        let accounts = &mut *ctx.accounts;
        let outcome = finalize_add_liquidity(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            record.as_mut(),
            &callback,
            AddLiquidityAccounts {
                user0: &mut accounts.user_account0,
                user1: &mut accounts.user_account1,
                vault0: &mut accounts.vault0,
                vault1: &mut accounts.vault1,
                lp_position: &mut accounts.lp_position,
                approval0: approval0.as_ref(),
                approval1: approval1.as_ref(),
            },
        )?;
        if let Some(record) = record.as_ref() {
            store_account(&accounts.request_record, record)?;
        }

        emit!(LiquidityMintedEvent {
            pool: pool_key,
            user: outcome.user,
            request_id: outcome.request_id,
            block_number: clock.slot,
            shares: outcome.minted,
        });
        emit!(FheComputationEvent {
            context: pool_key,
            request_id: outcome.request_id,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    pub fn remove_liquidity_callback(
        ctx: Context<RemoveLiquidityCallback>,
        request_id: u64,
        cleartexts: Vec<u8>,
        decryption_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let callback = Callback {
            program_id: *ctx.program_id,
            pool_key,
            attestation: &attestation,
            cleartexts: &cleartexts,
            decryption_proof: &decryption_proof,
            now: clock.unix_timestamp,
        };
        let mut record = load_optional::<RequestRecord>(&ctx.accounts.request_record);
        let mut fhe = SymbolicFhe::new(&[b"finalize", pool_key.as_ref(), &request_id.to_le_bytes()]);

        let accounts = &mut *ctx.accounts;
        let outcome = finalize_remove_liquidity(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            record.as_mut(),
            &callback,
            RemoveLiquidityAccounts {
                vault0: &mut accounts.vault0,
                vault1: &mut accounts.vault1,
                destination0: &mut accounts.destination_account0,
                destination1: &mut accounts.destination_account1,
                lp_position: &mut accounts.lp_position,
            },
        )?;
        if let Some(record) = record.as_ref() {
            store_account(&accounts.request_record, record)?;
        }

        emit!(LiquidityBurntEvent {
            pool: pool_key,
            user: outcome.user,
            request_id: outcome.request_id,
            block_number: clock.slot,
            burnt: outcome.burnt,
            amount0_out: outcome.amount0_out,
            amount1_out: outcome.amount1_out,
            to: outcome.to,
        });
        emit!(FheComputationEvent {
            context: pool_key,
            request_id: outcome.request_id,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    pub fn swap_tokens_callback(
        ctx: Context<SwapTokensCallback>,
        request_id: u64,
        cleartexts: Vec<u8>,
        decryption_proof: Vec<u8>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let pool_key = ctx.accounts.pool.key();
        let attestation = load_preceding_attestation(&ctx.accounts.instructions_sysvar)?;
        let callback = Callback {
            program_id: *ctx.program_id,
            pool_key,
            attestation: &attestation,
            cleartexts: &cleartexts,
            decryption_proof: &decryption_proof,
            now: clock.unix_timestamp,
        };
        let mut record = load_optional::<RequestRecord>(&ctx.accounts.request_record);
        let approval0 = load_optional::<OperatorApproval>(&ctx.accounts.operator_approval0);
        let approval1 = load_optional::<OperatorApproval>(&ctx.accounts.operator_approval1);
        let mut fhe = SymbolicFhe::new(&[b"finalize", pool_key.as_ref(), &request_id.to_le_bytes()]);

        let accounts = &mut *ctx.accounts;
        let outcome = finalize_swap(
            &mut fhe,
            &mut accounts.pool,
            &mut accounts.pending_operation,
            record.as_mut(),
            &callback,
            SwapAccounts {
                user0: &mut accounts.user_account0,
                user1: &mut accounts.user_account1,
                vault0: &mut accounts.vault0,
                vault1: &mut accounts.vault1,
                destination0: accounts.destination_account0.as_mut().map(|a| &mut **a),
                destination1: accounts.destination_account1.as_mut().map(|a| &mut **a),
                approval0: approval0.as_ref(),
                approval1: approval1.as_ref(),
            },
        )?;
        if let Some(record) = record.as_ref() {
            store_account(&accounts.request_record, record)?;
        }

        emit!(SwapEvent {
            pool: pool_key,
            from: outcome.from,
            request_id: outcome.request_id,
            amount0_in: outcome.amount0_in,
            amount1_in: outcome.amount1_in,
            amount0_out: outcome.amount0_out,
            amount1_out: outcome.amount1_out,
            to: outcome.to,
        });
        emit!(FheComputationEvent {
            context: pool_key,
            request_id: outcome.request_id,
            ops: fhe.into_ops(),
        });
        Ok(())
    }

    // ========================================================================
    // Refunds
    // ========================================================================

    pub fn request_liquidity_adding_refund(ctx: Context<RequestRefund>, _request_id: u64) -> Result<()> {
        refund_pending(ctx, Operation::AddLiquidity)
    }

    pub fn request_liquidity_removal_refund(ctx: Context<RequestRefund>, _request_id: u64) -> Result<()> {
        refund_pending(ctx, Operation::RemoveLiquidity)
    }

    pub fn request_swap_refund(ctx: Context<RequestRefund>, _request_id: u64) -> Result<()> {
        refund_pending(ctx, Operation::Swap)
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn get_user_pending_operation_info(
        ctx: Context<UserPendingOperation>,
        _user: Pubkey,
    ) -> Result<PendingOperationInfo> {
        Ok(load_optional::<PendingOperation>(&ctx.accounts.pending_operation)
            .map(|pending| pending.info())
            .unwrap_or_default())
    }

    pub fn get_pending_operation_info(ctx: Context<CallerPendingOperation>) -> Result<PendingOperationInfo> {
        Ok(load_optional::<PendingOperation>(&ctx.accounts.pending_operation)
            .map(|pending| pending.info())
            .unwrap_or_default())
    }

    pub fn is_reserve_viewer(ctx: Context<ViewPool>, viewer: Pubkey) -> Result<bool> {
        Ok(ctx.accounts.pool.is_reserve_viewer(&viewer))
    }

    pub fn get_reserve_viewers(ctx: Context<ViewPool>) -> Result<Vec<Pubkey>> {
        Ok(ctx.accounts.pool.reserve_viewers.clone())
    }

    pub fn get_reserve_snapshot(ctx: Context<ViewReserveSnapshot>) -> Result<ReserveSnapshot> {
        ctx.accounts
            .pool
            .reserve_snapshot_for(&ctx.accounts.viewer.key())
    }

    pub fn get_pool_info(ctx: Context<ViewPool>) -> Result<PoolInfo> {
        Ok(ctx.accounts.pool.info())
    }
}

fn announce_dispatch(pool: Pubkey, from: Pubkey, slot: u64, sent: Dispatch, fhe: SymbolicFhe) {
    emit!(DecryptionRequestedEvent {
        pool,
        from,
        block_number: slot,
        request_id: sent.request_id,
    });
    emit!(DecryptionPendingEvent {
        pool,
        from,
        request_id: sent.request_id,
        operation: sent.operation,
        handles: sent.handles,
    });
    emit!(FheComputationEvent {
        context: pool,
        request_id: sent.request_id,
        ops: fhe.into_ops(),
    });
}

fn refund_pending(ctx: Context<RequestRefund>, expected: Operation) -> Result<()> {
    let clock = Clock::get()?;
    let caller = ctx.accounts.user.key();
    let max_operation_time = ctx.accounts.pool.config.max_operation_time;
    let mut record = load_optional::<RequestRecord>(&ctx.accounts.request_record);

    let receipt = queue::refund(
        record.as_mut(),
        &mut ctx.accounts.pending_operation,
        &caller,
        expected,
        clock.unix_timestamp,
        max_operation_time,
    )?;
    if let Some(record) = record.as_ref() {
        store_account(&ctx.accounts.request_record, record)?;
    }

    emit!(RefundEvent {
        pool: ctx.accounts.pool.key(),
        from: receipt.user,
        block_number: clock.slot,
        request_id: receipt.request_id,
        operation: receipt.operation,
    });
    Ok(())
}

// ============================================================================
// Ledger account contexts
// ============================================================================

#[derive(Accounts)]
pub struct CreateConfidentialMint<'info> {
    #[account(mut)]
    pub authority: Signer<'info>,

    #[account(
        init,
        payer = authority,
        space = 8 + ConfidentialMint::INIT_SPACE,
    )]
    pub mint: Account<'info, ConfidentialMint>,

    pub underlying_mint: Option<Account<'info, Mint>>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct OpenConfidentialAccount<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    pub mint: Account<'info, ConfidentialMint>,

    #[account(
        init,
        payer = owner,
        space = 8 + ConfidentialAccount::INIT_SPACE,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, mint.key().as_ref(), owner.key().as_ref()],
        bump
    )]
    pub confidential_account: Account<'info, ConfidentialAccount>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct MintConfidential<'info> {
    pub owner: Signer<'info>,

    #[account(mut)]
    pub mint: Account<'info, ConfidentialMint>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, mint.key().as_ref(), owner.key().as_ref()],
        bump = confidential_account.bump
    )]
    pub confidential_account: Account<'info, ConfidentialAccount>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
pub struct ConfidentialTransfer<'info> {
    pub owner: Signer<'info>,

    pub mint: Account<'info, ConfidentialMint>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, mint.key().as_ref(), owner.key().as_ref()],
        bump = source_account.bump
    )]
    pub source_account: Account<'info, ConfidentialAccount>,

    #[account(
        mut,
        constraint = destination_account.mint == mint.key() @ ErrorCode::InvalidAddress,
        constraint = destination_account.key() != source_account.key() @ ErrorCode::InvalidAddress
    )]
    pub destination_account: Account<'info, ConfidentialAccount>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
#[instruction(operator: Pubkey)]
pub struct SetOperator<'info> {
    #[account(mut)]
    pub holder: Signer<'info>,

    pub mint: Account<'info, ConfidentialMint>,

    #[account(
        init_if_needed,
        payer = holder,
        space = 8 + OperatorApproval::INIT_SPACE,
        seeds = [OPERATOR_SEED, mint.key().as_ref(), holder.key().as_ref(), operator.as_ref()],
        bump
    )]
    pub operator_approval: Account<'info, OperatorApproval>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(holder: Pubkey, operator: Pubkey)]
pub struct IsOperator<'info> {
    pub mint: Account<'info, ConfidentialMint>,

    #[account(
        seeds = [OPERATOR_SEED, mint.key().as_ref(), holder.as_ref(), operator.as_ref()],
        bump
    )]
    /// CHECK: may not exist yet; deserialized on demand
    pub operator_approval: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct WrapToConfidential<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        mut,
        constraint = mint.underlying == underlying_mint.key() @ ErrorCode::InvalidAddress
    )]
    pub mint: Box<Account<'info, ConfidentialMint>>,

    pub underlying_mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        constraint = source.mint == underlying_mint.key() @ ErrorCode::InvalidAddress,
        constraint = source.owner == owner.key() @ ErrorCode::InvalidAddress
    )]
    pub source: Box<Account<'info, TokenAccount>>,

    /// CHECK: PDA owning the locked SPL tokens
    #[account(seeds = [VAULT_AUTHORITY_SEED, mint.key().as_ref()], bump)]
    pub vault_authority: UncheckedAccount<'info>,

    #[account(
        init_if_needed,
        payer = owner,
        seeds = [SPL_VAULT_SEED, mint.key().as_ref()],
        bump,
        token::mint = underlying_mint,
        token::authority = vault_authority,
    )]
    pub spl_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, mint.key().as_ref(), owner.key().as_ref()],
        bump = confidential_account.bump
    )]
    pub confidential_account: Box<Account<'info, ConfidentialAccount>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

// ============================================================================
// Pool account contexts
// ============================================================================

#[derive(Accounts)]
#[instruction(seed: u64)]
pub struct CreatePool<'info> {
    #[account(mut)]
    pub factory: Signer<'info>,

    #[account(
        init,
        payer = factory,
        space = 8 + Pool::INIT_SPACE,
        seeds = [POOL_SEED, factory.key().as_ref(), seed.to_le_bytes().as_ref()],
        bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct InitializePool<'info> {
    #[account(mut)]
    pub factory: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    pub token0_mint: Box<Account<'info, ConfidentialMint>>,
    pub token1_mint: Box<Account<'info, ConfidentialMint>>,

    #[account(
        init,
        payer = factory,
        space = 8 + ConfidentialAccount::INIT_SPACE,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, token0_mint.key().as_ref(), pool.key().as_ref()],
        bump
    )]
    pub vault0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        init,
        payer = factory,
        space = 8 + ConfidentialAccount::INIT_SPACE,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, token1_mint.key().as_ref(), pool.key().as_ref()],
        bump
    )]
    pub vault1: Box<Account<'info, ConfidentialAccount>>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AdminPool<'info> {
    pub factory: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,
}

#[derive(Accounts)]
pub struct AddLiquidity<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + PendingOperation::INIT_SPACE,
        seeds = [PENDING_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        init,
        payer = user,
        space = 8 + RequestRecord::INIT_SPACE,
        seeds = [REQUEST_SEED, pool.key().as_ref(), pool.next_request_id.to_le_bytes().as_ref()],
        bump
    )]
    pub request_record: Box<Account<'info, RequestRecord>>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + LpPosition::INIT_SPACE,
        seeds = [LP_POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), user.key().as_ref()],
        bump = user_account0.bump
    )]
    pub user_account0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), user.key().as_ref()],
        bump = user_account1.bump
    )]
    pub user_account1: Box<Account<'info, ConfidentialAccount>>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(lp_amount: Handle, to: Pubkey)]
pub struct RemoveLiquidity<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + PendingOperation::INIT_SPACE,
        seeds = [PENDING_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        init,
        payer = user,
        space = 8 + RequestRecord::INIT_SPACE,
        seeds = [REQUEST_SEED, pool.key().as_ref(), pool.next_request_id.to_le_bytes().as_ref()],
        bump
    )]
    pub request_record: Box<Account<'info, RequestRecord>>,

    #[account(
        seeds = [LP_POSITION_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump = lp_position.bump
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), to.as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand; the recipient must hold both pool tokens
    pub recipient_account0: UncheckedAccount<'info>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), to.as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand; the recipient must hold both pool tokens
    pub recipient_account1: UncheckedAccount<'info>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(amount0_in: Handle, amount1_in: Handle, to: Pubkey)]
pub struct SwapTokens<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        init_if_needed,
        payer = user,
        space = 8 + PendingOperation::INIT_SPACE,
        seeds = [PENDING_SEED, pool.key().as_ref(), user.key().as_ref()],
        bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        init,
        payer = user,
        space = 8 + RequestRecord::INIT_SPACE,
        seeds = [REQUEST_SEED, pool.key().as_ref(), pool.next_request_id.to_le_bytes().as_ref()],
        bump
    )]
    pub request_record: Box<Account<'info, RequestRecord>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), user.key().as_ref()],
        bump = user_account0.bump
    )]
    pub user_account0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), user.key().as_ref()],
        bump = user_account1.bump
    )]
    pub user_account1: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), to.as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand; the recipient must hold both pool tokens
    pub recipient_account0: UncheckedAccount<'info>,

    #[account(
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), to.as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand; the recipient must hold both pool tokens
    pub recipient_account1: UncheckedAccount<'info>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct AddLiquidityCallback<'info> {
    pub relayer: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        mut,
        seeds = [PENDING_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = pending_operation.bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        mut,
        seeds = [REQUEST_SEED, pool.key().as_ref(), request_id.to_le_bytes().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so unknown requests report RequestNotActive
    pub request_record: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), pending_operation.user.as_ref()],
        bump = user_account0.bump
    )]
    pub user_account0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), pending_operation.user.as_ref()],
        bump = user_account1.bump
    )]
    pub user_account1: Box<Account<'info, ConfidentialAccount>>,

    #[account(mut, address = pool.vault0 @ ErrorCode::InvalidAddress)]
    pub vault0: Box<Account<'info, ConfidentialAccount>>,

    #[account(mut, address = pool.vault1 @ ErrorCode::InvalidAddress)]
    pub vault1: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [LP_POSITION_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = lp_position.bump
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,

    #[account(
        seeds = [OPERATOR_SEED, pool.token0.as_ref(), pending_operation.user.as_ref(), pool.key().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so a missing grant reports OperatorNotApproved
    pub operator_approval0: UncheckedAccount<'info>,

    #[account(
        seeds = [OPERATOR_SEED, pool.token1.as_ref(), pending_operation.user.as_ref(), pool.key().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so a missing grant reports OperatorNotApproved
    pub operator_approval1: UncheckedAccount<'info>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct RemoveLiquidityCallback<'info> {
    pub relayer: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        mut,
        seeds = [PENDING_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = pending_operation.bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        mut,
        seeds = [REQUEST_SEED, pool.key().as_ref(), request_id.to_le_bytes().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so unknown requests report RequestNotActive
    pub request_record: UncheckedAccount<'info>,

    #[account(mut, address = pool.vault0 @ ErrorCode::InvalidAddress)]
    pub vault0: Box<Account<'info, ConfidentialAccount>>,

    #[account(mut, address = pool.vault1 @ ErrorCode::InvalidAddress)]
    pub vault1: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), pending_operation.destination.as_ref()],
        bump = destination_account0.bump
    )]
    pub destination_account0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), pending_operation.destination.as_ref()],
        bump = destination_account1.bump
    )]
    pub destination_account1: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [LP_POSITION_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = lp_position.bump
    )]
    pub lp_position: Box<Account<'info, LpPosition>>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct SwapTokensCallback<'info> {
    pub relayer: Signer<'info>,

    #[account(
        mut,
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        mut,
        seeds = [PENDING_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = pending_operation.bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        mut,
        seeds = [REQUEST_SEED, pool.key().as_ref(), request_id.to_le_bytes().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so unknown requests report RequestNotActive
    pub request_record: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), pending_operation.user.as_ref()],
        bump = user_account0.bump
    )]
    pub user_account0: Box<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), pending_operation.user.as_ref()],
        bump = user_account1.bump
    )]
    pub user_account1: Box<Account<'info, ConfidentialAccount>>,

    #[account(mut, address = pool.vault0 @ ErrorCode::InvalidAddress)]
    pub vault0: Box<Account<'info, ConfidentialAccount>>,

    #[account(mut, address = pool.vault1 @ ErrorCode::InvalidAddress)]
    pub vault1: Box<Account<'info, ConfidentialAccount>>,

    /// Omitted when the swap pays out to the trader.
    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token0.as_ref(), pending_operation.destination.as_ref()],
        bump
    )]
    pub destination_account0: Option<Account<'info, ConfidentialAccount>>,

    #[account(
        mut,
        seeds = [CONFIDENTIAL_ACCOUNT_SEED, pool.token1.as_ref(), pending_operation.destination.as_ref()],
        bump
    )]
    pub destination_account1: Option<Account<'info, ConfidentialAccount>>,

    #[account(
        seeds = [OPERATOR_SEED, pool.token0.as_ref(), pending_operation.user.as_ref(), pool.key().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so a missing grant reports OperatorNotApproved
    pub operator_approval0: UncheckedAccount<'info>,

    #[account(
        seeds = [OPERATOR_SEED, pool.token1.as_ref(), pending_operation.user.as_ref(), pool.key().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so a missing grant reports OperatorNotApproved
    pub operator_approval1: UncheckedAccount<'info>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct RequestRefund<'info> {
    pub user: Signer<'info>,

    #[account(
        seeds = [POOL_SEED, pool.config.factory.as_ref(), pool.seed.to_le_bytes().as_ref()],
        bump = pool.bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        mut,
        seeds = [PENDING_SEED, pool.key().as_ref(), pending_operation.user.as_ref()],
        bump = pending_operation.bump
    )]
    pub pending_operation: Box<Account<'info, PendingOperation>>,

    #[account(
        mut,
        seeds = [REQUEST_SEED, pool.key().as_ref(), request_id.to_le_bytes().as_ref()],
        bump
    )]
    /// CHECK: deserialized on demand so unknown requests report RequestNotActive
    pub request_record: UncheckedAccount<'info>,
}

#[derive(Accounts)]
#[instruction(user: Pubkey)]
pub struct UserPendingOperation<'info> {
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        seeds = [PENDING_SEED, pool.key().as_ref(), user.as_ref()],
        bump
    )]
    /// CHECK: may not exist yet; deserialized on demand
    pub pending_operation: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct CallerPendingOperation<'info> {
    pub caller: Signer<'info>,

    pub pool: Box<Account<'info, Pool>>,

    #[account(
        seeds = [PENDING_SEED, pool.key().as_ref(), caller.key().as_ref()],
        bump
    )]
    /// CHECK: may not exist yet; deserialized on demand
    pub pending_operation: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct ViewPool<'info> {
    pub pool: Box<Account<'info, Pool>>,
}

#[derive(Accounts)]
pub struct ViewReserveSnapshot<'info> {
    pub viewer: Signer<'info>,

    pub pool: Box<Account<'info, Pool>>,
}

// ============================================================================
// Events
// ============================================================================

#[event]
pub struct DecryptionPendingEvent {
    pub pool: Pubkey,
    pub from: Pubkey,
    pub request_id: u64,
    pub operation: Operation,
    pub handles: Vec<Handle>,
}

#[event]
pub struct DecryptionRequestedEvent {
    pub pool: Pubkey,
    pub from: Pubkey,
    pub block_number: u64,
    pub request_id: u64,
}

#[event]
pub struct RefundEvent {
    pub pool: Pubkey,
    pub from: Pubkey,
    pub block_number: u64,
    pub request_id: u64,
    pub operation: Operation,
}

#[event]
pub struct LiquidityMintedEvent {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub request_id: u64,
    pub block_number: u64,
    pub shares: Handle,
}

#[event]
pub struct LiquidityBurntEvent {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub request_id: u64,
    pub block_number: u64,
    pub burnt: Handle,
    pub amount0_out: Handle,
    pub amount1_out: Handle,
    pub to: Pubkey,
}

#[event]
pub struct SwapEvent {
    pub pool: Pubkey,
    pub from: Pubkey,
    pub request_id: u64,
    pub amount0_in: Handle,
    pub amount1_in: Handle,
    pub amount0_out: Handle,
    pub amount1_out: Handle,
    pub to: Pubkey,
}

/// Symbolic operations the coprocessor must evaluate for this instruction.
#[event]
pub struct FheComputationEvent {
    pub context: Pubkey,
    pub request_id: u64,
    pub ops: Vec<FheOp>,
}

#[event]
pub struct PoolInitializedEvent {
    pub pool: Pubkey,
    pub token0: Pubkey,
    pub token1: Pubkey,
    pub factory: Pubkey,
}

#[event]
pub struct ReserveViewersUpdatedEvent {
    pub pool: Pubkey,
    pub added: Vec<Pubkey>,
    pub price_scanner: Pubkey,
}

#[event]
pub struct ConfidentialTransferEvent {
    pub mint: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: Handle,
}

#[error_code]
pub enum ErrorCode {
    #[msg("User already has a pending operation")]
    UserHasPendingOperation,
    #[msg("Deadline has passed")]
    Expired,
    #[msg("Operation has not timed out yet")]
    OperationNotExpired,
    #[msg("Caller did not open this request")]
    NotRequestOwner,
    #[msg("Request is unknown or already resolved")]
    RequestNotActive,
    #[msg("Request belongs to a different operation")]
    OperationMismatch,
    #[msg("Forbidden")]
    Forbidden,
    #[msg("Invalid address")]
    InvalidAddress,
    #[msg("Pool is not an approved operator for this holder")]
    OperatorNotApproved,
    #[msg("Input proof does not match the encrypted inputs")]
    InvalidInputProof,
    #[msg("Decryption proof does not match the request")]
    InvalidDecryptionProof,
    #[msg("Cleartext payload has the wrong length")]
    InvalidCleartexts,
    #[msg("Expected an Ed25519 attestation before this instruction")]
    MissingAttestation,
    #[msg("Ciphertext operand has the wrong type")]
    FheTypeMismatch,
    #[msg("Invalid pool configuration")]
    InvalidConfig,
    #[msg("Pool is not initialized")]
    PoolNotInitialized,
    #[msg("Already initialized")]
    AlreadyInitialized,
    #[msg("Reserve viewer limit reached")]
    ReserveViewerLimit,
    #[msg("Math overflow")]
    MathOverflow,
    #[msg("Invalid input parameters")]
    InvalidInput,
}
