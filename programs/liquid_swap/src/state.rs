use anchor_lang::prelude::*;

use crate::utils::encryption::{FheType, Handle, SymbolicFhe};
use crate::ErrorCode;

pub const POOL_SEED: &[u8] = b"pool";
pub const PENDING_SEED: &[u8] = b"pending";
pub const REQUEST_SEED: &[u8] = b"request";
pub const LP_POSITION_SEED: &[u8] = b"lp_position";
pub const CONFIDENTIAL_ACCOUNT_SEED: &[u8] = b"confidential_account";
pub const OPERATOR_SEED: &[u8] = b"operator";
pub const SPL_VAULT_SEED: &[u8] = b"confidential_vault";
pub const VAULT_AUTHORITY_SEED: &[u8] = b"vault_authority";

pub const SCALING_FACTOR: u64 = 1_000_000;
pub const MINIMUM_LIQUIDITY: u64 = 100 * SCALING_FACTOR;
pub const MAX_OPERATION_TIME: i64 = 300;
pub const DEFAULT_FEE_BPS: u16 = 30;
pub const FEE_DENOMINATOR: u64 = 10_000;
pub const MAX_RESERVE_VIEWERS: usize = 16;
pub const CONFIDENTIAL_DECIMALS: u8 = 6;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SYMBOL_LEN: usize = 10;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, InitSpace)]
pub enum Operation {
    #[default]
    None,
    AddLiquidity,
    RemoveLiquidity,
    Swap,
}

impl Operation {
    /// Number of values the decryption subsystem returns for this operation.
    pub fn decrypted_len(self) -> usize {
        match self {
            Operation::None => 0,
            Operation::AddLiquidity => 4,
            Operation::RemoveLiquidity | Operation::Swap => 2,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub enum RequestStatus {
    Active,
    Finalized,
    Refunded,
}

// ============================================================================
// Pool configuration
// ============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct CreatePoolParams {
    pub price_scanner: Pubkey,
    pub input_verifier: Pubkey,
    pub kms_signer: Pubkey,
    pub fee_bps: Option<u16>,
    pub max_operation_time: Option<i64>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct PoolConfig {
    /// Creator of the pool; the only account allowed to initialize it and
    /// manage reserve viewers.
    pub factory: Pubkey,
    pub price_scanner: Pubkey,
    /// Signs the digest binding encrypted inputs to a user.
    pub input_verifier: Pubkey,
    /// Signs decryption results delivered to the callbacks.
    pub kms_signer: Pubkey,
    pub fee_bps: u16,
    pub max_operation_time: i64,
    pub scaling_factor: u64,
    pub minimum_liquidity: u64,
}

impl PoolConfig {
    pub fn new(factory: Pubkey, params: &CreatePoolParams) -> Self {
        Self {
            factory,
            price_scanner: params.price_scanner,
            input_verifier: params.input_verifier,
            kms_signer: params.kms_signer,
            fee_bps: params.fee_bps.unwrap_or(DEFAULT_FEE_BPS),
            max_operation_time: params.max_operation_time.unwrap_or(MAX_OPERATION_TIME),
            scaling_factor: SCALING_FACTOR,
            minimum_liquidity: MINIMUM_LIQUIDITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for key in [
            &self.factory,
            &self.price_scanner,
            &self.input_verifier,
            &self.kms_signer,
        ] {
            require!(*key != Pubkey::default(), ErrorCode::InvalidAddress);
        }
        require!((self.fee_bps as u64) < FEE_DENOMINATOR, ErrorCode::InvalidConfig);
        require!(self.max_operation_time > 0, ErrorCode::InvalidConfig);
        require!(self.scaling_factor > 0, ErrorCode::InvalidConfig);
        Ok(())
    }

    /// `10_000 - fee_bps`, the share of an input that counts toward the curve.
    pub fn fee_multiplier(&self) -> u64 {
        FEE_DENOMINATOR - self.fee_bps as u64
    }
}

// ============================================================================
// Pool
// ============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, InitSpace)]
pub struct ReserveSnapshot {
    pub obfuscated_reserve0: u128,
    pub obfuscated_reserve1: u128,
    pub updated_at: i64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PoolInfo {
    pub factory: Pubkey,
    pub token0: Pubkey,
    pub token1: Pubkey,
    pub scaling_factor: u64,
    pub minimum_liquidity: u64,
    pub max_operation_time: i64,
    pub fee_bps: u16,
    pub has_liquidity: bool,
    pub initialized: bool,
    pub next_request_id: u64,
}

#[account]
#[derive(InitSpace)]
pub struct Pool {
    pub config: PoolConfig,
    pub seed: u64,
    pub token0: Pubkey,
    pub token1: Pubkey,
    pub vault0: Pubkey,
    pub vault1: Pubkey,
    pub initialized: bool,
    pub reserve0: Handle,
    pub reserve1: Handle,
    pub total_lp_supply: Handle,
    pub locked_liquidity: Handle,
    pub has_liquidity: bool,
    pub next_request_id: u64,
    pub reserve_snapshot: ReserveSnapshot,
    #[max_len(16)]
    pub reserve_viewers: Vec<Pubkey>,
    pub bump: u8,
}

impl Pool {
    pub fn new(config: PoolConfig, seed: u64, bump: u8) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            seed,
            token0: Pubkey::default(),
            token1: Pubkey::default(),
            vault0: Pubkey::default(),
            vault1: Pubkey::default(),
            initialized: false,
            reserve0: Handle::default(),
            reserve1: Handle::default(),
            total_lp_supply: Handle::default(),
            locked_liquidity: Handle::default(),
            has_liquidity: false,
            next_request_id: 1,
            reserve_snapshot: ReserveSnapshot::default(),
            reserve_viewers: vec![config.price_scanner],
            bump,
        })
    }

    fn require_factory(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.config.factory, ErrorCode::Forbidden);
        Ok(())
    }

    pub fn require_initialized(&self) -> Result<()> {
        require!(self.initialized, ErrorCode::PoolNotInitialized);
        Ok(())
    }

    /// Binds the token pair and starts every encrypted aggregate at zero.
    pub fn initialize(
        &mut self,
        fhe: &mut SymbolicFhe,
        caller: &Pubkey,
        tokens: [Pubkey; 2],
        vaults: [Pubkey; 2],
    ) -> Result<()> {
        self.require_factory(caller)?;
        require!(!self.initialized, ErrorCode::AlreadyInitialized);
        require!(
            tokens[0] != Pubkey::default() && tokens[1] != Pubkey::default(),
            ErrorCode::InvalidAddress
        );
        require_keys_neq!(tokens[0], tokens[1], ErrorCode::InvalidAddress);

        let reserve0 = fhe.zero(FheType::Uint64)?;
        let reserve1 = fhe.zero(FheType::Uint64)?;
        let supply = fhe.zero(FheType::Uint64)?;
        let locked = fhe.zero(FheType::Uint64)?;

        self.token0 = tokens[0];
        self.token1 = tokens[1];
        self.vault0 = vaults[0];
        self.vault1 = vaults[1];
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
        self.total_lp_supply = supply;
        self.locked_liquidity = locked;
        self.initialized = true;
        Ok(())
    }

    pub fn allocate_request_id(&mut self) -> Result<u64> {
        let id = self.next_request_id;
        self.next_request_id = id.checked_add(1).ok_or(ErrorCode::MathOverflow)?;
        Ok(id)
    }

    pub fn is_reserve_viewer(&self, who: &Pubkey) -> bool {
        self.reserve_viewers.contains(who)
    }

    /// Registers every address in `viewers`, returning the ones that were new.
    /// The batch is validated as a whole before the set changes.
    pub fn add_reserve_viewers(&mut self, caller: &Pubkey, viewers: &[Pubkey]) -> Result<Vec<Pubkey>> {
        self.require_factory(caller)?;
        require!(
            viewers.iter().all(|v| *v != Pubkey::default()),
            ErrorCode::InvalidAddress
        );

        let mut added: Vec<Pubkey> = Vec::new();
        for viewer in viewers {
            if !self.is_reserve_viewer(viewer) && !added.contains(viewer) {
                added.push(*viewer);
            }
        }
        require!(
            self.reserve_viewers.len() + added.len() <= MAX_RESERVE_VIEWERS,
            ErrorCode::ReserveViewerLimit
        );

        self.reserve_viewers.extend_from_slice(&added);
        Ok(added)
    }

    pub fn set_price_scanner(&mut self, caller: &Pubkey, scanner: Pubkey) -> Result<()> {
        self.require_factory(caller)?;
        require!(scanner != Pubkey::default(), ErrorCode::InvalidAddress);
        require!(
            self.is_reserve_viewer(&scanner) || self.reserve_viewers.len() < MAX_RESERVE_VIEWERS,
            ErrorCode::ReserveViewerLimit
        );

        self.config.price_scanner = scanner;
        if !self.is_reserve_viewer(&scanner) {
            self.reserve_viewers.push(scanner);
        }
        Ok(())
    }

    pub fn reserve_snapshot_for(&self, viewer: &Pubkey) -> Result<ReserveSnapshot> {
        require!(self.is_reserve_viewer(viewer), ErrorCode::Forbidden);
        Ok(self.reserve_snapshot)
    }

    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            factory: self.config.factory,
            token0: self.token0,
            token1: self.token1,
            scaling_factor: self.config.scaling_factor,
            minimum_liquidity: self.config.minimum_liquidity,
            max_operation_time: self.config.max_operation_time,
            fee_bps: self.config.fee_bps,
            has_liquidity: self.has_liquidity,
            initialized: self.initialized,
            next_request_id: self.next_request_id,
        }
    }
}

// ============================================================================
// Per-user pending slot and request registry
// ============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingOperationInfo {
    pub request_id: u64,
    pub has_pending: bool,
    pub created_at: i64,
    pub operation: Operation,
}

/// The single in-flight operation a user may have against a pool.
#[account]
#[derive(InitSpace, Default)]
pub struct PendingOperation {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub request_id: u64,
    pub operation: Operation,
    pub created_at: i64,
    pub active: bool,
    /// AddLiquidity initiated while the pool had no liquidity.
    pub bootstrap: bool,
    /// Recipient of withdrawn or swapped tokens.
    pub destination: Pubkey,
    pub inputs: [Handle; 2],
    pub numerators: [Handle; 2],
    /// Plan-time reserves or LP supply the numerators are scaled by.
    pub multipliers: [Handle; 2],
    pub handles: [Handle; 4],
    pub handle_count: u8,
    pub bump: u8,
}

impl PendingOperation {
    /// Ties a freshly created slot to its pool and owner.
    pub fn bind(&mut self, pool: Pubkey, user: Pubkey) -> Result<()> {
        if self.pool == Pubkey::default() && self.user == Pubkey::default() {
            self.pool = pool;
            self.user = user;
            return Ok(());
        }
        require!(self.pool == pool && self.user == user, ErrorCode::InvalidAddress);
        Ok(())
    }

    pub fn targets(&self) -> &[Handle] {
        let count = (self.handle_count as usize).min(self.handles.len());
        &self.handles[..count]
    }

    pub fn info(&self) -> PendingOperationInfo {
        if !self.active {
            return PendingOperationInfo::default();
        }
        PendingOperationInfo {
            request_id: self.request_id,
            has_pending: true,
            created_at: self.created_at,
            operation: self.operation,
        }
    }

    pub fn clear(&mut self) {
        self.request_id = 0;
        self.operation = Operation::None;
        self.created_at = 0;
        self.active = false;
        self.bootstrap = false;
        self.destination = Pubkey::default();
        self.inputs = [Handle::default(); 2];
        self.numerators = [Handle::default(); 2];
        self.multipliers = [Handle::default(); 2];
        self.handles = [Handle::default(); 4];
        self.handle_count = 0;
    }
}

#[account]
#[derive(InitSpace)]
pub struct RequestRecord {
    pub pool: Pubkey,
    pub request_id: u64,
    pub user: Pubkey,
    pub operation: Operation,
    pub status: RequestStatus,
    pub created_at: i64,
    pub bump: u8,
}

/// Reads a program account that may not exist yet.
pub fn load_optional<T: AccountDeserialize + Owner>(info: &AccountInfo) -> Option<T> {
    if *info.owner != T::owner() || info.data_is_empty() {
        return None;
    }
    let data = info.try_borrow_data().ok()?;
    T::try_deserialize(&mut &data[..]).ok()
}

pub fn store_account<T: AccountSerialize>(info: &AccountInfo, value: &T) -> Result<()> {
    let mut data = info.try_borrow_mut_data()?;
    let mut dst: &mut [u8] = &mut data;
    value.try_serialize(&mut dst)
}

// ============================================================================
// LP positions and the confidential token ledger
// ============================================================================

#[account]
#[derive(InitSpace)]
pub struct LpPosition {
    pub pool: Pubkey,
    pub owner: Pubkey,
    pub balance: Handle,
    pub bump: u8,
}

#[account]
#[derive(InitSpace)]
pub struct ConfidentialMint {
    pub authority: Pubkey,
    #[max_len(32)]
    pub name: String,
    #[max_len(10)]
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Handle,
    /// Public SPL mint that can be wrapped into this token, or the default key.
    pub underlying: Pubkey,
    /// Signer of input proofs accepted by `mint_confidential`.
    pub input_verifier: Pubkey,
}

#[account]
#[derive(InitSpace)]
pub struct ConfidentialAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub balance: Handle,
    pub bump: u8,
}

#[account]
#[derive(InitSpace)]
pub struct OperatorApproval {
    pub mint: Pubkey,
    pub holder: Pubkey,
    pub operator: Pubkey,
    /// Unix timestamp until which the operator may move the holder's balance; 0 revokes.
    pub expiry: i64,
    pub bump: u8,
}

impl OperatorApproval {
    pub fn is_active(&self, now: i64) -> bool {
        self.expiry > 0 && now <= self.expiry
    }
}
