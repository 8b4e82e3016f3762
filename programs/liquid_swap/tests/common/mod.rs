#![allow(dead_code)]

use std::collections::HashMap;

use anchor_lang::prelude::*;
use liquid_swap::finalize::{
    finalize_add_liquidity, finalize_remove_liquidity, finalize_swap, AddLiquidityAccounts,
    Callback, RemoveLiquidityAccounts, Settlement, SwapAccounts,
};
use liquid_swap::queue::{self, RefundReceipt};
use liquid_swap::requests::{request_add_liquidity, request_remove_liquidity, request_swap, Initiation};
use liquid_swap::{
    decryption_digest, encode_cleartexts, input_digest, mint_encrypted, open_account,
    ConfidentialAccount, ConfidentialMint, CreatePoolParams, Ed25519Attestation, ErrorCode, FheOp,
    FheOpcode, FheType, Handle, LpPosition, Operation, OperatorApproval, PendingOperation,
    PendingOperationInfo, Pool, PoolConfig, RequestRecord, RequestStatus, SymbolicFhe,
};

pub const SCALE: u64 = 1_000_000;
pub const GENESIS: i64 = 1_700_000_000;
pub const PROOF: [u8; 64] = [7u8; 64];

/// Evaluates the symbolic op log on plaintexts, standing in for the coprocessor
/// and the KMS.
#[derive(Default)]
pub struct PlainCoprocessor {
    values: HashMap<Handle, u128>,
    inputs: u64,
}

impl PlainCoprocessor {
    pub fn encrypt_input(&mut self, value: u64) -> Handle {
        self.inputs += 1;
        let mut digest = [0xA5u8; 32];
        digest[..8].copy_from_slice(&self.inputs.to_le_bytes());
        let handle = Handle::from_digest(digest, FheType::Uint64);
        self.values.insert(handle, value as u128);
        handle
    }

    pub fn evaluate(&mut self, ops: &[FheOp]) {
        for op in ops {
            let mask = op.result.fhe_type().expect("typed result").max_value();
            let a = self.operand(&op.operands[0]);
            let b = self.operand(&op.operands[1]);
            let c = self.operand(&op.operands[2]);
            let value = match op.opcode {
                FheOpcode::TrivialEncrypt => op.scalar,
                FheOpcode::Add => a.wrapping_add(b),
                FheOpcode::Sub => a.wrapping_sub(b),
                FheOpcode::Mul => a.wrapping_mul(b),
                FheOpcode::AddScalar => a.wrapping_add(op.scalar),
                FheOpcode::MulScalar => a.wrapping_mul(op.scalar),
                FheOpcode::Min => a.min(b),
                FheOpcode::Le => (a <= b) as u128,
                FheOpcode::Lt => (a < b) as u128,
                FheOpcode::And => a & b,
                FheOpcode::Or => a | b,
                FheOpcode::Select => {
                    if a != 0 {
                        b
                    } else {
                        c
                    }
                }
                FheOpcode::Cast => a,
                FheOpcode::Rand => {
                    let mut word = [0u8; 16];
                    word.copy_from_slice(&op.result.0[..16]);
                    u128::from_le_bytes(word) % op.scalar
                }
                FheOpcode::DivScalar => a / op.scalar,
                FheOpcode::RemScalar => a % op.scalar,
            };
            self.values.insert(op.result, value & mask);
        }
    }

    fn operand(&self, handle: &Handle) -> u128 {
        if handle.is_assigned() {
            self.value(handle)
        } else {
            0
        }
    }

    pub fn value(&self, handle: &Handle) -> u128 {
        *self
            .values
            .get(handle)
            .unwrap_or_else(|| panic!("handle never evaluated: {:?}", handle))
    }
}

pub struct Trader {
    pub account0: ConfidentialAccount,
    pub account1: ConfidentialAccount,
    pub lp: LpPosition,
    pub pending: PendingOperation,
    pub approval0: Option<OperatorApproval>,
    pub approval1: Option<OperatorApproval>,
}

fn blank_account() -> ConfidentialAccount {
    ConfidentialAccount {
        mint: Pubkey::default(),
        owner: Pubkey::default(),
        balance: Handle::default(),
        bump: 0,
    }
}

fn blank_record() -> RequestRecord {
    RequestRecord {
        pool: Pubkey::default(),
        request_id: 0,
        user: Pubkey::default(),
        operation: Operation::None,
        status: RequestStatus::Active,
        created_at: 0,
        bump: 0,
    }
}

fn test_mint(symbol: &str, verifier: Pubkey) -> ConfidentialMint {
    ConfidentialMint {
        authority: Pubkey::new_unique(),
        name: format!("{} test token", symbol),
        symbol: symbol.to_string(),
        decimals: 6,
        total_supply: Handle::default(),
        underlying: Pubkey::default(),
        input_verifier: verifier,
    }
}

/// One initialized pool plus every account the handlers would load, held in
/// memory and driven through the same core calls.
pub struct World {
    pub program_id: Pubkey,
    pub pool_key: Pubkey,
    pub factory: Pubkey,
    pub scanner: Pubkey,
    pub verifier: Pubkey,
    pub kms: Pubkey,
    pub pool: Pool,
    pub mint0: ConfidentialMint,
    pub mint1: ConfidentialMint,
    pub vault0: ConfidentialAccount,
    pub vault1: ConfidentialAccount,
    pub traders: HashMap<Pubkey, Trader>,
    pub records: HashMap<u64, RequestRecord>,
    pub cop: PlainCoprocessor,
    pub now: i64,
    steps: u64,
}

impl World {
    pub fn new() -> Self {
        let factory = Pubkey::new_unique();
        let scanner = Pubkey::new_unique();
        let verifier = Pubkey::new_unique();
        let kms = Pubkey::new_unique();
        let config = PoolConfig::new(
            factory,
            &CreatePoolParams {
                price_scanner: scanner,
                input_verifier: verifier,
                kms_signer: kms,
                fee_bps: None,
                max_operation_time: None,
            },
        );

        let mut world = World {
            program_id: liquid_swap::ID,
            pool_key: Pubkey::new_unique(),
            factory,
            scanner,
            verifier,
            kms,
            pool: Pool::new(config, 0, 255).unwrap(),
            mint0: test_mint("TK0", verifier),
            mint1: test_mint("TK1", verifier),
            vault0: blank_account(),
            vault1: blank_account(),
            traders: HashMap::new(),
            records: HashMap::new(),
            cop: PlainCoprocessor::default(),
            now: GENESIS,
            steps: 0,
        };

        let token0 = Pubkey::new_unique();
        let token1 = Pubkey::new_unique();
        let pool_key = world.pool_key;
        let mut fhe = world.fhe();
        world
            .pool
            .initialize(
                &mut fhe,
                &factory,
                [token0, token1],
                [Pubkey::new_unique(), Pubkey::new_unique()],
            )
            .unwrap();
        open_account(&mut fhe, &mut world.vault0, token0, pool_key).unwrap();
        open_account(&mut fhe, &mut world.vault1, token1, pool_key).unwrap();
        world.mint0.total_supply = fhe.zero(FheType::Uint64).unwrap();
        world.mint1.total_supply = fhe.zero(FheType::Uint64).unwrap();
        world.cop.evaluate(fhe.ops());
        world
    }

    fn fhe(&mut self) -> SymbolicFhe {
        self.steps += 1;
        SymbolicFhe::new(&[b"harness", &self.steps.to_le_bytes()])
    }

    pub fn advance(&mut self, seconds: i64) {
        self.now += seconds;
    }

    pub fn deadline(&self) -> i64 {
        self.now + 60
    }

    /// Opens both token accounts, mints `funds` and approves the pool as operator.
    pub fn add_trader(&mut self, funds0: u64, funds1: u64) -> Pubkey {
        let user = Pubkey::new_unique();
        let token0 = self.pool.token0;
        let token1 = self.pool.token1;
        let amount0 = self.cop.encrypt_input(funds0);
        let amount1 = self.cop.encrypt_input(funds1);

        let mut fhe = self.fhe();
        let mut account0 = blank_account();
        let mut account1 = blank_account();
        open_account(&mut fhe, &mut account0, token0, user).unwrap();
        open_account(&mut fhe, &mut account1, token1, user).unwrap();
        mint_encrypted(&mut fhe, &mut self.mint0, &token0, &mut account0, amount0).unwrap();
        mint_encrypted(&mut fhe, &mut self.mint1, &token1, &mut account1, amount1).unwrap();
        self.cop.evaluate(fhe.ops());

        let approval = |mint: Pubkey| OperatorApproval {
            mint,
            holder: user,
            operator: self.pool_key,
            expiry: self.now + 86_400,
            bump: 0,
        };
        let trader = Trader {
            account0,
            account1,
            lp: LpPosition {
                pool: Pubkey::default(),
                owner: Pubkey::default(),
                balance: Handle::default(),
                bump: 0,
            },
            pending: PendingOperation::default(),
            approval0: Some(approval(token0)),
            approval1: Some(approval(token1)),
        };
        self.traders.insert(user, trader);
        user
    }

    pub fn revoke_operator(&mut self, user: &Pubkey) {
        let trader = self.traders.get_mut(user).expect("known trader");
        for approval in [&mut trader.approval0, &mut trader.approval1].into_iter().flatten() {
            approval.expiry = 0;
        }
    }

    /// Forgets the grants entirely, as if `set_operator` was never called.
    pub fn drop_operator(&mut self, user: &Pubkey) {
        let trader = self.traders.get_mut(user).expect("known trader");
        trader.approval0 = None;
        trader.approval1 = None;
    }

    /// The confidential accounts an entry point would find for `owner`.
    fn accounts_of(&self, owner: &Pubkey) -> [Option<ConfidentialAccount>; 2] {
        match self.traders.get(owner) {
            Some(t) => [Some(t.account0.clone()), Some(t.account1.clone())],
            None => [None, None],
        }
    }

    pub fn input_attestation(&self, user: &Pubkey, handles: &[Handle]) -> Ed25519Attestation {
        Ed25519Attestation {
            signer: self.verifier,
            signature: PROOF,
            message: input_digest(&self.program_id, user, handles).to_vec(),
        }
    }

    pub fn kms_attestation(&self, request_id: u64, handles: &[Handle], cleartexts: &[u8]) -> Ed25519Attestation {
        Ed25519Attestation {
            signer: self.kms,
            signature: PROOF,
            message: decryption_digest(&self.program_id, request_id, handles, cleartexts).to_vec(),
        }
    }

    // ------------------------------------------------------------------------
    // Initiation
    // ------------------------------------------------------------------------

    pub fn initiate_add(&mut self, user: Pubkey, amount0: u64, amount1: u64, deadline: i64) -> Result<u64> {
        let amounts = [self.cop.encrypt_input(amount0), self.cop.encrypt_input(amount1)];
        let attestation = self.input_attestation(&user, &amounts);
        self.initiate_add_with(user, amounts, &attestation, &PROOF, deadline)
    }

    pub fn initiate_add_with(
        &mut self,
        user: Pubkey,
        amounts: [Handle; 2],
        attestation: &Ed25519Attestation,
        proof: &[u8],
        deadline: i64,
    ) -> Result<u64> {
        let mut fhe = self.fhe();
        let init = Initiation {
            program_id: self.program_id,
            pool_key: self.pool_key,
            user,
            deadline,
            now: self.now,
            attestation,
            input_proof: proof,
        };
        let trader = self.traders.get_mut(&user).expect("known trader");
        let balances = [trader.account0.balance, trader.account1.balance];
        let mut record = blank_record();

        let sent = request_add_liquidity(
            &mut fhe,
            &mut self.pool,
            &mut trader.pending,
            &mut record,
            &mut trader.lp,
            &init,
            balances,
            amounts,
        )?;
        self.cop.evaluate(fhe.ops());
        self.records.insert(sent.request_id, record);
        Ok(sent.request_id)
    }

    pub fn initiate_remove(&mut self, user: Pubkey, lp_amount: u64, to: Pubkey, deadline: i64) -> Result<u64> {
        let amount = self.cop.encrypt_input(lp_amount);
        let attestation = self.input_attestation(&user, &[amount]);
        let [recipient0, recipient1] = self.accounts_of(&to);
        let mut fhe = self.fhe();
        let init = Initiation {
            program_id: self.program_id,
            pool_key: self.pool_key,
            user,
            deadline,
            now: self.now,
            attestation: &attestation,
            input_proof: &PROOF,
        };
        let trader = self.traders.get_mut(&user).expect("known trader");
        let lp_balance = trader.lp.balance;
        let mut record = blank_record();

        let sent = request_remove_liquidity(
            &mut fhe,
            &mut self.pool,
            &mut trader.pending,
            &mut record,
            &init,
            lp_balance,
            amount,
            to,
            [recipient0.as_ref(), recipient1.as_ref()],
        )?;
        self.cop.evaluate(fhe.ops());
        self.records.insert(sent.request_id, record);
        Ok(sent.request_id)
    }

    pub fn initiate_swap(
        &mut self,
        user: Pubkey,
        amount0_in: u64,
        amount1_in: u64,
        to: Pubkey,
        deadline: i64,
    ) -> Result<u64> {
        let amounts = [self.cop.encrypt_input(amount0_in), self.cop.encrypt_input(amount1_in)];
        let attestation = self.input_attestation(&user, &amounts);
        let [recipient0, recipient1] = self.accounts_of(&to);
        let mut fhe = self.fhe();
        let init = Initiation {
            program_id: self.program_id,
            pool_key: self.pool_key,
            user,
            deadline,
            now: self.now,
            attestation: &attestation,
            input_proof: &PROOF,
        };
        let trader = self.traders.get_mut(&user).expect("known trader");
        let balances = [trader.account0.balance, trader.account1.balance];
        let mut record = blank_record();

        let sent = request_swap(
            &mut fhe,
            &mut self.pool,
            &mut trader.pending,
            &mut record,
            &init,
            balances,
            amounts,
            to,
            [recipient0.as_ref(), recipient1.as_ref()],
        )?;
        self.cop.evaluate(fhe.ops());
        self.records.insert(sent.request_id, record);
        Ok(sent.request_id)
    }

    // ------------------------------------------------------------------------
    // Decryption and callbacks
    // ------------------------------------------------------------------------

    /// What the KMS would reveal for `user`'s pending request.
    pub fn decrypt(&self, user: &Pubkey) -> Vec<u128> {
        self.traders[user]
            .pending
            .targets()
            .iter()
            .map(|h| self.cop.value(h))
            .collect()
    }

    /// Honest relay of the pending request: decrypt, attest, call back.
    pub fn finalize(&mut self, user: Pubkey) -> Result<Settlement> {
        let pending = &self.traders[&user].pending;
        let kind = pending.operation;
        let request_id = pending.request_id;
        let handles = pending.targets().to_vec();
        let cleartexts = encode_cleartexts(&self.decrypt(&user));
        let attestation = self.kms_attestation(request_id, &handles, &cleartexts);
        self.callback(kind, user, request_id, &cleartexts, &attestation, &PROOF)
    }

    pub fn callback(
        &mut self,
        kind: Operation,
        user: Pubkey,
        request_id: u64,
        cleartexts: &[u8],
        attestation: &Ed25519Attestation,
        proof: &[u8],
    ) -> Result<Settlement> {
        let mut fhe = self.fhe();
        let callback = Callback {
            program_id: self.program_id,
            pool_key: self.pool_key,
            attestation,
            cleartexts,
            decryption_proof: proof,
            now: self.now,
        };

        let destination = self.traders[&user].pending.destination;
        let mut recipient = if destination != user && destination != Pubkey::default() {
            self.traders.remove(&destination)
        } else {
            None
        };
        let trader = self.traders.get_mut(&user).expect("known trader");
        let record = self.records.get_mut(&request_id);

        let result = match kind {
            Operation::AddLiquidity => finalize_add_liquidity(
                &mut fhe,
                &mut self.pool,
                &mut trader.pending,
                record,
                &callback,
                AddLiquidityAccounts {
                    user0: &mut trader.account0,
                    user1: &mut trader.account1,
                    vault0: &mut self.vault0,
                    vault1: &mut self.vault1,
                    lp_position: &mut trader.lp,
                    approval0: trader.approval0.as_ref(),
                    approval1: trader.approval1.as_ref(),
                },
            )
            .map(|outcome| outcome.settlement),
            Operation::RemoveLiquidity => {
                let (destination0, destination1) = match recipient.as_mut() {
                    Some(r) => (&mut r.account0, &mut r.account1),
                    None => (&mut trader.account0, &mut trader.account1),
                };
                finalize_remove_liquidity(
                    &mut fhe,
                    &mut self.pool,
                    &mut trader.pending,
                    record,
                    &callback,
                    RemoveLiquidityAccounts {
                        vault0: &mut self.vault0,
                        vault1: &mut self.vault1,
                        destination0,
                        destination1,
                        lp_position: &mut trader.lp,
                    },
                )
                .map(|outcome| outcome.settlement)
            }
            Operation::Swap => {
                let (destination0, destination1) = match recipient.as_mut() {
                    Some(r) => (Some(&mut r.account0), Some(&mut r.account1)),
                    None => (None, None),
                };
                finalize_swap(
                    &mut fhe,
                    &mut self.pool,
                    &mut trader.pending,
                    record,
                    &callback,
                    SwapAccounts {
                        user0: &mut trader.account0,
                        user1: &mut trader.account1,
                        vault0: &mut self.vault0,
                        vault1: &mut self.vault1,
                        destination0,
                        destination1,
                        approval0: trader.approval0.as_ref(),
                        approval1: trader.approval1.as_ref(),
                    },
                )
                .map(|outcome| outcome.settlement)
            }
            Operation::None => Err(error!(ErrorCode::InvalidInput)),
        };

        if let Some(r) = recipient {
            self.traders.insert(destination, r);
        }
        if result.is_ok() {
            self.cop.evaluate(fhe.ops());
        }
        result
    }

    pub fn refund(
        &mut self,
        caller: Pubkey,
        slot_owner: Pubkey,
        request_id: u64,
        kind: Operation,
    ) -> Result<RefundReceipt> {
        let max_operation_time = self.pool.config.max_operation_time;
        let trader = self.traders.get_mut(&slot_owner).expect("known trader");
        queue::refund(
            self.records.get_mut(&request_id),
            &mut trader.pending,
            &caller,
            kind,
            self.now,
            max_operation_time,
        )
    }

    // ------------------------------------------------------------------------
    // Plaintext views for assertions
    // ------------------------------------------------------------------------

    pub fn balances(&self, user: &Pubkey) -> (u128, u128) {
        let trader = &self.traders[user];
        (
            self.cop.value(&trader.account0.balance),
            self.cop.value(&trader.account1.balance),
        )
    }

    pub fn lp_balance(&self, user: &Pubkey) -> u128 {
        let balance = self.traders[user].lp.balance;
        if balance.is_assigned() {
            self.cop.value(&balance)
        } else {
            0
        }
    }

    pub fn reserves(&self) -> (u128, u128) {
        (self.cop.value(&self.pool.reserve0), self.cop.value(&self.pool.reserve1))
    }

    pub fn vaults(&self) -> (u128, u128) {
        (self.cop.value(&self.vault0.balance), self.cop.value(&self.vault1.balance))
    }

    pub fn supply(&self) -> u128 {
        self.cop.value(&self.pool.total_lp_supply)
    }

    pub fn locked(&self) -> u128 {
        self.cop.value(&self.pool.locked_liquidity)
    }

    pub fn pending_info(&self, user: &Pubkey) -> PendingOperationInfo {
        self.traders[user].pending.info()
    }

    pub fn status(&self, request_id: u64) -> RequestStatus {
        self.records[&request_id].status
    }

    /// Seeds the pool with a first deposit from a fresh provider.
    pub fn bootstrap(&mut self, amount0: u64, amount1: u64) -> Pubkey {
        let provider = self.add_trader(amount0, amount1);
        let deadline = self.deadline();
        self.initiate_add(provider, amount0, amount1, deadline).unwrap();
        assert_eq!(self.finalize(provider).unwrap(), Settlement::Applied);
        provider
    }
}
