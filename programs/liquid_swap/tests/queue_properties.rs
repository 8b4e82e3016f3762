use std::collections::HashMap;

use anchor_lang::prelude::*;
use liquid_swap::queue;
use liquid_swap::{
    CreatePoolParams, DecryptionPlan, ErrorCode, FheType, Handle, Operation, PendingOperation,
    Pool, PoolConfig, RequestRecord, RequestStatus, SymbolicFhe,
};
use proptest::prelude::*;

const USERS: usize = 3;
const TIMEOUT: i64 = 300;

struct Queue {
    pool: Pool,
    pool_key: Pubkey,
    users: Vec<Pubkey>,
    slots: Vec<PendingOperation>,
    records: HashMap<u64, RequestRecord>,
    now: i64,
}

impl Queue {
    fn new() -> Self {
        let factory = Pubkey::new_unique();
        let config = PoolConfig::new(
            factory,
            &CreatePoolParams {
                price_scanner: Pubkey::new_unique(),
                input_verifier: Pubkey::new_unique(),
                kms_signer: Pubkey::new_unique(),
                fee_bps: None,
                max_operation_time: Some(TIMEOUT),
            },
        );
        let mut pool = Pool::new(config, 7, 255).unwrap();
        let mut fhe = SymbolicFhe::new(&[b"queue-properties"]);
        pool.initialize(
            &mut fhe,
            &factory,
            [Pubkey::new_unique(), Pubkey::new_unique()],
            [Pubkey::new_unique(), Pubkey::new_unique()],
        )
        .unwrap();

        Queue {
            pool,
            pool_key: Pubkey::new_unique(),
            users: (0..USERS).map(|_| Pubkey::new_unique()).collect(),
            slots: (0..USERS).map(|_| PendingOperation::default()).collect(),
            records: HashMap::new(),
            now: 1_000,
        }
    }
}

fn swap_plan() -> DecryptionPlan {
    let mut fhe = SymbolicFhe::new(&[b"plan"]);
    DecryptionPlan {
        inputs: [Handle::default(); 2],
        numerators: [Handle::default(); 2],
        multipliers: [Handle::default(); 2],
        targets: vec![
            fhe.zero(FheType::Uint128).unwrap(),
            fhe.zero(FheType::Uint128).unwrap(),
        ],
        bootstrap: false,
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

#[derive(Clone, Debug)]
enum Step {
    Initiate(usize),
    Refund(usize),
    Wait(i64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..USERS).prop_map(Step::Initiate),
        (0..USERS).prop_map(Step::Refund),
        (1i64..400).prop_map(Step::Wait),
    ]
}

proptest! {
    #[test]
    fn prop_single_slot_and_monotonic_ids(steps in prop::collection::vec(step(), 1..64)) {
        let mut q = Queue::new();
        let mut last_id = 0u64;
        let mut opened = 0u64;

        for step in steps {
            match step {
                Step::Initiate(who) => {
                    let was_active = q.slots[who].active;
                    let others: Vec<_> = (0..USERS).filter(|i| *i != who).map(|i| q.slots[i].info()).collect();
                    let mut record = blank_record();
                    let result = queue::initiate(
                        &mut q.pool,
                        &mut q.slots[who],
                        &mut record,
                        q.pool_key,
                        q.users[who],
                        Operation::Swap,
                        q.now + 60,
                        q.now,
                    );

                    if was_active {
                        prop_assert_eq!(result.unwrap_err(), error!(ErrorCode::UserHasPendingOperation));
                    } else {
                        let id = result.unwrap();
                        prop_assert_eq!(id, last_id + 1);
                        last_id = id;
                        opened += 1;
                        queue::dispatch(&mut q.slots[who], &mut record, swap_plan(), q.users[who], q.now).unwrap();
                        q.records.insert(id, record);
                    }

                    let after: Vec<_> = (0..USERS).filter(|i| *i != who).map(|i| q.slots[i].info()).collect();
                    prop_assert_eq!(others, after);
                }
                Step::Refund(who) => {
                    let slot = &mut q.slots[who];
                    let was_active = slot.active;
                    let started = slot.created_at;
                    let id = slot.request_id;
                    let result = queue::refund(q.records.get_mut(&id), slot, &q.users[who], Operation::Swap, q.now, TIMEOUT);

                    if !was_active {
                        prop_assert_eq!(result.unwrap_err(), error!(ErrorCode::RequestNotActive));
                    } else if q.now - started >= TIMEOUT {
                        prop_assert_eq!(result.unwrap().request_id, id);
                        prop_assert!(!q.slots[who].active);
                        prop_assert_eq!(q.records[&id].status, RequestStatus::Refunded);
                    } else {
                        prop_assert_eq!(result.unwrap_err(), error!(ErrorCode::OperationNotExpired));
                        prop_assert!(q.slots[who].active);
                    }
                }
                Step::Wait(seconds) => q.now += seconds,
            }

            let active = q.records.values().filter(|r| r.status == RequestStatus::Active).count();
            let occupied = q.slots.iter().filter(|s| s.active).count();
            prop_assert_eq!(active, occupied);
        }

        prop_assert_eq!(q.pool.next_request_id, opened + 1);
    }
}
