use anchor_lang::prelude::*;
use anchor_lang::solana_program::sysvar::instructions::{
    load_current_index_checked, load_instruction_at_checked,
};
use solana_sdk_ids::ed25519_program;
use solana_sha256_hasher::hashv;

use crate::ErrorCode;

/// Version byte stamped into every handle derived by this program.
pub const HANDLE_VERSION: u8 = 1;

const HANDLE_DOMAIN: &[u8] = b"liquid-swap/handle";
const SEED_DOMAIN: &[u8] = b"liquid-swap/seed";
const INPUT_DOMAIN: &[u8] = b"liquid-swap/input";
const DECRYPTION_DOMAIN: &[u8] = b"liquid-swap/decrypt";

/// Width of one decrypted value in a callback payload.
pub const CLEARTEXT_WIDTH: usize = 16;

// ============================================================================
// Ciphertext handles
// ============================================================================

/// Opaque reference to an encrypted value held by the coprocessor.
///
/// Bytes `0..30` are digest material, byte 30 is the [`FheType`] tag and
/// byte 31 the handle version. The all-zero handle means "never assigned".
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Handle(pub [u8; 32]);

impl anchor_lang::Space for Handle {
    const INIT_SPACE: usize = 32;
}

impl Handle {
    pub fn fhe_type(&self) -> Option<FheType> {
        if self.0[31] != HANDLE_VERSION {
            return None;
        }
        FheType::from_tag(self.0[30])
    }

    pub fn is_assigned(&self) -> bool {
        *self != Handle::default()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Builds a handle from 30 bytes of digest material and a type tag.
    pub fn from_digest(digest: [u8; 32], fhe_type: FheType) -> Self {
        let mut bytes = digest;
        bytes[30] = fhe_type as u8;
        bytes[31] = HANDLE_VERSION;
        Handle(bytes)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FheType {
    Bool = 0,
    Uint64 = 5,
    Uint128 = 6,
}

impl FheType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FheType::Bool),
            5 => Some(FheType::Uint64),
            6 => Some(FheType::Uint128),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
        }
    }

    pub fn max_value(self) -> u128 {
        match self {
            FheType::Bool => 1,
            FheType::Uint64 => u64::MAX as u128,
            FheType::Uint128 => u128::MAX,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FheOpcode {
    TrivialEncrypt,
    Add,
    Sub,
    Mul,
    AddScalar,
    MulScalar,
    Min,
    Le,
    Lt,
    And,
    Or,
    Select,
    Cast,
    Rand,
    DivScalar,
    RemScalar,
}

/// One entry of the symbolic computation log handed to the coprocessor.
///
/// Unused operand slots hold the default handle. `scalar` carries the
/// plaintext constant for trivial encryption, scalar arithmetic, the random
/// upper bound, or the public divisor.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FheOp {
    pub opcode: FheOpcode,
    pub operands: [Handle; 3],
    pub scalar: u128,
    pub result: Handle,
}

// ============================================================================
// Symbolic evaluator
// ============================================================================

/// Records ciphertext operations and derives their result handles.
///
/// The program never sees plaintexts: every call appends an [`FheOp`] to the
/// log and returns a fresh handle whose bytes are a hash of the seed, the op
/// counter and the inputs. The log is emitted with the instruction so the
/// off-chain coprocessor can evaluate it.
pub struct SymbolicFhe {
    seed: [u8; 32],
    counter: u32,
    ops: Vec<FheOp>,
}

impl SymbolicFhe {
    pub fn new(parts: &[&[u8]]) -> Self {
        let mut material: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        material.push(SEED_DOMAIN);
        material.extend_from_slice(parts);
        Self {
            seed: hashv(&material).to_bytes(),
            counter: 0,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[FheOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<FheOp> {
        self.ops
    }

    fn record(
        &mut self,
        opcode: FheOpcode,
        operands: [Handle; 3],
        scalar: u128,
        result_type: FheType,
    ) -> Handle {
        let counter = self.counter.to_le_bytes();
        let digest = hashv(&[
            HANDLE_DOMAIN,
            &self.seed,
            &counter,
            &[opcode as u8],
            &operands[0].0,
            &operands[1].0,
            &operands[2].0,
            &scalar.to_le_bytes(),
        ])
        .to_bytes();
        self.counter = self.counter.wrapping_add(1);

        let result = Handle::from_digest(digest, result_type);
        self.ops.push(FheOp {
            opcode,
            operands,
            scalar,
            result,
        });
        result
    }

    fn numeric_type(handle: &Handle) -> Result<FheType> {
        match handle.fhe_type() {
            Some(FheType::Bool) | None => err!(ErrorCode::FheTypeMismatch),
            Some(t) => Ok(t),
        }
    }

    fn same_numeric(a: &Handle, b: &Handle) -> Result<FheType> {
        let ta = Self::numeric_type(a)?;
        let tb = Self::numeric_type(b)?;
        require!(ta == tb, ErrorCode::FheTypeMismatch);
        Ok(ta)
    }

    fn boolean(handle: &Handle) -> Result<()> {
        require!(
            handle.fhe_type() == Some(FheType::Bool),
            ErrorCode::FheTypeMismatch
        );
        Ok(())
    }

    pub fn trivial_encrypt(&mut self, value: u128, fhe_type: FheType) -> Result<Handle> {
        require!(value <= fhe_type.max_value(), ErrorCode::MathOverflow);
        Ok(self.record(
            FheOpcode::TrivialEncrypt,
            [Handle::default(); 3],
            value,
            fhe_type,
        ))
    }

    pub fn zero(&mut self, fhe_type: FheType) -> Result<Handle> {
        self.trivial_encrypt(0, fhe_type)
    }

    pub fn add(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        let t = Self::same_numeric(&a, &b)?;
        Ok(self.record(FheOpcode::Add, [a, b, Handle::default()], 0, t))
    }

    pub fn sub(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        let t = Self::same_numeric(&a, &b)?;
        Ok(self.record(FheOpcode::Sub, [a, b, Handle::default()], 0, t))
    }

    pub fn mul(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        let t = Self::same_numeric(&a, &b)?;
        Ok(self.record(FheOpcode::Mul, [a, b, Handle::default()], 0, t))
    }

    pub fn add_scalar(&mut self, a: Handle, scalar: u128) -> Result<Handle> {
        let t = Self::numeric_type(&a)?;
        Ok(self.record(
            FheOpcode::AddScalar,
            [a, Handle::default(), Handle::default()],
            scalar,
            t,
        ))
    }

    pub fn mul_scalar(&mut self, a: Handle, scalar: u128) -> Result<Handle> {
        let t = Self::numeric_type(&a)?;
        Ok(self.record(
            FheOpcode::MulScalar,
            [a, Handle::default(), Handle::default()],
            scalar,
            t,
        ))
    }

    pub fn min(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        let t = Self::same_numeric(&a, &b)?;
        Ok(self.record(FheOpcode::Min, [a, b, Handle::default()], 0, t))
    }

    pub fn le(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        Self::same_numeric(&a, &b)?;
        Ok(self.record(
            FheOpcode::Le,
            [a, b, Handle::default()],
            0,
            FheType::Bool,
        ))
    }

    pub fn lt(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        Self::same_numeric(&a, &b)?;
        Ok(self.record(
            FheOpcode::Lt,
            [a, b, Handle::default()],
            0,
            FheType::Bool,
        ))
    }

    pub fn and(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        Self::boolean(&a)?;
        Self::boolean(&b)?;
        Ok(self.record(
            FheOpcode::And,
            [a, b, Handle::default()],
            0,
            FheType::Bool,
        ))
    }

    pub fn or(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        Self::boolean(&a)?;
        Self::boolean(&b)?;
        Ok(self.record(
            FheOpcode::Or,
            [a, b, Handle::default()],
            0,
            FheType::Bool,
        ))
    }

    pub fn select(&mut self, condition: Handle, a: Handle, b: Handle) -> Result<Handle> {
        Self::boolean(&condition)?;
        let t = Self::same_numeric(&a, &b)?;
        Ok(self.record(FheOpcode::Select, [condition, a, b], 0, t))
    }

    /// Width conversion. Narrowing keeps the low bits.
    pub fn cast(&mut self, a: Handle, to: FheType) -> Result<Handle> {
        let from = Self::numeric_type(&a)?;
        if from == to {
            return Ok(a);
        }
        require!(to != FheType::Bool, ErrorCode::FheTypeMismatch);
        Ok(self.record(
            FheOpcode::Cast,
            [a, Handle::default(), Handle::default()],
            0,
            to,
        ))
    }

    /// Uniform random value in `[0, upper_bound)`; the bound must be a power of two.
    pub fn rand_bounded(&mut self, fhe_type: FheType, upper_bound: u128) -> Result<Handle> {
        require!(
            upper_bound.is_power_of_two() && fhe_type != FheType::Bool,
            ErrorCode::InvalidInput
        );
        Ok(self.record(
            FheOpcode::Rand,
            [Handle::default(); 3],
            upper_bound,
            fhe_type,
        ))
    }

    /// Quotient by a public divisor: a constant, or a value the KMS has
    /// already decrypted. A zero divisor yields a trivial zero.
    pub fn div_scalar(&mut self, a: Handle, divisor: u128) -> Result<Handle> {
        self.by_public_divisor(FheOpcode::DivScalar, a, divisor)
    }

    /// Remainder by a public divisor. A zero divisor yields a trivial zero.
    pub fn rem_scalar(&mut self, a: Handle, divisor: u128) -> Result<Handle> {
        self.by_public_divisor(FheOpcode::RemScalar, a, divisor)
    }

    fn by_public_divisor(&mut self, opcode: FheOpcode, a: Handle, divisor: u128) -> Result<Handle> {
        let t = Self::numeric_type(&a)?;
        if divisor == 0 {
            return self.zero(t);
        }
        Ok(self.record(
            opcode,
            [a, Handle::default(), Handle::default()],
            divisor,
            t,
        ))
    }
}

// ============================================================================
// Attestations (Ed25519 precompile introspection)
// ============================================================================

const ED25519_HEADER_LEN: usize = 16;
const ED25519_PUBKEY_LEN: usize = 32;
const ED25519_SIGNATURE_LEN: usize = 64;
const CURRENT_INSTRUCTION: u16 = u16::MAX;

/// A single signature checked by the Ed25519 precompile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ed25519Attestation {
    pub signer: Pubkey,
    pub signature: [u8; 64],
    pub message: Vec<u8>,
}

fn read_u16(data: &[u8], at: usize) -> Result<u16> {
    let bytes = data
        .get(at..at + 2)
        .ok_or(ErrorCode::MissingAttestation)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn slice_at(data: &[u8], offset: u16, len: usize) -> Result<&[u8]> {
    let start = offset as usize;
    data.get(start..start + len)
        .ok_or_else(|| error!(ErrorCode::MissingAttestation))
}

/// Parses Ed25519 precompile instruction data carrying exactly one
/// signature whose key, signature and message live in the same instruction.
pub fn parse_ed25519_instruction(data: &[u8]) -> Result<Ed25519Attestation> {
    require!(data.len() >= ED25519_HEADER_LEN, ErrorCode::MissingAttestation);
    require!(data[0] == 1, ErrorCode::MissingAttestation);

    let signature_offset = read_u16(data, 2)?;
    let signature_ix = read_u16(data, 4)?;
    let pubkey_offset = read_u16(data, 6)?;
    let pubkey_ix = read_u16(data, 8)?;
    let message_offset = read_u16(data, 10)?;
    let message_size = read_u16(data, 12)?;
    let message_ix = read_u16(data, 14)?;

    require!(
        signature_ix == CURRENT_INSTRUCTION
            && pubkey_ix == CURRENT_INSTRUCTION
            && message_ix == CURRENT_INSTRUCTION,
        ErrorCode::MissingAttestation
    );

    let pubkey = slice_at(data, pubkey_offset, ED25519_PUBKEY_LEN)?;
    let signature = slice_at(data, signature_offset, ED25519_SIGNATURE_LEN)?;
    let message = slice_at(data, message_offset, message_size as usize)?;

    let mut signer = [0u8; 32];
    signer.copy_from_slice(pubkey);
    let mut sig = [0u8; 64];
    sig.copy_from_slice(signature);

    Ok(Ed25519Attestation {
        signer: Pubkey::new_from_array(signer),
        signature: sig,
        message: message.to_vec(),
    })
}

/// Builds precompile instruction data in the layout `parse_ed25519_instruction` accepts.
pub fn ed25519_instruction_data(signer: &Pubkey, signature: &[u8; 64], message: &[u8]) -> Vec<u8> {
    let pubkey_offset = ED25519_HEADER_LEN;
    let signature_offset = pubkey_offset + ED25519_PUBKEY_LEN;
    let message_offset = signature_offset + ED25519_SIGNATURE_LEN;

    let mut data = Vec::with_capacity(message_offset + message.len());
    data.push(1);
    data.push(0);
    for field in [
        signature_offset as u16,
        CURRENT_INSTRUCTION,
        pubkey_offset as u16,
        CURRENT_INSTRUCTION,
        message_offset as u16,
        message.len() as u16,
        CURRENT_INSTRUCTION,
    ] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.extend_from_slice(signer.as_ref());
    data.extend_from_slice(signature);
    data.extend_from_slice(message);
    data
}

/// Loads the Ed25519 precompile instruction placed directly before the
/// currently executing instruction.
pub fn load_preceding_attestation(instructions_sysvar: &AccountInfo) -> Result<Ed25519Attestation> {
    let current = load_current_index_checked(instructions_sysvar)?;
    require!(current > 0, ErrorCode::MissingAttestation);

    let ix = load_instruction_at_checked((current - 1) as usize, instructions_sysvar)?;
    require_keys_eq!(ix.program_id, ed25519_program::ID, ErrorCode::MissingAttestation);

    parse_ed25519_instruction(&ix.data)
}

// ============================================================================
// Input intake
// ============================================================================

pub fn input_digest(program_id: &Pubkey, user: &Pubkey, handles: &[Handle]) -> [u8; 32] {
    let mut material: Vec<&[u8]> = vec![INPUT_DOMAIN, program_id.as_ref(), user.as_ref()];
    for handle in handles {
        material.push(&handle.0);
    }
    hashv(&material).to_bytes()
}

/// Accepts externally encrypted amounts for `user`.
///
/// The input verifier must have signed the digest binding the handles to
/// this program and this user, and the caller-supplied proof must be that
/// signature. All handles must be encrypted 64-bit integers.
pub fn intake_inputs(
    attestation: &Ed25519Attestation,
    input_verifier: &Pubkey,
    program_id: &Pubkey,
    user: &Pubkey,
    handles: &[Handle],
    input_proof: &[u8],
) -> Result<Vec<Handle>> {
    require_keys_eq!(attestation.signer, *input_verifier, ErrorCode::InvalidInputProof);
    require!(
        input_proof == attestation.signature.as_slice(),
        ErrorCode::InvalidInputProof
    );
    require!(
        attestation.message.as_slice() == input_digest(program_id, user, handles).as_slice(),
        ErrorCode::InvalidInputProof
    );
    require!(
        handles
            .iter()
            .all(|h| h.fhe_type() == Some(FheType::Uint64)),
        ErrorCode::InvalidInputProof
    );
    Ok(handles.to_vec())
}

// ============================================================================
// Decryption results
// ============================================================================

pub fn decryption_digest(
    program_id: &Pubkey,
    request_id: u64,
    handles: &[Handle],
    cleartexts: &[u8],
) -> [u8; 32] {
    let id = request_id.to_le_bytes();
    let mut material: Vec<&[u8]> = vec![DECRYPTION_DOMAIN, program_id.as_ref(), &id[..]];
    for handle in handles {
        material.push(&handle.0);
    }
    material.push(cleartexts);
    hashv(&material).to_bytes()
}

pub fn verify_decryption_proof(
    attestation: &Ed25519Attestation,
    kms_signer: &Pubkey,
    program_id: &Pubkey,
    request_id: u64,
    handles: &[Handle],
    cleartexts: &[u8],
    decryption_proof: &[u8],
) -> Result<()> {
    require_keys_eq!(attestation.signer, *kms_signer, ErrorCode::InvalidDecryptionProof);
    require!(
        decryption_proof == attestation.signature.as_slice(),
        ErrorCode::InvalidDecryptionProof
    );
    let expected = decryption_digest(program_id, request_id, handles, cleartexts);
    require!(
        attestation.message.as_slice() == expected.as_slice(),
        ErrorCode::InvalidDecryptionProof
    );
    Ok(())
}

/// Decodes exactly `count` big-endian 128-bit values.
pub fn decode_cleartexts(bytes: &[u8], count: usize) -> Result<Vec<u128>> {
    require!(
        bytes.len() == count * CLEARTEXT_WIDTH,
        ErrorCode::InvalidCleartexts
    );
    Ok(bytes
        .chunks_exact(CLEARTEXT_WIDTH)
        .map(|chunk| {
            let mut word = [0u8; CLEARTEXT_WIDTH];
            word.copy_from_slice(chunk);
            u128::from_be_bytes(word)
        })
        .collect())
}

pub fn encode_cleartexts(values: &[u128]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}
