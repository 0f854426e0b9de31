//! Plaintext FHE coprocessor.
//!
//! Ciphertexts carry their plaintext in the clear so the gateway pallet and
//! the token pallets can be exercised without an FHE library. The byte layouts
//! below are shared with `fhevm-client`, which builds inputs and unseals
//! reencrypted values against them.
//!
//! ```text
//! ciphertext   : type_tag(1) || value_le(32)
//! input proof  : count(1) || salt(32) || handles(32 * count)
//!                || ciphertexts(33 * count) || binding(32)
//! input handle : blake2_256("fhevm/input" || salt || contract || user || index || ciphertext)
//!                with byte 30 = type tag, byte 31 = HANDLE_VERSION
//! binding      : blake2_256("fhevm/input-binding" || salt || contract || user || handles)
//! sealed value : value_le(32) XOR blake2_256("fhevm/seal" || public_key)
//! ```
//!
//! Never wire this into a production runtime: `DebugDecrypt` exposes every value.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;


use alloc::vec::Vec;
use blake2::{Blake2b, Digest, digest::consts::U32};
use confidential_erc20_primitives::{DebugDecrypt, FheCoprocessor, FheType, Handle, SealedValue};
use sp_core::U256;

pub const CIPHERTEXT_LEN: usize = 33;
pub const SALT_LEN: usize = 32;
pub const BINDING_LEN: usize = 32;
pub const HANDLE_VERSION: u8 = 0;
/// Values a single input proof may carry.
pub const MAX_INPUT_VALUES: usize = 8;

const INPUT_DOMAIN: &[u8] = b"fhevm/input";
const BINDING_DOMAIN: &[u8] = b"fhevm/input-binding";
const SEAL_DOMAIN: &[u8] = b"fhevm/seal";
const KEYPAIR_DOMAIN: &[u8] = b"fhevm/keypair";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Malformed,
    UnknownType,
    TypeMismatch,
    ValueOutOfRange,
    TooManyValues,
    HandleNotInProof,
    HandleMismatch,
    BindingMismatch,
}

fn blake2_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Reduce `value` to the width of `ty`.
fn wrap(ty: FheType, value: U256) -> U256 {
    match ty {
        FheType::Bool => value & U256::one(),
        FheType::Uint64 => value & U256::from(u64::MAX),
        FheType::Uint256 => value,
    }
}

pub fn encode_ciphertext(ty: FheType, value: U256) -> Vec<u8> {
    let mut out = Vec::with_capacity(CIPHERTEXT_LEN);
    out.push(ty.tag());
    out.extend_from_slice(&value.to_little_endian());
    out
}

pub fn decode_ciphertext(ct: &[u8]) -> Result<(FheType, U256), MockError> {
    if ct.len() != CIPHERTEXT_LEN {
        return Err(MockError::Malformed);
    }
    let ty = FheType::from_tag(ct[0]).ok_or(MockError::UnknownType)?;
    let value = U256::from_little_endian(&ct[1..]);
    if value > ty.max_value() {
        return Err(MockError::ValueOutOfRange);
    }
    Ok((ty, value))
}

pub fn input_handle(
    contract: &[u8],
    user: &[u8],
    salt: &[u8; SALT_LEN],
    index: u8,
    ct: &[u8],
) -> Result<Handle, MockError> {
    let (ty, _) = decode_ciphertext(ct)?;
    let mut handle = blake2_256(&[INPUT_DOMAIN, salt, contract, user, &[index], ct]);
    handle[30] = ty.tag();
    handle[31] = HANDLE_VERSION;
    Ok(handle)
}

pub fn input_binding(
    contract: &[u8],
    user: &[u8],
    salt: &[u8; SALT_LEN],
    handles: &[Handle],
) -> [u8; BINDING_LEN] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(BINDING_DOMAIN);
    hasher.update(salt);
    hasher.update(contract);
    hasher.update(user);
    for h in handles {
        hasher.update(h);
    }
    hasher.finalize().into()
}

/// Encrypt `values` for (`contract`, `user`) and produce their handles plus
/// one proof covering all of them.
pub fn build_input(
    contract: &[u8],
    user: &[u8],
    salt: &[u8; SALT_LEN],
    values: &[(FheType, U256)],
) -> Result<(Vec<Handle>, Vec<u8>), MockError> {
    if values.is_empty() {
        return Err(MockError::Malformed);
    }
    if values.len() > MAX_INPUT_VALUES {
        return Err(MockError::TooManyValues);
    }

    let mut cts = Vec::with_capacity(values.len());
    for (ty, value) in values {
        if *value > ty.max_value() {
            return Err(MockError::ValueOutOfRange);
        }
        cts.push(encode_ciphertext(*ty, *value));
    }

    let mut handles = Vec::with_capacity(cts.len());
    for (i, ct) in cts.iter().enumerate() {
        handles.push(input_handle(contract, user, salt, i as u8, ct)?);
    }

    let binding = input_binding(contract, user, salt, &handles);

    let mut proof =
        Vec::with_capacity(1 + SALT_LEN + handles.len() * (32 + CIPHERTEXT_LEN) + BINDING_LEN);
    proof.push(handles.len() as u8);
    proof.extend_from_slice(salt);
    for h in &handles {
        proof.extend_from_slice(h);
    }
    for ct in &cts {
        proof.extend_from_slice(ct);
    }
    proof.extend_from_slice(&binding);
    Ok((handles, proof))
}

struct ParsedProof<'a> {
    salt: [u8; SALT_LEN],
    handles: Vec<Handle>,
    cts: Vec<&'a [u8]>,
    binding: [u8; BINDING_LEN],
}

fn parse_proof(proof: &[u8]) -> Result<ParsedProof<'_>, MockError> {
    let (&count, rest) = proof.split_first().ok_or(MockError::Malformed)?;
    let count = count as usize;
    if count == 0 || count > MAX_INPUT_VALUES {
        return Err(MockError::Malformed);
    }
    if rest.len() != SALT_LEN + count * (32 + CIPHERTEXT_LEN) + BINDING_LEN {
        return Err(MockError::Malformed);
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&rest[..SALT_LEN]);
    let mut off = SALT_LEN;

    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let mut h = [0u8; 32];
        h.copy_from_slice(&rest[off..off + 32]);
        handles.push(h);
        off += 32;
    }

    let mut cts = Vec::with_capacity(count);
    for _ in 0..count {
        cts.push(&rest[off..off + CIPHERTEXT_LEN]);
        off += CIPHERTEXT_LEN;
    }

    let mut binding = [0u8; BINDING_LEN];
    binding.copy_from_slice(&rest[off..]);
    Ok(ParsedProof { salt, handles, cts, binding })
}

/// Key a sealed value is bound to, derived from the client's secret.
pub fn public_key_of(secret: &[u8; 32]) -> [u8; 32] {
    blake2_256(&[KEYPAIR_DOMAIN, secret])
}

pub fn seal(value: U256, public_key: &[u8]) -> SealedValue {
    let pad = blake2_256(&[SEAL_DOMAIN, public_key]);
    let mut out = value.to_little_endian();
    for (b, p) in out.iter_mut().zip(pad.iter()) {
        *b ^= p;
    }
    out
}

pub fn unseal(sealed: &SealedValue, public_key: &[u8]) -> U256 {
    let pad = blake2_256(&[SEAL_DOMAIN, public_key]);
    let mut plain = *sealed;
    for (b, p) in plain.iter_mut().zip(pad.iter()) {
        *b ^= p;
    }
    U256::from_little_endian(&plain)
}

/// Stateless plaintext coprocessor.
#[derive(Default)]
pub struct PlaintextCoprocessor;

impl PlaintextCoprocessor {
    fn integer_pair(lhs: &[u8], rhs: &[u8]) -> Result<(FheType, U256, U256), MockError> {
        let (lt, lv) = decode_ciphertext(lhs)?;
        let (rt, rv) = decode_ciphertext(rhs)?;
        if lt != rt || lt == FheType::Bool {
            return Err(MockError::TypeMismatch);
        }
        Ok((lt, lv, rv))
    }

    fn bool_of(ct: &[u8]) -> Result<bool, MockError> {
        match decode_ciphertext(ct)? {
            (FheType::Bool, v) => Ok(!v.is_zero()),
            _ => Err(MockError::TypeMismatch),
        }
    }
}

impl FheCoprocessor for PlaintextCoprocessor {
    type Error = MockError;

    fn verify_input(
        contract: &[u8],
        user: &[u8],
        handle: &Handle,
        proof: &[u8],
    ) -> Result<Vec<u8>, MockError> {
        let parsed = parse_proof(proof)?;
        let expected = input_binding(contract, user, &parsed.salt, &parsed.handles);
        if expected != parsed.binding {
            return Err(MockError::BindingMismatch);
        }
        let index = parsed
            .handles
            .iter()
            .position(|h| h == handle)
            .ok_or(MockError::HandleNotInProof)?;
        let ct = parsed.cts[index];
        // The handle must commit to the ciphertext it is shipped with.
        if input_handle(contract, user, &parsed.salt, index as u8, ct)? != *handle {
            return Err(MockError::HandleMismatch);
        }
        Ok(ct.to_vec())
    }

    fn trivial_encrypt(value: U256, ty: FheType) -> Result<Vec<u8>, MockError> {
        if value > ty.max_value() {
            return Err(MockError::ValueOutOfRange);
        }
        Ok(encode_ciphertext(ty, value))
    }

    fn type_of(ct: &[u8]) -> Result<FheType, MockError> {
        decode_ciphertext(ct).map(|(ty, _)| ty)
    }

    fn add(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, MockError> {
        let (ty, a, b) = Self::integer_pair(lhs, rhs)?;
        Ok(encode_ciphertext(ty, wrap(ty, a.overflowing_add(b).0)))
    }

    fn sub(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, MockError> {
        let (ty, a, b) = Self::integer_pair(lhs, rhs)?;
        Ok(encode_ciphertext(ty, wrap(ty, a.overflowing_sub(b).0)))
    }

    fn le(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, MockError> {
        let (_, a, b) = Self::integer_pair(lhs, rhs)?;
        Ok(encode_ciphertext(FheType::Bool, U256::from((a <= b) as u8)))
    }

    fn and(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, MockError> {
        let both = Self::bool_of(lhs)? && Self::bool_of(rhs)?;
        Ok(encode_ciphertext(FheType::Bool, U256::from(both as u8)))
    }

    fn select(cond: &[u8], if_true: &[u8], if_false: &[u8]) -> Result<Vec<u8>, MockError> {
        let c = Self::bool_of(cond)?;
        let (tt, tv) = decode_ciphertext(if_true)?;
        let (ft, fv) = decode_ciphertext(if_false)?;
        if tt != ft {
            return Err(MockError::TypeMismatch);
        }
        Ok(encode_ciphertext(tt, if c { tv } else { fv }))
    }

    fn decrypt(ct: &[u8]) -> Result<U256, MockError> {
        decode_ciphertext(ct).map(|(_, v)| v)
    }

    fn reencrypt(ct: &[u8], public_key: &[u8]) -> Result<SealedValue, MockError> {
        let (_, value) = decode_ciphertext(ct)?;
        Ok(seal(value, public_key))
    }
}

impl DebugDecrypt for PlaintextCoprocessor {
    fn debug_decrypt(ct: &[u8]) -> Option<U256> {
        decode_ciphertext(ct).ok().map(|(_, v)| v)
    }
}
