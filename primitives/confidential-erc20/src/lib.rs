//! Types and traits for confidential ERC20 crates
#![cfg_attr(not(feature = "std"), no_std)]

use frame_support::{BoundedVec, pallet_prelude::*};
use sp_core::U256;
use sp_std::prelude::*;

/// Opaque on-chain reference to a ciphertext held by the FHE backend.
pub type Handle = [u8; 32];

/// Proof blob attached to encrypted inputs. One proof covers every handle
/// produced by a single client-side `encrypt()`.
pub type MaxProofLen = ConstU32<8192>;
pub type InputProof = BoundedVec<u8, MaxProofLen>;

/// Public key a reencrypted value is sealed to.
pub type MaxPubKeyLen = ConstU32<64>;
pub type PublicKeyBytes = BoundedVec<u8, MaxPubKeyLen>;

/// A 256-bit plaintext sealed to a user public key by the reencryption service.
pub type SealedValue = [u8; 32];

/// Encrypted value types understood by the backend.
///
/// Discriminants follow the fhevm type tags so handles and ciphertexts can be
/// inspected without a lookup table.
#[derive(
    Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen, RuntimeDebug,
)]
pub enum FheType {
    Bool,
    Uint64,
    Uint256,
}

impl FheType {
    pub const fn tag(self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint64 => 5,
            FheType::Uint256 => 8,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FheType::Bool),
            5 => Some(FheType::Uint64),
            8 => Some(FheType::Uint256),
            _ => None,
        }
    }

    /// Largest plaintext representable by this type.
    pub fn max_value(self) -> U256 {
        match self {
            FheType::Bool => U256::one(),
            FheType::Uint64 => U256::from(u64::MAX),
            FheType::Uint256 => U256::MAX,
        }
    }
}

/// Ciphertext engine the gateway pallet delegates to. Implement in the runtime.
///
/// All inputs and outputs are serialized ciphertexts; the layout is owned by
/// the implementation. Arithmetic wraps modulo the width of the operand type.
pub trait FheCoprocessor {
    type Error: core::fmt::Debug;

    /// Check that `proof` binds `handle` to the (`contract`, `user`) pair and
    /// return the ciphertext the handle stands for.
    fn verify_input(
        contract: &[u8],
        user: &[u8],
        handle: &Handle,
        proof: &[u8],
    ) -> Result<Vec<u8>, Self::Error>;

    /// Encrypt a public constant (no proof needed, value is already public).
    fn trivial_encrypt(value: U256, ty: FheType) -> Result<Vec<u8>, Self::Error>;

    fn type_of(ct: &[u8]) -> Result<FheType, Self::Error>;

    fn add(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, Self::Error>;
    fn sub(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, Self::Error>;
    /// Encrypted `lhs <= rhs`, returns an encrypted bool.
    fn le(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, Self::Error>;
    /// Boolean conjunction of two encrypted bools.
    fn and(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>, Self::Error>;
    /// `cond ? if_true : if_false` without revealing `cond`.
    fn select(cond: &[u8], if_true: &[u8], if_false: &[u8]) -> Result<Vec<u8>, Self::Error>;

    /// Threshold decryption oracle: reveals the plaintext publicly.
    fn decrypt(ct: &[u8]) -> Result<U256, Self::Error>;

    /// Re-encrypt `ct` so only the holder of the key behind `public_key` can read it.
    fn reencrypt(ct: &[u8], public_key: &[u8]) -> Result<SealedValue, Self::Error>;
}

/// Direct plaintext access, bypassing every ACL. Only mocked coprocessors
/// implement this; gateway functions built on it do not exist otherwise.
pub trait DebugDecrypt {
    fn debug_decrypt(ct: &[u8]) -> Option<U256>;
}

/// Gateway capability consumed by token pallets. Holds the ciphertexts and
/// the per-handle ACL; never reveals plaintext except through `decrypt`.
pub trait FheBackend<AccountId> {
    /// Validate an external encrypted input and take ownership of its handle.
    /// Each input handle can be consumed once.
    fn verify_input(
        contract: &AccountId,
        user: &AccountId,
        handle: Handle,
        proof: &InputProof,
        ty: FheType,
    ) -> Result<Handle, DispatchError>;

    fn trivial_encrypt(value: U256, ty: FheType) -> Result<Handle, DispatchError>;

    fn add(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError>;
    fn sub(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError>;
    fn le(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError>;
    fn and(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError>;
    fn select(cond: &Handle, if_true: &Handle, if_false: &Handle)
        -> Result<Handle, DispatchError>;

    /// Grant `who` persistent access to `handle`.
    fn allow(handle: &Handle, who: &AccountId) -> DispatchResult;
    fn is_allowed(handle: &Handle, who: &AccountId) -> bool;

    /// Public decryption requested by an account on the handle's ACL.
    fn decrypt(handle: &Handle, requester: &AccountId) -> Result<U256, DispatchError>;
}

/// Confidential token ledger as seen by other pallets (e.g. the wrapper).
pub trait ConfidentialLedger<AccountId, AssetId, Balance> {
    /// Address encrypted inputs for `asset` are bound to. Also the custody
    /// account of wrapped tokens.
    fn contract_account(asset: AssetId) -> AccountId;

    fn exists(asset: AssetId) -> bool;

    fn create_token(
        asset: AssetId,
        owner: &AccountId,
        name: Vec<u8>,
        symbol: Vec<u8>,
        decimals: u8,
    ) -> DispatchResult;

    fn total_supply(asset: AssetId) -> Balance;
    fn balance_of(asset: AssetId, who: &AccountId) -> Option<Handle>;

    /// Credit a public `amount` to `to`, bypassing the token owner check.
    fn mint(asset: AssetId, to: &AccountId, amount: Balance) -> DispatchResult;

    /// Debit a public `amount` from `from`. Fails without side effects when the
    /// encrypted balance is lower than `amount`.
    fn burn(asset: AssetId, from: &AccountId, amount: Balance) -> DispatchResult;
}

/// Plain (non-confidential) side of a wrapped token.
/// Semantics:
/// - `transfer_approved` = spend an allowance `owner` gave to `delegate`,
///   moving `amount` from `owner` to `dest`.
/// - `transfer` = move `amount` from `from` to `to`.
pub trait PublicToken<AccountId, AssetId, Balance> {
    fn exists(asset: AssetId) -> bool;
    fn balance(asset: AssetId, who: &AccountId) -> Balance;
    fn total_issuance(asset: AssetId) -> Balance;
    /// Smallest balance an account of `asset` may hold.
    fn minimum_balance(asset: AssetId) -> Balance;

    fn transfer_approved(
        asset: AssetId,
        owner: &AccountId,
        delegate: &AccountId,
        dest: &AccountId,
        amount: Balance,
    ) -> DispatchResult;

    /// Plain transfer that never reaps `from`.
    fn transfer(asset: AssetId, from: &AccountId, to: &AccountId, amount: Balance)
        -> DispatchResult;
}

// ACL

#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, scale_info::TypeInfo, RuntimeDebug)]
pub enum Op {
    Mint,
    Transfer,
    TransferFrom,
    Approve,
    Wrap,   // public -> confidential
    Unwrap, // confidential -> public
}

#[derive(Encode, Decode, scale_info::TypeInfo, RuntimeDebug)]
pub struct AclCtx<Balance, AccountId, AssetId> {
    /// Plaintext amount if the operation has one.
    pub amount: Option<Balance>,
    pub asset: AssetId,
    /// Origin who signed the extrinsic.
    pub caller: AccountId,
    /// On-behalf-of account (transfer_from).
    pub owner: Option<AccountId>,
    /// Receiver / spender if applicable.
    pub counterparty: Option<AccountId>,
}

pub trait AclProvider<AccountId, AssetId, Balance> {
    /// Return Ok(()) to allow; Err(..) to block.
    fn authorize(op: Op, ctx: &AclCtx<Balance, AccountId, AssetId>) -> Result<(), DispatchError>;
}

impl<AccountId, AssetId, Balance> AclProvider<AccountId, AssetId, Balance> for () {
    #[inline]
    fn authorize(_: Op, _: &AclCtx<Balance, AccountId, AssetId>) -> Result<(), DispatchError> {
        Ok(())
    }
}
