//! # pallet-fhevm
//!
//! Encryption gateway backend for confidential tokens. The pallet owns every
//! ciphertext and hands out opaque 32-byte [`Handle`]s instead:
//!
//! - **Encrypted inputs**: a client encrypts values for a (contract, user) pair
//!   and submits handles with one proof. [`FheBackend::verify_input`] checks the
//!   binding through the coprocessor and consumes the handle; replaying it fails.
//! - **Homomorphic ops**: `add`, `sub`, `le`, `and`, `select` run on the
//!   configured [`FheCoprocessor`] and store the result under a fresh handle.
//! - **ACL**: every handle carries the set of accounts allowed to use it.
//!   Token pallets grant balances to their contract account and to the holder.
//! - **Reencryption**: [`Pallet::reencrypt`] seals a value to a user key when
//!   both the user and the contract are on the handle's ACL.
//! - **Debug decryption**: [`Pallet::debug_decrypt`] only exists when the
//!   coprocessor implements [`DebugDecrypt`], i.e. on mocked chains.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;


use alloc::vec::Vec;
use frame_support::pallet_prelude::*;
use frame_system::pallet_prelude::*;
use parity_scale_codec::Encode;
use sp_core::U256;

use confidential_erc20_primitives::{
    DebugDecrypt, FheBackend, FheCoprocessor, FheType, Handle, InputProof, SealedValue,
};

pub use pallet::*;

pub(crate) const LOG_TARGET: &str = "runtime::fhevm";

/// Version byte stored in the last byte of every handle this pallet mints.
pub const HANDLE_VERSION: u8 = 0;

/// Why a reencryption request was refused.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, RuntimeDebug)]
pub enum ReencryptError {
    /// The requesting user is not on the handle's ACL.
    NotAuthorized,
    /// The contract the request is scoped to is not on the handle's ACL.
    ContractNotAuthorized,
    /// Reencryption is scoped to a user-vs-contract relationship.
    UserIsContract,
    UnknownHandle,
    Coprocessor,
}

impl ReencryptError {
    pub fn message(&self) -> &'static str {
        match self {
            ReencryptError::NotAuthorized => "User is not authorized to reencrypt this handle!",
            ReencryptError::ContractNotAuthorized => {
                "dapp contract is not authorized to reencrypt this handle!"
            }
            ReencryptError::UserIsContract => {
                "userAddress should not be equal to contractAddress when requesting reencryption!"
            }
            ReencryptError::UnknownHandle => "handle does not exist",
            ReencryptError::Coprocessor => "coprocessor failed to reencrypt the handle",
        }
    }
}

impl core::fmt::Display for ReencryptError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Clone, Copy)]
enum Operation {
    TrivialEncrypt,
    Add,
    Sub,
    Le,
    And,
    Select,
}

impl Operation {
    fn tag(self) -> u8 {
        match self {
            Operation::TrivialEncrypt => 0,
            Operation::Add => 1,
            Operation::Sub => 2,
            Operation::Le => 3,
            Operation::And => 4,
            Operation::Select => 5,
        }
    }
}

#[frame_support::pallet]
pub mod pallet {
    use super::*;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Ciphertext engine (runtime supplies an implementation).
        type Coprocessor: FheCoprocessor;

        /// Upper bound on a serialized ciphertext.
        #[pallet::constant]
        type MaxCiphertextLen: Get<u32>;

        type WeightInfo: WeightInfo;
    }

    pub trait WeightInfo {
        fn allow() -> Weight;
        fn request_decryption() -> Weight;
    }

    impl WeightInfo for () {
        fn allow() -> Weight {
            Weight::from_parts(10_000, 0)
        }
        fn request_decryption() -> Weight {
            Weight::from_parts(40_000, 0)
        }
    }

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    /// Handle -> ciphertext. Consumed encrypted inputs stay here, which is what
    /// makes a second submission of the same input fail.
    #[pallet::storage]
    pub type Ciphertexts<T: Config> =
        StorageMap<_, Identity, Handle, BoundedVec<u8, T::MaxCiphertextLen>, OptionQuery>;

    /// (handle, account) -> allowed.
    #[pallet::storage]
    pub type Acl<T: Config> = StorageDoubleMap<
        _,
        Identity,
        Handle,
        Blake2_128Concat,
        T::AccountId,
        (),
        OptionQuery,
    >;

    /// Salt for computed handles.
    #[pallet::storage]
    pub type HandleNonce<T> = StorageValue<_, u64, ValueQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        InputVerified {
            handle: Handle,
            contract: T::AccountId,
            user: T::AccountId,
        },
        AccessGranted {
            handle: Handle,
            who: T::AccountId,
        },
        Decrypted {
            handle: Handle,
            value: U256,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        UnknownHandle,
        InvalidInputProof,
        InputAlreadyUsed,
        TypeMismatch,
        CiphertextTooLarge,
        NotAllowed,
        /// Generic coprocessor failure on a homomorphic op.
        CoprocessorError,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Share a handle the caller is allowed on with `who`.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::allow())]
        pub fn allow(origin: OriginFor<T>, handle: Handle, who: T::AccountId) -> DispatchResult {
            let caller = ensure_signed(origin)?;
            ensure!(Ciphertexts::<T>::contains_key(handle), Error::<T>::UnknownHandle);
            ensure!(Acl::<T>::contains_key(handle, &caller), Error::<T>::NotAllowed);
            <Self as FheBackend<T::AccountId>>::allow(&handle, &who)
        }

        /// Publicly reveal the value behind a handle the caller is allowed on.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::request_decryption())]
        pub fn request_decryption(origin: OriginFor<T>, handle: Handle) -> DispatchResult {
            let caller = ensure_signed(origin)?;
            let value = <Self as FheBackend<T::AccountId>>::decrypt(&handle, &caller)?;
            Self::deposit_event(Event::Decrypted { handle, value });
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        pub fn ciphertext(handle: &Handle) -> Result<Vec<u8>, DispatchError> {
            Ciphertexts::<T>::get(handle)
                .map(|ct| ct.into_inner())
                .ok_or_else(|| Error::<T>::UnknownHandle.into())
        }

        pub fn handle_type(handle: &Handle) -> Option<FheType> {
            let ct = Ciphertexts::<T>::get(handle)?;
            T::Coprocessor::type_of(&ct).ok()
        }

        /// Seal the value behind `handle` to `public_key` for `user`, acting
        /// for `contract`.
        pub fn reencrypt(
            user: &T::AccountId,
            handle: &Handle,
            contract: &T::AccountId,
            public_key: &[u8],
        ) -> Result<SealedValue, ReencryptError> {
            if user == contract {
                return Err(ReencryptError::UserIsContract);
            }
            let ct = Ciphertexts::<T>::get(handle).ok_or(ReencryptError::UnknownHandle)?;
            if !Acl::<T>::contains_key(handle, user) {
                log::debug!(
                    target: LOG_TARGET,
                    "reencrypt refused: {:?} not on acl of {:?}",
                    user,
                    handle
                );
                return Err(ReencryptError::NotAuthorized);
            }
            if !Acl::<T>::contains_key(handle, contract) {
                return Err(ReencryptError::ContractNotAuthorized);
            }
            T::Coprocessor::reencrypt(&ct, public_key).map_err(|e| {
                log::warn!(target: LOG_TARGET, "coprocessor reencrypt failed: {:?}", e);
                ReencryptError::Coprocessor
            })
        }

        fn store(handle: Handle, ct: Vec<u8>) -> DispatchResult {
            let bounded: BoundedVec<u8, T::MaxCiphertextLen> =
                ct.try_into().map_err(|_| Error::<T>::CiphertextTooLarge)?;
            Ciphertexts::<T>::insert(handle, bounded);
            Ok(())
        }

        fn store_computed(
            op: Operation,
            operands: &[&Handle],
            ct: Vec<u8>,
        ) -> Result<Handle, DispatchError> {
            let ty = T::Coprocessor::type_of(&ct).map_err(|_| Error::<T>::CoprocessorError)?;
            let nonce = HandleNonce::<T>::mutate(|n| {
                let cur = *n;
                *n = n.wrapping_add(1);
                cur
            });

            let mut preimage = Vec::with_capacity(9 + operands.len() * 32 + 8);
            preimage.extend_from_slice(b"fhevm/op");
            preimage.push(op.tag());
            for h in operands {
                preimage.extend_from_slice(&h[..]);
            }
            preimage.extend_from_slice(&nonce.to_le_bytes());

            let mut handle = sp_io::hashing::blake2_256(&preimage);
            handle[30] = ty.tag();
            handle[31] = HANDLE_VERSION;
            Self::store(handle, ct)?;
            log::trace!(target: LOG_TARGET, "op {} -> {:?}", op.tag(), handle);
            Ok(handle)
        }

        fn binary(op: Operation, lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError> {
            let a = Self::ciphertext(lhs)?;
            let b = Self::ciphertext(rhs)?;
            let out = match op {
                Operation::Add => T::Coprocessor::add(&a, &b),
                Operation::Sub => T::Coprocessor::sub(&a, &b),
                Operation::Le => T::Coprocessor::le(&a, &b),
                Operation::And => T::Coprocessor::and(&a, &b),
                Operation::TrivialEncrypt | Operation::Select => {
                    return Err(Error::<T>::CoprocessorError.into())
                }
            }
            .map_err(|e| {
                log::warn!(target: LOG_TARGET, "coprocessor op {} failed: {:?}", op.tag(), e);
                Error::<T>::CoprocessorError
            })?;
            Self::store_computed(op, &[lhs, rhs], out)
        }
    }

    // Only mocked coprocessors expose plaintext.
    impl<T: Config> Pallet<T>
    where
        T::Coprocessor: DebugDecrypt,
    {
        /// Plaintext behind `handle`, ignoring the ACL.
        pub fn debug_decrypt(handle: &Handle) -> Option<U256> {
            let ct = Ciphertexts::<T>::get(handle)?;
            <T::Coprocessor as DebugDecrypt>::debug_decrypt(&ct)
        }
    }

    impl<T: Config> FheBackend<T::AccountId> for Pallet<T> {
        fn verify_input(
            contract: &T::AccountId,
            user: &T::AccountId,
            handle: Handle,
            proof: &InputProof,
            ty: FheType,
        ) -> Result<Handle, DispatchError> {
            ensure!(!Ciphertexts::<T>::contains_key(handle), Error::<T>::InputAlreadyUsed);

            let ct =
                T::Coprocessor::verify_input(&contract.encode(), &user.encode(), &handle, proof)
                    .map_err(|e| {
                        log::warn!(target: LOG_TARGET, "input {:?} rejected: {:?}", handle, e);
                        Error::<T>::InvalidInputProof
                    })?;
            let actual = T::Coprocessor::type_of(&ct).map_err(|_| Error::<T>::InvalidInputProof)?;
            ensure!(actual == ty, Error::<T>::TypeMismatch);

            Self::store(handle, ct)?;
            Acl::<T>::insert(handle, contract, ());

            Self::deposit_event(Event::InputVerified {
                handle,
                contract: contract.clone(),
                user: user.clone(),
            });
            Ok(handle)
        }

        fn trivial_encrypt(value: U256, ty: FheType) -> Result<Handle, DispatchError> {
            let ct = T::Coprocessor::trivial_encrypt(value, ty)
                .map_err(|_| Error::<T>::CoprocessorError)?;
            Self::store_computed(Operation::TrivialEncrypt, &[], ct)
        }

        fn add(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError> {
            Self::binary(Operation::Add, lhs, rhs)
        }

        fn sub(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError> {
            Self::binary(Operation::Sub, lhs, rhs)
        }

        fn le(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError> {
            Self::binary(Operation::Le, lhs, rhs)
        }

        fn and(lhs: &Handle, rhs: &Handle) -> Result<Handle, DispatchError> {
            Self::binary(Operation::And, lhs, rhs)
        }

        fn select(
            cond: &Handle,
            if_true: &Handle,
            if_false: &Handle,
        ) -> Result<Handle, DispatchError> {
            let c = Self::ciphertext(cond)?;
            let t = Self::ciphertext(if_true)?;
            let f = Self::ciphertext(if_false)?;
            let out = T::Coprocessor::select(&c, &t, &f).map_err(|e| {
                log::warn!(target: LOG_TARGET, "coprocessor select failed: {:?}", e);
                Error::<T>::CoprocessorError
            })?;
            Self::store_computed(Operation::Select, &[cond, if_true, if_false], out)
        }

        fn allow(handle: &Handle, who: &T::AccountId) -> DispatchResult {
            ensure!(Ciphertexts::<T>::contains_key(handle), Error::<T>::UnknownHandle);
            if !Acl::<T>::contains_key(handle, who) {
                Acl::<T>::insert(handle, who, ());
                Self::deposit_event(Event::AccessGranted {
                    handle: *handle,
                    who: who.clone(),
                });
            }
            Ok(())
        }

        fn is_allowed(handle: &Handle, who: &T::AccountId) -> bool {
            Acl::<T>::contains_key(handle, who)
        }

        fn decrypt(handle: &Handle, requester: &T::AccountId) -> Result<U256, DispatchError> {
            let ct = Self::ciphertext(handle)?;
            ensure!(Acl::<T>::contains_key(handle, requester), Error::<T>::NotAllowed);
            T::Coprocessor::decrypt(&ct).map_err(|_| Error::<T>::CoprocessorError.into())
        }
    }
}
