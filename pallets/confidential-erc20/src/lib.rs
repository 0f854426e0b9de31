//! # pallet-confidential-erc20
//!
//! ERC20-style tokens whose balances and allowances are encrypted handles held
//! by an [`FheBackend`]. Total supply and mint amounts stay public.
//!
//! Each token has a *contract account* derived from `PalletId` and the asset
//! id. Encrypted inputs are bound to that account, and every balance or
//! allowance handle the pallet writes is shared with it and with the accounts
//! entitled to read it.
//!
//! Transfers never reveal whether they moved value: when the sender's balance
//! (or the spender's allowance) is too low the pallet selects an encrypted zero
//! and the call still succeeds.
//!
//! Other pallets reach the ledger through [`ConfidentialLedger`]; the wrapper
//! pallet uses it to back wrapped tokens with a plain asset.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;
#[cfg(test)]
mod mock;

use frame_support::{PalletId, pallet_prelude::*};
use frame_system::pallet_prelude::*;
use sp_core::U256;
use sp_runtime::traits::{
    AccountIdConversion, AtLeast32BitUnsigned, CheckedAdd, MaybeSerializeDeserialize, Saturating,
};
use sp_std::prelude::*;

use confidential_erc20_primitives::{
    AclCtx, AclProvider, ConfidentialLedger, FheBackend, FheType, Handle, InputProof, Op,
};

pub use pallet::*;

pub(crate) const LOG_TARGET: &str = "runtime::confidential-erc20";

/// Metadata and owner of a token.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, MaxEncodedLen, TypeInfo)]
pub struct TokenDetails<AccountId, BoundedString> {
    /// Only the owner may mint.
    pub owner: AccountId,
    pub name: BoundedString,
    pub symbol: BoundedString,
    pub decimals: u8,
}

#[frame_support::pallet]
pub mod pallet {
    use super::*;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        type AssetId: Parameter + Member + Copy + Ord + MaxEncodedLen + MaybeSerializeDeserialize;
        type Balance: Parameter
            + Member
            + AtLeast32BitUnsigned
            + Copy
            + Default
            + MaxEncodedLen
            + Into<U256>;

        /// Encrypted state and homomorphic ops.
        type Backend: FheBackend<Self::AccountId>;

        /// Per-operation policy hook.
        type Acl: AclProvider<Self::AccountId, Self::AssetId, Self::Balance>;

        /// Root of the per-token contract accounts.
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// Max length of token name and symbol.
        #[pallet::constant]
        type StringLimit: Get<u32>;

        type WeightInfo: WeightInfo;
    }

    pub trait WeightInfo {
        fn create() -> Weight;
        fn mint() -> Weight;
        fn transfer() -> Weight;
        fn transfer_handle() -> Weight;
        fn approve() -> Weight;
        fn transfer_from() -> Weight;
    }

    impl WeightInfo for () {
        fn create() -> Weight {
            Weight::from_parts(20_000, 0)
        }
        fn mint() -> Weight {
            Weight::from_parts(40_000, 0)
        }
        fn transfer() -> Weight {
            Weight::from_parts(80_000, 0)
        }
        fn transfer_handle() -> Weight {
            Weight::from_parts(70_000, 0)
        }
        fn approve() -> Weight {
            Weight::from_parts(40_000, 0)
        }
        fn transfer_from() -> Weight {
            Weight::from_parts(120_000, 0)
        }
    }

    pub type BoundedString<T> = BoundedVec<u8, <T as Config>::StringLimit>;
    pub type TokenDetailsOf<T> =
        TokenDetails<<T as frame_system::Config>::AccountId, BoundedString<T>>;

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    #[pallet::storage]
    pub type Tokens<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AssetId, TokenDetailsOf<T>, OptionQuery>;

    /// (asset, who) -> encrypted balance handle.
    #[pallet::storage]
    pub type Balances<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::AssetId,
        Blake2_128Concat,
        T::AccountId,
        Handle,
        OptionQuery,
    >;

    /// (asset, owner, spender) -> encrypted allowance handle.
    #[pallet::storage]
    pub type Allowances<T: Config> = StorageNMap<
        _,
        (
            NMapKey<Blake2_128Concat, T::AssetId>,
            NMapKey<Blake2_128Concat, T::AccountId>,
            NMapKey<Blake2_128Concat, T::AccountId>,
        ),
        Handle,
        OptionQuery,
    >;

    #[pallet::storage]
    pub type TotalSupply<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AssetId, T::Balance, ValueQuery>;

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        /// (asset, owner, name, symbol, decimals)
        pub tokens: Vec<(T::AssetId, T::AccountId, Vec<u8>, Vec<u8>, u8)>,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            for (asset, owner, name, symbol, decimals) in &self.tokens {
                Pallet::<T>::do_create(*asset, owner, name.clone(), symbol.clone(), *decimals)
                    .expect("genesis tokens must be unique with bounded metadata");
            }
        }
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        TokenCreated {
            asset: T::AssetId,
            owner: T::AccountId,
        },
        Minted {
            asset: T::AssetId,
            to: T::AccountId,
            amount: T::Balance,
        },
        Burned {
            asset: T::AssetId,
            from: T::AccountId,
            amount: T::Balance,
        },
        /// Amount omitted: it is confidential, and may be zero.
        Transfer {
            asset: T::AssetId,
            from: T::AccountId,
            to: T::AccountId,
        },
        Approval {
            asset: T::AssetId,
            owner: T::AccountId,
            spender: T::AccountId,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        UnknownToken,
        AlreadyExists,
        /// Name or symbol longer than `StringLimit`.
        BadMetadata,
        NotOwner,
        Overflow,
        /// Caller is not on the ACL of the amount handle.
        HandleNotAllowed,
        InsufficientBalance,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Create a token owned by the caller.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::create())]
        pub fn create(
            origin: OriginFor<T>,
            asset: T::AssetId,
            name: Vec<u8>,
            symbol: Vec<u8>,
            decimals: u8,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::do_create(asset, &who, name, symbol, decimals)
        }

        /// Mint a public `amount` to `to`. Owner only.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::mint())]
        pub fn mint(
            origin: OriginFor<T>,
            asset: T::AssetId,
            to: T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            let details = Tokens::<T>::get(asset).ok_or(Error::<T>::UnknownToken)?;
            ensure!(details.owner == who, Error::<T>::NotOwner);
            T::Acl::authorize(
                Op::Mint,
                &AclCtx {
                    amount: Some(amount),
                    asset,
                    caller: who,
                    owner: None,
                    counterparty: Some(to.clone()),
                },
            )?;
            Self::do_mint(asset, &to, amount)
        }

        /// Transfer an encrypted amount supplied as a fresh encrypted input.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::transfer())]
        pub fn transfer(
            origin: OriginFor<T>,
            asset: T::AssetId,
            to: T::AccountId,
            encrypted_amount: Handle,
            input_proof: InputProof,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::ensure_transfer_allowed(asset, &who, &to)?;
            let amount = Self::verify_amount(asset, &who, encrypted_amount, &input_proof)?;
            Self::do_transfer(asset, &who, &to, &amount)
        }

        /// Transfer an amount the caller already holds a handle to.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::transfer_handle())]
        pub fn transfer_handle(
            origin: OriginFor<T>,
            asset: T::AssetId,
            to: T::AccountId,
            amount: Handle,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::ensure_transfer_allowed(asset, &who, &to)?;
            ensure!(T::Backend::is_allowed(&amount, &who), Error::<T>::HandleNotAllowed);
            Self::do_transfer(asset, &who, &to, &amount)
        }

        /// Set `spender`'s allowance over the caller's balance, replacing any
        /// previous value.
        #[pallet::call_index(4)]
        #[pallet::weight(T::WeightInfo::approve())]
        pub fn approve(
            origin: OriginFor<T>,
            asset: T::AssetId,
            spender: T::AccountId,
            encrypted_amount: Handle,
            input_proof: InputProof,
        ) -> DispatchResult {
            let owner = ensure_signed(origin)?;
            ensure!(Tokens::<T>::contains_key(asset), Error::<T>::UnknownToken);
            T::Acl::authorize(
                Op::Approve,
                &AclCtx {
                    amount: None,
                    asset,
                    caller: owner.clone(),
                    owner: None,
                    counterparty: Some(spender.clone()),
                },
            )?;
            let amount = Self::verify_amount(asset, &owner, encrypted_amount, &input_proof)?;
            Self::set_allowance(asset, &owner, &spender, amount)?;
            Self::deposit_event(Event::Approval { asset, owner, spender });
            Ok(())
        }

        /// Spend the caller's allowance over `owner`'s balance. Moves nothing and
        /// leaves the allowance as is when the amount exceeds either of them.
        #[pallet::call_index(5)]
        #[pallet::weight(T::WeightInfo::transfer_from())]
        pub fn transfer_from(
            origin: OriginFor<T>,
            asset: T::AssetId,
            owner: T::AccountId,
            to: T::AccountId,
            encrypted_amount: Handle,
            input_proof: InputProof,
        ) -> DispatchResult {
            let spender = ensure_signed(origin)?;
            ensure!(Tokens::<T>::contains_key(asset), Error::<T>::UnknownToken);
            T::Acl::authorize(
                Op::TransferFrom,
                &AclCtx {
                    amount: None,
                    asset,
                    caller: spender.clone(),
                    owner: Some(owner.clone()),
                    counterparty: Some(to.clone()),
                },
            )?;
            let amount = Self::verify_amount(asset, &spender, encrypted_amount, &input_proof)?;

            let allowance = match Allowances::<T>::get((asset, &owner, &spender)) {
                Some(h) => h,
                None => Self::encrypted_zero()?,
            };
            let balance = Self::balance_or_zero(asset, &owner)?;

            let within_allowance = T::Backend::le(&amount, &allowance)?;
            let within_balance = T::Backend::le(&amount, &balance)?;
            let ok = T::Backend::and(&within_allowance, &within_balance)?;
            let moved = T::Backend::select(&ok, &amount, &Self::encrypted_zero()?)?;

            let remaining = T::Backend::sub(&allowance, &moved)?;
            Self::set_allowance(asset, &owner, &spender, remaining)?;
            Self::move_value(asset, &owner, &to, &moved)?;

            log::trace!(
                target: LOG_TARGET,
                "transfer_from {:?} -> {:?} by {:?}",
                owner,
                to,
                spender
            );
            Self::deposit_event(Event::Transfer { asset, from: owner, to });
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        #[inline]
        pub fn contract_account(asset: T::AssetId) -> T::AccountId {
            T::PalletId::get().into_sub_account_truncating(asset)
        }

        pub fn token(asset: T::AssetId) -> Option<TokenDetailsOf<T>> {
            Tokens::<T>::get(asset)
        }

        pub fn name(asset: T::AssetId) -> Vec<u8> {
            Tokens::<T>::get(asset).map(|d| d.name.into_inner()).unwrap_or_default()
        }

        pub fn symbol(asset: T::AssetId) -> Vec<u8> {
            Tokens::<T>::get(asset).map(|d| d.symbol.into_inner()).unwrap_or_default()
        }

        pub fn decimals(asset: T::AssetId) -> u8 {
            Tokens::<T>::get(asset).map(|d| d.decimals).unwrap_or_default()
        }

        pub fn total_supply(asset: T::AssetId) -> T::Balance {
            TotalSupply::<T>::get(asset)
        }

        pub fn balance_of(asset: T::AssetId, who: &T::AccountId) -> Option<Handle> {
            Balances::<T>::get(asset, who)
        }

        pub fn allowance(
            asset: T::AssetId,
            owner: &T::AccountId,
            spender: &T::AccountId,
        ) -> Option<Handle> {
            Allowances::<T>::get((asset, owner, spender))
        }

        pub(crate) fn do_create(
            asset: T::AssetId,
            owner: &T::AccountId,
            name: Vec<u8>,
            symbol: Vec<u8>,
            decimals: u8,
        ) -> DispatchResult {
            ensure!(!Tokens::<T>::contains_key(asset), Error::<T>::AlreadyExists);
            let name: BoundedString<T> = name.try_into().map_err(|_| Error::<T>::BadMetadata)?;
            let symbol: BoundedString<T> =
                symbol.try_into().map_err(|_| Error::<T>::BadMetadata)?;

            Tokens::<T>::insert(
                asset,
                TokenDetails { owner: owner.clone(), name, symbol, decimals },
            );
            Self::deposit_event(Event::TokenCreated { asset, owner: owner.clone() });
            Ok(())
        }

        pub(crate) fn do_mint(
            asset: T::AssetId,
            to: &T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            ensure!(Tokens::<T>::contains_key(asset), Error::<T>::UnknownToken);
            let supply = TotalSupply::<T>::get(asset)
                .checked_add(&amount)
                .ok_or(Error::<T>::Overflow)?;

            let value = T::Backend::trivial_encrypt(amount.into(), FheType::Uint256)?;
            let balance = Self::balance_or_zero(asset, to)?;
            let updated = T::Backend::add(&balance, &value)?;
            Self::set_balance(asset, to, updated)?;
            TotalSupply::<T>::insert(asset, supply);

            log::debug!(target: LOG_TARGET, "minted {:?} to {:?}", amount, to);
            Self::deposit_event(Event::Minted { asset, to: to.clone(), amount });
            Ok(())
        }

        /// Remove a public `amount` from `from`. The only place the pallet learns
        /// a balance predicate in the clear.
        pub(crate) fn do_burn(
            asset: T::AssetId,
            from: &T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            ensure!(Tokens::<T>::contains_key(asset), Error::<T>::UnknownToken);
            let balance = Balances::<T>::get(asset, from).ok_or(Error::<T>::InsufficientBalance)?;
            let value = T::Backend::trivial_encrypt(amount.into(), FheType::Uint256)?;

            let contract = Self::contract_account(asset);
            let enough = T::Backend::le(&value, &balance)?;
            T::Backend::allow(&enough, &contract)?;
            ensure!(
                !T::Backend::decrypt(&enough, &contract)?.is_zero(),
                Error::<T>::InsufficientBalance
            );

            let updated = T::Backend::sub(&balance, &value)?;
            Self::set_balance(asset, from, updated)?;
            TotalSupply::<T>::mutate(asset, |s| *s = s.saturating_sub(amount));

            log::debug!(target: LOG_TARGET, "burned {:?} from {:?}", amount, from);
            Self::deposit_event(Event::Burned { asset, from: from.clone(), amount });
            Ok(())
        }

        fn ensure_transfer_allowed(
            asset: T::AssetId,
            from: &T::AccountId,
            to: &T::AccountId,
        ) -> DispatchResult {
            ensure!(Tokens::<T>::contains_key(asset), Error::<T>::UnknownToken);
            T::Acl::authorize(
                Op::Transfer,
                &AclCtx {
                    amount: None,
                    asset,
                    caller: from.clone(),
                    owner: None,
                    counterparty: Some(to.clone()),
                },
            )
        }

        fn verify_amount(
            asset: T::AssetId,
            sender: &T::AccountId,
            handle: Handle,
            proof: &InputProof,
        ) -> Result<Handle, DispatchError> {
            let contract = Self::contract_account(asset);
            let amount =
                T::Backend::verify_input(&contract, sender, handle, proof, FheType::Uint256)?;
            T::Backend::allow(&amount, sender)?;
            Ok(amount)
        }

        fn encrypted_zero() -> Result<Handle, DispatchError> {
            T::Backend::trivial_encrypt(U256::zero(), FheType::Uint256)
        }

        fn balance_or_zero(asset: T::AssetId, who: &T::AccountId) -> Result<Handle, DispatchError> {
            match Balances::<T>::get(asset, who) {
                Some(h) => Ok(h),
                None => Self::encrypted_zero(),
            }
        }

        fn set_balance(asset: T::AssetId, who: &T::AccountId, handle: Handle) -> DispatchResult {
            T::Backend::allow(&handle, &Self::contract_account(asset))?;
            T::Backend::allow(&handle, who)?;
            Balances::<T>::insert(asset, who, handle);
            Ok(())
        }

        fn set_allowance(
            asset: T::AssetId,
            owner: &T::AccountId,
            spender: &T::AccountId,
            handle: Handle,
        ) -> DispatchResult {
            T::Backend::allow(&handle, &Self::contract_account(asset))?;
            T::Backend::allow(&handle, owner)?;
            T::Backend::allow(&handle, spender)?;
            Allowances::<T>::insert((asset, owner, spender), handle);
            Ok(())
        }

        fn do_transfer(
            asset: T::AssetId,
            from: &T::AccountId,
            to: &T::AccountId,
            amount: &Handle,
        ) -> DispatchResult {
            let balance = Self::balance_or_zero(asset, from)?;
            let enough = T::Backend::le(amount, &balance)?;
            let moved = T::Backend::select(&enough, amount, &Self::encrypted_zero()?)?;
            Self::move_value(asset, from, to, &moved)?;

            log::trace!(target: LOG_TARGET, "transfer {:?} -> {:?}", from, to);
            Self::deposit_event(Event::Transfer { asset, from: from.clone(), to: to.clone() });
            Ok(())
        }

        /// Debit then credit, re-reading the receiver after the debit so that
        /// `from == to` nets out.
        fn move_value(
            asset: T::AssetId,
            from: &T::AccountId,
            to: &T::AccountId,
            moved: &Handle,
        ) -> DispatchResult {
            let from_balance = Self::balance_or_zero(asset, from)?;
            Self::set_balance(asset, from, T::Backend::sub(&from_balance, moved)?)?;

            let to_balance = Self::balance_or_zero(asset, to)?;
            Self::set_balance(asset, to, T::Backend::add(&to_balance, moved)?)?;
            Ok(())
        }
    }

    impl<T: Config> ConfidentialLedger<T::AccountId, T::AssetId, T::Balance> for Pallet<T> {
        fn contract_account(asset: T::AssetId) -> T::AccountId {
            T::PalletId::get().into_sub_account_truncating(asset)
        }

        fn exists(asset: T::AssetId) -> bool {
            Tokens::<T>::contains_key(asset)
        }

        fn create_token(
            asset: T::AssetId,
            owner: &T::AccountId,
            name: Vec<u8>,
            symbol: Vec<u8>,
            decimals: u8,
        ) -> DispatchResult {
            Self::do_create(asset, owner, name, symbol, decimals)
        }

        fn total_supply(asset: T::AssetId) -> T::Balance {
            TotalSupply::<T>::get(asset)
        }

        fn balance_of(asset: T::AssetId, who: &T::AccountId) -> Option<Handle> {
            Balances::<T>::get(asset, who)
        }

        fn mint(asset: T::AssetId, to: &T::AccountId, amount: T::Balance) -> DispatchResult {
            Self::do_mint(asset, to, amount)
        }

        fn burn(asset: T::AssetId, from: &T::AccountId, amount: T::Balance) -> DispatchResult {
            Self::do_burn(asset, from, amount)
        }
    }
}
