//! # pallet-confidential-erc20-wrapper
//!
//! Wraps a plain fungible asset 1:1 into a confidential token kept by a
//! [`ConfidentialLedger`]:
//!
//! - `deposit_for` pulls plain tokens from the caller (through an approval given
//!   to the wrapped token's contract account) and mints the same amount as an
//!   encrypted balance for the beneficiary.
//! - `withdraw_to` burns encrypted balance from the caller and releases the
//!   plain tokens held by the contract account.
//!
//! The contract account of the wrapped token is both the custody account of
//! the plain asset and the owner of the confidential token, so wrapped supply
//! can only be minted against a deposit.
//!
//! Custody is never reaped. `register` gives it a provider reference and the
//! registrar seeds it with the underlying's minimum balance (its floor), and
//! withdrawals keep it alive. No deposit is ever swept away as dust.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
mod mock;

use core::marker::PhantomData;
use frame_support::{
    pallet_prelude::*,
    traits::tokens::{Preservation, fungibles},
};
use frame_system::pallet_prelude::*;
use sp_runtime::traits::{AtLeast32BitUnsigned, Saturating, Zero};
use sp_std::prelude::*;

use confidential_erc20_primitives::{AclCtx, AclProvider, ConfidentialLedger, Op, PublicToken};

pub use pallet::*;

pub(crate) const LOG_TARGET: &str = "runtime::confidential-erc20-wrapper";

/// [`PublicToken`] over any `fungibles` implementation (e.g. `pallet-assets`).
pub struct FungiblesPublicToken<F>(PhantomData<F>);

impl<AccountId, F>
    PublicToken<
        AccountId,
        <F as fungibles::Inspect<AccountId>>::AssetId,
        <F as fungibles::Inspect<AccountId>>::Balance,
    > for FungiblesPublicToken<F>
where
    AccountId: Eq,
    F: fungibles::Mutate<AccountId> + fungibles::approvals::Mutate<AccountId>,
{
    fn exists(asset: <F as fungibles::Inspect<AccountId>>::AssetId) -> bool {
        <F as fungibles::Inspect<AccountId>>::asset_exists(asset)
    }

    fn balance(
        asset: <F as fungibles::Inspect<AccountId>>::AssetId,
        who: &AccountId,
    ) -> <F as fungibles::Inspect<AccountId>>::Balance {
        <F as fungibles::Inspect<AccountId>>::balance(asset, who)
    }

    fn total_issuance(
        asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    ) -> <F as fungibles::Inspect<AccountId>>::Balance {
        <F as fungibles::Inspect<AccountId>>::total_issuance(asset)
    }

    fn minimum_balance(
        asset: <F as fungibles::Inspect<AccountId>>::AssetId,
    ) -> <F as fungibles::Inspect<AccountId>>::Balance {
        <F as fungibles::Inspect<AccountId>>::minimum_balance(asset)
    }

    fn transfer_approved(
        asset: <F as fungibles::Inspect<AccountId>>::AssetId,
        owner: &AccountId,
        delegate: &AccountId,
        dest: &AccountId,
        amount: <F as fungibles::Inspect<AccountId>>::Balance,
    ) -> DispatchResult {
        <F as fungibles::approvals::Mutate<AccountId>>::transfer_from(
            asset, owner, delegate, dest, amount,
        )
    }

    fn transfer(
        asset: <F as fungibles::Inspect<AccountId>>::AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: <F as fungibles::Inspect<AccountId>>::Balance,
    ) -> DispatchResult {
        <F as fungibles::Mutate<AccountId>>::transfer(
            asset,
            from,
            to,
            amount,
            Preservation::Preserve,
        )
        .map(|_| ())
    }
}

#[frame_support::pallet]
pub mod pallet {
    use super::*;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Id of the confidential token.
        type AssetId: Parameter + Member + Copy + Ord + MaxEncodedLen;
        /// Id of the plain asset being wrapped.
        type UnderlyingAssetId: Parameter + Member + Copy + Ord + MaxEncodedLen;
        type Balance: Parameter + Member + AtLeast32BitUnsigned + Copy + Default + MaxEncodedLen;

        type Ledger: ConfidentialLedger<Self::AccountId, Self::AssetId, Self::Balance>;
        /// The plain side of every wrapped token.
        type PlainToken: PublicToken<Self::AccountId, Self::UnderlyingAssetId, Self::Balance>;

        /// Policy hook consulted on wrap and unwrap.
        type Acl: AclProvider<Self::AccountId, Self::AssetId, Self::Balance>;

        /// Who may open a new wrapped token. The resolved account pays the
        /// custody floor.
        type RegisterOrigin: EnsureOrigin<Self::RuntimeOrigin, Success = Self::AccountId>;

        type WeightInfo: WeightInfo;
    }

    pub trait WeightInfo {
        fn register() -> Weight;
        fn deposit_for() -> Weight;
        fn withdraw_to() -> Weight;
    }

    impl WeightInfo for () {
        fn register() -> Weight {
            Weight::from_parts(30_000, 0)
        }
        fn deposit_for() -> Weight {
            Weight::from_parts(90_000, 0)
        }
        fn withdraw_to() -> Weight {
            Weight::from_parts(110_000, 0)
        }
    }

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    /// Confidential token -> plain asset it wraps.
    #[pallet::storage]
    pub type Underlying<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AssetId, T::UnderlyingAssetId, OptionQuery>;

    /// Plain asset -> its confidential token.
    #[pallet::storage]
    pub type WrappedBy<T: Config> =
        StorageMap<_, Blake2_128Concat, T::UnderlyingAssetId, T::AssetId, OptionQuery>;

    /// Plain tokens seeded into the custody at registration. Backs no supply.
    #[pallet::storage]
    pub type CustodyFloor<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AssetId, T::Balance, ValueQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        Registered {
            asset: T::AssetId,
            underlying: T::UnderlyingAssetId,
        },
        Deposited {
            asset: T::AssetId,
            from: T::AccountId,
            to: T::AccountId,
            amount: T::Balance,
        },
        Withdrawn {
            asset: T::AssetId,
            from: T::AccountId,
            to: T::AccountId,
            amount: T::Balance,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        NotWrapped,
        /// The plain asset already has a confidential token.
        AlreadyWrapped,
        /// A confidential token with this id exists.
        AssetInUse,
        /// The plain asset does not exist.
        UnknownUnderlying,
        ZeroAmount,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Open confidential token `asset` backed by `underlying`. The
        /// registering account seeds the custody with the underlying's minimum
        /// balance.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::register())]
        pub fn register(
            origin: OriginFor<T>,
            asset: T::AssetId,
            underlying: T::UnderlyingAssetId,
            name: Vec<u8>,
            symbol: Vec<u8>,
            decimals: u8,
        ) -> DispatchResult {
            let registrar = T::RegisterOrigin::ensure_origin(origin)?;
            ensure!(!WrappedBy::<T>::contains_key(underlying), Error::<T>::AlreadyWrapped);
            ensure!(!T::Ledger::exists(asset), Error::<T>::AssetInUse);
            ensure!(T::PlainToken::exists(underlying), Error::<T>::UnknownUnderlying);

            let custody = T::Ledger::contract_account(asset);
            T::Ledger::create_token(asset, &custody, name, symbol, decimals)?;

            // custody must exist before it can hold non-sufficient assets
            frame_system::Pallet::<T>::inc_providers(&custody);
            let floor = T::PlainToken::minimum_balance(underlying);
            if !floor.is_zero() {
                T::PlainToken::transfer(underlying, &registrar, &custody, floor)?;
            }
            CustodyFloor::<T>::insert(asset, floor);
            Underlying::<T>::insert(asset, underlying);
            WrappedBy::<T>::insert(underlying, asset);

            Self::deposit_event(Event::Registered { asset, underlying });
            Ok(())
        }

        /// Lock `amount` of the caller's plain tokens and credit `account` with
        /// the same confidential amount. The caller must have approved the
        /// token's contract account beforehand.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::deposit_for())]
        pub fn deposit_for(
            origin: OriginFor<T>,
            asset: T::AssetId,
            account: T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
            let underlying = Underlying::<T>::get(asset).ok_or(Error::<T>::NotWrapped)?;
            T::Acl::authorize(
                Op::Wrap,
                &AclCtx {
                    amount: Some(amount),
                    asset,
                    caller: who.clone(),
                    owner: None,
                    counterparty: Some(account.clone()),
                },
            )?;

            let custody = T::Ledger::contract_account(asset);
            T::PlainToken::transfer_approved(underlying, &who, &custody, &custody, amount)?;
            T::Ledger::mint(asset, &account, amount)?;

            log::debug!(target: LOG_TARGET, "wrapped {:?} for {:?}", amount, account);
            Self::deposit_event(Event::Deposited { asset, from: who, to: account, amount });
            Ok(())
        }

        /// Burn `amount` of the caller's confidential balance and release the
        /// plain tokens to `account`. Fails, with nothing changed, when the
        /// confidential balance is lower than `amount`. The custody keeps its
        /// floor, so it is never reaped.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::withdraw_to())]
        pub fn withdraw_to(
            origin: OriginFor<T>,
            asset: T::AssetId,
            account: T::AccountId,
            amount: T::Balance,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
            let underlying = Underlying::<T>::get(asset).ok_or(Error::<T>::NotWrapped)?;
            T::Acl::authorize(
                Op::Unwrap,
                &AclCtx {
                    amount: Some(amount),
                    asset,
                    caller: who.clone(),
                    owner: None,
                    counterparty: Some(account.clone()),
                },
            )?;

            T::Ledger::burn(asset, &who, amount)?;
            let custody = T::Ledger::contract_account(asset);
            T::PlainToken::transfer(underlying, &custody, &account, amount)?;

            log::debug!(target: LOG_TARGET, "unwrapped {:?} to {:?}", amount, account);
            Self::deposit_event(Event::Withdrawn { asset, from: who, to: account, amount });
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        pub fn underlying(asset: T::AssetId) -> Option<T::UnderlyingAssetId> {
            Underlying::<T>::get(asset)
        }

        pub fn wrapped_by(underlying: T::UnderlyingAssetId) -> Option<T::AssetId> {
            WrappedBy::<T>::get(underlying)
        }

        /// Plain tokens held by the custody of `asset` above its floor.
        /// Never below the confidential supply; plain tokens sent straight to
        /// the custody stay locked here.
        pub fn locked(asset: T::AssetId) -> Option<T::Balance> {
            let underlying = Underlying::<T>::get(asset)?;
            let held = T::PlainToken::balance(underlying, &T::Ledger::contract_account(asset));
            Some(held.saturating_sub(CustodyFloor::<T>::get(asset)))
        }

        pub fn total_supply(asset: T::AssetId) -> T::Balance {
            T::Ledger::total_supply(asset)
        }

        pub fn balance_of(
            asset: T::AssetId,
            who: &T::AccountId,
        ) -> Option<confidential_erc20_primitives::Handle> {
            T::Ledger::balance_of(asset, who)
        }
    }
}
