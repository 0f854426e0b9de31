//! Benchmarking for `pallet-confidential-erc20`.
//!
//! Calls taking an encrypted input need a proof from the runtime's coprocessor,
//! so `transfer`, `approve` and `transfer_from` are not benchmarked here;
//! `transfer_handle` runs the same homomorphic path without the input check.

use super::*;
use frame_benchmarking::v2::*;
use frame_system::RawOrigin;

fn setup_token<T: Config>(asset: T::AssetId, owner: &T::AccountId) {
    Pallet::<T>::do_create(asset, owner, b"Naraggara".to_vec(), b"NARA".to_vec(), 18)
        .expect("fresh token");
}

#[benchmarks(where T::AssetId: From<u32>, T::Balance: From<u32>)]
mod benchmarks {
    use super::*;

    #[benchmark]
    fn create() {
        let caller: T::AccountId = whitelisted_caller();
        let asset: T::AssetId = 1u32.into();

        #[extrinsic_call]
        create(
            RawOrigin::Signed(caller.clone()),
            asset,
            b"Naraggara".to_vec(),
            b"NARA".to_vec(),
            18,
        );

        assert!(Tokens::<T>::contains_key(asset));
    }

    #[benchmark]
    fn mint() {
        let caller: T::AccountId = whitelisted_caller();
        let asset: T::AssetId = 1u32.into();
        setup_token::<T>(asset, &caller);

        #[extrinsic_call]
        mint(RawOrigin::Signed(caller.clone()), asset, caller.clone(), 10_000u32.into());

        assert_eq!(TotalSupply::<T>::get(asset), 10_000u32.into());
    }

    #[benchmark]
    fn transfer_handle() {
        let caller: T::AccountId = whitelisted_caller();
        let recipient: T::AccountId = account("recipient", 0, 0);
        let asset: T::AssetId = 1u32.into();
        setup_token::<T>(asset, &caller);
        Pallet::<T>::do_mint(asset, &caller, 10_000u32.into()).expect("owner mints");
        let amount = Balances::<T>::get(asset, &caller).expect("minted balance");

        #[extrinsic_call]
        transfer_handle(RawOrigin::Signed(caller.clone()), asset, recipient.clone(), amount);

        assert!(Balances::<T>::contains_key(asset, &recipient));
    }

    impl_benchmark_test_suite!(Pallet, crate::mock::new_test_ext(), crate::mock::Runtime);
}
