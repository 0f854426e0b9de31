//! EVM Precompile for a Confidential ERC20 token
//!
//! Each instance serves the single token selected by `Asset`, so the
//! precompile address plays the role of the token contract. Amounts travel as
//! `bytes32` ciphertext handles together with the input proof produced by the
//! client.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
mod mock;

extern crate alloc;

use alloc::vec::Vec;
use core::marker::PhantomData;

use confidential_erc20_primitives::InputProof;
use fp_evm::PrecompileHandle;
use frame_support::{
    BoundedVec,
    dispatch::{GetDispatchInfo, PostDispatchInfo},
    pallet_prelude::ConstU32,
    traits::Get,
};
use pallet_evm::AddressMapping;
use precompile_utils::prelude::*;
use precompile_utils::{
    evm::logs::{LogExt, log3},
    keccak256,
};
use sp_core::{H160, H256, U256};
use sp_runtime::traits::Dispatchable;

pub const MAX_PROOF_SIZE: u32 = 8192;

type GetMaxProofSize = ConstU32<MAX_PROOF_SIZE>;

/// event Transfer(address indexed from, address indexed to)
pub const SELECTOR_LOG_TRANSFER: [u8; 32] = keccak256!("Transfer(address,address)");

/// event Approval(address indexed owner, address indexed spender)
pub const SELECTOR_LOG_APPROVAL: [u8; 32] = keccak256!("Approval(address,address)");

type AssetIdOf<Runtime> = <Runtime as pallet_confidential_erc20::Config>::AssetId;
type AccountIdOf<Runtime> = <Runtime as frame_system::Config>::AccountId;

/// Precompile exposing one confidential ERC20 token to the EVM.
pub struct ConfidentialErc20Precompile<Runtime, Asset>(PhantomData<(Runtime, Asset)>);

#[precompile_utils::precompile]
impl<Runtime, Asset> ConfidentialErc20Precompile<Runtime, Asset>
where
    Asset: Get<AssetIdOf<Runtime>> + 'static,
    Runtime: pallet_confidential_erc20::Config + pallet_evm::Config + frame_system::Config,
    <Runtime as frame_system::Config>::RuntimeCall:
        Dispatchable<PostInfo = PostDispatchInfo> + GetDispatchInfo,
    <Runtime as frame_system::Config>::RuntimeCall: From<pallet_confidential_erc20::Call<Runtime>>,
    <<Runtime as frame_system::Config>::RuntimeCall as Dispatchable>::RuntimeOrigin:
        From<Option<AccountIdOf<Runtime>>>,
    <Runtime as pallet_evm::Config>::AddressMapping: AddressMapping<AccountIdOf<Runtime>>,
{
    // ============ View Functions ============

    #[precompile::public("name()")]
    #[precompile::view]
    fn name(handle: &mut impl PrecompileHandle) -> EvmResult<UnboundedBytes> {
        handle.record_db_read::<Runtime>(64)?;
        Ok(pallet_confidential_erc20::Pallet::<Runtime>::name(Asset::get()).into())
    }

    #[precompile::public("symbol()")]
    #[precompile::view]
    fn symbol(handle: &mut impl PrecompileHandle) -> EvmResult<UnboundedBytes> {
        handle.record_db_read::<Runtime>(64)?;
        Ok(pallet_confidential_erc20::Pallet::<Runtime>::symbol(Asset::get()).into())
    }

    #[precompile::public("decimals()")]
    #[precompile::view]
    fn decimals(handle: &mut impl PrecompileHandle) -> EvmResult<u8> {
        handle.record_db_read::<Runtime>(64)?;
        Ok(pallet_confidential_erc20::Pallet::<Runtime>::decimals(Asset::get()))
    }

    /// Plaintext supply; mint amounts are public.
    #[precompile::public("totalSupply()")]
    #[precompile::view]
    fn total_supply(handle: &mut impl PrecompileHandle) -> EvmResult<U256> {
        handle.record_db_read::<Runtime>(16)?;
        Ok(pallet_confidential_erc20::Pallet::<Runtime>::total_supply(Asset::get()).into())
    }

    /// Handle of `who`'s encrypted balance, zero when it has none.
    /// Solidity: function balanceOf(address who) view returns (bytes32)
    #[precompile::public("balanceOf(address)")]
    #[precompile::view]
    fn balance_of(handle: &mut impl PrecompileHandle, who: Address) -> EvmResult<H256> {
        handle.record_db_read::<Runtime>(64)?;
        let who = Self::account(who.into());
        Ok(pallet_confidential_erc20::Pallet::<Runtime>::balance_of(Asset::get(), &who)
            .map(H256::from)
            .unwrap_or_default())
    }

    /// Solidity: function allowance(address owner, address spender) view returns (bytes32)
    #[precompile::public("allowance(address,address)")]
    #[precompile::view]
    fn allowance(
        handle: &mut impl PrecompileHandle,
        owner: Address,
        spender: Address,
    ) -> EvmResult<H256> {
        handle.record_db_read::<Runtime>(96)?;
        let owner = Self::account(owner.into());
        let spender = Self::account(spender.into());
        Ok(
            pallet_confidential_erc20::Pallet::<Runtime>::allowance(Asset::get(), &owner, &spender)
                .map(H256::from)
                .unwrap_or_default(),
        )
    }

    // ============ State-Changing Functions ============

    /// Solidity: function transfer(address to, bytes32 encryptedAmount, bytes inputProof) returns (bool)
    #[precompile::public("transfer(address,bytes32,bytes)")]
    fn transfer(
        handle: &mut impl PrecompileHandle,
        to: Address,
        encrypted_amount: H256,
        input_proof: BoundedBytes<GetMaxProofSize>,
    ) -> EvmResult<bool> {
        let caller = handle.context().caller;
        let to: H160 = to.into();

        RuntimeHelper::<Runtime>::try_dispatch(
            handle,
            Some(Self::account(caller)).into(),
            pallet_confidential_erc20::Call::<Runtime>::transfer {
                asset: Asset::get(),
                to: Self::account(to),
                encrypted_amount: encrypted_amount.0,
                input_proof: Self::proof(input_proof)?,
            },
            0,
        )?;

        log3(
            handle.context().address,
            SELECTOR_LOG_TRANSFER,
            H256::from(caller),
            H256::from(to),
            Vec::new(),
        )
        .record(handle)?;

        Ok(true)
    }

    /// Solidity: function approve(address spender, bytes32 encryptedAmount, bytes inputProof) returns (bool)
    #[precompile::public("approve(address,bytes32,bytes)")]
    fn approve(
        handle: &mut impl PrecompileHandle,
        spender: Address,
        encrypted_amount: H256,
        input_proof: BoundedBytes<GetMaxProofSize>,
    ) -> EvmResult<bool> {
        let caller = handle.context().caller;
        let spender: H160 = spender.into();

        RuntimeHelper::<Runtime>::try_dispatch(
            handle,
            Some(Self::account(caller)).into(),
            pallet_confidential_erc20::Call::<Runtime>::approve {
                asset: Asset::get(),
                spender: Self::account(spender),
                encrypted_amount: encrypted_amount.0,
                input_proof: Self::proof(input_proof)?,
            },
            0,
        )?;

        log3(
            handle.context().address,
            SELECTOR_LOG_APPROVAL,
            H256::from(caller),
            H256::from(spender),
            Vec::new(),
        )
        .record(handle)?;

        Ok(true)
    }

    /// Solidity: function transferFrom(address from, address to, bytes32 encryptedAmount, bytes inputProof) returns (bool)
    #[precompile::public("transferFrom(address,address,bytes32,bytes)")]
    fn transfer_from(
        handle: &mut impl PrecompileHandle,
        from: Address,
        to: Address,
        encrypted_amount: H256,
        input_proof: BoundedBytes<GetMaxProofSize>,
    ) -> EvmResult<bool> {
        let caller = handle.context().caller;
        let from: H160 = from.into();
        let to: H160 = to.into();

        RuntimeHelper::<Runtime>::try_dispatch(
            handle,
            Some(Self::account(caller)).into(),
            pallet_confidential_erc20::Call::<Runtime>::transfer_from {
                asset: Asset::get(),
                owner: Self::account(from),
                to: Self::account(to),
                encrypted_amount: encrypted_amount.0,
                input_proof: Self::proof(input_proof)?,
            },
            0,
        )?;

        log3(
            handle.context().address,
            SELECTOR_LOG_TRANSFER,
            H256::from(from),
            H256::from(to),
            Vec::new(),
        )
        .record(handle)?;

        Ok(true)
    }

    fn account(address: H160) -> AccountIdOf<Runtime> {
        <Runtime as pallet_evm::Config>::AddressMapping::into_account_id(address)
    }

    fn proof(input_proof: BoundedBytes<GetMaxProofSize>) -> EvmResult<InputProof> {
        let proof: Vec<u8> = input_proof.into();
        BoundedVec::try_from(proof).map_err(|_| revert("proof too large"))
    }
}
