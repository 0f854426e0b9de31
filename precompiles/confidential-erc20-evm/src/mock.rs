//! Mock runtime for testing the confidential ERC20 EVM precompile.

use super::*;

use confidential_erc20_primitives::Handle;
use fhevm_client::{EncryptedInput, FhevmInstance, ReencryptionGateway};
use fhevm_mock_coprocessor::PlaintextCoprocessor;
use frame_support::{
    PalletId, construct_runtime, derive_impl, parameter_types, traits::Everything,
    weights::Weight,
};
use pallet_evm::{EnsureAddressNever, EnsureAddressRoot, FrameSystemAccountProvider};
use precompile_utils::{mock_account, precompile_set::*, testing::MockAccount};
use sp_core::{H256, U256};
use sp_runtime::{BuildStorage, Perbill, traits::BlakeTwo256};

pub type AccountId = MockAccount;
pub type AssetId = u32;
pub type Balance = u128;
pub type Block = frame_system::mocking::MockBlockU32<Runtime>;

pub const TOKEN: AssetId = 7;

construct_runtime!(
    pub enum Runtime {
        System: frame_system,
        Balances: pallet_balances,
        Timestamp: pallet_timestamp,
        Evm: pallet_evm,
        Fhevm: pallet_fhevm,
        ConfidentialErc20: pallet_confidential_erc20,
    }
);

parameter_types! {
    pub const BlockHashCount: u32 = 250;
    pub const MaximumBlockWeight: Weight = Weight::from_parts(1024, 1);
    pub const MaximumBlockLength: u32 = 2 * 1024;
    pub const AvailableBlockRatio: Perbill = Perbill::one();
    pub const SS58Prefix: u8 = 42;
}

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Runtime {
    type BaseCallFilter = Everything;
    type RuntimeOrigin = RuntimeOrigin;
    type RuntimeCall = RuntimeCall;
    type RuntimeTask = RuntimeTask;
    type Nonce = u64;
    type Block = Block;
    type Hash = H256;
    type Hashing = BlakeTwo256;
    type AccountId = AccountId;
    type Lookup = sp_runtime::traits::IdentityLookup<Self::AccountId>;
    type RuntimeEvent = RuntimeEvent;
    type BlockHashCount = BlockHashCount;
    type PalletInfo = PalletInfo;
    type AccountData = pallet_balances::AccountData<Balance>;
    type SS58Prefix = SS58Prefix;
}

parameter_types! {
    pub const ExistentialDeposit: u128 = 0;
}

impl pallet_balances::Config for Runtime {
    type MaxReserves = ();
    type ReserveIdentifier = [u8; 4];
    type MaxLocks = ();
    type Balance = Balance;
    type RuntimeEvent = RuntimeEvent;
    type DustRemoval = ();
    type ExistentialDeposit = ExistentialDeposit;
    type AccountStore = System;
    type WeightInfo = ();
    type RuntimeHoldReason = ();
    type FreezeIdentifier = ();
    type MaxFreezes = ();
    type RuntimeFreezeReason = ();
    type DoneSlashHandler = ();
}

parameter_types! {
    pub const MinimumPeriod: u64 = 5;
}

impl pallet_timestamp::Config for Runtime {
    type Moment = u64;
    type OnTimestampSet = ();
    type MinimumPeriod = MinimumPeriod;
    type WeightInfo = ();
}

pub const CONFIDENTIAL_ERC20_PRECOMPILE: u64 = 2049;

parameter_types! {
    pub const PrecompileToken: AssetId = TOKEN;
}

pub type Precompiles<R> = PrecompileSetBuilder<
    R,
    (
        PrecompileAt<
            AddressU64<CONFIDENTIAL_ERC20_PRECOMPILE>,
            ConfidentialErc20Precompile<R, PrecompileToken>,
        >,
    ),
>;

pub type PCall = ConfidentialErc20PrecompileCall<Runtime, PrecompileToken>;

mock_account!(TokenAddress, |_| MockAccount::from_u64(CONFIDENTIAL_ERC20_PRECOMPILE));

const MAX_POV_SIZE: u64 = 5 * 1024 * 1024;
const BLOCK_STORAGE_LIMIT: u64 = 40 * 1024;

parameter_types! {
    pub BlockGasLimit: U256 = U256::from(u64::MAX);
    pub PrecompilesValue: Precompiles<Runtime> = Precompiles::new();
    pub const WeightPerGas: Weight = Weight::from_parts(1, 0);
    pub GasLimitPovSizeRatio: u64 = {
        let block_gas_limit = BlockGasLimit::get().min(u64::MAX.into()).low_u64();
        block_gas_limit.saturating_div(MAX_POV_SIZE)
    };
    pub GasLimitStorageGrowthRatio: u64 = {
        let block_gas_limit = BlockGasLimit::get().min(u64::MAX.into()).low_u64();
        block_gas_limit.saturating_div(BLOCK_STORAGE_LIMIT)
    };
}

impl pallet_evm::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type FeeCalculator = ();
    type GasWeightMapping = pallet_evm::FixedGasWeightMapping<Self>;
    type WeightPerGas = WeightPerGas;
    type CallOrigin = EnsureAddressRoot<AccountId>;
    type WithdrawOrigin = EnsureAddressNever<AccountId>;
    type AddressMapping = AccountId;
    type Currency = Balances;
    type Runner = pallet_evm::runner::stack::Runner<Self>;
    type PrecompilesType = Precompiles<Runtime>;
    type PrecompilesValue = PrecompilesValue;
    type ChainId = ();
    type OnChargeTransaction = ();
    type BlockGasLimit = BlockGasLimit;
    type BlockHashMapping = pallet_evm::SubstrateBlockHashMapping<Self>;
    type FindAuthor = ();
    type OnCreate = ();
    type GasLimitPovSizeRatio = GasLimitPovSizeRatio;
    type GasLimitStorageGrowthRatio = GasLimitStorageGrowthRatio;
    type Timestamp = Timestamp;
    type WeightInfo = pallet_evm::weights::SubstrateWeight<Runtime>;
    type AccountProvider = FrameSystemAccountProvider<Runtime>;
    type CreateOriginFilter = ();
    type CreateInnerOriginFilter = ();
}

parameter_types! {
    pub const MaxCiphertextLen: u32 = 64;
    pub const Erc20PalletId: PalletId = PalletId(*b"cf/erc20");
    pub const StringLimit: u32 = 32;
}

impl pallet_fhevm::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type Coprocessor = PlaintextCoprocessor;
    type MaxCiphertextLen = MaxCiphertextLen;
    type WeightInfo = ();
}

impl pallet_confidential_erc20::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type AssetId = AssetId;
    type Balance = Balance;
    type Backend = Fhevm;
    type Acl = ();
    type PalletId = Erc20PalletId;
    type StringLimit = StringLimit;
    type WeightInfo = ();
}

pub(crate) struct ExtBuilder {
    balances: Vec<(AccountId, Balance)>,
    // (owner, amount) minted into TOKEN after genesis
    minted: Vec<(AccountId, Balance)>,
}

impl Default for ExtBuilder {
    fn default() -> ExtBuilder {
        ExtBuilder { balances: vec![], minted: vec![] }
    }
}

impl ExtBuilder {
    pub(crate) fn with_balances(mut self, balances: Vec<(AccountId, Balance)>) -> Self {
        self.balances = balances;
        self
    }

    pub(crate) fn with_confidential(mut self, minted: Vec<(AccountId, Balance)>) -> Self {
        self.minted = minted;
        self
    }

    pub(crate) fn build(self) -> sp_io::TestExternalities {
        let mut t = frame_system::GenesisConfig::<Runtime>::default()
            .build_storage()
            .expect("Frame system builds valid default genesis config");

        pallet_balances::GenesisConfig::<Runtime> {
            balances: self.balances,
            dev_accounts: None,
        }
        .assimilate_storage(&mut t)
        .expect("Pallet balances storage can be assimilated");

        pallet_confidential_erc20::GenesisConfig::<Runtime> {
            tokens: vec![(
                TOKEN,
                precompile_utils::testing::Alice.into(),
                b"Naraggara".to_vec(),
                b"NARA".to_vec(),
                18,
            )],
        }
        .assimilate_storage(&mut t)
        .expect("Token storage can be assimilated");

        let mut ext = sp_io::TestExternalities::new(t);
        ext.execute_with(|| {
            System::set_block_number(1);
            for (who, amount) in self.minted {
                ConfidentialErc20::mint(
                    RuntimeOrigin::signed(precompile_utils::testing::Alice.into()),
                    TOKEN,
                    who,
                    amount,
                )
                .expect("token owner mints");
            }
        });
        ext
    }
}

pub fn precompiles() -> Precompiles<Runtime> {
    PrecompilesValue::get()
}

pub struct PalletGateway;

impl ReencryptionGateway for PalletGateway {
    type AccountId = AccountId;
    type Error = pallet_fhevm::ReencryptError;

    fn reencrypt(
        &self,
        user: &AccountId,
        handle: &Handle,
        contract: &AccountId,
        public_key: &[u8],
    ) -> Result<[u8; 32], pallet_fhevm::ReencryptError> {
        Fhevm::reencrypt(user, handle, contract, public_key)
    }
}

/// Encrypted amount that `user` may submit to TOKEN.
pub fn encrypt_for(user: impl Into<AccountId>, value: u64) -> (H256, Vec<u8>) {
    let EncryptedInput { handles, input_proof } = FhevmInstance::new(PalletGateway)
        .create_encrypted_input(&ConfidentialErc20::contract_account(TOKEN), &user.into())
        .add256(U256::from(value))
        .encrypt()
        .expect("encrypt");
    (H256::from(handles[0]), input_proof.into_inner())
}

pub fn confidential_balance(who: impl Into<AccountId>) -> u64 {
    ConfidentialErc20::balance_of(TOKEN, &who.into())
        .and_then(|h| Fhevm::debug_decrypt(&h))
        .map(|v| v.as_u64())
        .unwrap_or(0)
}

pub fn confidential_allowance(owner: impl Into<AccountId>, spender: impl Into<AccountId>) -> u64 {
    ConfidentialErc20::allowance(TOKEN, &owner.into(), &spender.into())
        .and_then(|h| Fhevm::debug_decrypt(&h))
        .map(|v| v.as_u64())
        .unwrap_or(0)
}
