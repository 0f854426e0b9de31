use crate::{self as pallet_confidential_erc20_wrapper, FungiblesPublicToken};
use confidential_erc20_primitives::{Handle, InputProof, PublicToken};
use fhevm_client::{EncryptedInput, FhevmInstance, ReencryptionGateway};
use fhevm_mock_coprocessor::PlaintextCoprocessor;
use frame_support::{
    PalletId, construct_runtime, derive_impl, parameter_types,
    traits::{AsEnsureOriginWithArg, ConstU32, ConstU64},
};
use frame_system::{EnsureRoot, EnsureSigned};
use sp_core::U256;
use sp_runtime::{BuildStorage, traits::IdentityLookup};

pub type AccountId = u128;
pub type AssetId = u32;
pub type Balance = u64;
pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;
/// Registers wrapped tokens and pays their custody floor.
pub const ADMIN: AccountId = 9;
/// Plain asset (pallet-assets id).
pub const USDC: AssetId = 1;
/// Its confidential wrapper (pallet-confidential-erc20 id).
pub const CUSDC: AssetId = 101;
pub const INITIAL: Balance = 10_000;

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Runtime {
    type Block = frame_system::mocking::MockBlock<Runtime>;
    type AccountId = AccountId;
    type Lookup = IdentityLookup<AccountId>;
    type AccountData = pallet_balances::AccountData<Balance>;
}

parameter_types! {
    pub const ExistentialDeposit: Balance = 1;
}

impl pallet_balances::Config for Runtime {
    type MaxReserves = ();
    type ReserveIdentifier = [u8; 8];
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

impl pallet_assets::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type Balance = Balance;
    type AssetId = AssetId;
    type AssetIdParameter = AssetId;
    type Currency = Balances;
    type CreateOrigin = AsEnsureOriginWithArg<EnsureSigned<AccountId>>;
    type ForceOrigin = EnsureRoot<AccountId>;
    type AssetDeposit = ConstU64<1>;
    type AssetAccountDeposit = ConstU64<1>;
    type MetadataDepositBase = ConstU64<1>;
    type MetadataDepositPerByte = ConstU64<1>;
    type ApprovalDeposit = ConstU64<1>;
    type StringLimit = ConstU32<50>;
    type Holder = ();
    type Freezer = ();
    type Extra = ();
    type WeightInfo = ();
    type CallbackHandle = ();
    type RemoveItemsLimit = ConstU32<1000>;
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

impl pallet_confidential_erc20_wrapper::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type AssetId = AssetId;
    type UnderlyingAssetId = AssetId;
    type Balance = Balance;
    type Ledger = ConfidentialErc20;
    type PlainToken = FungiblesPublicToken<Assets>;
    type Acl = ();
    type RegisterOrigin = EnsureSigned<AccountId>;
    type WeightInfo = ();
}

construct_runtime!(
    pub enum Runtime {
        System: frame_system,
        Balances: pallet_balances,
        Assets: pallet_assets,
        Fhevm: pallet_fhevm,
        ConfidentialErc20: pallet_confidential_erc20,
        Wrapper: pallet_confidential_erc20_wrapper,
    }
);

type Plain = FungiblesPublicToken<Assets>;

/// USDC exists with `INITIAL` minted to Alice, Bob and the admin; CUSDC wraps it.
pub fn new_test_ext() -> sp_io::TestExternalities {
    let mut t = frame_system::GenesisConfig::<Runtime>::default()
        .build_storage()
        .unwrap();
    pallet_balances::GenesisConfig::<Runtime> {
        balances: vec![(ALICE, 1_000), (BOB, 1_000), (ADMIN, 1_000)],
        dev_accounts: None,
    }
    .assimilate_storage(&mut t)
    .unwrap();

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| {
        System::set_block_number(1);
        open_wrapped(CUSDC, USDC, true, 1);
    });
    ext
}

/// Create plain asset `underlying`, fund the accounts with `INITIAL` and
/// register `asset` as its wrapper.
pub fn open_wrapped(asset: AssetId, underlying: AssetId, sufficient: bool, min_balance: Balance) {
    Assets::force_create(RuntimeOrigin::root(), underlying, ALICE, sufficient, min_balance)
        .unwrap();
    for who in [ALICE, BOB, ADMIN] {
        Assets::mint(RuntimeOrigin::signed(ALICE), underlying, who, INITIAL).unwrap();
    }
    Wrapper::register(
        RuntimeOrigin::signed(ADMIN),
        asset,
        underlying,
        b"Confidential".to_vec(),
        b"c".to_vec(),
        6,
    )
    .unwrap();
}

pub fn custody() -> AccountId {
    custody_of(CUSDC)
}

pub fn custody_of(asset: AssetId) -> AccountId {
    ConfidentialErc20::contract_account(asset)
}

/// Approve the wrapper custody and wrap `amount` for `to`.
pub fn wrap(who: AccountId, to: AccountId, amount: Balance) {
    wrap_into(CUSDC, who, to, amount)
}

pub fn wrap_into(asset: AssetId, who: AccountId, to: AccountId, amount: Balance) {
    let underlying = Wrapper::underlying(asset).unwrap();
    Assets::approve_transfer(RuntimeOrigin::signed(who), underlying, custody_of(asset), amount)
        .unwrap();
    Wrapper::deposit_for(RuntimeOrigin::signed(who), asset, to, amount).unwrap();
}

pub fn plain_balance(who: AccountId) -> Balance {
    plain_balance_of(USDC, who)
}

pub fn plain_balance_of(underlying: AssetId, who: AccountId) -> Balance {
    <Plain as PublicToken<AccountId, AssetId, Balance>>::balance(underlying, &who)
}

pub fn plain_issuance() -> Balance {
    <Plain as PublicToken<AccountId, AssetId, Balance>>::total_issuance(USDC)
}

pub fn confidential_balance(who: AccountId) -> u64 {
    confidential_balance_of(CUSDC, who)
}

pub fn confidential_balance_of(asset: AssetId, who: AccountId) -> u64 {
    ConfidentialErc20::balance_of(asset, &who)
        .and_then(|h| Fhevm::debug_decrypt(&h))
        .map(|v| v.as_u64())
        .unwrap_or(0)
}

struct PalletGateway;

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

pub fn encrypt_for(user: AccountId, value: u64) -> (Handle, InputProof) {
    encrypt_into(CUSDC, user, value)
}

/// Encrypted amount that `user` may submit to `asset`.
pub fn encrypt_into(asset: AssetId, user: AccountId, value: u64) -> (Handle, InputProof) {
    let EncryptedInput { handles, input_proof } = FhevmInstance::new(PalletGateway)
        .create_encrypted_input(&custody_of(asset), &user)
        .add256(U256::from(value))
        .encrypt()
        .expect("encrypt");
    (handles[0], input_proof)
}
