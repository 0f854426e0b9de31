use crate::pallet as pallet_confidential_erc20;
use confidential_erc20_primitives::{AclCtx, AclProvider, Handle, InputProof, Op};
use fhevm_client::{
    ClientError, EncryptedInput, FhevmInstance, Keypair, ReencryptionGateway, reencrypt_euint256,
};
use fhevm_mock_coprocessor::PlaintextCoprocessor;
use frame_support::{PalletId, construct_runtime, derive_impl, parameter_types};
use sp_core::U256;
use sp_runtime::{BuildStorage, DispatchError, traits::IdentityLookup};

// u128 so that per-token contract accounts do not collide after truncation.
pub type AccountId = u128;
pub type AssetId = u32;
pub type Balance = u64;
pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;
pub const ASSET: AssetId = 7;
pub const OTHER_ASSET: AssetId = 8;

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Runtime {
    type Block = frame_system::mocking::MockBlock<Runtime>;
    type AccountId = AccountId;
    type Lookup = IdentityLookup<AccountId>;
}

parameter_types! {
    pub const MaxCiphertextLen: u32 = 64;
    pub const Erc20PalletId: PalletId = PalletId(*b"cf/erc20");
    pub const StringLimit: u32 = 32;
    /// Account whose transfers the policy hook refuses.
    pub static Frozen: Option<AccountId> = None;
}

impl pallet_fhevm::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type Coprocessor = PlaintextCoprocessor;
    type MaxCiphertextLen = MaxCiphertextLen;
    type WeightInfo = ();
}

pub struct FreezeAcl;
impl AclProvider<AccountId, AssetId, Balance> for FreezeAcl {
    fn authorize(op: Op, ctx: &AclCtx<Balance, AccountId, AssetId>) -> Result<(), DispatchError> {
        match (op, Frozen::get()) {
            (Op::Transfer | Op::TransferFrom, Some(frozen)) if ctx.caller == frozen => {
                Err(DispatchError::Other("account frozen"))
            }
            _ => Ok(()),
        }
    }
}

impl pallet_confidential_erc20::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type AssetId = AssetId;
    type Balance = Balance;
    type Backend = Fhevm;
    type Acl = FreezeAcl;
    type PalletId = Erc20PalletId;
    type StringLimit = StringLimit;
    type WeightInfo = ();
}

construct_runtime!(
    pub enum Runtime {
        System: frame_system,
        Fhevm: pallet_fhevm,
        ConfidentialErc20: pallet_confidential_erc20,
    }
);

pub fn new_test_ext() -> sp_io::TestExternalities {
    let mut t = frame_system::GenesisConfig::<Runtime>::default()
        .build_storage()
        .unwrap();
    pallet_confidential_erc20::GenesisConfig::<Runtime> {
        tokens: vec![(ASSET, ALICE, b"Naraggara".to_vec(), b"NARA".to_vec(), 18)],
    }
    .assimilate_storage(&mut t)
    .unwrap();
    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| System::set_block_number(1));
    ext
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

pub fn instance() -> FhevmInstance<PalletGateway> {
    FhevmInstance::new(PalletGateway)
}

/// Encrypted u256 bound to `asset`'s contract account and `user`.
pub fn encrypt_for(asset: AssetId, user: AccountId, value: u64) -> (Handle, InputProof) {
    let contract = ConfidentialErc20::contract_account(asset);
    let EncryptedInput { handles, input_proof } = instance()
        .create_encrypted_input(&contract, &user)
        .add256(U256::from(value))
        .encrypt()
        .expect("encrypt");
    (handles[0], input_proof)
}

pub fn plain(handle: &Handle) -> u64 {
    Fhevm::debug_decrypt(handle).expect("known handle").as_u64()
}

/// Decrypted balance, zero when the account never held the token.
pub fn balance(asset: AssetId, who: AccountId) -> u64 {
    ConfidentialErc20::balance_of(asset, &who).map(|h| plain(&h)).unwrap_or(0)
}

pub fn allowance(asset: AssetId, owner: AccountId, spender: AccountId) -> u64 {
    ConfidentialErc20::allowance(asset, &owner, &spender).map(|h| plain(&h)).unwrap_or(0)
}

/// Client side read of `owner`'s balance performed as `user`.
pub fn reencrypt_balance(
    user: AccountId,
    owner: AccountId,
    asset: AssetId,
) -> Result<U256, ClientError> {
    let handle = ConfidentialErc20::balance_of(asset, &owner).expect("balance");
    let contract = ConfidentialErc20::contract_account(asset);
    reencrypt_euint256(&Keypair::generate(), &user, &instance(), &handle, &contract)
}
