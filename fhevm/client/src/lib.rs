//! # fhevm-client
//!
//! Client side of the FHE gateway:
//!
//! - [`FhevmInstance::create_encrypted_input`] accumulates typed values for a
//!   (contract, user) pair and encrypts them into handles plus one proof.
//! - [`Keypair`] is the reencryption key a user holds.
//! - [`reencrypt_euint256`] asks a [`ReencryptionGateway`] for a value sealed
//!   to the keypair and unseals it locally.
//!
//! ```rust,ignore
//! let instance = FhevmInstance::new(gateway);
//! let input = instance
//!     .create_encrypted_input(&token_account, &alice)
//!     .add256(1337u64.into())
//!     .encrypt()?;
//! // submit input.handles[0] and input.input_proof with the transfer call
//!
//! let keypair = Keypair::generate();
//! let balance = reencrypt_euint256(&keypair, &alice, &instance, &handle, &token_account)?;
//! ```
//!
//! Accounts are bound into inputs by their SCALE encoding, the same bytes the
//! gateway pallet hands to its coprocessor.


use parity_scale_codec::Encode;
use rand::RngCore;
use sp_core::U256;
use thiserror::Error;

use confidential_erc20_primitives::{FheType, Handle, InputProof, SealedValue};
use fhevm_mock_coprocessor::{MockError, SALT_LEN, build_input, public_key_of, unseal};

pub use fhevm_mock_coprocessor::MAX_INPUT_VALUES;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("encrypted input has no values")]
    EmptyInput,
    #[error("encrypted input holds at most {MAX_INPUT_VALUES} values")]
    TooManyValues,
    #[error("value does not fit its encrypted type")]
    ValueOutOfRange,
    #[error("input proof exceeds the on-chain size limit")]
    ProofTooLarge,
    #[error("encryption failed: {0}")]
    Encryption(&'static str),
    /// Refusal reported by the gateway, message passed through verbatim.
    #[error("{0}")]
    Reencrypt(String),
}

impl From<MockError> for ClientError {
    fn from(e: MockError) -> Self {
        match e {
            MockError::TooManyValues => ClientError::TooManyValues,
            MockError::ValueOutOfRange => ClientError::ValueOutOfRange,
            _ => ClientError::Encryption("malformed ciphertext"),
        }
    }
}

/// Remote side of reencryption. On chain this is `pallet_fhevm::Pallet::reencrypt`.
pub trait ReencryptionGateway {
    type AccountId: Encode;
    type Error: core::fmt::Display;

    fn reencrypt(
        &self,
        user: &Self::AccountId,
        handle: &Handle,
        contract: &Self::AccountId,
        public_key: &[u8],
    ) -> Result<SealedValue, Self::Error>;
}

/// Reencryption keypair. The secret never leaves the client.
#[derive(Clone)]
pub struct Keypair {
    secret: [u8; 32],
    public: [u8; 32],
}

impl Keypair {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { public: public_key_of(&seed), secret: seed }
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    fn unseal(&self, sealed: &SealedValue) -> U256 {
        unseal(sealed, &public_key_of(&self.secret))
    }
}

impl core::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keypair").field("public", &self.public).finish_non_exhaustive()
    }
}

/// Handles and the proof binding them to one (contract, user) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub input_proof: InputProof,
}

pub struct EncryptedInputBuilder {
    contract: Vec<u8>,
    user: Vec<u8>,
    values: Vec<(FheType, U256)>,
}

impl EncryptedInputBuilder {
    pub fn add_bool(mut self, value: bool) -> Self {
        self.values.push((FheType::Bool, U256::from(value as u8)));
        self
    }

    pub fn add64(mut self, value: u64) -> Self {
        self.values.push((FheType::Uint64, U256::from(value)));
        self
    }

    pub fn add256(mut self, value: U256) -> Self {
        self.values.push((FheType::Uint256, value));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn encrypt(self) -> Result<EncryptedInput, ClientError> {
        self.encrypt_with_rng(&mut rand::rng())
    }

    /// Same as [`Self::encrypt`] with a caller supplied randomness source.
    pub fn encrypt_with_rng<R: RngCore>(self, rng: &mut R) -> Result<EncryptedInput, ClientError> {
        if self.values.is_empty() {
            return Err(ClientError::EmptyInput);
        }
        if self.values.len() > MAX_INPUT_VALUES {
            return Err(ClientError::TooManyValues);
        }

        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);

        let (handles, proof) = build_input(&self.contract, &self.user, &salt, &self.values)?;
        let input_proof = InputProof::try_from(proof).map_err(|_| ClientError::ProofTooLarge)?;
        Ok(EncryptedInput { handles, input_proof })
    }
}

/// Connection to one chain's gateway.
pub struct FhevmInstance<G> {
    gateway: G,
}

impl<G: ReencryptionGateway> FhevmInstance<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn create_encrypted_input(
        &self,
        contract: &G::AccountId,
        user: &G::AccountId,
    ) -> EncryptedInputBuilder {
        EncryptedInputBuilder {
            contract: contract.encode(),
            user: user.encode(),
            values: Vec::new(),
        }
    }

    pub fn generate_keypair(&self) -> Keypair {
        Keypair::generate()
    }
}

/// Read the 256-bit value behind `handle` as `user`, scoped to `contract`.
pub fn reencrypt_euint256<G: ReencryptionGateway>(
    keypair: &Keypair,
    user: &G::AccountId,
    instance: &FhevmInstance<G>,
    handle: &Handle,
    contract: &G::AccountId,
) -> Result<U256, ClientError> {
    let sealed = instance
        .gateway
        .reencrypt(user, handle, contract, keypair.public_key())
        .map_err(|e| ClientError::Reencrypt(e.to_string()))?;
    Ok(keypair.unseal(&sealed))
}
