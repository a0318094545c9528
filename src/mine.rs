use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::{Address, B256, Bytes, Keccak256, keccak256};
use alloy_sol_types::SolValue;
use rand::{Rng, SeedableRng, rng, rngs::StdRng};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use tracing::info;

use crate::error::{Error, Result};

/// Default ceiling on the number of salts tried before giving up.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u64 = 10_000_000;

/// Salts handed to the thread pool per round.
const DEFAULT_BATCH_SIZE: u64 = 1 << 14;

/// How often, in attempts, the search reports progress.
const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Init code of the token the launchpad deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InitCode {
    /// Creation bytecode without constructor arguments. The launchpad
    /// appends `abi.encode(name, symbol)` before deploying.
    Creation(Bytes),
    /// Keccak256 of the complete init code, arguments included.
    Hash(B256),
}

impl InitCode {
    /// Keccak256 of the init code deployed for a token called `name`/`symbol`.
    pub(crate) fn hash_for(&self, name: &str, symbol: &str) -> Result<B256> {
        match self {
            Self::Creation(code) if code.is_empty() => Err(Error::InvalidInitCode(
                "creation bytecode is empty".into(),
            )),
            Self::Creation(code) => {
                let args = (name.to_owned(), symbol.to_owned()).abi_encode_params();
                let mut init_code = Vec::with_capacity(code.len() + args.len());
                init_code.extend_from_slice(code);
                init_code.extend_from_slice(&args);
                Ok(keccak256(init_code))
            }
            Self::Hash(hash) if hash.is_zero() => {
                Err(Error::InvalidInitCode("init code hash is zero".into()))
            }
            Self::Hash(hash) => Ok(*hash),
        }
    }
}

/// Everything needed to predict where the launchpad will deploy a token.
#[derive(Debug, Clone)]
pub(crate) struct AddressMiningRequest {
    /// Launchpad contract performing the CREATE2 deployment.
    pub(crate) launchpad: Address,
    pub(crate) init_code: InitCode,
    /// The token the new one is paired with; the mined address must sort
    /// below it so the new token becomes token0.
    pub(crate) reference: Address,
    pub(crate) deployer: Address,
    pub(crate) name: String,
    pub(crate) symbol: String,
}

/// Knobs for the salt search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MiningOptions {
    pub(crate) max_attempts: u64,
    pub(crate) batch_size: u64,
    pub(crate) progress_interval: u64,
    /// Seeds the session entropy for reproducible runs.
    pub(crate) seed: Option<u64>,
}

impl Default for MiningOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: None,
        }
    }
}

impl MiningOptions {
    fn entropy(&self) -> [u8; 32] {
        let mut entropy = [0u8; 32];
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed).fill(&mut entropy),
            None => rng().fill(&mut entropy),
        }
        entropy
    }
}

/// A salt whose deployment address satisfied the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Found {
    pub(crate) salt: B256,
    pub(crate) address: Address,
    /// Number of salts tried, the winning one included.
    pub(crate) attempts: u64,
}

/// Outcome of mining a launchpad token address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MinedToken {
    /// Salt to pass to the launchpad.
    pub(crate) salt: B256,
    /// Salt bound to the deployer and token metadata, as used in CREATE2.
    pub(crate) salt_hash: B256,
    pub(crate) address: Address,
    pub(crate) attempts: u64,
}

/// Derives the salt tried at `attempt` from the session entropy.
///
/// Attempts never repeat within a session and sessions never share
/// entropy unless seeded alike.
fn candidate_salt(entropy: &[u8; 32], attempt: u64) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(entropy);
    hasher.update(attempt.to_be_bytes());
    hasher.finalize()
}

/// Defines the interface for address mining algorithms.
///
/// Implementations must be thread-safe to enable parallel mining.
pub(crate) trait Miner: Sync {
    /// Calculates the contract address that would result from deploying with the given salt.
    fn compute_address(&self, salt: &B256) -> Address;

    /// Searches for a salt whose deployment address sorts strictly below
    /// `reference` as a big-endian unsigned integer.
    ///
    /// Salts are tried in parallel batches. Within a batch the lowest
    /// satisfying attempt wins, so a seeded search always returns the same
    /// salt. `cancel` is polled once per attempt.
    fn mine_below(
        &self,
        reference: Address,
        options: &MiningOptions,
        cancel: &AtomicBool,
    ) -> Result<Found> {
        let entropy = options.entropy();
        let batch_size = options.batch_size.max(1);
        let progress_interval = options.progress_interval.max(1);

        let mut searched = 0u64;
        let mut next_report = progress_interval;

        while searched < options.max_attempts {
            let end = searched.saturating_add(batch_size).min(options.max_attempts);

            let found = (searched..end).into_par_iter().find_map_first(|attempt| {
                if cancel.load(Ordering::Relaxed) {
                    return Some(Err(Error::Cancelled));
                }

                let salt = candidate_salt(&entropy, attempt);
                let address = self.compute_address(&salt);

                (address < reference).then(|| {
                    Ok(Found {
                        salt,
                        address,
                        attempts: attempt + 1,
                    })
                })
            });

            if let Some(found) = found {
                return found;
            }

            searched = end;
            if searched >= next_report {
                info!(searched, %reference, "still mining");
                next_report = searched.saturating_add(progress_interval);
            }
        }

        Err(Error::AddressMiningExhausted {
            reference,
            attempts: searched,
        })
    }
}

/// Mines salts for tokens deployed by the launchpad.
///
/// The launchpad does not use the caller's salt directly. It hashes
/// `abi.encode(salt, deployer, name, symbol)` first, so a salt mined for
/// one token cannot be replayed for another.
#[derive(Debug, Clone)]
pub(crate) struct TokenMiner {
    launchpad: Address,
    init_code_hash: B256,
    /// ABI encoding of `(deployer, name, symbol)` as it follows the salt word.
    salt_tail: Vec<u8>,
}

impl TokenMiner {
    pub(crate) fn new(
        launchpad: Address,
        init_code: &InitCode,
        deployer: Address,
        name: &str,
        symbol: &str,
    ) -> Result<Self> {
        let init_code_hash = init_code.hash_for(name, symbol)?;

        // bytes32 is static, so the salt only ever occupies the first word
        let encoded =
            (B256::ZERO, deployer, name.to_owned(), symbol.to_owned()).abi_encode_params();

        Ok(Self {
            launchpad,
            init_code_hash,
            salt_tail: encoded[32..].to_vec(),
        })
    }

    pub(crate) fn from_request(request: &AddressMiningRequest) -> Result<Self> {
        Self::new(
            request.launchpad,
            &request.init_code,
            request.deployer,
            &request.name,
            &request.symbol,
        )
    }

    pub(crate) fn init_code_hash(&self) -> B256 {
        self.init_code_hash
    }

    /// Binds `salt` to the deployer and token metadata.
    pub(crate) fn salt_hash(&self, salt: &B256) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(salt);
        hasher.update(&self.salt_tail);
        hasher.finalize()
    }
}

impl Miner for TokenMiner {
    fn compute_address(&self, salt: &B256) -> Address {
        self.launchpad.create2(self.salt_hash(salt), self.init_code_hash)
    }
}

/// Finds a salt under which the launchpad deploys the requested token at an
/// address below `request.reference`.
pub(crate) fn guess_token_address(
    request: &AddressMiningRequest,
    options: &MiningOptions,
    cancel: &AtomicBool,
) -> Result<MinedToken> {
    let miner = TokenMiner::from_request(request)?;

    info!(
        launchpad = %request.launchpad,
        reference = %request.reference,
        init_code_hash = %miner.init_code_hash(),
        max_attempts = options.max_attempts,
        "mining token salt"
    );

    let found = miner.mine_below(request.reference, options, cancel)?;

    info!(
        salt = %found.salt,
        address = %found.address,
        attempts = found.attempts,
        "found token salt"
    );

    Ok(MinedToken {
        salt: found.salt,
        salt_hash: miner.salt_hash(&found.salt),
        address: found.address,
        attempts: found.attempts,
    })
}

#[cfg(test)]
fn test_request(reference: Address) -> AddressMiningRequest {
    use alloy_primitives::{address, bytes};

    AddressMiningRequest {
        launchpad: address!("0xc0ffee0000000000000000000000000000000001"),
        init_code: InitCode::Creation(bytes!("6080604052")),
        reference,
        deployer: address!("0xb0a8169d471051130cc458e4862b7fd0008cdf82"),
        name: "Test Token".into(),
        symbol: "TEST".into(),
    }
}

#[test]
fn test_token_address_matches_recorded_vector() {
    use alloy_primitives::{address, b256};

    let request = test_request(Address::ZERO);
    let miner = TokenMiner::from_request(&request).unwrap();
    let salt = B256::repeat_byte(0x42);

    assert_eq!(
        miner.init_code_hash(),
        b256!("0xbab0e43ce426c2ce8849d12aaffa55abee09d5252a6d4b9566817a8ba90052b7")
    );
    assert_eq!(
        miner.salt_hash(&salt),
        b256!("0x0a749108b13a951ea5be5016cdb2b297460372de1a99315d4cffea01ec1a272a")
    );
    assert_eq!(
        miner.compute_address(&salt),
        address!("0xd55f461655051533a9fff9194eec7ac427e8507c")
    );
}

#[test]
fn test_salt_tail_matches_full_encoding() {
    let request = test_request(Address::ZERO);
    let miner = TokenMiner::from_request(&request).unwrap();
    let salt = B256::repeat_byte(0x42);
    let full = (salt, request.deployer, request.name.clone(), request.symbol.clone())
        .abi_encode_params();
    assert_eq!(miner.salt_hash(&salt), keccak256(full));
}

#[test]
fn test_init_code_hash_passthrough() {
    let hash = B256::repeat_byte(0x11);
    assert_eq!(InitCode::Hash(hash).hash_for("A", "B").unwrap(), hash);
}

#[test]
fn test_empty_init_code_rejected() {
    let mut request = test_request(Address::repeat_byte(0xff));
    request.init_code = InitCode::Creation(Bytes::new());
    assert!(matches!(
        guess_token_address(&request, &MiningOptions::default(), &AtomicBool::new(false)),
        Err(Error::InvalidInitCode(_))
    ));
    assert!(matches!(
        InitCode::Hash(B256::ZERO).hash_for("A", "B"),
        Err(Error::InvalidInitCode(_))
    ));
}

#[test]
fn test_candidate_salt_vector() {
    use alloy_primitives::b256;

    assert_eq!(
        candidate_salt(&[7u8; 32], 3),
        b256!("0x19ce3f79c326764135f070b70541c73e1d5ceb26915d2943eec36a3ee89887ca")
    );
}

#[test]
fn test_max_reference_succeeds_first_try() {
    let request = test_request(Address::repeat_byte(0xff));
    let mined =
        guess_token_address(&request, &MiningOptions::default(), &AtomicBool::new(false)).unwrap();
    assert_eq!(mined.attempts, 1);
    assert!(mined.address < request.reference);
}

#[test]
fn test_zero_reference_exhausts() {
    let request = test_request(Address::ZERO);
    let options = MiningOptions {
        max_attempts: 5_000,
        batch_size: 512,
        ..MiningOptions::default()
    };
    match guess_token_address(&request, &options, &AtomicBool::new(false)) {
        Err(Error::AddressMiningExhausted { attempts, reference }) => {
            assert_eq!(attempts, 5_000);
            assert_eq!(reference, Address::ZERO);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[test]
fn test_zero_attempt_ceiling_exhausts_immediately() {
    let request = test_request(Address::repeat_byte(0xff));
    let options = MiningOptions {
        max_attempts: 0,
        ..MiningOptions::default()
    };
    assert!(matches!(
        guess_token_address(&request, &options, &AtomicBool::new(false)),
        Err(Error::AddressMiningExhausted { attempts: 0, .. })
    ));
}

#[test]
fn test_cancelled_search() {
    let request = test_request(Address::ZERO);
    assert!(matches!(
        guess_token_address(&request, &MiningOptions::default(), &AtomicBool::new(true)),
        Err(Error::Cancelled)
    ));
}

#[test]
fn test_seeded_search_is_reproducible() {
    let request = test_request(Address::repeat_byte(0x10));
    let options = MiningOptions {
        seed: Some(7),
        batch_size: 64,
        ..MiningOptions::default()
    };
    let cancel = AtomicBool::new(false);
    let first = guess_token_address(&request, &options, &cancel).unwrap();
    let second = guess_token_address(&request, &options, &cancel).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_mined_address_rederives_and_sorts_below_reference() {
    use rand::RngCore;

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let cancel = AtomicBool::new(false);

    for trial in 0..100 {
        // Keep the leading byte away from zero so a hit stays likely.
        let mut raw = [0u8; 20];
        rng.fill_bytes(&mut raw);
        raw[0] = raw[0].max(0x08);
        let request = test_request(Address::from(raw));

        let options = MiningOptions {
            seed: Some(trial),
            batch_size: 256,
            ..MiningOptions::default()
        };
        let mined = guess_token_address(&request, &options, &cancel).unwrap();

        assert!(mined.address < request.reference, "trial {trial}");

        let miner = TokenMiner::from_request(&request).unwrap();
        assert_eq!(miner.compute_address(&mined.salt), mined.address);
        assert_eq!(
            request.launchpad.create2(mined.salt_hash, miner.init_code_hash()),
            mined.address
        );
    }
}

#[test]
fn test_miner_stops_on_first_satisfying_attempt() {
    use std::sync::atomic::AtomicU64;

    // Deploys to the zero address only for salts whose first byte is zero.
    struct Sparse(AtomicU64);

    impl Miner for Sparse {
        fn compute_address(&self, salt: &B256) -> Address {
            self.0.fetch_add(1, Ordering::Relaxed);
            if salt[0] == 0 { Address::ZERO } else { Address::repeat_byte(0xff) }
        }
    }

    let miner = Sparse(AtomicU64::new(0));
    let options = MiningOptions {
        seed: Some(1),
        batch_size: 64,
        ..MiningOptions::default()
    };
    let found = miner
        .mine_below(Address::repeat_byte(0x01), &options, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(found.salt[0], 0);
    assert_eq!(found.address, Address::ZERO);
    assert!(miner.0.load(Ordering::Relaxed) >= found.attempts);
}
