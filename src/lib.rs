//! Identity-derived wallet seeds with passphrase-encrypted backups.
//!
//! [`RecoveryCoordinator`] is the entry point: it derives wallets from
//! identity assertions, seals them into [`BackupEnvelope`]s and restores
//! them. Every operation is synchronous, CPU-bound (Argon2id) and free of
//! I/O unless a [`BlobStore`] is passed in, so callers on an interactive
//! thread should run it on a worker and drop the result to cancel.

pub mod cipher;
pub mod config;
pub mod crypto;
pub mod envelope;
mod error;
pub mod storage;
pub mod wallet;

pub use crate::cipher::BackupCipher;
pub use crate::config::RecoveryConfig;
pub use crate::crypto::KdfParams;
pub use crate::envelope::BackupEnvelope;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::storage::{BlobStore, FileStore, MemoryStore};
pub use crate::wallet::{KeyDeriver, PUBLIC_ID_LEN, SEED_LEN, WalletKeyMaterial};

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Progress of a single restore attempt.
///
/// ```text
/// Pending ─▶ Verifying ─▶ Success | AuthFailed | IdentifierMismatch | Rejected(InvalidInput)
///    └─────▶ Rejected(UnsupportedVersion | WeakPassphrase | InvalidInput)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Pending,
    Verifying,
    Success,
    AuthFailed,
    IdentifierMismatch,
    Rejected(ErrorKind),
}

impl RestoreState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RestoreState::Pending | RestoreState::Verifying)
    }

    pub fn can_transition_to(&self, next: RestoreState) -> bool {
        use RestoreState::*;
        match (self, next) {
            (Pending, Verifying) => true,
            (Pending, Rejected(kind)) => matches!(
                kind,
                ErrorKind::UnsupportedVersion | ErrorKind::WeakPassphrase | ErrorKind::InvalidInput
            ),
            (Verifying, Success | AuthFailed | IdentifierMismatch) => true,
            (Verifying, Rejected(ErrorKind::InvalidInput | ErrorKind::Internal)) => true,
            _ => false,
        }
    }

    fn advance(&mut self, next: RestoreState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid restore transition {self:?} -> {next:?}"
        );
        debug!(from = ?self, to = ?next, "restore state");
        *self = next;
    }

    /// Terminal state reached when an attempt fails with `err`.
    fn failed(&self, err: &Error) -> RestoreState {
        match (self, err.kind()) {
            (RestoreState::Verifying, ErrorKind::AuthenticationFailed) => RestoreState::AuthFailed,
            (RestoreState::Verifying, ErrorKind::IdentifierMismatch) => {
                RestoreState::IdentifierMismatch
            }
            (_, kind) => RestoreState::Rejected(kind),
        }
    }
}

/// Result of one restore attempt together with the state it ended in.
///
/// No retries happen inside the coordinator; lockout after repeated
/// `AuthFailed` results is up to the caller.
#[derive(Debug)]
pub struct RestoreAttempt {
    state: RestoreState,
    result: Result<WalletKeyMaterial>,
}

impl RestoreAttempt {
    pub fn state(&self) -> RestoreState {
        self.state
    }

    pub fn is_success(&self) -> bool {
        self.state == RestoreState::Success
    }

    pub fn into_result(self) -> Result<WalletKeyMaterial> {
        self.result
    }
}

/// Orchestrates wallet derivation, backup and restore.
///
/// Holds only its configuration; cloning or sharing it across threads is
/// free of synchronization.
#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    config: RecoveryConfig,
    deriver: KeyDeriver,
    cipher: BackupCipher,
}

impl RecoveryCoordinator {
    pub fn new(config: RecoveryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            deriver: KeyDeriver::new(config.wallet_kdf),
            cipher: BackupCipher::new(config.backup_kdf),
        })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    fn check_passphrase(&self, passphrase: &[u8]) -> Result<()> {
        if passphrase.len() < self.config.min_passphrase_len {
            return Err(Error::weak_passphrase(self.config.min_passphrase_len));
        }
        Ok(())
    }

    /// Derives the wallet for an identity assertion.
    pub fn create_wallet(&self, assertion: &[u8]) -> Result<WalletKeyMaterial> {
        self.deriver.derive_wallet(assertion)
    }

    /// Seals the wallet seed under `passphrase`.
    ///
    /// The envelope is bound to the wallet's public identifier as
    /// associated data, so it only opens when that identifier is supplied
    /// again on restore.
    pub fn backup_wallet(
        &self,
        material: &WalletKeyMaterial,
        passphrase: &[u8],
    ) -> Result<BackupEnvelope> {
        self.check_passphrase(passphrase)?;

        let envelope =
            self.cipher
                .encrypt(material.seed(), passphrase, material.public_identifier())?;

        info!(wallet = %material.fingerprint(), "wallet backup created");
        Ok(envelope)
    }

    /// Restores a wallet and reports the state the attempt ended in.
    ///
    /// `expected_public_identifier` is used as associated data and, after
    /// decryption, compared in constant time with the identifier recomputed
    /// from the recovered seed. Without it only envelopes sealed with empty
    /// associated data open.
    pub fn restore(
        &self,
        envelope: &BackupEnvelope,
        passphrase: &[u8],
        expected_public_identifier: Option<&[u8]>,
    ) -> RestoreAttempt {
        let mut state = RestoreState::Pending;
        let result = self.run_restore(&mut state, envelope, passphrase, expected_public_identifier);

        if let Err(err) = &result {
            let terminal = state.failed(err);
            state.advance(terminal);
        }

        match &result {
            Ok(material) => info!(wallet = %material.fingerprint(), "wallet restored"),
            Err(_) => warn!(state = ?state, "wallet restore failed"),
        }

        RestoreAttempt { state, result }
    }

    /// Restores a wallet from an envelope. See [`restore`](Self::restore).
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` if the envelope version is unknown
    /// - `WeakPassphrase` if the passphrase is below the policy minimum
    /// - `InvalidInput` if the expected identifier or decrypted seed has the wrong length
    /// - `AuthenticationFailed` for a wrong passphrase or tampered envelope
    /// - `IdentifierMismatch` if the seed belongs to a different wallet
    pub fn restore_wallet(
        &self,
        envelope: &BackupEnvelope,
        passphrase: &[u8],
        expected_public_identifier: Option<&[u8]>,
    ) -> Result<WalletKeyMaterial> {
        self.restore(envelope, passphrase, expected_public_identifier)
            .into_result()
    }

    fn run_restore(
        &self,
        state: &mut RestoreState,
        envelope: &BackupEnvelope,
        passphrase: &[u8],
        expected: Option<&[u8]>,
    ) -> Result<WalletKeyMaterial> {
        if envelope.version() != crate::envelope::CURRENT_VERSION {
            return Err(Error::unsupported_version(envelope.version()));
        }
        self.check_passphrase(passphrase)?;
        if let Some(id) = expected {
            if id.len() != PUBLIC_ID_LEN {
                return Err(Error::invalid_input(format!(
                    "public identifier must be {PUBLIC_ID_LEN} bytes"
                )));
            }
        }

        state.advance(RestoreState::Verifying);

        let associated_data = expected.unwrap_or_default();
        let seed = self.cipher.decrypt(envelope, passphrase, associated_data)?;
        let material = WalletKeyMaterial::from_seed_slice(&seed)?;

        if let Some(id) = expected {
            if !bool::from(material.public_identifier()[..].ct_eq(id)) {
                return Err(Error::identifier_mismatch());
            }
        }

        state.advance(RestoreState::Success);
        Ok(material)
    }

    /// Seals an arbitrary secret, e.g. a mnemonic, under `passphrase`.
    pub fn backup_secret(
        &self,
        payload: &[u8],
        passphrase: &[u8],
        associated_data: &[u8],
    ) -> Result<BackupEnvelope> {
        self.check_passphrase(passphrase)?;
        self.cipher.encrypt(payload, passphrase, associated_data)
    }

    /// Opens an envelope created by [`backup_secret`](Self::backup_secret).
    pub fn restore_secret(
        &self,
        envelope: &BackupEnvelope,
        passphrase: &[u8],
        associated_data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.version() != crate::envelope::CURRENT_VERSION {
            return Err(Error::unsupported_version(envelope.version()));
        }
        self.check_passphrase(passphrase)?;
        self.cipher.decrypt(envelope, passphrase, associated_data)
    }

    /// Serializes `envelope` into the host store under `name`.
    pub fn store_backup<S: BlobStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
        envelope: &BackupEnvelope,
    ) -> Result<()> {
        store.put(name, &envelope.to_bytes()?)?;
        debug!(name, "backup stored");
        Ok(())
    }

    /// Loads and parses the envelope stored under `name`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if there is no blob under `name` or it is malformed,
    /// `UnsupportedVersion` if it was written by a newer format.
    pub fn load_backup<S: BlobStore + ?Sized>(&self, store: &S, name: &str) -> Result<BackupEnvelope> {
        let data = store
            .get(name)?
            .ok_or_else(|| Error::invalid_input(format!("no backup named '{name}'")))?;
        BackupEnvelope::from_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> RecoveryCoordinator {
        let cheap = KdfParams::new(8, 1, 1).unwrap();
        RecoveryCoordinator::new(RecoveryConfig {
            wallet_kdf: cheap,
            backup_kdf: cheap,
            min_passphrase_len: 8,
        })
        .unwrap()
    }

    #[test]
    fn backup_and_restore_scenario() {
        let rc = coordinator();
        let material = rc.create_wallet(b"mock_id_token_google_1700000000").unwrap();
        assert_eq!(material.seed().len(), 32);
        assert_eq!(material.public_identifier().len(), 32);

        let envelope = rc.backup_wallet(&material, b"correcthorsebattery").unwrap();

        let restored = rc
            .restore_wallet(
                &envelope,
                b"correcthorsebattery",
                Some(material.public_identifier()),
            )
            .unwrap();
        assert_eq!(restored.seed(), material.seed());
        assert_eq!(restored, material);

        let err = rc
            .restore_wallet(&envelope, b"wrongpassword", Some(material.public_identifier()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn restore_is_bound_to_the_wallet_identifier() {
        let rc = coordinator();
        let m1 = rc.create_wallet(b"assertion-one").unwrap();
        let m2 = rc.create_wallet(b"assertion-two").unwrap();

        let envelope = rc.backup_wallet(&m1, b"pw-pw-pw-pw").unwrap();

        // the identifier is associated data, so the wrong one fails the tag
        let attempt = rc.restore(&envelope, b"pw-pw-pw-pw", Some(m2.public_identifier()));
        assert_eq!(attempt.state(), RestoreState::AuthFailed);
        assert!(attempt.state().is_terminal());
        assert_eq!(
            attempt.into_result().unwrap_err().kind(),
            ErrorKind::AuthenticationFailed
        );
    }

    #[test]
    fn identifier_mismatch_on_unbound_seed_envelope() {
        let rc = coordinator();
        let m1 = rc.create_wallet(b"assertion-one").unwrap();
        let m2 = rc.create_wallet(b"assertion-two").unwrap();

        // seed sealed under m2's identifier: authenticates, but is m1's seed
        let envelope = rc
            .backup_secret(m1.seed(), b"pw-pw-pw-pw", m2.public_identifier())
            .unwrap();

        let attempt = rc.restore(&envelope, b"pw-pw-pw-pw", Some(m2.public_identifier()));
        assert_eq!(attempt.state(), RestoreState::IdentifierMismatch);
        assert_eq!(
            attempt.into_result().unwrap_err().kind(),
            ErrorKind::IdentifierMismatch
        );
    }

    #[test]
    fn restore_without_identifier_opens_unbound_envelopes_only() {
        let rc = coordinator();
        let m = rc.create_wallet(b"assertion").unwrap();

        let bound = rc.backup_wallet(&m, b"long enough").unwrap();
        let attempt = rc.restore(&bound, b"long enough", None);
        assert_eq!(attempt.state(), RestoreState::AuthFailed);

        let unbound = rc.backup_secret(m.seed(), b"long enough", b"").unwrap();
        let restored = rc.restore_wallet(&unbound, b"long enough", None).unwrap();
        assert_eq!(restored, m);
    }

    #[test]
    fn weak_passphrase_is_rejected() {
        let rc = coordinator();
        let m = rc.create_wallet(b"assertion").unwrap();

        let err = rc.backup_wallet(&m, b"short").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WeakPassphrase);

        let envelope = rc.backup_wallet(&m, b"long enough").unwrap();
        let attempt = rc.restore(&envelope, b"short", Some(m.public_identifier()));
        assert_eq!(
            attempt.state(),
            RestoreState::Rejected(ErrorKind::WeakPassphrase)
        );
    }

    #[test]
    fn version_99_is_rejected_before_crypto() {
        let rc = coordinator();
        let envelope = BackupEnvelope::with_version(99, vec![0; 16], vec![0; 24], vec![0; 16], vec![1; 32]);

        let attempt = rc.restore(&envelope, b"correcthorsebattery", None);
        assert_eq!(
            attempt.state(),
            RestoreState::Rejected(ErrorKind::UnsupportedVersion)
        );

        let mut bytes = rc
            .backup_wallet(&rc.create_wallet(b"a").unwrap(), b"correcthorsebattery")
            .unwrap()
            .to_bytes()
            .unwrap();
        bytes[0] = 99;
        assert_eq!(
            BackupEnvelope::from_bytes(&bytes).unwrap_err().kind(),
            ErrorKind::UnsupportedVersion
        );
    }

    #[test]
    fn malformed_expected_identifier_is_rejected() {
        let rc = coordinator();
        let m = rc.create_wallet(b"assertion").unwrap();
        let envelope = rc.backup_wallet(&m, b"long enough").unwrap();

        let attempt = rc.restore(&envelope, b"long enough", Some(&[0u8; 5]));
        assert_eq!(attempt.state(), RestoreState::Rejected(ErrorKind::InvalidInput));
    }

    #[test]
    fn non_seed_payload_is_rejected_after_verification() {
        let rc = coordinator();
        let envelope = rc
            .backup_secret(b"abandon ability able about", b"long enough", b"")
            .unwrap();

        let attempt = rc.restore(&envelope, b"long enough", None);
        assert_eq!(attempt.state(), RestoreState::Rejected(ErrorKind::InvalidInput));

        let phrase = rc.restore_secret(&envelope, b"long enough", b"").unwrap();
        assert_eq!(phrase.as_slice(), b"abandon ability able about");
    }

    #[test]
    fn store_and_load_backup() {
        let rc = coordinator();
        let store = MemoryStore::new();
        let m = rc.create_wallet(b"assertion").unwrap();
        let envelope = rc.backup_wallet(&m, b"long enough").unwrap();

        rc.store_backup(&store, "main", &envelope).unwrap();
        let loaded = rc.load_backup(&store, "main").unwrap();
        assert_eq!(loaded, envelope);

        let err = rc.load_backup(&store, "other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn state_machine_transitions() {
        use RestoreState::*;

        assert!(Pending.can_transition_to(Verifying));
        assert!(Pending.can_transition_to(Rejected(ErrorKind::WeakPassphrase)));
        assert!(Verifying.can_transition_to(AuthFailed));
        assert!(!Pending.can_transition_to(Success));
        assert!(!Success.can_transition_to(Verifying));
        assert!(!Verifying.can_transition_to(Rejected(ErrorKind::UnsupportedVersion)));
        assert!(!Pending.is_terminal());
        assert!(IdentifierMismatch.is_terminal());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RecoveryConfig {
            min_passphrase_len: 0,
            ..RecoveryConfig::default()
        };
        assert!(RecoveryCoordinator::new(config).is_err());
    }

    #[test]
    fn coordinator_is_shareable_across_threads() {
        let rc = std::sync::Arc::new(coordinator());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let rc = rc.clone();
                std::thread::spawn(move || {
                    let m = rc.create_wallet(format!("token-{i}").as_bytes()).unwrap();
                    let env = rc.backup_wallet(&m, b"long enough").unwrap();
                    rc.restore_wallet(&env, b"long enough", Some(m.public_identifier()))
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }
}
