use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKdfParams")]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

#[derive(Deserialize)]
struct RawKdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl TryFrom<RawKdfParams> for KdfParams {
    type Error = Error;

    fn try_from(raw: RawKdfParams) -> Result<Self> {
        KdfParams::new(raw.mem_cost_kib, raw.time_cost, raw.parallelism)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // default memory cost
            mem_cost_kib: 64 * 1024, // 64 MiB
            // default number of iterations
            time_cost: 3,
            // default number of threads
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    #[cfg(test)]
    pub(crate) fn unchecked(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        }
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            return Err(Error::invalid_input("argon2 parallelism must be >= 1"));
        }
        if self.parallelism > Params::MAX_P_COST {
            return Err(Error::invalid_input(format!(
                "argon2 parallelism must be <= {}",
                Params::MAX_P_COST
            )));
        }
        if self.time_cost < 1 {
            return Err(Error::invalid_input("argon2 time cost must be >= 1"));
        }
        if self
            .parallelism
            .checked_mul(8)
            .is_none_or(|min| self.mem_cost_kib < min)
        {
            return Err(Error::invalid_input(
                "argon2 memory cost must be at least 8 * parallelism",
            ));
        }
        Ok(())
    }
}

/// Stretches `secret` into a 32-byte key with Argon2id.
///
/// The Argon2 salt is `label || salt`, so the same secret stretched under
/// different labels yields unrelated keys. `salt` may be empty when the
/// label alone is the (fixed) salt.
pub fn stretch(
    secret: &[u8],
    label: &[u8],
    salt: &[u8],
    kdf: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    kdf.validate()?;

    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| Error::internal(format!("failed to construct Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut full_salt = Vec::with_capacity(label.len() + salt.len());
    full_salt.extend_from_slice(label);
    full_salt.extend_from_slice(salt);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(secret, &full_salt, key.as_mut())
        .map_err(|e| Error::internal(format!("argon2 key derivation failed: {e}")))?;

    Ok(key)
}
