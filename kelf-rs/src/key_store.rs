use crate::error::{KelfError, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Names of the platform secrets consumed by the signature chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyName {
    SignatureMasterKey,
    SignatureHashKey,
    KbitMasterKey,
    KcMasterKey,
    KbitIv,
    KcIv,
    ContentIv,
    ContentTableIv,
    RootSignatureMasterKey,
    RootSignatureHashKey,
}

impl KeyName {
    /// Every name, in key-store order.
    pub const ALL: [KeyName; 10] = [
        KeyName::SignatureMasterKey,
        KeyName::SignatureHashKey,
        KeyName::KbitMasterKey,
        KeyName::KcMasterKey,
        KeyName::KbitIv,
        KeyName::KcIv,
        KeyName::ContentIv,
        KeyName::ContentTableIv,
        KeyName::RootSignatureMasterKey,
        KeyName::RootSignatureHashKey,
    ];

    /// The canonical key-store entry name.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyName::SignatureMasterKey => "MG_SIG_MASTER_KEY",
            KeyName::SignatureHashKey => "MG_SIG_HASH_KEY",
            KeyName::KbitMasterKey => "MG_KBIT_MASTER_KEY",
            KeyName::KcMasterKey => "MG_KC_MASTER_KEY",
            KeyName::KbitIv => "MG_KBIT_IV",
            KeyName::KcIv => "MG_KC_IV",
            KeyName::ContentIv => "MG_CONTENT_IV",
            KeyName::ContentTableIv => "MG_CONTENT_TABLE_IV",
            KeyName::RootSignatureMasterKey => "MG_ROOTSIG_MASTER_KEY",
            KeyName::RootSignatureHashKey => "MG_ROOTSIG_HASH_KEY",
        }
    }

    /// Byte width of the secret. The three secrets used as two-key
    /// Triple-DES keys are 16 bytes wide.
    pub fn width(self) -> usize {
        match self {
            KeyName::KbitMasterKey | KeyName::KcMasterKey | KeyName::RootSignatureHashKey => 16,
            _ => 8,
        }
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyName {
    type Err = KelfError;

    fn from_str(s: &str) -> Result<Self> {
        KeyName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KelfError::InvalidConfig(format!("Unknown key name: {s}")))
    }
}

/// Platform secrets used to sign, wrap and encrypt KELF containers.
///
/// The store is built once by the caller and borrowed by the codec; it is
/// never mutated afterwards.
#[derive(Clone)]
pub struct KeyStore {
    keys: HashMap<KeyName, Vec<u8>>,
    override_kbit: Option<[u8; 16]>,
    override_kc: Option<[u8; 16]>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("keys", &self.keys.len())
            .field("has_override", &self.override_keys().is_some())
            .finish()
    }
}

impl KeyStore {
    /// Builds a key store from `(name, bytes)` entries.
    ///
    /// Every [`KeyName`] must be present with exactly [`KeyName::width`] bytes.
    /// `OVERRIDE_KBIT` and `OVERRIDE_KC` are accepted as optional 16-byte
    /// entries; an empty value counts as absent.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut keys = HashMap::new();
        let mut override_kbit = None;
        let mut override_kc = None;

        for (name, value) in entries {
            let name = name.trim();
            if name.eq_ignore_ascii_case("OVERRIDE_KBIT") {
                override_kbit = Self::override_key(name, value)?;
                continue;
            }
            if name.eq_ignore_ascii_case("OVERRIDE_KC") {
                override_kc = Self::override_key(name, value)?;
                continue;
            }
            let key = name.parse::<KeyName>()?;
            if value.len() != key.width() {
                return Err(KelfError::InvalidConfig(format!(
                    "{key} must be {} bytes, got {}",
                    key.width(),
                    value.len()
                )));
            }
            keys.insert(key, value.to_vec());
        }

        if let Some(missing) = KeyName::ALL.into_iter().find(|k| !keys.contains_key(k)) {
            return Err(KelfError::InvalidConfig(format!("Missing key {missing}")));
        }

        Ok(Self {
            keys,
            override_kbit,
            override_kc,
        })
    }

    /// Builds a key store from hex-encoded `(name, value)` entries.
    pub fn from_hex_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let decoded = entries
            .into_iter()
            .map(|(name, value)| {
                hex::decode(value.trim())
                    .map(|bytes| (name, bytes))
                    .map_err(|_| KelfError::InvalidConfig(format!("Invalid hex in {name}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(decoded.iter().map(|(name, bytes)| (*name, bytes.as_slice())))
    }

    fn override_key(name: &str, value: &[u8]) -> Result<Option<[u8; 16]>> {
        match value.len() {
            0 => Ok(None),
            16 => {
                let mut key = [0u8; 16];
                key.copy_from_slice(value);
                Ok(Some(key))
            }
            n => Err(KelfError::InvalidConfig(format!(
                "{name} must be empty or 16 bytes, got {n}"
            ))),
        }
    }

    /// Returns the secret stored under `name`.
    pub fn get(&self, name: KeyName) -> &[u8] {
        // Construction guarantees every name is present.
        self.keys.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns an IV-sized secret as an array.
    pub(crate) fn iv(&self, name: KeyName) -> [u8; 8] {
        let mut iv = [0u8; 8];
        iv.copy_from_slice(&self.get(name)[..8]);
        iv
    }

    /// `SignatureMasterKey ‖ SignatureHashKey`, the two-key signing key.
    pub(crate) fn signature_master_and_hash_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(self.get(KeyName::SignatureMasterKey));
        key[8..].copy_from_slice(self.get(KeyName::SignatureHashKey));
        key
    }

    /// The override `(Kbit, Kc)` pair, present only when both halves are set.
    pub fn override_keys(&self) -> Option<([u8; 16], [u8; 16])> {
        self.override_kbit.zip(self.override_kc)
    }
}
