//! Network parameters: address prefixes and policy activation heights

use crate::constants::*;
use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Networks whose addresses and policy rules are understood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Testnet4,
    Signet,
    Liquid,
    LiquidTestnet,
}

/// Address encoding parameters of a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    /// Base58check version byte of P2PKH addresses
    pub pubkey_hash_version: u8,
    /// Base58check version byte of P2SH addresses
    pub script_hash_version: u8,
    /// Leading characters of base58 P2PKH addresses
    pub pubkey_hash_prefixes: &'static [char],
    /// Leading characters of base58 P2SH addresses
    pub script_hash_prefixes: &'static [char],
    /// Human-readable part of segwit addresses
    pub bech32_hrp: &'static str,
    /// Leading character of confidential base58 addresses (Liquid only)
    pub confidential_prefix: Option<char>,
    /// Human-readable part of confidential segwit addresses (Liquid only)
    pub confidential_hrp: Option<&'static str>,
}

const MAINNET_PARAMS: NetworkParams = NetworkParams {
    pubkey_hash_version: 0x00,
    script_hash_version: 0x05,
    pubkey_hash_prefixes: &['1'],
    script_hash_prefixes: &['3'],
    bech32_hrp: "bc",
    confidential_prefix: None,
    confidential_hrp: None,
};

const TESTNET_PARAMS: NetworkParams = NetworkParams {
    pubkey_hash_version: 0x6f,
    script_hash_version: 0xc4,
    pubkey_hash_prefixes: &['m', 'n'],
    script_hash_prefixes: &['2'],
    bech32_hrp: "tb",
    confidential_prefix: None,
    confidential_hrp: None,
};

const LIQUID_PARAMS: NetworkParams = NetworkParams {
    pubkey_hash_version: 0x39,
    script_hash_version: 0x27,
    pubkey_hash_prefixes: &['P', 'Q'],
    script_hash_prefixes: &['G', 'H'],
    bech32_hrp: "ex",
    confidential_prefix: Some('V'),
    confidential_hrp: Some("lq"),
};

const LIQUID_TESTNET_PARAMS: NetworkParams = NetworkParams {
    pubkey_hash_version: 0x24,
    script_hash_version: 0x13,
    pubkey_hash_prefixes: &['F'],
    script_hash_prefixes: &['8', '9'],
    bech32_hrp: "tex",
    confidential_prefix: Some('V'),
    confidential_hrp: Some("tlq"),
};

impl Network {
    pub const ALL: [Network; 6] = [
        Network::Mainnet,
        Network::Testnet,
        Network::Testnet4,
        Network::Signet,
        Network::Liquid,
        Network::LiquidTestnet,
    ];

    /// Address encoding parameters for this network
    pub fn params(&self) -> &'static NetworkParams {
        match self {
            Network::Mainnet => &MAINNET_PARAMS,
            Network::Testnet | Network::Testnet4 | Network::Signet => &TESTNET_PARAMS,
            Network::Liquid => &LIQUID_PARAMS,
            Network::LiquidTestnet => &LIQUID_TESTNET_PARAMS,
        }
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self, Network::Liquid | Network::LiquidTestnet)
    }

    /// Segwit address prefix including the separator, e.g. `bc1`
    pub fn bech32_prefix(&self) -> String {
        format!("{}1", self.params().bech32_hrp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Testnet4 => "testnet4",
            Network::Signet => "signet",
            Network::Liquid => "liquid",
            Network::LiquidTestnet => "liquidtestnet",
        }
    }

    /// Height after which `upgrade` is in force, if this network schedules it
    pub fn activation_height(&self, upgrade: PolicyUpgrade) -> Option<u32> {
        upgrade
            .schedule()
            .iter()
            .find(|(network, _)| network == self)
            .map(|(_, height)| *height)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "testnet4" => Ok(Network::Testnet4),
            "signet" => Ok(Network::Signet),
            "liquid" => Ok(Network::Liquid),
            "liquidtestnet" => Ok(Network::LiquidTestnet),
            other => Err(CodecError::Unsupported(format!("unknown network '{}'", other))),
        }
    }
}

/// Relay policy changes that are gated by block height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyUpgrade {
    /// Version 3 transactions and pay-to-anchor spends
    V3Standardness,
    /// One dust output allowed in a zero-fee transaction
    EphemeralDust,
    /// OP_RETURN limits lifted, BIP54 legacy sigops cap enforced
    DatacarrierLift,
}

impl PolicyUpgrade {
    fn schedule(&self) -> &'static [(Network, u32)] {
        match self {
            PolicyUpgrade::V3Standardness => V3_STANDARDNESS_ACTIVATION,
            PolicyUpgrade::EphemeralDust => EPHEMERAL_DUST_ACTIVATION,
            PolicyUpgrade::DatacarrierLift => DATACARRIER_LIFT_ACTIVATION,
        }
    }

    /// Whether the upgrade applies to a transaction at `height` on `network`.
    ///
    /// Unknown height or network, and networks without a schedule, get the
    /// current rules. A rule is still pending while `height <= activation`.
    pub fn is_active(&self, height: Option<u32>, network: Option<Network>) -> bool {
        match (height, network) {
            (Some(height), Some(network)) => match network.activation_height(*self) {
                Some(activation) => height > activation,
                None => true,
            },
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_str() {
        assert_eq!("".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("testnet4".parse::<Network>().unwrap(), Network::Testnet4);
        assert_eq!("LiquidTestnet".parse::<Network>().unwrap(), Network::LiquidTestnet);
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_serde_names() {
        let json = serde_json::to_string(&Network::LiquidTestnet).unwrap();
        assert_eq!(json, "\"liquidtestnet\"");
        let network: Network = serde_json::from_str("\"signet\"").unwrap();
        assert_eq!(network, Network::Signet);
    }

    #[test]
    fn test_testnets_share_address_params() {
        assert_eq!(Network::Testnet.params(), Network::Signet.params());
        assert_eq!(Network::Testnet4.bech32_prefix(), "tb1");
        assert_eq!(Network::Liquid.bech32_prefix(), "ex1");
    }

    #[test]
    fn test_activation_boundary() {
        let upgrade = PolicyUpgrade::V3Standardness;
        assert!(!upgrade.is_active(Some(863_500), Some(Network::Mainnet)));
        assert!(upgrade.is_active(Some(863_501), Some(Network::Mainnet)));
        assert!(upgrade.is_active(None, Some(Network::Mainnet)));
        assert!(upgrade.is_active(Some(0), None));
    }

    #[test]
    fn test_unscheduled_network_is_active() {
        assert_eq!(Network::Liquid.activation_height(PolicyUpgrade::EphemeralDust), None);
        assert!(PolicyUpgrade::EphemeralDust.is_active(Some(1), Some(Network::Liquid)));
    }
}
