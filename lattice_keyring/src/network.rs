use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::consts::{SIGNING_URL, SIGNING_URL_TESTNET};

/// The network the signing service is reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_mainnet(&self) -> bool {
        self == &Self::Mainnet
    }

    /// Signing service used when the credentials carry no endpoint.
    pub fn signing_url(&self) -> &'static str {
        match self {
            Network::Mainnet => SIGNING_URL,
            Network::Testnet => SIGNING_URL_TESTNET,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err("invalid network, possible value are: 'mainnet', 'testnet'".to_string()),
        }
    }
}

impl Serialize for Network {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let string = String::deserialize(d)?;
        string.parse().map_err(serde::de::Error::custom)
    }
}
