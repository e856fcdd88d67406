use std::{fs::File, io::BufReader, net::Ipv6Addr, path::Path};

use ipnet::Ipv6Net;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Duid, Error, Result};

/// Offer parameters handed to every client. Each field may be omitted from
/// the config file, in which case the default below is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server_id: Duid,
    // IA_NA address offered to the client
    pub address: Ipv6Addr,
    pub address_preferred_lifetime: u32,
    pub address_valid_lifetime: u32,
    // IA_PD prefix delegated to the client
    pub prefix: Ipv6Net,
    pub prefix_preferred_lifetime: u32,
    pub prefix_valid_lifetime: u32,
    // sent in the Preference option of every Advertise
    pub preference: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_id: Duid::from(vec![0x00, 0x02, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]),
            address: Ipv6Addr::new(0x2001, 0xdb8, 0xcafe, 0, 0, 0, 0, 0x100),
            address_preferred_lifetime: 1800,
            address_valid_lifetime: 3600,
            prefix: Ipv6Net::new(Ipv6Addr::new(0x2001, 0xdb8, 0xaaaa, 0, 0, 0, 0, 0), 64)
                .expect("static prefix length is valid"),
            prefix_preferred_lifetime: 7200,
            prefix_valid_lifetime: 10800,
            preference: 255,
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Config =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_id.is_empty() {
            return Err(Error::InvalidConfig("server_id must not be empty".into()));
        }
        if self.address_valid_lifetime < self.address_preferred_lifetime {
            return Err(Error::InvalidConfig(format!(
                "address_valid_lifetime {} is shorter than address_preferred_lifetime {}",
                self.address_valid_lifetime, self.address_preferred_lifetime
            )));
        }
        if self.prefix_valid_lifetime < self.prefix_preferred_lifetime {
            return Err(Error::InvalidConfig(format!(
                "prefix_valid_lifetime {} is shorter than prefix_preferred_lifetime {}",
                self.prefix_valid_lifetime, self.prefix_preferred_lifetime
            )));
        }
        if self.prefix != self.prefix.trunc() {
            return Err(Error::InvalidConfig(format!(
                "prefix {} has host bits set",
                self.prefix
            )));
        }
        Ok(())
    }
}
