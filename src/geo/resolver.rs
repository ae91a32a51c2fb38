//! GeoIP lookup module.
//!
//! Resolves an IP address to country, region, city and coordinates using a
//! GeoLite2-City database.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, MaxMindDBError, Reader};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Location fields merged into a collected record.
///
/// Every field is serialized, `null` when the database has no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoLocation {
    pub nation: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Anything that can resolve an address to a location.
pub trait GeoResolver: Send + Sync {
    /// Returns `Ok(None)` when the address is not in the database.
    fn resolve(&self, ip: IpAddr) -> AppResult<Option<GeoLocation>>;
}

/// Resolver backed by a MaxMind `.mmdb` file loaded into memory.
pub struct MaxMindResolver {
    reader: Reader<Vec<u8>>,
}

impl MaxMindResolver {
    pub fn open(path: &Path) -> AppResult<Self> {
        let reader = Reader::open_readfile(path)
            .map_err(|e| AppError::Geo(format!("cannot open {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Successfully opened GeoIP database");
        Ok(Self { reader })
    }
}

impl GeoResolver for MaxMindResolver {
    fn resolve(&self, ip: IpAddr) -> AppResult<Option<GeoLocation>> {
        match self.reader.lookup::<geoip2::City>(ip) {
            Ok(city) => Ok(Some(GeoLocation {
                nation: english(city.country.as_ref().and_then(|c| c.names.as_ref())),
                region: english(
                    city.subdivisions
                        .as_ref()
                        .and_then(|s| s.last())
                        .and_then(|s| s.names.as_ref()),
                ),
                city: english(city.city.as_ref().and_then(|c| c.names.as_ref())),
                latitude: city.location.as_ref().and_then(|l| l.latitude),
                longitude: city.location.as_ref().and_then(|l| l.longitude),
            })),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(AppError::Geo(format!("lookup of {ip} failed: {e}"))),
        }
    }
}

/// English name out of a MaxMind `names` map.
fn english(names: Option<&BTreeMap<&str, &str>>) -> Option<String> {
    names.and_then(|n| n.get("en")).map(|s| (*s).to_string())
}
