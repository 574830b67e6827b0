//! Native packages bound by name in the root symbol table.

mod errors;
mod math;
mod media_types;
mod mime;
mod time;
mod units;

use tracing::error;

use crate::error::SymbolResult;
use crate::symbols::Package;

pub use mime::{is_media_type, mime_type};
pub use time::{duration, DURATION_UNITS};
pub use units::dimension;

/// Names of every package [`package`] knows.
pub const PACKAGES: [&str; 5] = ["errors", "math", "mime", "time", "units"];

/// Builds the package registered under `name`.
pub fn package(name: &str) -> Option<Package> {
    let built: SymbolResult<Package> = match name {
        "errors" => errors::package(),
        "math" => math::package(),
        "mime" => mime::package(),
        "time" => time::package(),
        "units" => units::package(),
        _ => return None,
    };
    match built {
        Ok(package) => Some(package),
        Err(err) => {
            error!("failed to build package {}: {}", name, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Object;

    #[test]
    fn test_every_package_builds() {
        for name in PACKAGES {
            let package = package(name).unwrap();
            assert_eq!(package.name(), name);
            assert!(package.keys().count() > 0);
        }
        assert!(package("request").is_none());
    }

    #[test]
    fn test_missing_member() {
        let math = package("math").unwrap();
        assert!(math.get("Tau").unwrap().is_none());
    }
}
