//! Build information baked in by `build.rs`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_date: &'static str,
    pub build_profile: &'static str,
    pub rust_version: &'static str,
    pub target: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("REPO_VERSION"),
        build_date: env!("BUILD_TIMESTAMP"),
        build_profile: env!("BUILD_PROFILE"),
        rust_version: env!("RUST_VERSION"),
        target: env!("BUILD_TARGET"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, built {}", self.version, self.build_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_json() {
        let info = build_info();
        assert!(info.to_string().contains(", built "));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["version"], info.version);
        assert_eq!(json["build_date"], info.build_date);
    }
}
