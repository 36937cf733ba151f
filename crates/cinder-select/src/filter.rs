//! Name and vendor matching shared by catalogs and collections.
//!
//! Matching is a case-insensitive "contains" test against the trimmed name
//! and the trimmed vendor string independently. Case folding never consults
//! the host locale: Unicode lowercasing is locale-free, and the Turkish
//! dotted and dotless capitals/smalls (`İ`, `ı`) fold to a plain `i`, so
//! "intel" matches "INTEL", "Intel" and "ıntel" alike.

/// Fold a string for matching: trim, lowercase, collapse dotted/dotless i.
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().chars() {
        match c {
            '\u{0130}' | '\u{0131}' => out.push('i'),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Whether any pattern occurs in `name` or in `vendor`.
pub fn matches_any(name: &str, vendor: &str, patterns: &[&str]) -> bool {
    let name = fold(name);
    let vendor = fold(vendor);
    patterns
        .iter()
        .map(|p| fold(p))
        .filter(|p| !p.is_empty())
        .any(|p| name.contains(&p) || vendor.contains(&p))
}

/// Hardware vendors with built-in search patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Intel,
    Amd,
    Nvidia,
    Altera,
    Xilinx,
}

impl Vendor {
    pub const ALL: [Vendor; 5] = [
        Vendor::Intel,
        Vendor::Amd,
        Vendor::Nvidia,
        Vendor::Altera,
        Vendor::Xilinx,
    ];

    /// Patterns matched against platform name and vendor strings.
    pub const fn platform_patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Intel => &["intel"],
            Self::Amd => &["amd", "advanced micro devices"],
            Self::Nvidia => &["nvidia"],
            Self::Altera => &["altera"],
            Self::Xilinx => &["xilinx"],
        }
    }

    /// Patterns matched against device name and vendor strings.
    ///
    /// NVIDIA devices are also recognized by their product lines.
    pub const fn device_patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Nvidia => &["nvidia", "gtx", "titan"],
            other => other.platform_patterns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_trims_and_lowercases() {
        assert_eq!(fold("  Intel(R) Corporation \t"), "intel(r) corporation");
        assert_eq!(fold("NVIDIA"), "nvidia");
    }

    #[test]
    fn fold_collapses_turkish_i() {
        assert_eq!(fold("INTEL"), "intel");
        assert_eq!(fold("İNTEL"), "intel");
        assert_eq!(fold("ıntel"), "intel");
        assert_eq!(fold("NVİDİA"), "nvidia");
        assert_eq!(fold("XILINX"), "xilinx");
    }

    #[test]
    fn fold_leaves_other_accents_alone() {
        assert_eq!(fold("É"), "é");
    }

    #[test]
    fn matches_name_or_vendor() {
        assert!(matches_any("GeForce GTX 1080", "NVIDIA Corporation", &["nvidia"]));
        assert!(matches_any("GeForce GTX 1080", "", &["gtx"]));
        assert!(matches_any("Radeon", "Advanced Micro Devices, Inc.", &["amd", "advanced micro devices"]));
        assert!(!matches_any("Radeon", "AMD", &["intel"]));
    }

    #[test]
    fn pattern_case_is_ignored() {
        assert!(matches_any("x", "INTEL", &["Intel"]));
        assert!(matches_any("x", "Intel", &["INTEL"]));
    }

    #[test]
    fn empty_patterns_never_match() {
        assert!(!matches_any("anything", "vendor", &[]));
        assert!(!matches_any("anything", "vendor", &["  "]));
    }

    #[test]
    fn vendor_presets() {
        assert!(Vendor::Nvidia.device_patterns().contains(&"titan"));
        assert!(!Vendor::Nvidia.platform_patterns().contains(&"titan"));
        assert_eq!(Vendor::Intel.device_patterns(), Vendor::Intel.platform_patterns());
        assert_eq!(Vendor::ALL.len(), 5);
    }
}
