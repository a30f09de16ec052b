//! Terminal font catalog
//!
//! Font families share the tool lifecycle: the nerd-fonts view probes them
//! with the nerdfonts check script and installs/uninstalls them through the
//! same pipeline contracts, passing the family id as the script argument.

/// A single patched font family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFamily {
    /// Identifier matching the release asset name, e.g. "jetbrainsmono"
    pub id: &'static str,
    pub display_name: &'static str,
    /// Filled by the probe: "Installed" or "Missing"
    pub status: String,
    /// Font version if the probe reports one
    pub version: String,
}

impl FontFamily {
    fn new(id: &'static str, display_name: &'static str) -> Self {
        Self {
            id,
            display_name,
            status: String::new(),
            version: String::new(),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == "Installed"
    }
}

/// The eight families the installer manages, in display order.
pub fn font_families() -> Vec<FontFamily> {
    vec![
        FontFamily::new("jetbrainsmono", "JetBrainsMono"),
        FontFamily::new("firacode", "FiraCode"),
        FontFamily::new("hack", "Hack"),
        FontFamily::new("sourcecodepro", "SauceCodePro"),
        FontFamily::new("cascadiacode", "CaskaydiaCove"),
        FontFamily::new("meslo", "Meslo"),
        FontFamily::new("ubuntumono", "UbuntuMono"),
        FontFamily::new("iosevka", "Iosevka"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_families() {
        assert_eq!(font_families().len(), 8);
    }

    #[test]
    fn test_fresh_family_is_not_installed() {
        assert!(!FontFamily::new("hack", "Hack").is_installed());
    }
}
