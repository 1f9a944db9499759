//! Effect descriptors and four-character component codes.
//!
//! A descriptor path has the form `"<manufacturer>/<type>/<subtype>/<name>"`,
//! e.g. `"appl/aufx/dely/Apple: AUDelay"`. The first three fields are the
//! text rendering of packed 32-bit codes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Packed four-character code (OSType-style).
///
/// The packed value holds the first character in its most significant byte.
/// On a little-endian host the in-memory bytes are therefore the reverse of
/// the text, so converting between the two always swaps the byte order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FourCc(pub u32);

impl FourCc {
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Pack text bytes, first byte most significant.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(
            (bytes[0] as u32) << 24
                | (bytes[1] as u32) << 16
                | (bytes[2] as u32) << 8
                | bytes[3] as u32,
        )
    }

    /// Parse the text form. Shorter codes are space padded, longer ones truncated.
    pub fn parse(text: &str) -> Self {
        let mut bytes = [b' '; 4];
        for (dst, src) in bytes.iter_mut().zip(text.as_bytes()) {
            *dst = *src;
        }
        Self::from_bytes(bytes)
    }

    /// Text bytes in display order.
    pub fn to_bytes(self) -> [u8; 4] {
        let rev = self.0.swap_bytes();
        rev.to_le_bytes()
    }

    pub fn to_text(self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    pub const fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<4.4}", self.to_text())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc('{}' {:#010x})", self.to_text(), self.0)
    }
}

/// Component type codes the host enumerates.
pub mod component_types {
    use super::FourCc;

    pub const EFFECT: FourCc = FourCc::from_bytes(*b"aufx");
    pub const GENERATOR: FourCc = FourCc::from_bytes(*b"augn");
    pub const MUSIC_EFFECT: FourCc = FourCc::from_bytes(*b"aumf");
    pub const MIXER: FourCc = FourCc::from_bytes(*b"aumx");
    pub const PANNER: FourCc = FourCc::from_bytes(*b"aupn");

    /// Types scanned when listing hostable components, in scan order.
    pub const HOSTED: [FourCc; 5] = [EFFECT, GENERATOR, MUSIC_EFFECT, MIXER, PANNER];
}

/// Lookup key for a native component (the name is not part of identity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub manufacturer: FourCc,
    pub component_type: FourCc,
    pub sub_type: FourCc,
}

/// Identifies exactly one installable native component. Immutable once resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub manufacturer: FourCc,
    pub component_type: FourCc,
    pub sub_type: FourCc,
    /// Conventionally `"Vendor: Effect Name"`.
    pub display_name: String,
}

impl EffectDescriptor {
    pub fn new(
        manufacturer: FourCc,
        component_type: FourCc,
        sub_type: FourCc,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer,
            component_type,
            sub_type,
            display_name: display_name.into(),
        }
    }

    /// Parse `"<manufacturer>/<type>/<subtype>/<name>"`.
    ///
    /// The name is everything after the third separator and may itself contain `/`.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDescriptor {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut fields = path.splitn(4, '/');
        let mut code = |what: &str| -> Result<FourCc> {
            let token = fields
                .next()
                .ok_or_else(|| invalid(&format!("missing {} code", what)))?;
            if token.is_empty() || token.len() > 4 {
                return Err(invalid(&format!(
                    "{} code must be 1-4 bytes, got {:?}",
                    what, token
                )));
            }
            Ok(FourCc::parse(token))
        };

        let manufacturer = code("manufacturer")?;
        let component_type = code("type")?;
        let sub_type = code("subtype")?;
        let display_name = fields.next().unwrap_or_default().to_string();

        Ok(Self {
            manufacturer,
            component_type,
            sub_type,
            display_name,
        })
    }

    /// Persisted text form.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.manufacturer, self.component_type, self.sub_type, self.display_name
        )
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey {
            manufacturer: self.manufacturer,
            component_type: self.component_type,
            sub_type: self.sub_type,
        }
    }

    /// Vendor part of `"Vendor: Name"`; empty when there is no `:`.
    pub fn vendor(&self) -> &str {
        match self.display_name.split_once(':') {
            Some((vendor, _)) => vendor.trim(),
            None => "",
        }
    }

    /// Effect part of `"Vendor: Name"`; the whole name when there is no `:`.
    pub fn effect_name(&self) -> &str {
        match self.display_name.split_once(':') {
            Some((_, name)) => name.trim(),
            None => self.display_name.trim(),
        }
    }
}

impl fmt::Display for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for EffectDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Render a packed component version as `major.minor.bugfix`.
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        (version >> 16) & 0xffff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fourcc_packing_is_byte_swapped() {
        let code = FourCc::parse("appl");
        assert_eq!(code.code(), 0x6170_706c);
        assert_eq!(code.to_bytes(), *b"appl");
        assert_eq!(code.to_text(), "appl");
        assert_eq!(code, FourCc::from_bytes(*b"appl"));
    }

    #[test]
    fn test_fourcc_short_code_is_padded() {
        let code = FourCc::parse("dly");
        assert_eq!(code.to_text(), "dly ");
        assert_eq!(code.to_string(), "dly ");
    }

    #[test]
    fn test_parse_descriptor() {
        let desc = EffectDescriptor::parse("appl/aufx/dely/My Delay").unwrap();
        assert_eq!(desc.manufacturer.to_text(), "appl");
        assert_eq!(desc.component_type, component_types::EFFECT);
        assert_eq!(desc.sub_type.to_text(), "dely");
        assert_eq!(desc.display_name, "My Delay");
        assert_eq!(desc.path(), "appl/aufx/dely/My Delay");
    }

    #[test]
    fn test_name_keeps_separators() {
        let desc = EffectDescriptor::parse("ACME/aufx/eq  /ACME: EQ 1/3 Octave").unwrap();
        assert_eq!(desc.display_name, "ACME: EQ 1/3 Octave");
        assert_eq!(desc.vendor(), "ACME");
        assert_eq!(desc.effect_name(), "EQ 1/3 Octave");
    }

    #[test]
    fn test_vendor_split_without_colon() {
        let desc = EffectDescriptor::parse("appl/aufx/dely/My Delay").unwrap();
        assert_eq!(desc.vendor(), "");
        assert_eq!(desc.effect_name(), "My Delay");
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(EffectDescriptor::parse("appl/aufx").is_err());
        assert!(EffectDescriptor::parse("appl//dely/x").is_err());
        assert!(EffectDescriptor::parse("apple/aufx/dely/x").is_err());
    }

    #[test]
    fn test_missing_name_is_empty() {
        let desc = EffectDescriptor::parse("appl/aufx/dely").unwrap();
        assert_eq!(desc.display_name, "");
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(0x0001_0203), "1.2.3");
        assert_eq!(format_version(0), "0.0.0");
    }

    proptest! {
        #[test]
        fn prop_descriptor_path_roundtrip(
            m in "[a-zA-Z0-9 ]{4}",
            t in "[a-zA-Z0-9 ]{4}",
            s in "[a-zA-Z0-9 ]{4}",
            name in "[a-zA-Z0-9 :/]{0,24}",
        ) {
            let path = format!("{}/{}/{}/{}", m, t, s, name);
            let desc = EffectDescriptor::parse(&path).unwrap();
            prop_assert_eq!(desc.path(), path);
        }

        #[test]
        fn prop_fourcc_text_roundtrip(code in any::<u32>()) {
            let cc = FourCc::new(code);
            prop_assert_eq!(FourCc::from_bytes(cc.to_bytes()), cc);
        }
    }
}
