//! Fingerprint flavors and the immutable run specification.
//!
//! A [`Flavor`] is an opaque identifier handed through to the fingerprint
//! engine. This crate never interprets it beyond three lookups: the numeric
//! code sent over the engine protocol, the `#type=` string written in the
//! FPS1 header, and whether selecting it pins the bit length.

use std::fmt;
use std::num::NonZeroU32;

/// Default number of bits when no `--fplen` or fixed-size flavor is given.
pub const DEFAULT_BIT_LENGTH: u32 = 1024;

/// Number of keys in the MDL MACCS fixed-key fingerprint.
pub const MACCS_BIT_LENGTH: u32 = 166;

/// Number of keys in the PubChem substructure fingerprint.
pub const PUBCHEM_BIT_LENGTH: u32 = 881;

const DEFAULT_NONZERO_BIT_LENGTH: NonZeroU32 = NonZeroU32::new(DEFAULT_BIT_LENGTH).unwrap();

const ECFP: u32 = 0x0001_0000;
const FCFP: u32 = 0x0002_0000;
const PATH: u32 = 0x0003_0000;
const EXTPATH: u32 = 0x0004_0000;
const PUBCHEM: u32 = 0x0005_0000;
const MACCS: u32 = 0x0006_0000;
const LINGOS: u32 = 0x0007_0000;

/// Fingerprint algorithm and parameterization requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Ecfp0,
    Ecfp2,
    Ecfp4,
    Ecfp6,
    Fcfp0,
    Fcfp2,
    Fcfp4,
    Fcfp6,
    Path5,
    Path6,
    Path7,
    ExtPath5,
    ExtPath6,
    ExtPath7,
    Pubchem,
    Maccs166,
    Lingos,
    /// Raw engine code with no known header type.
    Other(u32),
}

impl Flavor {
    /// Numeric identifier understood by the engine.
    ///
    /// The high half selects the family, the low half its variant (radius
    /// index for circular flavors, depth for path flavors).
    pub fn code(self) -> u32 {
        match self {
            Flavor::Ecfp0 => ECFP,
            Flavor::Ecfp2 => ECFP + 1,
            Flavor::Ecfp4 => ECFP + 2,
            Flavor::Ecfp6 => ECFP + 3,
            Flavor::Fcfp0 => FCFP,
            Flavor::Fcfp2 => FCFP + 1,
            Flavor::Fcfp4 => FCFP + 2,
            Flavor::Fcfp6 => FCFP + 3,
            Flavor::Path5 => PATH + 5,
            Flavor::Path6 => PATH + 6,
            Flavor::Path7 => PATH + 7,
            Flavor::ExtPath5 => EXTPATH + 5,
            Flavor::ExtPath6 => EXTPATH + 6,
            Flavor::ExtPath7 => EXTPATH + 7,
            Flavor::Pubchem => PUBCHEM,
            Flavor::Maccs166 => MACCS,
            Flavor::Lingos => LINGOS,
            Flavor::Other(code) => code,
        }
    }

    /// Value of the `#type=` header line. Unknown flavors get `???`.
    pub fn fps_type(self) -> &'static str {
        match self {
            Flavor::Ecfp0 => "cdk/ecfp/radius=0",
            Flavor::Ecfp2 => "cdk/ecfp/radius=2",
            Flavor::Ecfp4 => "cdk/ecfp/radius=4",
            Flavor::Ecfp6 => "cdk/ecfp/radius=6",
            Flavor::Fcfp0 => "cdk/fcfp/radius=0",
            Flavor::Fcfp2 => "cdk/fcfp/radius=2",
            Flavor::Fcfp4 => "cdk/fcfp/radius=4",
            Flavor::Fcfp6 => "cdk/fcfp/radius=6",
            Flavor::Path5 => "cdk/path/depth=5",
            Flavor::Path6 => "cdk/path/depth=6",
            Flavor::Path7 => "cdk/path/depth=7",
            Flavor::ExtPath5 => "cdk/extpath/depth=5",
            Flavor::ExtPath6 => "cdk/extpath/depth=6",
            Flavor::ExtPath7 => "cdk/extpath/depth=7",
            Flavor::Pubchem => "cdk/pubchem",
            Flavor::Maccs166 => "cdk/maccs",
            Flavor::Lingos => "cdk/lingos",
            Flavor::Other(_) => "???",
        }
    }

    /// Bit length pinned by selecting this flavor, if any.
    pub fn forced_bit_length(self) -> Option<u32> {
        match self {
            Flavor::Maccs166 => Some(MACCS_BIT_LENGTH),
            Flavor::Pubchem => Some(PUBCHEM_BIT_LENGTH),
            _ => None,
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Other(code) => write!(f, "flavor#{code:#x}"),
            other => f.write_str(other.fps_type()),
        }
    }
}

/// Number of bytes needed to store `bit_length` bits.
///
/// Both the engine adapter and the writer size buffers through this.
pub fn byte_len(bit_length: u32) -> usize {
    (bit_length as usize).div_ceil(8)
}

/// Flavor plus bit length, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintSpec {
    flavor: Flavor,
    bit_length: NonZeroU32,
}

impl FingerprintSpec {
    /// Returns `None` when `bit_length` is zero.
    pub fn new(flavor: Flavor, bit_length: u32) -> Option<Self> {
        NonZeroU32::new(bit_length).map(|bit_length| Self { flavor, bit_length })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn bit_length(&self) -> u32 {
        self.bit_length.get()
    }

    /// Bytes per fingerprint, `ceil(bit_length / 8)`.
    pub fn byte_len(&self) -> usize {
        byte_len(self.bit_length())
    }

    /// Characters in the hex field of every record line.
    pub fn hex_len(&self) -> usize {
        self.byte_len() * 2
    }
}

impl Default for FingerprintSpec {
    fn default() -> Self {
        Self {
            flavor: Flavor::Ecfp4,
            bit_length: DEFAULT_NONZERO_BIT_LENGTH,
        }
    }
}
