use std::fmt;

/// Lists the container families unpak can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakFormat {
    /// No known magic matched.
    Unknown,

    /// Unreal Engine 3 (`"Pak\0"` magic).
    UnrealEngine3,

    /// Unreal Engine 4 or 5 (`"PAK"`-prefixed magic).
    UnrealEngine4_5,

    /// Source engine VPK, either header variant.
    SourceEngine,

    /// Fallback for extraction-only use on unrecognized containers.
    Generic,
}

impl fmt::Display for PakFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let str = match self {
            PakFormat::Unknown => "Unknown",
            PakFormat::UnrealEngine3 => "Unreal Engine 3",
            PakFormat::UnrealEngine4_5 => "Unreal Engine 4/5",
            PakFormat::SourceEngine => "Source Engine",
            PakFormat::Generic => "Generic PAK",
        };

        write!(f, "{str}")
    }
}
