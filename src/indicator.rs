//! Slot indicator palette.
//!
//! Every slot has an addressable LED.  The coordinator never picks raw
//! colours; it asks for an [`Indicator`] meaning and this module turns
//! it into the `{position, color, brightness, blink}` tuple the drawer
//! controller understands.
//!
//! | Indicator   | Colour    | Blink | Meaning                              |
//! |-------------|-----------|-------|--------------------------------------|
//! | PlaceHere   | green     | yes   | put the bottle in this slot          |
//! | RemoveHere  | green     | no    | take the bottle out of this slot     |
//! | Wrong       | red       | no    | incorrect physical action here       |
//! | Staged      | yellow    | no    | bottle lifted, slot waits its turn   |
//! | Occupied    | dim white | no    | slot holds a bottle, nothing pending |
//! | Off         | black     | no    | indicator cleared                    |

use serde::{Serialize, Serializer};

use crate::cabinet::SlotIndex;

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// Semantic indicator state for a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    PlaceHere,
    RemoveHere,
    Wrong,
    Staged,
    Occupied,
    Off,
}

impl Indicator {
    pub const fn colour(self) -> Rgb {
        match self {
            Self::PlaceHere | Self::RemoveHere => (0x00, 0xFF, 0x00),
            Self::Wrong => (0xFF, 0x00, 0x00),
            Self::Staged => (0xFF, 0xFF, 0x00),
            Self::Occupied => (0x44, 0x44, 0x44),
            Self::Off => (0x00, 0x00, 0x00),
        }
    }

    pub const fn blink(self) -> bool {
        matches!(self, Self::PlaceHere)
    }

    pub const fn brightness(self) -> u8 {
        match self {
            Self::Off => 0,
            _ => 100,
        }
    }

    /// Build the wire command for `position`.
    pub fn at(self, position: SlotIndex) -> LedCommand {
        LedCommand {
            position,
            color: self.colour(),
            brightness: self.brightness(),
            blink: self.blink(),
        }
    }
}

/// One entry of a `set_leds` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedCommand {
    pub position: SlotIndex,
    #[serde(serialize_with = "serialize_hex")]
    pub color: Rgb,
    pub brightness: u8,
    pub blink: bool,
}

fn serialize_hex<S: Serializer>(rgb: &Rgb, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex(*rgb))
}

/// `#RRGGBB`, upper-case.
pub fn hex((r, g, b): Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}
