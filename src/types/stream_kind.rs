//! Canonical representation of stream kinds and kind sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::error::ZstrongError;

/// The shape of the data carried by a stream.
///
/// The numeric tags are part of the container wire format and of type masks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Opaque bytes, element width 1.
    Serial,
    /// Records of identical width, no numeric meaning.
    FixedField,
    /// Little-endian unsigned integers of width 1, 2, 4 or 8.
    Numeric,
    /// Records of individually specified lengths. Reports element width 0.
    VariableField,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Serial,
        StreamKind::FixedField,
        StreamKind::Numeric,
        StreamKind::VariableField,
    ];

    /// The wire tag of this kind. Tags are distinct bits so they double as mask bits.
    pub fn tag(self) -> u8 {
        match self {
            StreamKind::Serial => 1,
            StreamKind::FixedField => 2,
            StreamKind::Numeric => 4,
            StreamKind::VariableField => 8,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ZstrongError> {
        match tag {
            1 => Ok(StreamKind::Serial),
            2 => Ok(StreamKind::FixedField),
            4 => Ok(StreamKind::Numeric),
            8 => Ok(StreamKind::VariableField),
            other => Err(ZstrongError::FrameFormatError(format!(
                "invalid stream kind tag {}",
                other
            ))),
        }
    }

    /// The single-kind mask for this kind.
    pub fn mask(self) -> TypeMask {
        TypeMask(self.tag())
    }

    /// Checks whether `width` is a legal element width for this kind.
    pub fn validate_width(self, width: usize) -> Result<(), ZstrongError> {
        let ok = match self {
            StreamKind::Serial => width == 1,
            StreamKind::VariableField => width == 0,
            StreamKind::FixedField => width >= 1,
            StreamKind::Numeric => matches!(width, 1 | 2 | 4 | 8),
        };
        if ok {
            Ok(())
        } else {
            Err(ZstrongError::InvalidParameter(format!(
                "element width {} is not valid for a {} stream",
                width, self
            )))
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamKind::Serial => "serial",
            StreamKind::FixedField => "fixed_field",
            StreamKind::Numeric => "numeric",
            StreamKind::VariableField => "variable_field",
        };
        write!(f, "{}", s)
    }
}

/// A set of stream kinds, used to declare what a codec input or a selector accepts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const NONE: TypeMask = TypeMask(0);
    pub const SERIAL: TypeMask = TypeMask(1);
    pub const FIXED_FIELD: TypeMask = TypeMask(2);
    pub const NUMERIC: TypeMask = TypeMask(4);
    pub const VARIABLE_FIELD: TypeMask = TypeMask(8);
    /// Every kind except `VariableField`.
    pub const FIXED_WIDTH: TypeMask = TypeMask(7);
    pub const ANY: TypeMask = TypeMask(15);

    pub fn contains(self, kind: StreamKind) -> bool {
        self.0 & kind.tag() != 0
    }

    pub fn intersects(self, other: TypeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_superset_of(self, other: TypeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn kinds(self) -> impl Iterator<Item = StreamKind> {
        StreamKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl From<StreamKind> for TypeMask {
    fn from(kind: StreamKind) -> Self {
        kind.mask()
    }
}

impl BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 | rhs.0)
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == TypeMask::ANY {
            return write!(f, "any");
        }
        let names: Vec<String> = self.kinds().map(|k| k.to_string()).collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for kind in StreamKind::ALL {
            assert_eq!(StreamKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(StreamKind::from_tag(3).is_err());
    }

    #[test]
    fn test_mask_membership() {
        let mask = TypeMask::SERIAL | TypeMask::NUMERIC;
        assert!(mask.contains(StreamKind::Serial));
        assert!(mask.contains(StreamKind::Numeric));
        assert!(!mask.contains(StreamKind::VariableField));
        assert!(TypeMask::ANY.is_superset_of(mask));
        assert_eq!(mask.to_string(), "serial|numeric");
    }

    #[test]
    fn test_width_rules() {
        assert!(StreamKind::Numeric.validate_width(4).is_ok());
        assert!(StreamKind::Numeric.validate_width(3).is_err());
        assert!(StreamKind::Serial.validate_width(2).is_err());
        assert!(StreamKind::VariableField.validate_width(0).is_ok());
        assert!(StreamKind::FixedField.validate_width(12).is_ok());
        assert!(StreamKind::FixedField.validate_width(0).is_err());
    }
}
