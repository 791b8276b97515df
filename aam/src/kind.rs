//! The element-type discriminator carried in every array's header.

/// Element kind. Discriminant values follow the original's `atype`
/// ordering (with a gap at 5, and our own `Nested` tacked on at the end)
/// purely so a reader who knows the original can cross-reference constants
/// in `original_source/`; nothing in this crate depends on the numeric
/// values beyond `repr(u8)` round-tripping through the heap's flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Boolean = 2,
    Integer = 3,
    Real = 4,
    Character = 6,
    Phrase = 7,
    Fault = 8,
    Nested = 9,
}

impl Kind {
    #[inline]
    pub(crate) fn from_u8(v: u8) -> Kind {
        match v {
            2 => Kind::Boolean,
            3 => Kind::Integer,
            4 => Kind::Real,
            6 => Kind::Character,
            7 => Kind::Phrase,
            8 => Kind::Fault,
            9 => Kind::Nested,
            _ => panic!("corrupt heap: unrecognised kind tag {v}"),
        }
    }

    /// Is this kind valence-0-only (phrases and faults never have valence
    /// above 0; every other kind can appear at any valence)?
    #[inline]
    pub fn is_atomic_only(self) -> bool {
        matches!(self, Kind::Phrase | Kind::Fault)
    }

    /// Homogeneous (packable into a typed payload) kinds, i.e. everything
    /// except `Nested`.
    #[inline]
    pub fn is_homogeneous(self) -> bool {
        !matches!(self, Kind::Nested)
    }

    /// `numeric(k)` in the original: boolean, integer, or real.
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Boolean | Kind::Integer | Kind::Real)
    }
}
