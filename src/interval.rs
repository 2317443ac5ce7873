use num_enum::{FromPrimitive, IntoPrimitive};

/// Three-valued occupancy tag for a region under interval evaluation, plus
/// the `Unknown` sentinel every node starts in.
///
/// `Unknown` never survives a finished build: [`crate::tree::SimplexTree::is_done`]
/// is defined as `type() != Interval::Unknown`.
#[derive(Copy, Clone, Debug, Eq, FromPrimitive, IntoPrimitive, PartialEq)]
#[repr(u8)]
pub enum Interval {
    /// f > 0 throughout the region: entirely outside the solid.
    Empty = 0,
    /// f < 0 throughout the region: entirely inside the solid.
    Filled = 1,
    /// f changes sign (or evaluation was unsafe): the surface may cross.
    Ambiguous = 2,
    /// Not yet evaluated.
    #[num_enum(default)]
    Unknown = 3,
}

impl Interval {
    /// Lattice join used when merging sibling classifications during
    /// collapse: `Empty ∨ Empty = Empty`, `Filled ∨ Filled = Filled`,
    /// anything else (including a mix, or an `Unknown`) is `Ambiguous`.
    pub fn join(self, other: Interval) -> Interval {
        use Interval::*;
        match (self, other) {
            (Empty, Empty) => Empty,
            (Filled, Filled) => Filled,
            _ => Ambiguous,
        }
    }

    /// `true` for the three terminal states a finished node may carry.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Interval::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_commutative() {
        let states = [
            Interval::Empty,
            Interval::Filled,
            Interval::Ambiguous,
            Interval::Unknown,
        ];
        for &a in &states {
            for &b in &states {
                assert_eq!(a.join(b), b.join(a));
            }
        }
    }

    #[test]
    fn unknown_is_never_terminal() {
        assert!(!Interval::Unknown.is_terminal());
        assert!(Interval::Empty.is_terminal());
        assert!(Interval::Filled.is_terminal());
        assert!(Interval::Ambiguous.is_terminal());
    }
}
