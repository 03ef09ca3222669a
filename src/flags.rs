// This module encapsulates the bitflags API
// so that we don't leak details that may
// affect semver later on.

use bitflags::bitflags;

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    struct SimulationBitFlags: u32 {
        const EMPTY = 0;
        const CHECK_INVARIANTS = 1 << 1;
        const MINIMIZE_ARG = 1 << 2;
    }
}

/// Optional behavior of a simulation run.
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimulationOptions(SimulationBitFlags);

impl SimulationOptions {
    /// Recount the links of every live chromosome after
    /// each event and panic if the running total disagrees.
    pub fn with_invariant_checks(self) -> Self {
        Self(self.0 | SimulationBitFlags::CHECK_INVARIANTS)
    }

    /// Merge adjacent marginal trees with identical
    /// genealogies once the simulation is done.
    pub fn with_minimized_arg(self) -> Self {
        Self(self.0 | SimulationBitFlags::MINIMIZE_ARG)
    }

    pub fn check_invariants(&self) -> bool {
        self.0.contains(SimulationBitFlags::CHECK_INVARIANTS)
    }

    pub fn minimize_arg(&self) -> bool {
        self.0.contains(SimulationBitFlags::MINIMIZE_ARG)
    }
}
