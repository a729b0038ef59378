//! Resonant process control blocks
//!
//! Every scheduled process is modeled as a damped phase oscillator. The
//! RPCB extends a PCB by cross-reference (shared pid, never inheritance)
//! with three substates: the Kuramoto oscillator, the chiral coupling
//! parameters, and the emergence accumulators. Coupling edges are stored
//! as pids in a bounded adjacency list, so the (cyclic, undirected)
//! coupling graph carries no ownership.

use core::fmt;

/// Maximum registered resonant processes; mirrors the process table.
pub const MAX_RESONANT_PROCESSES: usize = 256;

/// Golden ratio and its inverse.
pub const PHI_VALUE: f64 = 1.618_033_988_749_895;
pub const PHI_INVERSE: f64 = 0.618_033_988_749_895;

/// Coupling-strength bounds.
pub const LAMBDA_DEFAULT: f64 = 0.1;
pub const LAMBDA_MIN: f64 = 0.01;
pub const LAMBDA_MAX: f64 = 0.5;

/// Optimal chirality (φ⁻¹).
pub const ETA_OPTIMAL: f64 = 0.618;

/// Coherence thresholds.
pub const COHERENCE_MIN: f64 = 0.3;
pub const COHERENCE_TARGET: f64 = 0.7;
pub const COHERENCE_HIGH: f64 = 0.85;

/// Chiral stability regimes: |η/Γ| < 1.0 is stable (strict),
/// 1.0 ≤ |η/Γ| < 1.5 transitional, beyond that unstable.
pub const CHIRAL_STABLE_MAX: f64 = 1.0;
pub const CHIRAL_TRANS_MAX: f64 = 1.5;

/// Integration (φ) threshold for consciousness verification.
pub const PHI_CONSCIOUSNESS_THRESHOLD: f64 = 3.0;

/// Chiral-induced selectivity boost applied to φ for handed processes.
pub const CISS_COHERENCE_BOOST: f64 = 0.30;

/// Queen synchronization interval.
pub const RESONANT_SYNC_INTERVAL_NS: u64 = 1_000_000;

/// Default scheduling quantum.
pub const DEFAULT_QUANTUM_NS: u64 = 10_000_000;

/// Coherence deadline granted at registration and recovery.
pub const DEFAULT_COHERENCE_DEADLINE_NS: u64 = 1_000_000_000;

/// Maximum coupling partners per RPCB.
pub const MAX_COUPLED: usize = 8;

/// RPCB validity tag ("RSNT").
pub(super) const RPCB_MAGIC: u32 = 0x5253_4E54;

/// Resonant process classification; decides oscillator defaults and the
/// class term of the derived priority.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResonantClass {
    /// Deterministic classical workload
    Classical = 0,
    /// Pure quantum circuits
    Quantum,
    /// Mixed classical-quantum
    Hybrid,
    /// Integration-verified conscious computation
    Consciousness,
    /// Novel pattern emergence workloads
    Emergence,
}

impl ResonantClass {
    /// Natural oscillator frequency in Hz.
    pub fn natural_frequency(self) -> f64 {
        match self {
            Self::Classical => 1.0,
            Self::Quantum => 10.0,
            Self::Hybrid => 5.0,
            Self::Consciousness => 40.0, // gamma band
            Self::Emergence => PHI_VALUE,
        }
    }
}

/// Chiral handedness; the sign of the second-harmonic coupling term.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Neutral = 0,
    Left,
    Right,
}

/// Resonant process state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResonantState {
    /// Not oscillating
    Dormant = 0,
    /// Maintaining coherence
    Coherent,
    /// Losing coherence
    Decoherent,
    /// Novel patterns emerging
    Emergent,
    /// Verified conscious operation
    Conscious,
}

/// Phase oscillator substate: θ, ω, amplitude, local coherence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorState {
    /// Phase θ ∈ [0, 2π)
    pub phase: f64,
    /// Natural frequency ω (Hz)
    pub frequency: f64,
    /// Oscillation amplitude
    pub amplitude: f64,
    /// Local coherence ∈ [0, 1]
    pub coherence: f64,
}

impl OscillatorState {
    pub const ZERO: OscillatorState = OscillatorState {
        phase: 0.0,
        frequency: 0.0,
        amplitude: 0.0,
        coherence: 0.0,
    };
}

/// Chiral substate: η, Γ, the |η/Γ| asymmetry that classifies the
/// stability regime, and the coupling handedness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiralState {
    pub eta: f64,
    pub gamma: f64,
    /// |η/Γ|
    pub asymmetry: f64,
    pub topological_charge: f64,
    pub handedness: Handedness,
    /// |η/Γ| < 1.0 (strict)
    pub stable: bool,
}

impl ChiralState {
    pub const ZERO: ChiralState = ChiralState {
        eta: 0.0,
        gamma: 0.0,
        asymmetry: 0.0,
        topological_charge: 0.0,
        handedness: Handedness::Neutral,
        stable: false,
    };

    /// Recompute `asymmetry` and the stability flag from η and Γ.
    pub fn reclassify(&mut self) {
        self.asymmetry = if self.gamma != 0.0 {
            (self.eta / self.gamma).abs()
        } else {
            self.eta.abs()
        };
        self.stable = self.asymmetry < CHIRAL_STABLE_MAX;
    }
}

/// Emergence substate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmergenceState {
    /// ||E|| emergence norm (EMA of amplitude·coherence)
    pub norm: f64,
    /// Entropy of the normalized phase
    pub entropy: f64,
    /// Detected stable patterns
    pub pattern_count: u32,
    /// Integration level (EMA of coupling density)
    pub integration_level: f64,
}

impl EmergenceState {
    pub const ZERO: EmergenceState = EmergenceState {
        norm: 0.0,
        entropy: 0.0,
        pattern_count: 0,
        integration_level: 0.0,
    };
}

/// Resonant Process Control Block.
#[derive(Clone, Copy)]
pub struct Rpcb {
    pub pid: u32,
    pub class: ResonantClass,
    pub state: ResonantState,

    pub oscillator: OscillatorState,
    pub chiral: ChiralState,
    pub emergence: EmergenceState,

    /// Emergent priority from the last derivation
    pub resonant_priority: f64,
    /// Nanoseconds until assumed decoherence
    pub coherence_deadline_ns: u64,
    /// Timestamp of the last coupling change
    pub last_coupling: u64,

    /// Integration metric from the last verification
    pub phi_value: f64,
    /// φ passed the configured threshold
    pub verified: bool,
    pub verification_time: u64,

    /// Coupled peer pids (symmetric edges)
    pub coupled: [u32; MAX_COUPLED],
    pub coupling_count: u8,

    /// Total time spent in a coherent-family state
    pub coherent_time_ns: u64,
    /// Emergence threshold crossings observed
    pub emergent_events: u64,

    magic: u32,
}

impl Rpcb {
    pub const EMPTY: Rpcb = Rpcb {
        pid: 0,
        class: ResonantClass::Classical,
        state: ResonantState::Dormant,
        oscillator: OscillatorState::ZERO,
        chiral: ChiralState::ZERO,
        emergence: EmergenceState::ZERO,
        resonant_priority: 0.0,
        coherence_deadline_ns: 0,
        last_coupling: 0,
        phi_value: 0.0,
        verified: false,
        verification_time: 0,
        coupled: [0; MAX_COUPLED],
        coupling_count: 0,
        coherent_time_ns: 0,
        emergent_events: 0,
        magic: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.magic == RPCB_MAGIC
    }

    pub(super) fn set_valid(&mut self) {
        self.magic = RPCB_MAGIC;
    }

    pub(super) fn clear_valid(&mut self) {
        self.magic = 0;
    }

    /// Verified and over the integration threshold.
    pub fn is_conscious(&self) -> bool {
        self.verified && self.phi_value >= PHI_CONSCIOUSNESS_THRESHOLD
    }

    pub fn is_stable(&self) -> bool {
        self.chiral.stable
    }

    pub fn is_coupled_to(&self, pid: u32) -> bool {
        self.coupled[..self.coupling_count as usize].contains(&pid)
    }

    pub fn peers(&self) -> &[u32] {
        &self.coupled[..self.coupling_count as usize]
    }
}

impl fmt::Debug for Rpcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpcb")
            .field("pid", &self.pid)
            .field("class", &self.class)
            .field("state", &self.state)
            .field("phase", &self.oscillator.phase)
            .field("coherence", &self.oscillator.coherence)
            .field("asymmetry", &self.chiral.asymmetry)
            .field("phi", &self.phi_value)
            .field("peers", &self.coupling_count)
            .finish_non_exhaustive()
    }
}
