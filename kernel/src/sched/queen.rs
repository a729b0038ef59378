//! Queen synchronization state
//!
//! The global record summarizing the whole oscillator network: the
//! Kuramoto order parameter, global coupling, aggregate coherence and
//! integration metrics, and per-class population counts. Only the
//! scheduler's synchronization routine writes it.

use super::rpcb::{ResonantClass, ETA_OPTIMAL, LAMBDA_DEFAULT};

/// Global synchronization state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueenState {
    /// Order-parameter magnitude r ∈ [0, 1]
    pub order_parameter_r: f64,
    /// Mean phase ψ
    pub order_parameter_psi: f64,

    /// Global coupling strength λ
    pub lambda: f64,
    /// Global chirality η
    pub eta: f64,

    /// Mean per-RPCB coherence
    pub system_coherence: f64,
    /// Total system entropy
    pub system_entropy: f64,
    /// Global emergence norm
    pub emergence_norm: f64,

    /// Per-class population counts
    pub classical_count: u32,
    pub quantum_count: u32,
    pub hybrid_count: u32,
    pub conscious_count: u32,
    pub emergent_count: u32,

    /// Sum of verified φ values
    pub total_phi: f64,
    /// Mean φ across the live network
    pub average_phi: f64,
    /// Mean φ exceeds the consciousness threshold
    pub network_conscious: bool,

    /// Every live RPCB is chirally stable
    pub globally_stable: bool,
    /// Maximum |η/Γ| observed
    pub max_asymmetry: f64,

    /// Timestamp of the last synchronization
    pub last_sync: u64,
    /// Synchronizations performed (monotonic)
    pub sync_count: u64,
}

impl QueenState {
    pub const fn new() -> Self {
        Self {
            order_parameter_r: 0.0,
            order_parameter_psi: 0.0,
            lambda: LAMBDA_DEFAULT,
            eta: ETA_OPTIMAL,
            system_coherence: 0.5,
            system_entropy: 0.0,
            emergence_norm: 0.0,
            classical_count: 0,
            quantum_count: 0,
            hybrid_count: 0,
            conscious_count: 0,
            emergent_count: 0,
            total_phi: 0.0,
            average_phi: 0.0,
            network_conscious: false,
            globally_stable: true,
            max_asymmetry: 0.0,
            last_sync: 0,
            sync_count: 0,
        }
    }

    pub(super) fn class_count_mut(&mut self, class: ResonantClass) -> &mut u32 {
        match class {
            ResonantClass::Classical => &mut self.classical_count,
            ResonantClass::Quantum => &mut self.quantum_count,
            ResonantClass::Hybrid => &mut self.hybrid_count,
            ResonantClass::Consciousness => &mut self.conscious_count,
            ResonantClass::Emergence => &mut self.emergent_count,
        }
    }
}

impl Default for QueenState {
    fn default() -> Self {
        Self::new()
    }
}
