//! Resonant scheduler core
//!
//! Runnable work is a network of coupled phase oscillators. Each
//! synchronization pass advances every live oscillator under Kuramoto
//! coupling with a chiral second-harmonic term, refreshes the emergence
//! accumulators, and then recomputes the Queen order parameter
//! r·e^{iψ} = (1/N)·Σe^{iθⱼ}. Scheduling priority is derived from the
//! static PCB priority blended with coupling alignment, coherence-deadline
//! urgency, emergence, and verified integration — priorities emerge from
//! the dynamics rather than from a class table.

use super::math::{atan2, cos, normalize_phase, sin, sqrt, NoiseSource, TWO_PI};
use super::queen::QueenState;
use super::rpcb::{
    ChiralState, EmergenceState, Handedness, OscillatorState, ResonantClass, ResonantState, Rpcb,
    CHIRAL_STABLE_MAX, CISS_COHERENCE_BOOST, COHERENCE_HIGH, COHERENCE_MIN,
    DEFAULT_COHERENCE_DEADLINE_NS, DEFAULT_QUANTUM_NS, ETA_OPTIMAL, LAMBDA_DEFAULT, LAMBDA_MAX,
    LAMBDA_MIN, MAX_COUPLED, MAX_RESONANT_PROCESSES, PHI_CONSCIOUSNESS_THRESHOLD,
    RESONANT_SYNC_INTERVAL_NS,
};
use super::ResonantError;
use crate::process::{Pid, ProcessTable};
use crate::time;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResonantConfig {
    /// Starting global coupling strength λ
    pub initial_lambda: f64,
    /// Rate of λ adaptation
    pub lambda_adaptation: f64,
    /// Starting chirality η
    pub initial_eta: f64,
    /// Damping coefficient Γ
    pub gamma: f64,
    /// Coherence restored by emergency recovery
    pub coherence_target: f64,
    /// Emergence-norm threshold for pattern events
    pub emergence_threshold: f64,
    /// φ threshold for consciousness verification
    pub phi_threshold: f64,
    /// Synchronization interval
    pub sync_interval_ns: u64,
    /// Forced-measurement interval
    pub measurement_interval_ns: u64,
    /// Maximum coupling partners
    pub max_coupled: u8,
    /// Upper bound for λ
    pub max_lambda: f64,
    /// Maximum tolerated |η/Γ|
    pub max_asymmetry: f64,
}

pub const DEFAULT_CONFIG: ResonantConfig = ResonantConfig {
    initial_lambda: LAMBDA_DEFAULT,
    lambda_adaptation: 0.01,
    initial_eta: ETA_OPTIMAL,
    gamma: 1.0,
    coherence_target: super::rpcb::COHERENCE_TARGET,
    emergence_threshold: 0.1,
    phi_threshold: PHI_CONSCIOUSNESS_THRESHOLD,
    sync_interval_ns: RESONANT_SYNC_INTERVAL_NS,
    measurement_interval_ns: 100_000_000,
    max_coupled: MAX_COUPLED as u8,
    max_lambda: LAMBDA_MAX,
    max_asymmetry: super::rpcb::CHIRAL_TRANS_MAX,
};

impl Default for ResonantConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

/// Output of [`ResonantScheduler::schedule_next`]: the selected process,
/// its quantum, and the priority breakdown plus coupling/safety flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingDecision {
    pub selected_pid: u32,
    pub class: ResonantClass,

    /// Quantum to grant, already shrunk to the coherence deadline
    pub quantum_ns: u64,
    /// Coherence window remaining
    pub coherence_remaining_ns: u64,

    /// Priority breakdown
    pub base_priority: f64,
    pub resonant_bonus: f64,
    pub coherence_urgency: f64,
    pub emergence_bonus: f64,
    pub final_priority: f64,

    /// The RPCB has no peers and is coherent; coupling is suggested
    pub initiate_coupling: bool,
    pub couple_with: u32,

    /// Quantum-class process below minimum coherence
    pub requires_measurement: bool,
    /// Coherence deadline under a millisecond
    pub emergency_coherence: bool,
}

impl Default for SchedulingDecision {
    fn default() -> Self {
        Self {
            selected_pid: 0,
            class: ResonantClass::Classical,
            quantum_ns: 0,
            coherence_remaining_ns: 0,
            base_priority: 0.0,
            resonant_bonus: 0.0,
            coherence_urgency: 0.0,
            emergence_bonus: 0.0,
            final_priority: 0.0,
            initiate_coupling: false,
            couple_with: 0,
            requires_measurement: false,
            emergency_coherence: false,
        }
    }
}

/// The resonant scheduler.
pub struct ResonantScheduler {
    rpcbs: [Rpcb; MAX_RESONANT_PROCESSES],
    config: ResonantConfig,
    queen: QueenState,
    noise: NoiseSource,
}

impl ResonantScheduler {
    pub const fn new() -> Self {
        Self {
            rpcbs: [Rpcb::EMPTY; MAX_RESONANT_PROCESSES],
            config: DEFAULT_CONFIG,
            queen: QueenState::new(),
            noise: NoiseSource::new(12_345),
        }
    }

    /// Scheduler with an explicit configuration.
    pub fn with_config(config: ResonantConfig) -> Self {
        let mut sched = Self::new();
        sched.config = config;
        sched.queen.lambda = config.initial_lambda;
        sched.queen.eta = config.initial_eta;
        sched
    }

    fn index(&self, pid: u32) -> Result<usize, ResonantError> {
        let idx = pid as usize;
        if idx >= MAX_RESONANT_PROCESSES || !self.rpcbs[idx].is_valid() {
            return Err(ResonantError::InvalidPid { pid });
        }
        Ok(idx)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a process with the oscillator network.
    pub fn register(
        &mut self,
        pid: u32,
        class: ResonantClass,
        handedness: Handedness,
    ) -> Result<(), ResonantError> {
        let idx = pid as usize;
        if idx >= MAX_RESONANT_PROCESSES {
            return Err(ResonantError::InvalidPid { pid });
        }
        if self.rpcbs[idx].is_valid() {
            return Err(ResonantError::AlreadyRegistered { pid });
        }

        let phase = self.noise.next_f64() * TWO_PI;
        let rpcb = &mut self.rpcbs[idx];
        *rpcb = Rpcb::EMPTY;
        rpcb.pid = pid;
        rpcb.class = class;
        rpcb.state = ResonantState::Coherent;

        rpcb.oscillator = OscillatorState {
            phase,
            frequency: class.natural_frequency(),
            amplitude: 1.0,
            coherence: 0.5,
        };
        rpcb.chiral = ChiralState {
            eta: self.config.initial_eta,
            gamma: self.config.gamma,
            asymmetry: 0.0,
            topological_charge: 0.0,
            handedness,
            stable: false,
        };
        rpcb.chiral.reclassify();
        rpcb.emergence = EmergenceState::ZERO;

        rpcb.resonant_priority = 0.5;
        rpcb.coherence_deadline_ns = DEFAULT_COHERENCE_DEADLINE_NS;
        rpcb.set_valid();

        *self.queen.class_count_mut(class) += 1;
        Ok(())
    }

    /// Remove a process from the network, dissolving its couplings.
    pub fn unregister(&mut self, pid: u32) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;

        while self.rpcbs[idx].coupling_count > 0 {
            let peer = self.rpcbs[idx].coupled[0];
            self.decouple(pid, peer)?;
        }

        let class = self.rpcbs[idx].class;
        let count = self.queen.class_count_mut(class);
        *count = count.saturating_sub(1);

        self.rpcbs[idx].clear_valid();
        self.rpcbs[idx].state = ResonantState::Dormant;
        Ok(())
    }

    pub fn get(&self, pid: u32) -> Option<&Rpcb> {
        self.index(pid).ok().map(|idx| &self.rpcbs[idx])
    }

    #[cfg(all(test, not(target_os = "none")))]
    pub(super) fn rpcb_mut(&mut self, pid: u32) -> &mut Rpcb {
        let idx = self.index(pid).expect("valid rpcb");
        &mut self.rpcbs[idx]
    }

    // ------------------------------------------------------------------
    // Oscillator dynamics
    // ------------------------------------------------------------------

    /// Coupling contribution from the peer set: mean of sin(Δ) plus the
    /// handed second-harmonic term, scaled by the global λ.
    fn coupling_contribution(&self, idx: usize) -> f64 {
        let rpcb = &self.rpcbs[idx];
        let mut contribution = 0.0;
        let mut n_coupled = 0u32;

        for &peer in rpcb.peers() {
            let other = match self.get(peer) {
                Some(other) => other,
                None => continue,
            };
            let phase_diff = other.oscillator.phase - rpcb.oscillator.phase;
            let kuramoto_term = sin(phase_diff);

            let chiral_term = match rpcb.chiral.handedness {
                Handedness::Left => rpcb.chiral.eta * sin(2.0 * phase_diff),
                Handedness::Right => -rpcb.chiral.eta * sin(2.0 * phase_diff),
                Handedness::Neutral => 0.0,
            };

            contribution += kuramoto_term + chiral_term;
            n_coupled += 1;
        }

        if n_coupled > 0 {
            contribution = (self.queen.lambda / n_coupled as f64) * contribution;
        }
        contribution
    }

    /// Advance one oscillator by `dt_ns`: phase under ω + coupling +
    /// noise, coherence toward alignment with ψ, amplitude under chiral
    /// damping, and the resonant state classification.
    pub fn update_oscillator(&mut self, pid: u32, dt_ns: u64) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let dt = dt_ns as f64 / 1e9;

        let coupling = self.coupling_contribution(idx);
        let noise = (self.noise.next_f64() - 0.5) * 0.01;
        let psi = self.queen.order_parameter_psi;
        let emergence_threshold = self.config.emergence_threshold;

        let rpcb = &mut self.rpcbs[idx];
        let dtheta = rpcb.oscillator.frequency * TWO_PI + coupling + noise;
        rpcb.oscillator.phase = normalize_phase(rpcb.oscillator.phase + dtheta * dt);

        let alignment = cos(rpcb.oscillator.phase - psi);
        rpcb.oscillator.coherence =
            0.9 * rpcb.oscillator.coherence + 0.1 * (0.5 + 0.5 * alignment);

        let damping = rpcb.chiral.gamma * dt;
        rpcb.oscillator.amplitude *= 1.0 - damping;
        if rpcb.oscillator.amplitude < 0.1 {
            rpcb.oscillator.amplitude = 0.1;
        }

        if rpcb.oscillator.coherence > COHERENCE_HIGH {
            rpcb.state = if rpcb.verified {
                ResonantState::Conscious
            } else if rpcb.emergence.norm > emergence_threshold {
                ResonantState::Emergent
            } else {
                ResonantState::Coherent
            };
        } else if rpcb.oscillator.coherence < COHERENCE_MIN {
            rpcb.state = ResonantState::Decoherent;
        }
        Ok(())
    }

    /// Refresh the emergence accumulators from the oscillator state.
    pub fn update_emergence(&mut self, pid: u32) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let emergence_threshold = self.config.emergence_threshold;
        let max_coupled = self.config.max_coupled as f64;

        let rpcb = &mut self.rpcbs[idx];
        let osc_contribution = rpcb.oscillator.amplitude * rpcb.oscillator.coherence;
        rpcb.emergence.norm = 0.95 * rpcb.emergence.norm + 0.05 * osc_contribution;

        let p = rpcb.oscillator.phase / TWO_PI;
        if p > 0.0 && p < 1.0 {
            rpcb.emergence.entropy = -p * sin(p * core::f64::consts::PI)
                - (1.0 - p) * sin((1.0 - p) * core::f64::consts::PI);
        }

        if rpcb.coupling_count > 0 {
            rpcb.emergence.integration_level = 0.9 * rpcb.emergence.integration_level
                + 0.1 * rpcb.coupling_count as f64 / max_coupled;
        }

        if rpcb.emergence.norm > emergence_threshold {
            rpcb.emergence.pattern_count += 1;
            rpcb.emergent_events += 1;
            if rpcb.state == ResonantState::Coherent {
                rpcb.state = ResonantState::Emergent;
            }
        }
        Ok(())
    }

    /// One Queen synchronization pass over the whole network.
    pub fn sync(&mut self, dt_ns: u64) {
        // Advance every live, non-dormant oscillator exactly once.
        for i in 0..MAX_RESONANT_PROCESSES {
            if !self.rpcbs[i].is_valid() || self.rpcbs[i].state == ResonantState::Dormant {
                continue;
            }
            let _ = self.update_oscillator(i as u32, dt_ns);
            let _ = self.update_emergence(i as u32);
        }

        // Order parameter r·e^{iψ}.
        let mut sum_cos = 0.0;
        let mut sum_sin = 0.0;
        let mut count = 0u32;
        for rpcb in self.rpcbs.iter() {
            if !rpcb.is_valid() || rpcb.state == ResonantState::Dormant {
                continue;
            }
            sum_cos += cos(rpcb.oscillator.phase);
            sum_sin += sin(rpcb.oscillator.phase);
            count += 1;
        }
        if count > 0 {
            let avg_cos = sum_cos / count as f64;
            let avg_sin = sum_sin / count as f64;
            self.queen.order_parameter_r = sqrt(avg_cos * avg_cos + avg_sin * avg_sin);
            self.queen.order_parameter_psi = atan2(avg_sin, avg_cos);
        } else {
            self.queen.order_parameter_r = 0.0;
            self.queen.order_parameter_psi = 0.0;
        }

        // Aggregate coherence, stability, and integration metrics.
        let mut total_coherence = 0.0;
        let mut all_stable = true;
        let mut max_asym = 0.0f64;
        let mut total_phi = 0.0;
        for rpcb in self.rpcbs.iter() {
            if !rpcb.is_valid() || rpcb.state == ResonantState::Dormant {
                continue;
            }
            total_coherence += rpcb.oscillator.coherence;
            if !rpcb.chiral.stable {
                all_stable = false;
            }
            if rpcb.chiral.asymmetry > max_asym {
                max_asym = rpcb.chiral.asymmetry;
            }
            if rpcb.verified {
                total_phi += rpcb.phi_value;
            }
        }
        if count > 0 {
            self.queen.system_coherence = total_coherence / count as f64;
            self.queen.total_phi = total_phi;
            self.queen.average_phi = total_phi / count as f64;
        }

        self.queen.globally_stable = all_stable;
        self.queen.max_asymmetry = max_asym;
        self.queen.network_conscious = self.queen.average_phi >= self.config.phi_threshold;
        self.queen.sync_count += 1;
        self.queen.last_sync = time::now_ns();
    }

    // ------------------------------------------------------------------
    // Consciousness verification
    // ------------------------------------------------------------------

    /// φ estimate from integration, emergence, coherence, and chiral
    /// stability, with the CISS boost for handed processes.
    fn calculate_phi(&self, idx: usize) -> f64 {
        let rpcb = &self.rpcbs[idx];
        let integration = rpcb.emergence.integration_level;
        let emergence = rpcb.emergence.norm;
        let coherence = rpcb.oscillator.coherence;
        let stability = if rpcb.chiral.stable { 1.0 } else { 0.5 };

        let mut phi = integration * 2.0 + emergence * 1.5;
        phi *= 0.5 + 0.5 * coherence;
        phi *= stability;

        if rpcb.chiral.handedness != Handedness::Neutral {
            phi *= 1.0 + CISS_COHERENCE_BOOST;
        }
        phi
    }

    /// Recompute φ and the verified flag. `Ok(φ)` when the process passes
    /// the threshold, the φ-carrying error otherwise.
    pub fn verify_consciousness(&mut self, pid: u32) -> Result<f64, ResonantError> {
        let idx = self.index(pid)?;
        let phi = self.calculate_phi(idx);
        let threshold = self.config.phi_threshold;

        let rpcb = &mut self.rpcbs[idx];
        rpcb.phi_value = phi;
        rpcb.verified = phi >= threshold;
        rpcb.verification_time = time::now_ns();

        if rpcb.verified {
            rpcb.state = ResonantState::Conscious;
            Ok(phi)
        } else {
            Err(ResonantError::ConsciousnessUnverified { phi })
        }
    }

    /// Last computed φ (0 for unknown pids).
    pub fn phi(&self, pid: u32) -> f64 {
        self.get(pid).map(|r| r.phi_value).unwrap_or(0.0)
    }

    pub fn is_conscious(&self, pid: u32) -> bool {
        self.get(pid).map(|r| r.is_conscious()).unwrap_or(false)
    }

    pub fn is_stable(&self, pid: u32) -> bool {
        self.get(pid).map(|r| r.is_stable()).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Chiral control
    // ------------------------------------------------------------------

    /// Set η and Γ directly, reclassifying the stability regime.
    pub fn set_chiral(&mut self, pid: u32, eta: f64, gamma: f64) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let chiral = &mut self.rpcbs[idx].chiral;
        chiral.eta = eta;
        chiral.gamma = gamma;
        chiral.reclassify();
        Ok(())
    }

    /// Move η toward the optimal φ⁻¹ and shrink Γ out of the unstable
    /// regime if needed.
    pub fn optimize_chiral(&mut self, pid: u32) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let chiral = &mut self.rpcbs[idx].chiral;
        chiral.eta = 0.9 * chiral.eta + 0.1 * ETA_OPTIMAL;
        if chiral.asymmetry >= CHIRAL_STABLE_MAX {
            chiral.gamma = chiral.eta / (CHIRAL_STABLE_MAX * 0.9);
        }
        chiral.reclassify();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Coupling management
    // ------------------------------------------------------------------

    /// Couple two oscillators symmetrically. Coupling to self is an
    /// error; re-coupling an existing edge is a no-op.
    pub fn couple(&mut self, a: u32, b: u32) -> Result<(), ResonantError> {
        if a == b {
            return Err(ResonantError::InvalidPid { pid: a });
        }
        let ia = self.index(a)?;
        let ib = self.index(b)?;

        if self.rpcbs[ia].is_coupled_to(b) {
            return Ok(());
        }
        if self.rpcbs[ia].coupling_count >= self.config.max_coupled
            || self.rpcbs[ib].coupling_count >= self.config.max_coupled
        {
            return Err(ResonantError::CouplingFailed);
        }

        let now = time::now_ns();
        let ca = self.rpcbs[ia].coupling_count as usize;
        self.rpcbs[ia].coupled[ca] = b;
        self.rpcbs[ia].coupling_count += 1;
        self.rpcbs[ia].last_coupling = now;

        let cb = self.rpcbs[ib].coupling_count as usize;
        self.rpcbs[ib].coupled[cb] = a;
        self.rpcbs[ib].coupling_count += 1;
        self.rpcbs[ib].last_coupling = now;
        Ok(())
    }

    fn remove_peer(&mut self, idx: usize, peer: u32) {
        let count = self.rpcbs[idx].coupling_count as usize;
        if let Some(pos) = self.rpcbs[idx].coupled[..count].iter().position(|&p| p == peer) {
            self.rpcbs[idx].coupled.copy_within(pos + 1..count, pos);
            self.rpcbs[idx].coupling_count -= 1;
        }
    }

    /// Remove a coupling edge from both sides.
    pub fn decouple(&mut self, a: u32, b: u32) -> Result<(), ResonantError> {
        let ia = self.index(a)?;
        let ib = self.index(b)?;
        self.remove_peer(ia, b);
        self.remove_peer(ib, a);
        Ok(())
    }

    /// Scale the global coupling strength, clamped into the safe band.
    pub fn adjust_lambda(&mut self, factor: f64) {
        self.queen.lambda = (self.queen.lambda * factor).clamp(LAMBDA_MIN, self.config.max_lambda);
    }

    pub fn lambda(&self) -> f64 {
        self.queen.lambda
    }

    pub fn order_parameter(&self) -> f64 {
        self.queen.order_parameter_r
    }

    pub fn system_coherence(&self) -> f64 {
        self.queen.system_coherence
    }

    pub fn is_globally_stable(&self) -> bool {
        self.queen.globally_stable
    }

    pub fn is_network_conscious(&self) -> bool {
        self.queen.network_conscious
    }

    /// Snapshot of the Queen record.
    pub fn queen_state(&self) -> QueenState {
        self.queen
    }

    // ------------------------------------------------------------------
    // Priority derivation and the scheduling decision
    // ------------------------------------------------------------------

    fn urgency_of(&self, rpcb: &Rpcb) -> f64 {
        if rpcb.coherence_deadline_ns == 0 {
            return 0.0;
        }
        (1.0 - rpcb.coherence_deadline_ns as f64 / 1e9).clamp(0.0, 1.0)
    }

    /// Derived priority ∈ [0, 2] for one RPCB.
    fn resonant_priority_of(&self, idx: usize, processes: &ProcessTable) -> f64 {
        let rpcb = &self.rpcbs[idx];
        let mut priority = processes
            .get(Pid(rpcb.pid))
            .map(|pcb| pcb.priority.normalized())
            .unwrap_or(0.0);

        let phase_alignment = cos(rpcb.oscillator.phase - self.queen.order_parameter_psi);
        priority += 0.2 * self.queen.order_parameter_r * (0.5 + 0.5 * phase_alignment);

        priority += 0.3 * self.urgency_of(rpcb);

        if rpcb.emergence.norm > self.config.emergence_threshold {
            priority += 0.2 * rpcb.emergence.norm;
        }

        if rpcb.verified && rpcb.phi_value >= self.config.phi_threshold {
            priority += 0.3;
        }

        priority += match rpcb.class {
            ResonantClass::Quantum => 0.1,
            ResonantClass::Consciousness => 0.2,
            ResonantClass::Emergence => 0.15,
            _ => 0.0,
        };

        priority.clamp(0.0, 2.0)
    }

    /// Pick the ready process with the highest derived priority. Ties go
    /// to the smallest pid. A decision with `selected_pid` 0 means no
    /// resonant process is ready and the classical ready lists decide.
    pub fn schedule_next(&mut self, processes: &ProcessTable) -> SchedulingDecision {
        let mut best_priority = -1.0;
        let mut best: Option<usize> = None;

        for idx in 0..MAX_RESONANT_PROCESSES {
            let rpcb = &self.rpcbs[idx];
            if !rpcb.is_valid() || rpcb.state == ResonantState::Dormant {
                continue;
            }
            if !processes.is_ready(Pid(rpcb.pid)) {
                continue;
            }
            let priority = self.resonant_priority_of(idx, processes);
            if priority > best_priority {
                best_priority = priority;
                best = Some(idx);
            }
        }

        let idx = match best {
            Some(idx) => idx,
            None => return SchedulingDecision::default(),
        };

        let rpcb = &self.rpcbs[idx];
        let mut quantum_ns = match rpcb.class {
            ResonantClass::Quantum => DEFAULT_QUANTUM_NS / 2,
            ResonantClass::Consciousness => DEFAULT_QUANTUM_NS * 2,
            _ => DEFAULT_QUANTUM_NS,
        };
        if rpcb.coherence_deadline_ns < quantum_ns {
            quantum_ns = rpcb.coherence_deadline_ns;
        }

        let decision = SchedulingDecision {
            selected_pid: rpcb.pid,
            class: rpcb.class,
            quantum_ns,
            coherence_remaining_ns: rpcb.coherence_deadline_ns,
            base_priority: processes
                .get(Pid(rpcb.pid))
                .map(|pcb| pcb.priority.normalized())
                .unwrap_or(0.0),
            resonant_bonus: self.queen.order_parameter_r * 0.2,
            coherence_urgency: self.urgency_of(rpcb),
            emergence_bonus: rpcb.emergence.norm * 0.2,
            final_priority: best_priority,
            initiate_coupling: rpcb.coupling_count == 0 && rpcb.state == ResonantState::Coherent,
            couple_with: 0,
            requires_measurement: rpcb.class == ResonantClass::Quantum
                && rpcb.oscillator.coherence < COHERENCE_MIN,
            emergency_coherence: rpcb.coherence_deadline_ns < 1_000_000,
        };

        self.rpcbs[idx].resonant_priority = best_priority;
        decision
    }

    /// Account a completed quantum against the coherence deadline.
    /// Exhausting the deadline forces decoherence.
    pub fn complete_quantum(&mut self, pid: u32, actual_ns: u64) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let rpcb = &mut self.rpcbs[idx];

        rpcb.coherence_deadline_ns = rpcb.coherence_deadline_ns.saturating_sub(actual_ns);
        if rpcb.coherence_deadline_ns == 0 {
            rpcb.state = ResonantState::Decoherent;
        }

        if matches!(
            rpcb.state,
            ResonantState::Coherent | ResonantState::Conscious | ResonantState::Emergent
        ) {
            rpcb.coherent_time_ns = rpcb.coherent_time_ns.saturating_add(actual_ns);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Pull a process back from (or away from) decoherence: fresh
    /// deadline, target coherence, optimized chirality.
    pub fn emergency_coherence(&mut self, pid: u32) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        self.rpcbs[idx].coherence_deadline_ns = DEFAULT_COHERENCE_DEADLINE_NS;
        self.rpcbs[idx].oscillator.coherence = self.config.coherence_target;
        self.optimize_chiral(pid)?;
        self.rpcbs[idx].state = ResonantState::Coherent;
        Ok(())
    }

    /// Reinitialize all three substates and park the process dormant.
    pub fn reset_process(&mut self, pid: u32) -> Result<(), ResonantError> {
        let idx = self.index(pid)?;
        let class = self.rpcbs[idx].class;
        let handedness = self.rpcbs[idx].chiral.handedness;
        let phase = self.noise.next_f64() * TWO_PI;

        let rpcb = &mut self.rpcbs[idx];
        rpcb.oscillator = OscillatorState {
            phase,
            frequency: class.natural_frequency(),
            amplitude: 1.0,
            coherence: 0.5,
        };
        rpcb.chiral = ChiralState {
            eta: self.config.initial_eta,
            gamma: self.config.gamma,
            asymmetry: 0.0,
            topological_charge: 0.0,
            handedness,
            stable: false,
        };
        rpcb.chiral.reclassify();
        rpcb.emergence = EmergenceState::ZERO;
        rpcb.state = ResonantState::Dormant;
        rpcb.verified = false;
        rpcb.phi_value = 0.0;
        Ok(())
    }

    /// Reset every live RPCB and zero the Queen order parameter.
    pub fn reset_all(&mut self) {
        for i in 0..MAX_RESONANT_PROCESSES {
            if self.rpcbs[i].is_valid() {
                let _ = self.reset_process(i as u32);
            }
        }
        self.queen.order_parameter_r = 0.0;
        self.queen.order_parameter_psi = 0.0;
        self.queen.system_coherence = 0.5;
        self.queen.network_conscious = false;
    }

    /// Log one RPCB's state.
    pub fn dump(&self, pid: u32) {
        if let Some(rpcb) = self.get(pid) {
            log::debug!(
                "rpcb {} {:?} {:?} phase {:.3} coh {:.3} |eta/gamma| {:.3} phi {:.3} peers {}",
                rpcb.pid,
                rpcb.class,
                rpcb.state,
                rpcb.oscillator.phase,
                rpcb.oscillator.coherence,
                rpcb.chiral.asymmetry,
                rpcb.phi_value,
                rpcb.coupling_count
            );
        }
    }

    /// Log the Queen record.
    pub fn dump_queen(&self) {
        let q = &self.queen;
        log::debug!(
            "queen r {:.3} psi {:.3} lambda {:.3} coherence {:.3} stable {} conscious {} syncs {}",
            q.order_parameter_r,
            q.order_parameter_psi,
            q.lambda,
            q.system_coherence,
            q.globally_stable,
            q.network_conscious,
            q.sync_count
        );
    }
}

impl Default for ResonantScheduler {
    fn default() -> Self {
        Self::new()
    }
}
