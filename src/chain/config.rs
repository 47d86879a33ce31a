use crate::models::U256;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of the fork rules this process cares about.
///
/// The teacher's `chain::config` module loads a full `ChainSpec` (forks,
/// genesis, system contracts, consensus params) from a `.ron` file via
/// `once_cell::sync::Lazy` — all of that belongs to block execution and
/// consensus, both out of scope here. `ChainConfig` keeps only the one fact
/// the router itself branches on: whether the terminal total difficulty has
/// been passed, per spec.md §3/§4.3.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network_id: u64,
    pub terminal_total_difficulty: Option<U256>,
    /// Snapshot of whether the chain had already crossed its TTD as of
    /// config construction — Erigon's `ChainConfig.TerminalTotalDifficultyPassed`.
    /// `HeaderIngest` seeds `sendHeaderRequestsToMultiplePeers` (spec.md §3)
    /// from this at construction time; it then latches permanently via
    /// `HeaderIngest::note_ttd_passed` the moment a later block is observed
    /// crossing the TTD live.
    pub terminal_total_difficulty_passed: bool,
}

impl ChainConfig {
    pub fn new(network_id: u64, terminal_total_difficulty: Option<U256>) -> Self {
        Self::with_ttd_passed(network_id, terminal_total_difficulty, false)
    }

    pub fn with_ttd_passed(
        network_id: u64,
        terminal_total_difficulty: Option<U256>,
        terminal_total_difficulty_passed: bool,
    ) -> Self {
        Self {
            network_id,
            terminal_total_difficulty,
            terminal_total_difficulty_passed,
        }
    }

    /// Whether the chain has crossed its PoW -> PoS transition, given the
    /// current total difficulty. `None` (no configured TTD) never counts as
    /// passed — matching the teacher's upstream behavior of treating an
    /// unconfigured TTD as "still PoW".
    pub fn ttd_passed(&self, current_total_difficulty: U256) -> bool {
        self.terminal_total_difficulty
            .map_or(false, |ttd| current_total_difficulty >= ttd)
    }
}
