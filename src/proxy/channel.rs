//! Load-balanced channel of upstream hosts.

use std::sync::Mutex;

use rand::Rng;

/// How the channel distributes requests over its hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancePolicy {
    Random,
    RoundRobin,
    WeightedRoundRobin,
}

struct ChannelState {
    cursor: usize,
    /// Smooth weighted round-robin running weights.
    current: Vec<i64>,
}

/// An ordered set of upstream hosts with a selection policy.
///
/// Shared by every request to a proxy route; `pick` is safe to call
/// concurrently.
pub struct UpstreamChannel {
    hosts: Vec<String>,
    weights: Vec<u32>,
    policy: LoadBalancePolicy,
    state: Mutex<ChannelState>,
}

impl UpstreamChannel {
    /// Empty `weights` assigns weight 1 to every host; a non-empty list
    /// must match the host count.
    pub fn new(
        hosts: Vec<String>,
        policy: LoadBalancePolicy,
        weights: Vec<u32>,
    ) -> anyhow::Result<Self> {
        if hosts.is_empty() {
            anyhow::bail!("no upstream hosts configured");
        }
        let weights = if weights.is_empty() {
            vec![1; hosts.len()]
        } else if weights.len() == hosts.len() {
            weights
        } else {
            anyhow::bail!(
                "{} weights for {} hosts",
                weights.len(),
                hosts.len()
            );
        };

        let state = ChannelState {
            cursor: 0,
            current: vec![0; hosts.len()],
        };
        Ok(Self {
            hosts,
            weights,
            policy,
            state: Mutex::new(state),
        })
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Selects the upstream for one request according to the policy.
    pub fn pick(&self) -> &str {
        let index = match self.policy {
            LoadBalancePolicy::Random => {
                rand::thread_rng().gen_range(0..self.hosts.len())
            }
            LoadBalancePolicy::RoundRobin => {
                let mut state = self.lock();
                let index = state.cursor % self.hosts.len();
                state.cursor = state.cursor.wrapping_add(1);
                index
            }
            LoadBalancePolicy::WeightedRoundRobin => self.pick_weighted(),
        };
        &self.hosts[index]
    }

    /// Smooth weighted round-robin: every pick raises each host's running
    /// weight by its configured weight, takes the maximum, and lowers the
    /// winner by the weight total.
    fn pick_weighted(&self) -> usize {
        let mut state = self.lock();
        let total: i64 = self.weights.iter().map(|w| i64::from(*w)).sum();
        let mut best = 0;
        for i in 0..self.hosts.len() {
            state.current[i] += i64::from(self.weights[i]);
            if state.current[i] > state.current[best] {
                best = i;
            }
        }
        state.current[best] -= total;
        best
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
