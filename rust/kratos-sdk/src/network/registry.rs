// Node registry - immutable topology snapshots over shared per-node state

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::node::Node;
use crate::error::{Error, Result};
use crate::execute::AttemptOutcome;
use crate::status::StatusPolicy;
use crate::types::{AccountId, NodeAddress};

/// Topology captured at one point in time.
///
/// Executions hold on to the snapshot they started with; a refresh swaps in
/// a new one without disturbing them.
#[derive(Debug, Default)]
pub struct NetworkSnapshot {
    nodes: Vec<Arc<Node>>,
    index: HashMap<AccountId, usize>,
    mirror_endpoints: Vec<String>,
    generation: u64,
}

impl NetworkSnapshot {
    fn build(nodes: Vec<Arc<Node>>, mirror_endpoints: Vec<String>, generation: u64) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.account_id(), i))
            .collect();
        Self {
            nodes,
            index,
            mirror_endpoints,
            generation,
        }
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node_ids(&self) -> Vec<AccountId> {
        self.nodes.iter().map(|n| n.account_id()).collect()
    }

    pub fn get(&self, account_id: &AccountId) -> Option<&Arc<Node>> {
        self.index.get(account_id).map(|&i| &self.nodes[i])
    }

    pub fn mirror_endpoints(&self) -> &[String] {
        &self.mirror_endpoints
    }

    /// Bumped on every refresh
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered candidates for one execution.
    ///
    /// An explicit list is returned as given and must be fully known.
    /// Otherwise nodes (restricted to the known members of `allowed` when
    /// set) are ordered by remaining backoff, then health
    /// (highest first), then a per-execution pseudo-random key derived from
    /// `seed`.
    pub fn candidates(
        &self,
        explicit: Option<&[AccountId]>,
        allowed: Option<&[AccountId]>,
        seed: u64,
    ) -> Result<Vec<Arc<Node>>> {
        if let Some(explicit) = explicit {
            let nodes = explicit
                .iter()
                .map(|id| self.get(id).cloned().ok_or(Error::UnknownNode(*id)))
                .collect::<Result<Vec<_>>>()?;
            if nodes.is_empty() {
                return Err(Error::NoNodes);
            }
            return Ok(nodes);
        }

        let mut nodes: Vec<Arc<Node>> = match allowed {
            // Nodes dropped by a refresh since freezing are skipped
            Some(allowed) => allowed
                .iter()
                .filter_map(|id| self.get(id).cloned())
                .collect(),
            None => self.nodes.clone(),
        };
        if nodes.is_empty() {
            return Err(Error::NoNodes);
        }

        nodes.sort_by_cached_key(|node| {
            (
                node.remaining_backoff(),
                std::cmp::Reverse(node.health()),
                mix(seed, &node.account_id()),
            )
        });
        Ok(nodes)
    }
}

/// SplitMix64 over the seed and the node id
fn mix(seed: u64, account_id: &AccountId) -> u64 {
    let mut z = seed
        ^ account_id
            .num
            .wrapping_add(account_id.realm.rotate_left(21))
            .wrapping_add(account_id.shard.rotate_left(42));
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Registry of known consensus nodes
#[derive(Debug)]
pub struct NodeRegistry {
    current: RwLock<Arc<NetworkSnapshot>>,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl NodeRegistry {
    pub fn new(
        addresses: &[NodeAddress],
        mirror_endpoints: Vec<String>,
        min_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        let nodes = addresses
            .iter()
            .map(|a| Arc::new(Node::from_address(a)))
            .collect();
        Self {
            current: RwLock::new(Arc::new(NetworkSnapshot::build(nodes, mirror_endpoints, 0))),
            min_backoff,
            max_backoff,
        }
    }

    /// Current topology
    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the whole node set.
    ///
    /// Nodes that survive the refresh unchanged keep their health and
    /// backoff. An empty topology is refused and the old one stays.
    pub fn refresh(&self, addresses: &[NodeAddress]) -> Result<Arc<NetworkSnapshot>> {
        if addresses.is_empty() {
            return Err(Error::NoNodes);
        }

        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = Arc::clone(&guard);

        let nodes: Vec<Arc<Node>> = addresses
            .iter()
            .map(|address| match previous.get(&address.account_id) {
                Some(old) if old.endpoints() == address.endpoints.as_slice() => Arc::clone(old),
                Some(old) => {
                    let node = Node::from_address(address);
                    node.inherit_state(old);
                    Arc::new(node)
                }
                None => Arc::new(Node::from_address(address)),
            })
            .collect();

        let snapshot = Arc::new(NetworkSnapshot::build(
            nodes,
            previous.mirror_endpoints.clone(),
            previous.generation + 1,
        ));
        *guard = Arc::clone(&snapshot);

        info!(
            "🌐 Network refreshed: {} nodes (generation {})",
            snapshot.len(),
            snapshot.generation
        );
        Ok(snapshot)
    }

    /// Apply one attempt's outcome to the node's health
    pub fn report_outcome(&self, node: &Node, outcome: AttemptOutcome, policy: &StatusPolicy) {
        match outcome {
            AttemptOutcome::ImmediateAccept => node.record_success(),
            AttemptOutcome::TransportFailure => {
                let backoff = node.record_failure(self.min_backoff, self.max_backoff);
                debug!("Node {} backing off for {:?}", node.account_id(), backoff);
            }
            AttemptOutcome::ImmediateReject(status) if policy.is_node_level(status) => {
                let backoff = node.record_failure(self.min_backoff, self.max_backoff);
                debug!(
                    "Node {} rejected with {}, backing off for {:?}",
                    node.account_id(),
                    status,
                    backoff
                );
            }
            // Request-level rejections say nothing about the node
            AttemptOutcome::ImmediateReject(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    fn address(num: u64) -> NodeAddress {
        NodeAddress {
            account_id: AccountId::from_num(num),
            endpoints: vec![format!("http://node{}", num)],
            description: String::new(),
        }
    }

    fn registry(nums: &[u64]) -> NodeRegistry {
        let addresses: Vec<_> = nums.iter().map(|&n| address(n)).collect();
        NodeRegistry::new(
            &addresses,
            vec![],
            Duration::from_secs(8),
            Duration::from_secs(3600),
        )
    }

    fn ids(nodes: &[Arc<Node>]) -> Vec<u64> {
        nodes.iter().map(|n| n.account_id().num).collect()
    }

    #[test]
    fn test_explicit_order_is_kept() {
        let registry = registry(&[3, 4, 5]);
        let snapshot = registry.snapshot();
        snapshot.nodes()[2].record_failure(Duration::from_secs(8), Duration::from_secs(60));

        let explicit = [AccountId::from_num(5), AccountId::from_num(3)];
        let candidates = snapshot.candidates(Some(&explicit), None, 1).unwrap();
        assert_eq!(ids(&candidates), vec![5, 3]);

        let unknown = [AccountId::from_num(99)];
        assert!(matches!(
            snapshot.candidates(Some(&unknown), None, 1),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_backed_off_nodes_sort_last() {
        let registry = registry(&[3, 4, 5]);
        let snapshot = registry.snapshot();
        let policy = StatusPolicy::default();
        let four = snapshot.get(&AccountId::from_num(4)).unwrap();
        registry.report_outcome(four, AttemptOutcome::TransportFailure, &policy);

        for seed in 0..16 {
            let candidates = snapshot.candidates(None, None, seed).unwrap();
            assert_eq!(candidates.len(), 3);
            assert_eq!(candidates[2].account_id().num, 4);
        }
    }

    #[test]
    fn test_seed_is_stable() {
        let snapshot = registry(&[3, 4, 5, 6, 7]).snapshot();
        let a = snapshot.candidates(None, None, 42).unwrap();
        let b = snapshot.candidates(None, None, 42).unwrap();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_allowed_restricts_candidates() {
        let snapshot = registry(&[3, 4, 5]).snapshot();
        let allowed = [AccountId::from_num(5), AccountId::from_num(3)];
        let mut got = ids(&snapshot.candidates(None, Some(&allowed), 7).unwrap());
        got.sort();
        assert_eq!(got, vec![3, 5]);

        // Unknown members are skipped, an all-unknown list leaves nothing
        let stale = [AccountId::from_num(9), AccountId::from_num(4)];
        assert_eq!(ids(&snapshot.candidates(None, Some(&stale), 7).unwrap()), vec![4]);
        let gone = [AccountId::from_num(9)];
        assert!(matches!(
            snapshot.candidates(None, Some(&gone), 7),
            Err(Error::NoNodes)
        ));
    }

    #[test]
    fn test_terminal_rejection_leaves_health() {
        let registry = registry(&[3]);
        let snapshot = registry.snapshot();
        let node = &snapshot.nodes()[0];
        let policy = StatusPolicy::default();

        registry.report_outcome(node, AttemptOutcome::ImmediateReject(Status::InvalidSignature), &policy);
        assert!(node.is_healthy());

        registry.report_outcome(node, AttemptOutcome::ImmediateReject(Status::Busy), &policy);
        assert!(!node.is_healthy());

        registry.report_outcome(node, AttemptOutcome::ImmediateAccept, &policy);
        assert!(node.is_healthy());
    }

    #[test]
    fn test_refresh_swaps_atomically() {
        let registry = registry(&[3, 4]);
        let before = registry.snapshot();
        before.nodes()[0].record_failure(Duration::from_secs(8), Duration::from_secs(60));

        let after = registry.refresh(&[address(3), address(9)]).unwrap();
        assert_eq!(after.generation(), 1);
        assert_eq!(ids(after.nodes()), vec![3, 9]);
        // Surviving node keeps its state
        assert!(!after.nodes()[0].is_healthy());
        // Old snapshot untouched
        assert_eq!(ids(before.nodes()), vec![3, 4]);

        assert!(registry.refresh(&[]).is_err());
        assert_eq!(registry.snapshot().generation(), 1);
    }
}
