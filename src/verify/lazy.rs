//! Lazy splice verification
//!
//! Proofs are not checked on arrival. Instead each history blob joins a
//! dependency graph for its (author, tree) group, where a confirmed edge
//! `parent -> child` records that the parent proof's historical root at the
//! child's version hash-matches the child's root. Forcing a message walks to
//! the newest reachable version, performs one public-key verification there,
//! and propagates validity down every confirmed edge, so one signature check
//! settles an entire connected component.

use crate::tree::PrunedTree;
use crate::wire::{from_wire, signing_bytes, SignatureKind, SignedBlob, SIGNING_BYTES_LEN};
use crate::{Agg, Aggregator, Blake3Aggregator, Metrics, SignatureVerifier};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback invoked exactly once per message submitted for verification
pub type VerifiedCallback = Box<dyn FnOnce(bool) + Send>;

/// Default bound on live (author, tree) groups
pub const DEFAULT_MAX_GROUPS: usize = 64;
/// Default bound on pending messages within one group
pub const DEFAULT_MAX_ENTRIES_PER_GROUP: usize = 1024;

type GroupKey = (Vec<u8>, u64);

struct Entry {
    version: u64,
    payload: [u8; SIGNING_BYTES_LEN],
    signature: Vec<u8>,
    on_verified: Option<VerifiedCallback>,
}

impl Entry {
    fn finish(&mut self, valid: bool) {
        if let Some(cb) = self.on_verified.take() {
            cb(valid);
        }
    }
}

/// The splice dependency graph over version numbers
///
/// Confirmed edges carry hash-verified splices; provisional edges record a
/// derived root for a version whose bundle has not arrived yet.
#[derive(Default)]
struct Dag {
    /// version -> confirmed later versions vouching for it
    parents: HashMap<u64, BTreeSet<u64>>,
    /// confirmed reverse edges
    children: HashMap<u64, BTreeSet<u64>>,
    /// absent target version -> claimant versions
    provisional: HashMap<u64, BTreeSet<u64>>,
    /// claimant version -> targets it provisionally claims
    claims: HashMap<u64, BTreeSet<u64>>,
}

impl Dag {
    fn add_confirmed(&mut self, parent: u64, child: u64) {
        self.parents.entry(child).or_default().insert(parent);
        self.children.entry(parent).or_default().insert(child);
    }

    fn add_provisional(&mut self, claimant: u64, target: u64) {
        self.provisional.entry(target).or_default().insert(claimant);
        self.claims.entry(claimant).or_default().insert(target);
    }

    /// Remove and return every claimant provisionally spliced to `target`
    fn take_provisional(&mut self, target: u64) -> Vec<u64> {
        let claimants = self.provisional.remove(&target).unwrap_or_default();
        for &claimant in &claimants {
            if let Some(targets) = self.claims.get_mut(&claimant) {
                targets.remove(&target);
                if targets.is_empty() {
                    self.claims.remove(&claimant);
                }
            }
        }
        claimants.into_iter().collect()
    }

    /// The newest confirmed parent of `version`, if any
    fn max_parent(&self, version: u64) -> Option<u64> {
        self.parents
            .get(&version)
            .and_then(|p| p.iter().next_back().copied())
    }

    /// Every version reachable from `root` along confirmed child edges,
    /// `root` included
    fn component_down(&self, root: u64) -> Vec<u64> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            if !seen.insert(v) {
                continue;
            }
            if let Some(children) = self.children.get(&v) {
                stack.extend(children.iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    /// Drop every edge touching `version`
    fn remove(&mut self, version: u64) {
        if let Some(parents) = self.parents.remove(&version) {
            for p in parents {
                if let Some(c) = self.children.get_mut(&p) {
                    c.remove(&version);
                }
            }
        }
        if let Some(children) = self.children.remove(&version) {
            for c in children {
                if let Some(p) = self.parents.get_mut(&c) {
                    p.remove(&version);
                }
            }
        }
        if let Some(targets) = self.claims.remove(&version) {
            for t in targets {
                if let Some(claimants) = self.provisional.get_mut(&t) {
                    claimants.remove(&version);
                    if claimants.is_empty() {
                        self.provisional.remove(&t);
                    }
                }
            }
        }
        // Provisional edges *to* this version were consumed when its bundle
        // arrived; any left are stale claims from removed claimants.
        self.take_provisional(version);
    }
}

/// Per-(author, tree) pending state
struct OneTree {
    /// Not-yet-resolved bundles keyed by leaf index
    bundles: BTreeMap<u64, Entry>,
    /// Leaves pending at each version (one batch = one version)
    by_version: BTreeMap<u64, BTreeSet<u64>>,
    /// Root aggregates claimed by arrived bundles
    roots: HashMap<u64, Agg>,
    /// Roots derived by later proofs for versions not yet arrived
    pending_roots: HashMap<u64, Agg>,
    /// Hash-validated roots left behind by resolved components; a late
    /// arrival matching one of these verifies without a public-key check
    validated_roots: HashMap<u64, Agg>,
    dag: Dag,
    /// LRU stamp, bumped on every touch
    stamp: u64,
}

impl OneTree {
    fn new(stamp: u64) -> Self {
        OneTree {
            bundles: BTreeMap::new(),
            by_version: BTreeMap::new(),
            roots: HashMap::new(),
            pending_roots: HashMap::new(),
            validated_roots: HashMap::new(),
            dag: Dag::default(),
            stamp,
        }
    }

    /// Resolve every bundle at `version` with the given outcome
    fn resolve_version(&mut self, version: u64, valid: bool, metrics: &Metrics) {
        if let Some(leaves) = self.by_version.remove(&version) {
            for leaf in leaves {
                if let Some(mut entry) = self.bundles.remove(&leaf) {
                    entry.finish(valid);
                }
            }
        }
        if let Some(root) = self.roots.remove(&version) {
            if valid {
                self.validated_roots.insert(version, root);
            }
        }
        if valid {
            // The derived roots this version vouched for are now trusted.
            if let Some(targets) = self.dag.claims.get(&version).cloned() {
                for target in targets {
                    if let Some(agg) = self.pending_roots.remove(&target) {
                        self.validated_roots.insert(target, agg);
                        metrics.incr_splice_confirms();
                    }
                }
            }
        }
        self.dag.remove(version);
        // Pending roots whose every claimant is gone can never be confirmed.
        self.pending_roots
            .retain(|target, _| self.dag.provisional.contains_key(target));
    }
}

/// Defers public-key verification and amortizes it across spliced proofs
pub struct LazyVerifier {
    keys: Arc<dyn SignatureVerifier>,
    agg: Blake3Aggregator,
    groups: HashMap<GroupKey, OneTree>,
    max_groups: usize,
    max_entries_per_group: usize,
    clock: u64,
    metrics: Arc<Metrics>,
}

impl LazyVerifier {
    pub fn new(keys: Arc<dyn SignatureVerifier>, metrics: Arc<Metrics>) -> Self {
        LazyVerifier::with_limits(
            keys,
            metrics,
            DEFAULT_MAX_GROUPS,
            DEFAULT_MAX_ENTRIES_PER_GROUP,
        )
    }

    /// Bound live groups and per-group entries; overflow forces the oldest
    pub fn with_limits(
        keys: Arc<dyn SignatureVerifier>,
        metrics: Arc<Metrics>,
        max_groups: usize,
        max_entries_per_group: usize,
    ) -> Self {
        LazyVerifier {
            keys,
            agg: Blake3Aggregator,
            groups: HashMap::new(),
            max_groups: max_groups.max(1),
            max_entries_per_group: max_entries_per_group.max(1),
            clock: 0,
            metrics,
        }
    }

    /// Number of messages awaiting resolution
    pub fn pending(&self) -> usize {
        self.groups.values().map(|g| g.bundles.len()).sum()
    }

    /// Submit a message for deferred verification
    ///
    /// The callback fires exactly once: immediately on a leaf-binding
    /// failure, a duplicate, or a known-validated root; otherwise when the
    /// message is forced (explicitly or by the expiration policy).
    pub fn add(
        &mut self,
        data: &[u8],
        blob: SignedBlob,
        on_verified: impl FnOnce(bool) + Send + 'static,
    ) {
        // Only history proofs can splice; everything else is checked now.
        if blob.kind != SignatureKind::SingleHistoryTree {
            let valid = self.verify_now(data, &blob);
            on_verified(valid);
            return;
        }

        let Some((pruned, root)) = self.parse_and_bind(data, &blob) else {
            on_verified(false);
            return;
        };
        let version = pruned.version();
        let leaf = u64::from(blob.leaf);
        let payload = signing_bytes(blob.kind, version, &root);
        let key: GroupKey = (blob.signer.clone(), blob.tree_id);

        self.clock += 1;
        let stamp = self.clock;
        let group = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| OneTree::new(stamp));
        group.stamp = stamp;

        // A resolved component may have already authenticated this root.
        if let Some(&validated) = group.validated_roots.get(&version) {
            if validated == root {
                self.metrics.incr_splice_confirms();
                on_verified(true);
            } else {
                let offender = (Box::new(on_verified) as VerifiedCallback, payload, blob.signature);
                self.fail_group(&key, version, Some(offender));
            }
            return;
        }

        // Consistency against roots claimed by already-arrived bundles and
        // roots derived by later proofs.
        if group.roots.get(&version).is_some_and(|&r| r != root)
            || group.pending_roots.get(&version).is_some_and(|&p| p != root)
        {
            let offender = (Box::new(on_verified) as VerifiedCallback, payload, blob.signature);
            self.fail_group(&key, version, Some(offender));
            return;
        }

        if group.bundles.contains_key(&leaf) {
            warn!(leaf, version, "duplicate bundle for leaf");
            on_verified(false);
            return;
        }

        // This bundle may be the missing peer of provisional splices:
        // confirm every claimant.
        if group.pending_roots.remove(&version).is_some() {
            for claimant in group.dag.take_provisional(version) {
                group.dag.add_confirmed(claimant, version);
                self.metrics.incr_splice_confirms();
            }
        }

        group.bundles.insert(
            leaf,
            Entry {
                version,
                payload,
                signature: blob.signature.clone(),
                on_verified: Some(Box::new(on_verified)),
            },
        );
        group.by_version.entry(version).or_default().insert(leaf);
        group.roots.insert(version, root);

        if let Err(conflict) = register_hints(group, &pruned, version, &blob, &self.metrics) {
            warn!(version, target = conflict, "splice hint contradicts known root");
            self.fail_group(&key, version, None);
            return;
        }

        self.enforce_limits(&key);
    }

    /// Resolve one message now, walking its splice chain for the cheapest
    /// signature check; returns whether the message was pending
    pub fn force(&mut self, signer: &[u8], tree_id: u64, leaf: u64) -> bool {
        let key: GroupKey = (signer.to_vec(), tree_id);
        let Some(version) = self
            .groups
            .get(&key)
            .and_then(|g| g.bundles.get(&leaf).map(|e| e.version))
        else {
            return false;
        };
        self.force_version(&key, version);
        true
    }

    /// Resolve everything pending for one (author, tree) group
    pub fn force_group(&mut self, signer: &[u8], tree_id: u64) {
        let key: GroupKey = (signer.to_vec(), tree_id);
        self.drain_group(&key);
    }

    /// Resolve every pending message
    pub fn force_all(&mut self) {
        let keys: Vec<GroupKey> = self.groups.keys().cloned().collect();
        for key in keys {
            self.drain_group(&key);
        }
    }

    // === Internal resolution machinery ===

    fn drain_group(&mut self, key: &GroupKey) {
        loop {
            let Some(&version) = self
                .groups
                .get(key)
                .and_then(|g| g.by_version.keys().next())
            else {
                break;
            };
            self.force_version(key, version);
        }
    }

    /// Force the bundle(s) at `version`: walk confirmed parent edges to a
    /// root candidate, verify its signature, and propagate. On a failed
    /// candidate, fail that version alone and retry up the shortened chain.
    fn force_version(&mut self, key: &GroupKey, version: u64) {
        loop {
            let Some(group) = self.groups.get_mut(key) else {
                return;
            };
            if !group.by_version.contains_key(&version) {
                return;
            }

            let mut candidate = version;
            while let Some(parent) = group.dag.max_parent(candidate) {
                candidate = parent;
            }

            let (payload, signature) = {
                let leaves = group
                    .by_version
                    .get(&candidate)
                    .expect("dag nodes track pending versions");
                let first = leaves.iter().next().expect("non-empty version set");
                let entry = &group.bundles[first];
                (entry.payload, entry.signature.clone())
            };

            let valid = self.keys.verify(&key.0, &payload, &signature);
            self.metrics.incr_pk_verifications();

            if valid {
                let component = group.dag.component_down(candidate);
                debug!(
                    candidate,
                    settled = component.len(),
                    "signature validated splice component"
                );
                for v in component {
                    group.resolve_version(v, true, &self.metrics);
                }
                return;
            }

            warn!(candidate, "splice root candidate failed signature check");
            group.resolve_version(candidate, false, &self.metrics);
            if candidate == version {
                return;
            }
        }
    }

    /// Splice trust is gone for this group: every pending version is settled
    /// by its own signature and the group is evicted. The conflicting
    /// message (if provided) gets its own independent signature check too;
    /// a root conflict taints the splice graph, not the message itself.
    fn fail_group(
        &mut self,
        key: &GroupKey,
        version: u64,
        offender: Option<(VerifiedCallback, [u8; SIGNING_BYTES_LEN], Vec<u8>)>,
    ) {
        warn!(
            tree_id = key.1,
            version, "conflicting root aggregates; revoking splice trust for group"
        );
        if let Some(mut group) = self.groups.remove(key) {
            let versions: Vec<u64> = group.by_version.keys().copied().collect();
            for v in versions {
                let valid = {
                    let leaves = &group.by_version[&v];
                    let first = leaves.iter().next().expect("non-empty version set");
                    let entry = &group.bundles[first];
                    self.metrics.incr_pk_verifications();
                    self.keys.verify(&key.0, &entry.payload, &entry.signature)
                };
                group.resolve_version(v, valid, &self.metrics);
            }
        }
        if let Some((cb, payload, signature)) = offender {
            self.metrics.incr_pk_verifications();
            cb(self.keys.verify(&key.0, &payload, &signature));
        }
    }

    fn enforce_limits(&mut self, just_touched: &GroupKey) {
        if let Some(group) = self.groups.get(just_touched) {
            if group.bundles.len() > self.max_entries_per_group {
                let oldest = group
                    .by_version
                    .keys()
                    .next()
                    .copied()
                    .expect("oversized group is non-empty");
                self.metrics.incr_expirations();
                debug!(version = oldest, "group over capacity; forcing oldest batch");
                self.force_version(just_touched, oldest);
            }
        }

        while self.groups.len() > self.max_groups {
            let Some(oldest) = self
                .groups
                .iter()
                .min_by_key(|(_, g)| g.stamp)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.metrics.incr_expirations();
            debug!(tree_id = oldest.1, "too many groups; forcing oldest out");
            self.drain_group(&oldest);
            self.groups.remove(&oldest);
        }
    }

    fn parse_and_bind(&self, data: &[u8], blob: &SignedBlob) -> Option<(PrunedTree, Agg)> {
        let wire = blob.tree.as_ref()?;
        let pruned = from_wire(wire).ok()?;
        if pruned.leaf_agg(u64::from(blob.leaf)) != Some(self.agg.leaf(data)) {
            return None;
        }
        let root = pruned.root_agg().ok()?;
        Some((pruned, root))
    }

    fn verify_now(&self, data: &[u8], blob: &SignedBlob) -> bool {
        let payload = match blob.kind {
            SignatureKind::SingleMessage => {
                signing_bytes(SignatureKind::SingleMessage, 0, &self.agg.leaf(data))
            }
            _ => {
                let Some((pruned, root)) = self.parse_and_bind(data, blob) else {
                    return false;
                };
                signing_bytes(blob.kind, pruned.version(), &root)
            }
        };
        self.metrics.incr_pk_verifications();
        self.keys.verify(&blob.signer, &payload, &blob.signature)
    }
}

/// Record this bundle's splice hints: confirmed against arrived roots,
/// provisional otherwise. Returns the conflicting target on inconsistency.
fn register_hints(
    group: &mut OneTree,
    pruned: &PrunedTree,
    version: u64,
    blob: &SignedBlob,
    metrics: &Metrics,
) -> std::result::Result<(), u64> {
    for &hint in &blob.splice_hints {
        let target = u64::from(hint);
        if target >= version {
            warn!(version, target, "ignoring non-monotonic splice hint");
            continue;
        }
        let Ok(derived) = pruned.historical_agg(target) else {
            warn!(version, target, "proof lacks splice path for hint");
            continue;
        };

        if let Some(&arrived) = group.roots.get(&target) {
            if arrived == derived {
                group.dag.add_confirmed(version, target);
                metrics.incr_splice_confirms();
            } else {
                return Err(target);
            }
        } else if let Some(&validated) = group.validated_roots.get(&target) {
            if validated != derived {
                return Err(target);
            }
        } else {
            match group.pending_roots.get(&target) {
                Some(&pending) if pending != derived => return Err(target),
                _ => {
                    group.pending_roots.insert(target, derived);
                    group.dag.add_provisional(version, target);
                }
            }
        }
    }
    Ok(())
}
