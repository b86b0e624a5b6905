//! Candidate generation, binding enumeration, scoring, and deduplication

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use arbor_core::{
    Direction, EdgeKind, GraphStore, KindFilter, PatternInstance, RoleBinding, TextMatcher,
};

use crate::definition::{BaseConstraint, Constraint, PatternDef};
use crate::error::PatternError;

/// Compiled pattern table plus the per-process instance id generator.
///
/// Stateless per call: candidate sets feed a binding iterator, accepted
/// bindings are scored, then structurally deduplicated.
pub struct MatcherEngine {
    patterns: BTreeMap<String, PatternDef>,
    counter: AtomicU64,
}

/// Outcome of evaluating one constraint against one binding.
struct ConstraintOutcome {
    label: String,
    required: bool,
    satisfied: bool,
    weight: f64,
    evidence: Option<String>,
    /// `(role, node)` captured for an optional constraint's `bind_as`.
    bound: Option<(String, String)>,
}

impl MatcherEngine {
    pub fn new() -> Self {
        MatcherEngine {
            patterns: BTreeMap::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Validate a definition and add it to the table. Replaces any
    /// previous definition with the same id.
    pub fn register(&mut self, def: PatternDef) -> Result<(), PatternError> {
        validate_def(&def)?;
        tracing::debug!(pattern = %def.id, roles = def.roles.len(), "pattern registered");
        self.patterns.insert(def.id.clone(), def);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PatternDef> {
        self.patterns.get(id)
    }

    pub fn pattern_ids(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Match one pattern against the store, optionally restricted to an
    /// explicit node scope.
    pub fn match_pattern(
        &self,
        store: &GraphStore,
        pattern_id: &str,
        scope: Option<&HashSet<String>>,
    ) -> Result<Vec<PatternInstance>, PatternError> {
        let def = self
            .patterns
            .get(pattern_id)
            .ok_or_else(|| PatternError::NotFound(pattern_id.to_string()))?;
        Ok(self.run(store, def, scope))
    }

    /// Match every registered pattern.
    pub fn match_all(
        &self,
        store: &GraphStore,
        scope: Option<&HashSet<String>>,
    ) -> Vec<PatternInstance> {
        self.patterns
            .values()
            .flat_map(|def| self.run(store, def, scope))
            .collect()
    }

    fn run(
        &self,
        store: &GraphStore,
        def: &PatternDef,
        scope: Option<&HashSet<String>>,
    ) -> Vec<PatternInstance> {
        let group_roles = group_roles(def);

        // Candidate sets per role: store query on kind (+ literal name,
        // + forwarded filter), regex name as a post-filter, then scope.
        let mut candidates: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (role, spec) in &def.roles {
            let mut query = spec.filter.clone().unwrap_or_default();
            query.kind = Some(KindFilter::One(spec.kind));
            if let Some(TextMatcher::Literal(lit)) = &spec.name {
                query.name = Some(TextMatcher::literal(lit.clone()));
            }
            let mut found: Vec<String> = store
                .find_nodes(&query)
                .into_iter()
                .filter(|node| match &spec.name {
                    Some(TextMatcher::Regex(re)) => re.is_match(&node.name),
                    _ => true,
                })
                .filter(|node| scope.is_none_or(|s| s.contains(&node.id)))
                .map(|node| node.id.clone())
                .collect();
            found.sort();

            if found.is_empty() {
                tracing::debug!(pattern = %def.id, role = %role, "no candidates, zero matches");
                return Vec::new();
            }
            candidates.insert(role, found);
        }

        // Non-group roles, owners before their owned roles, otherwise
        // smallest candidate set first.
        let order = enumeration_order(def, &candidates, &group_roles);

        let mut binding: BTreeMap<&str, String> = BTreeMap::new();
        let mut accepted: Vec<PatternInstance> = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        self.enumerate(
            store, def, &candidates, &group_roles, &order, 0, &mut binding, &mut seen,
            &mut accepted,
        );
        tracing::debug!(pattern = %def.id, matches = accepted.len(), "pattern evaluated");
        accepted
    }

    #[allow(clippy::too_many_arguments)]
    fn enumerate<'d>(
        &self,
        store: &GraphStore,
        def: &'d PatternDef,
        candidates: &BTreeMap<&'d str, Vec<String>>,
        group_roles: &BTreeSet<&'d str>,
        order: &[&'d str],
        level: usize,
        binding: &mut BTreeMap<&'d str, String>,
        seen: &mut HashSet<Vec<String>>,
        accepted: &mut Vec<PatternInstance>,
    ) {
        if level == order.len() {
            if let Some(instance) = self.evaluate(store, def, candidates, group_roles, binding) {
                let key = structural_key(&instance);
                if seen.insert(key) {
                    accepted.push(instance);
                }
            }
            return;
        }

        let role = order[level];
        let spec = &def.roles[role];
        for id in &candidates[role] {
            if let Some(owner) = &spec.owned_by {
                let owner_id = &binding[owner.as_str()];
                if !owned_by(store, owner_id, id) {
                    continue;
                }
            }
            binding.insert(role, id.clone());
            self.enumerate(
                store, def, candidates, group_roles, order, level + 1, binding, seen, accepted,
            );
        }
        binding.remove(role);
    }

    /// Evaluate every constraint against a complete binding; emit an
    /// instance when all required constraints hold.
    fn evaluate(
        &self,
        store: &GraphStore,
        def: &PatternDef,
        candidates: &BTreeMap<&str, Vec<String>>,
        group_roles: &BTreeSet<&str>,
        binding: &BTreeMap<&str, String>,
    ) -> Option<PatternInstance> {
        // Group roles bind to their entire candidate set, owner-restricted
        // when the role declares `owned_by`.
        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for &role in group_roles {
            let spec = &def.roles[role];
            let members: Vec<String> = match &spec.owned_by {
                Some(owner) => {
                    let owner_id = &binding[owner.as_str()];
                    candidates[role]
                        .iter()
                        .filter(|id| owned_by(store, owner_id, id))
                        .cloned()
                        .collect()
                }
                None => candidates[role].clone(),
            };
            if members.is_empty() {
                return None;
            }
            groups.insert(role, members);
        }

        let mut outcomes: Vec<ConstraintOutcome> = Vec::new();
        for constraint in &def.constraints {
            let required = !constraint.is_optional();
            let outcome = match constraint.as_base() {
                BaseConstraint::Edge(ec) => {
                    let to_ids: Vec<&str> = ec
                        .to
                        .names()
                        .iter()
                        .flat_map(|role| {
                            resolve(&groups, binding, role).iter().map(String::as_str)
                        })
                        .collect();
                    let hit = resolve(&groups, binding, &ec.from).iter().find_map(|from_id| {
                        store
                            .edges_of(from_id, Direction::Out)
                            .into_iter()
                            .find(|edge| {
                                edge.kind == ec.kind
                                    && to_ids.contains(&edge.dst.as_str())
                                    && ec.min_confidence.is_none_or(|min| edge.confidence >= min)
                            })
                            .map(|edge| (from_id.clone(), edge.dst.clone()))
                    });
                    let label = ec.label();
                    let weight = def.scoring.weight_for(&label, None);
                    match hit {
                        Some((from_id, dst_id)) => ConstraintOutcome {
                            evidence: Some(format!("{from_id} -{}-> {dst_id}", ec.kind)),
                            bound: constraint_bind_as(constraint).map(|name| (name, dst_id)),
                            label,
                            required,
                            satisfied: true,
                            weight,
                        },
                        None => ConstraintOutcome {
                            label,
                            required,
                            satisfied: false,
                            weight: 0.0,
                            evidence: None,
                            bound: None,
                        },
                    }
                }
                BaseConstraint::Group(gc) => {
                    let size = resolve(&groups, binding, &gc.role).len();
                    let satisfied =
                        size >= gc.min_size && gc.max_size.is_none_or(|max| size <= max);
                    let label = gc.label();
                    let weight = def.scoring.weight_for(&label, Some(&gc.alt_label()));
                    ConstraintOutcome {
                        evidence: satisfied
                            .then(|| format!("{} bound {size} nodes", gc.role)),
                        label,
                        required,
                        satisfied,
                        weight: if satisfied { weight } else { 0.0 },
                        bound: None,
                    }
                }
            };

            if outcome.required && !outcome.satisfied {
                return None;
            }
            outcomes.push(outcome);
        }

        // Score and assemble.
        let awarded: f64 = outcomes
            .iter()
            .filter(|o| o.satisfied)
            .map(|o| o.weight)
            .sum();
        let confidence = (def.scoring.base + awarded).clamp(0.0, 1.0);

        let mut evidence = vec![format!("base {:.2}", def.scoring.base)];
        evidence.extend(outcomes.iter().filter_map(|o| o.evidence.clone()));

        let mut roles: BTreeMap<String, RoleBinding> = BTreeMap::new();
        for (role, id) in binding {
            roles.insert(role.to_string(), RoleBinding::One(id.clone()));
        }
        for (role, members) in &groups {
            roles.insert(role.to_string(), RoleBinding::Many(members.clone()));
        }
        for outcome in &outcomes {
            if let Some((name, node)) = &outcome.bound {
                roles.insert(name.clone(), RoleBinding::One(node.clone()));
            }
        }

        let explanation = render_explanation(def, &roles, &outcomes, awarded, confidence);

        Some(PatternInstance {
            id: self.mint_id(&def.id),
            pattern_id: def.id.clone(),
            roles,
            confidence,
            evidence,
            explanation: Some(explanation),
        })
    }

    /// Process-unique instance id: hash of the template id and a
    /// monotonically increasing counter.
    fn mint_id(&self, pattern_id: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = DefaultHasher::new();
        pattern_id.hash(&mut hasher);
        n.hash(&mut hasher);
        format!("pi_{n:04}_{:012x}", hasher.finish() & 0xffff_ffff_ffff)
    }
}

impl Default for MatcherEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A role's bound node ids: the group members for a group role, the
/// single bound node otherwise.
fn resolve<'a>(
    groups: &'a BTreeMap<&str, Vec<String>>,
    binding: &'a BTreeMap<&str, String>,
    role: &str,
) -> &'a [String] {
    match groups.get(role) {
        Some(members) => members,
        None => std::slice::from_ref(&binding[role]),
    }
}

/// Structural identity: pattern id is implied by the caller, so the key
/// is the multiset of bound node ids across all roles.
fn structural_key(instance: &PatternInstance) -> Vec<String> {
    let mut ids: Vec<String> = instance
        .roles
        .values()
        .flat_map(|b| b.node_ids().iter().cloned())
        .collect();
    ids.sort();
    ids
}

/// A node is owned by `owner` when its `parent` names the owner or the
/// owner has a `defines` edge to it.
fn owned_by(store: &GraphStore, owner_id: &str, node_id: &str) -> bool {
    if let Some(node) = store.get_node(node_id) {
        if node.parent.as_deref() == Some(owner_id) {
            return true;
        }
    }
    store
        .edges_of(node_id, Direction::In)
        .iter()
        .any(|edge| edge.kind == EdgeKind::Defines && edge.src == owner_id)
}

fn group_roles(def: &PatternDef) -> BTreeSet<&str> {
    def.constraints
        .iter()
        .filter_map(|c| match c.as_base() {
            BaseConstraint::Group(group) => def
                .roles
                .keys()
                .find(|r| **r == group.role)
                .map(String::as_str),
            BaseConstraint::Edge(_) => None,
        })
        .collect()
}

/// Owners before their owned roles; ties broken by ascending candidate
/// count to keep the Cartesian product shallow.
fn enumeration_order<'d>(
    def: &'d PatternDef,
    candidates: &BTreeMap<&'d str, Vec<String>>,
    group_roles: &BTreeSet<&'d str>,
) -> Vec<&'d str> {
    let mut remaining: Vec<&str> = def
        .roles
        .keys()
        .map(String::as_str)
        .filter(|r| !group_roles.contains(r))
        .collect();
    let mut order: Vec<&str> = Vec::new();

    while !remaining.is_empty() {
        let placed: HashSet<&str> = order.iter().copied().collect();
        let next = remaining
            .iter()
            .enumerate()
            .filter(|(_, role)| match &def.roles[**role].owned_by {
                Some(owner) => placed.contains(owner.as_str()),
                None => true,
            })
            .min_by_key(|(_, role)| candidates[**role].len())
            .map(|(i, _)| i)
            // Unreconcilable `owned_by` chain; validation rejects cycles,
            // so this is only a defensive fallback.
            .unwrap_or(0);
        order.push(remaining.remove(next));
    }
    order
}

fn constraint_bind_as(constraint: &Constraint) -> Option<String> {
    match constraint {
        Constraint::Optional(opt) => opt.bind_as.clone(),
        _ => None,
    }
}

fn render_explanation(
    def: &PatternDef,
    roles: &BTreeMap<String, RoleBinding>,
    outcomes: &[ConstraintOutcome],
    awarded: f64,
    confidence: f64,
) -> String {
    let mut lines = Vec::new();
    let bindings: Vec<String> = roles
        .iter()
        .map(|(role, binding)| match binding {
            RoleBinding::One(id) => format!("{role}={id}"),
            RoleBinding::Many(ids) => format!("{role}={} nodes", ids.len()),
        })
        .collect();
    lines.push(format!("{}: {}", def.id, bindings.join(", ")));
    for outcome in outcomes {
        let mark = if outcome.satisfied { "ok" } else { "miss" };
        let detail = outcome.evidence.as_deref().unwrap_or("not satisfied");
        lines.push(format!(
            "  [{mark}] {} +{:.2}: {detail}",
            outcome.label, outcome.weight
        ));
    }
    lines.push(format!(
        "  score: clamp({:.2} base + {:.2} awarded) = {:.2}",
        def.scoring.base, awarded, confidence
    ));
    lines.join("\n")
}

fn validate_def(def: &PatternDef) -> Result<(), PatternError> {
    if def.roles.is_empty() {
        return Err(PatternError::invalid(&def.id, "pattern declares no roles"));
    }
    if !(0.0..=1.0).contains(&def.scoring.base) {
        return Err(PatternError::invalid(&def.id, "scoring base outside [0, 1]"));
    }
    for (label, weight) in &def.scoring.weights {
        if !(0.0..=1.0).contains(weight) {
            return Err(PatternError::invalid(
                &def.id,
                format!("weight `{label}` outside [0, 1]"),
            ));
        }
    }

    let groups = group_roles(def);
    for (role, spec) in &def.roles {
        if let Some(owner) = &spec.owned_by {
            if owner == role {
                return Err(PatternError::invalid(
                    &def.id,
                    format!("role `{role}` is owned by itself"),
                ));
            }
            if !def.roles.contains_key(owner) {
                return Err(PatternError::invalid(
                    &def.id,
                    format!("role `{role}` owned by unknown role `{owner}`"),
                ));
            }
            if groups.contains(owner.as_str()) {
                return Err(PatternError::invalid(
                    &def.id,
                    format!("role `{role}` owned by group role `{owner}`"),
                ));
            }
        }
    }
    // owned_by chains must terminate.
    for role in def.roles.keys() {
        let mut cursor = role;
        for _ in 0..=def.roles.len() {
            match &def.roles[cursor].owned_by {
                Some(owner) if owner == role => {
                    return Err(PatternError::invalid(
                        &def.id,
                        format!("`owned_by` cycle through role `{role}`"),
                    ));
                }
                Some(owner) => cursor = owner,
                None => break,
            }
        }
    }

    for constraint in &def.constraints {
        for referenced in constraint.referenced_roles() {
            if !def.roles.contains_key(referenced) {
                return Err(PatternError::invalid(
                    &def.id,
                    format!("constraint references unknown role `{referenced}`"),
                ));
            }
        }
        if let Constraint::Optional(opt) = constraint {
            if let Some(bind_as) = &opt.bind_as {
                if def.roles.contains_key(bind_as) {
                    return Err(PatternError::invalid(
                        &def.id,
                        format!("`bind_as` role `{bind_as}` collides with a declared role"),
                    ));
                }
            }
        }
    }
    Ok(())
}
