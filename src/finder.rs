//! Bidirectional shortest-path search for common ancestors.
//!
//! Each side walks upward along parent edges one generation at a time and
//! records, for every ancestor it reaches, the minimal distance and every
//! edge that reaches it at that distance. The two sides meet at a shared
//! ancestor or, failing that, across a partnership between an ancestor of
//! each side.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use crate::policy::KinshipPolicyV1;
use crate::store::FamilyGraph;
use crate::types::{Apex, Deadline, KinshipError, ParentEdge, ParentKind, PersonId};

/// How one ancestor was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    /// Minimal generations from the origin.
    pub distance: u32,
    /// Every edge reaching this person from a person at `distance - 1`.
    pub via: Vec<ParentEdge>,
    /// Whether some minimal route uses biological edges only.
    pub biological: bool,
}

/// Upward breadth-first expansion from one person.
///
/// The map can be expanded incrementally, one generation per call, and is
/// cheap to share: a fully expanded map answers every later query from the
/// same origin without touching the graph again.
#[derive(Debug, Clone)]
pub struct AncestorMap {
    origin: PersonId,
    visits: HashMap<PersonId, Visit>,
    frontier: Vec<PersonId>,
    level: u32,
    exhausted: bool,
}

impl AncestorMap {
    /// Start an expansion at `origin` (distance 0).
    pub fn new(origin: PersonId) -> Self {
        let mut visits = HashMap::new();
        visits.insert(
            origin,
            Visit {
                distance: 0,
                via: Vec::new(),
                biological: true,
            },
        );
        Self {
            origin,
            visits,
            frontier: vec![origin],
            level: 0,
            exhausted: false,
        }
    }

    /// The person this map expands from.
    pub fn origin(&self) -> PersonId {
        self.origin
    }

    /// Generations expanded so far.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Whether no further ancestors can be discovered.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// People discovered by the last expansion.
    pub fn frontier(&self) -> &[PersonId] {
        &self.frontier
    }

    /// Minimal distance to `person`, if discovered.
    pub fn distance(&self, person: PersonId) -> Option<u32> {
        self.visits.get(&person).map(|v| v.distance)
    }

    /// Whether `person` has been discovered.
    pub fn contains(&self, person: PersonId) -> bool {
        self.visits.contains_key(&person)
    }

    /// Visit record for `person`.
    pub fn visit(&self, person: PersonId) -> Option<&Visit> {
        self.visits.get(&person)
    }

    /// Every discovered ancestor with its generation, excluding the origin,
    /// ordered by generation then id.
    pub fn generations(&self) -> Vec<(PersonId, u32)> {
        let mut out: Vec<(PersonId, u32)> = self
            .visits
            .iter()
            .filter(|(p, _)| **p != self.origin)
            .map(|(p, v)| (*p, v.distance))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Number of people discovered, origin included.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Always false: the origin is always present.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Expand one generation. Returns the newly discovered people, sorted.
    ///
    /// Stops (and marks the map exhausted) once `max_generations` have been
    /// expanded or no parents remain. Fails with `InvariantViolation` if the
    /// origin turns out to be its own biological ancestor.
    pub fn expand<G: FamilyGraph + ?Sized>(
        &mut self,
        graph: &G,
        max_generations: u32,
    ) -> Result<Vec<PersonId>, KinshipError> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        if self.level >= max_generations {
            self.exhausted = true;
            self.frontier.clear();
            return Ok(Vec::new());
        }

        let next_distance = self.level + 1;
        let mut discovered: Vec<PersonId> = Vec::new();

        for &person in &self.frontier {
            let person_bio = self.visits.get(&person).map_or(false, |v| v.biological);

            for edge in graph.parents_of(person) {
                let bio_route = person_bio && edge.kind == ParentKind::Biological;

                if edge.parent == self.origin {
                    if bio_route {
                        tracing::warn!(
                            person = %self.origin,
                            "Person reached as their own biological ancestor"
                        );
                        return Err(KinshipError::InvariantViolation(format!(
                            "biological cycle through person {}",
                            self.origin
                        )));
                    }
                    continue;
                }

                match self.visits.get_mut(&edge.parent) {
                    Some(visit) if visit.distance == next_distance => {
                        visit.via.push(*edge);
                        visit.biological |= bio_route;
                    }
                    Some(_) => {}
                    None => {
                        self.visits.insert(
                            edge.parent,
                            Visit {
                                distance: next_distance,
                                via: vec![*edge],
                                biological: bio_route,
                            },
                        );
                        discovered.push(edge.parent);
                    }
                }
            }
        }

        discovered.sort();
        self.level = next_distance;
        self.exhausted = discovered.is_empty();
        self.frontier = discovered.clone();

        tracing::trace!(
            origin = %self.origin,
            level = self.level,
            discovered = discovered.len(),
            "Expanded ancestor generation"
        );
        Ok(discovered)
    }

    /// Expand until exhausted, checking `deadline` before each generation.
    pub fn expand_fully<G: FamilyGraph + ?Sized>(
        &mut self,
        graph: &G,
        max_generations: u32,
        deadline: &Deadline,
    ) -> Result<(), KinshipError> {
        while !self.exhausted {
            deadline.check()?;
            self.expand(graph, max_generations)?;
        }
        Ok(())
    }

    /// Every shortest route from the origin up to `apex`, at most `limit`.
    ///
    /// Each leg is ordered origin-first: `leg[0].child` is the origin and
    /// `leg.last().parent` is `apex`. The origin itself yields one empty leg.
    /// Routes are produced best provenance first, so a biological route, if
    /// one exists, is always the first leg and survives any `limit`.
    pub fn legs(&self, apex: PersonId, limit: usize) -> Vec<Vec<ParentEdge>> {
        let mut out = Vec::new();
        if !self.visits.contains_key(&apex) || limit == 0 {
            return out;
        }
        let mut stack: Vec<ParentEdge> = Vec::new();
        self.collect_legs(apex, &mut stack, &mut out, limit);
        out
    }

    fn collect_legs(
        &self,
        person: PersonId,
        stack: &mut Vec<ParentEdge>,
        out: &mut Vec<Vec<ParentEdge>>,
        limit: usize,
    ) {
        if out.len() >= limit {
            return;
        }
        if person == self.origin {
            out.push(stack.iter().rev().copied().collect());
            return;
        }
        let Some(visit) = self.visits.get(&person) else {
            return;
        };
        let mut via = visit.via.clone();
        via.sort_by_key(|edge| (self.route_rank(edge), *edge));
        for edge in via {
            stack.push(edge);
            self.collect_legs(edge.child, stack, out, limit);
            stack.pop();
            if out.len() >= limit {
                return;
            }
        }
    }

    /// 0 continues a biological route, 2 is a step or foster edge.
    fn route_rank(&self, edge: &ParentEdge) -> u8 {
        let child_bio = self.visits.get(&edge.child).map_or(false, |v| v.biological);
        match edge.kind {
            ParentKind::Biological if child_bio => 0,
            kind if kind.is_step_like() => 2,
            _ => 1,
        }
    }
}

/// Where the two sides met, with both expansions kept for leg enumeration.
#[derive(Debug, Clone)]
pub struct Meeting<'a> {
    /// Shortest combined generations (`dist_a + dist_b`) over the apexes.
    pub distance: u32,
    /// Every shared ancestor at the shortest blood distance, then every
    /// partnership bridge at the shortest bridge distance when that is no
    /// longer than the blood one. Sorted within each group.
    pub apexes: Vec<Apex>,
    /// Expansion from A.
    pub side_a: Cow<'a, AncestorMap>,
    /// Expansion from B.
    pub side_b: Cow<'a, AncestorMap>,
}

/// Outcome of a search.
#[derive(Debug, Clone)]
pub enum Search<'a> {
    /// The lineages meet.
    Met(Meeting<'a>),
    /// No path within the search bound.
    Unrelated,
}

/// Bidirectional breadth-first path finder.
///
/// ## Algorithm
///
/// 1. Seed both sides (either may arrive pre-expanded) and record every
///    meeting already visible between them
/// 2. Check the deadline, then expand the non-exhausted side with the
///    smaller frontier by one generation
/// 3. Record meetings involving the newly discovered people: shared
///    ancestors and, if enabled, partnerships across the two sides
/// 4. Halt once the best shared-ancestor distance is strictly below
///    `min(level) + 1` over the non-exhausted sides, or both are exhausted.
///    Bridges never halt the search, so blood kinship behind a partnership
///    is still found
/// 5. Drop partnership bridges whose endpoints are themselves common
///    ancestors within the blood distance, then return the shared ancestors
///    at the best distance together with any shorter or equal bridges
pub struct PathFinder<'g, G: FamilyGraph + ?Sized> {
    graph: &'g G,
    policy: &'g KinshipPolicyV1,
    bridges: bool,
}

#[derive(Default)]
struct Candidates {
    best: Option<u32>,
    ancestors: BTreeSet<PersonId>,
    bridges: BTreeSet<(u32, Apex)>,
}

impl Candidates {
    fn offer_ancestor(&mut self, distance: u32, person: PersonId) {
        match self.best {
            Some(best) if distance > best => {}
            Some(best) if distance == best => {
                self.ancestors.insert(person);
            }
            _ => {
                self.best = Some(distance);
                self.ancestors.clear();
                self.ancestors.insert(person);
            }
        }
    }

    fn offer_bridge(&mut self, distance: u32, apex: Apex) {
        self.bridges.insert((distance, apex));
    }
}

impl<'g, G: FamilyGraph + ?Sized> PathFinder<'g, G> {
    /// Create a finder over `graph`.
    pub fn new(graph: &'g G, policy: &'g KinshipPolicyV1) -> Self {
        Self {
            graph,
            policy,
            bridges: policy.include_partnerships,
        }
    }

    /// Search between two distinct people.
    pub fn between(&self, a: PersonId, b: PersonId, deadline: &Deadline) -> Result<Search<'static>, KinshipError> {
        self.search(
            Cow::Owned(AncestorMap::new(a)),
            Cow::Owned(AncestorMap::new(b)),
            deadline,
        )
    }

    /// Search between two (possibly pre-expanded) ancestor maps.
    pub fn search<'a>(
        &self,
        mut side_a: Cow<'a, AncestorMap>,
        mut side_b: Cow<'a, AncestorMap>,
        deadline: &Deadline,
    ) -> Result<Search<'a>, KinshipError> {
        let mut found = Candidates::default();
        self.scan_all(&side_a, &side_b, &mut found);

        loop {
            let lower_bound = [&side_a, &side_b]
                .iter()
                .filter(|s| !s.is_exhausted())
                .map(|s| s.level() + 1)
                .min();

            match (found.best, lower_bound) {
                (Some(best), Some(lb)) if best < lb => break,
                (_, None) => break,
                _ => {}
            }

            deadline.check()?;

            let expand_a = match (side_a.is_exhausted(), side_b.is_exhausted()) {
                (false, true) => true,
                (true, false) => false,
                _ => {
                    (side_a.frontier().len(), side_a.level())
                        <= (side_b.frontier().len(), side_b.level())
                }
            };

            if expand_a {
                let new = side_a.to_mut().expand(self.graph, self.policy.max_generations)?;
                self.scan_new(&new, &side_a, &side_b, false, &mut found);
            } else {
                let new = side_b.to_mut().expand(self.graph, self.policy.max_generations)?;
                self.scan_new(&new, &side_b, &side_a, true, &mut found);
            }
        }

        let blood = found.best;

        // A bridge never stands in for a shared ancestor.
        let is_common = |person: PersonId| match (side_a.distance(person), side_b.distance(person), blood) {
            (Some(da), Some(db), Some(best)) => da + db <= best,
            _ => false,
        };
        let bridges: Vec<(u32, Apex)> = found
            .bridges
            .into_iter()
            .filter(|(_, apex)| !is_common(apex.a_side()) && !is_common(apex.b_side()))
            .collect();
        let bridge_best = bridges
            .first()
            .map(|(distance, _)| *distance)
            .filter(|distance| blood.map_or(true, |best| *distance <= best));

        let Some(distance) = [blood, bridge_best].into_iter().flatten().min() else {
            tracing::debug!(
                a = %side_a.origin(),
                b = %side_b.origin(),
                levels = ?(side_a.level(), side_b.level()),
                "No common ancestor"
            );
            return Ok(Search::Unrelated);
        };

        let mut apexes: Vec<Apex> = found
            .ancestors
            .into_iter()
            .map(|person| Apex::Ancestor { person })
            .collect();
        let blood_apexes = apexes.len();
        if let Some(bridge_best) = bridge_best {
            apexes.extend(
                bridges
                    .into_iter()
                    .take_while(|(d, _)| *d == bridge_best)
                    .map(|(_, apex)| apex),
            );
        }

        tracing::debug!(
            a = %side_a.origin(),
            b = %side_b.origin(),
            distance,
            blood = ?blood,
            apexes = apexes.len(),
            bridged = apexes.len() - blood_apexes,
            "Lineages met"
        );

        Ok(Search::Met(Meeting {
            distance,
            apexes,
            side_a,
            side_b,
        }))
    }

    /// Record every meeting between two maps.
    fn scan_all(&self, a: &AncestorMap, b: &AncestorMap, found: &mut Candidates) {
        let mut people: Vec<PersonId> = a.visits.keys().copied().collect();
        people.sort();
        self.scan_new(&people, a, b, false, found);
    }

    /// Record meetings involving `new`, discovered on `this` side.
    ///
    /// `flipped` is true when `this` is B's side.
    fn scan_new(
        &self,
        new: &[PersonId],
        this: &AncestorMap,
        other: &AncestorMap,
        flipped: bool,
        found: &mut Candidates,
    ) {
        for &person in new {
            let Some(d_this) = this.distance(person) else {
                continue;
            };

            if let Some(d_other) = other.distance(person) {
                found.offer_ancestor(d_this + d_other, person);
            }

            if !self.bridges {
                continue;
            }
            for edge in self.graph.partners_of(person) {
                let Some(partner) = edge.other(person) else {
                    continue;
                };
                let Some(d_other) = other.distance(partner) else {
                    continue;
                };
                let (a_side, b_side) = if flipped {
                    (partner, person)
                } else {
                    (person, partner)
                };
                found.offer_bridge(
                    d_this + d_other,
                    Apex::Partnership {
                        a_side,
                        b_side,
                        edge: *edge,
                    },
                );
            }
        }
    }
}
