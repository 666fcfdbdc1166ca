//! Configuration search: the cheapest set of upgrades that makes every item
//! type feasible.
//!
//! A search state is an [`ItemLevel`] plus a [`Configuration`] and the cost
//! paid so far. States start at the most advanced item and walk towards the
//! most basic one: a feasible item steps down a level for free, an
//! infeasible one branches into one upgrade per saturated producer or line.
//! The search is uniform-cost, so the first [`ItemLevel::Done`] state taken
//! off the frontier is optimal.
//!
//! # Equivalence
//!
//! At level `T` only item types `<= T` remain to be checked, so two states
//! are merged when they agree on every facility involved in some item
//! `<= T` and every line carrying such an item. Everything else can only
//! affect item types that are already feasible and stay so.

use crate::catalog::Catalog;
use crate::configuration::{Configuration, ConfigurationError};
use crate::fixed::Fixed64;
use crate::flow::{FlowSnapshot, SolverError};
use crate::id::*;
use crate::network::Network;
use crate::validation::{ConsistencyError, verify_validated_levels};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Search limits and checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Stop after expanding this many states.
    pub max_expansions: Option<usize>,
    /// Stop once this much wall-clock time has passed.
    pub time_budget: Option<Duration>,
    /// Re-check every already-validated item before expanding a state.
    pub verify_validated_levels: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error("cumulative cost {cost} plus {increment} exceeds the representable range")]
    CostOverflow { cost: Fixed64, increment: Fixed64 },
}

// ---------------------------------------------------------------------------
// States and results
// ---------------------------------------------------------------------------

/// One node of the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub level: ItemLevel,
    pub configuration: Configuration,
    pub cost: Fixed64,
}

/// A single level increment applied on the way to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeAction {
    Facility {
        id: FacilityId,
        to_level: u32,
        cost: Fixed64,
    },
    Line {
        id: LineId,
        to_level: u32,
        cost: Fixed64,
    },
}

impl UpgradeAction {
    pub fn cost(&self) -> Fixed64 {
        match *self {
            UpgradeAction::Facility { cost, .. } | UpgradeAction::Line { cost, .. } => cost,
        }
    }
}

/// Counters collected during one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// States taken off the frontier and expanded.
    pub expanded: usize,
    /// Successors produced by expansions.
    pub generated: usize,
    /// Successors discarded because an equivalent state was at least as cheap.
    pub pruned: usize,
    /// Flow graph evaluations.
    pub evaluations: usize,
}

/// The cheapest upgrade plan found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub configuration: Configuration,
    pub total_cost: Fixed64,
    /// Upgrades in the order the search applied them.
    pub actions: Vec<UpgradeAction>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanOutcome {
    Found(Plan),
    /// The frontier emptied without reaching `Done`.
    Infeasible { stats: SearchStats },
    /// A budget ran out first. No plan costs less than `lower_bound`;
    /// `frontier_best` is the expanded state closest to `Done`.
    BudgetExhausted {
        lower_bound: Fixed64,
        frontier_best: Option<SearchState>,
        stats: SearchStats,
    },
}

impl PlanOutcome {
    /// Cost of the plan, or `-1` when none was found.
    pub fn total_cost(&self) -> Fixed64 {
        match self {
            PlanOutcome::Found(plan) => plan.total_cost,
            _ => Fixed64::from_num(-1),
        }
    }

    pub fn plan(&self) -> Option<&Plan> {
        match self {
            PlanOutcome::Found(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn stats(&self) -> SearchStats {
        match self {
            PlanOutcome::Found(plan) => plan.stats,
            PlanOutcome::Infeasible { stats } | PlanOutcome::BudgetExhausted { stats, .. } => {
                *stats
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Equivalence keys
// ---------------------------------------------------------------------------

/// Which facilities and lines matter at one item level.
#[derive(Debug, Clone)]
struct LevelMask {
    facilities: Vec<usize>,
    lines: Vec<usize>,
}

impl LevelMask {
    fn for_item(catalog: &Catalog, item: ItemTypeId) -> Self {
        let facilities = catalog
            .facilities()
            .filter(|(_, f)| f.most_basic_item().is_some_and(|basic| basic <= item))
            .map(|(id, _)| id.index())
            .collect();
        let lines = catalog
            .lines()
            .filter(|(_, l)| l.item <= item)
            .map(|(id, _)| id.index())
            .collect();
        Self { facilities, lines }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    level: ItemLevel,
    facility_levels: Vec<u32>,
    line_levels: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

fn add_cost(cost: Fixed64, increment: Fixed64) -> Result<Fixed64, SearchError> {
    cost.checked_add(increment)
        .ok_or(SearchError::CostOverflow { cost, increment })
}

struct Successor {
    state: SearchState,
    action: Option<UpgradeAction>,
}

struct ArenaEntry {
    state: SearchState,
    parent: Option<usize>,
    action: Option<UpgradeAction>,
}

/// Uniform-cost search over configurations of one [`Network`].
pub struct Planner<'a> {
    network: &'a Network,
    config: SearchConfig,
    masks: Vec<LevelMask>,
}

impl<'a> Planner<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_config(network, SearchConfig::default())
    }

    pub fn with_config(network: &'a Network, config: SearchConfig) -> Self {
        let catalog = network.catalog();
        let masks = catalog
            .item_ids()
            .map(|item| LevelMask::for_item(catalog, item))
            .collect();
        Self {
            network,
            config,
            masks,
        }
    }

    pub fn network(&self) -> &Network {
        self.network
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn key(&self, state: &SearchState) -> StateKey {
        let (facility_levels, line_levels) = match state.level {
            ItemLevel::Done => (Vec::new(), Vec::new()),
            ItemLevel::Item(item) => match self.masks.get(item.index()) {
                Some(mask) => (
                    mask.facilities
                        .iter()
                        .map(|&i| state.configuration.facility_levels[i])
                        .collect(),
                    mask.lines
                        .iter()
                        .map(|&i| state.configuration.line_levels[i])
                        .collect(),
                ),
                None => (
                    state.configuration.facility_levels.clone(),
                    state.configuration.line_levels.clone(),
                ),
            },
        };
        StateKey {
            level: state.level,
            facility_levels,
            line_levels,
        }
    }

    /// True when the two states are interchangeable for the rest of the
    /// search. Costs are ignored.
    pub fn equivalent(&self, a: &SearchState, b: &SearchState) -> bool {
        self.key(a) == self.key(b)
    }

    /// Check that every item more refined than the state's level is still
    /// feasible.
    pub fn verify_validated_levels(&self, state: &SearchState) -> Result<(), ConsistencyError> {
        verify_validated_levels(self.network, state.level, &state.configuration)
    }

    /// Search from `initial` for the cheapest configuration feasible at
    /// every item type.
    pub fn plan(&self, initial: &Configuration) -> Result<PlanOutcome, SearchError> {
        let top = self.network.catalog().most_advanced_item();
        self.plan_from(ItemLevel::Item(top), initial)
    }

    /// Search from `initial`, treating item types above `level` as already
    /// validated.
    pub fn plan_from(
        &self,
        level: ItemLevel,
        initial: &Configuration,
    ) -> Result<PlanOutcome, SearchError> {
        let catalog = self.network.catalog();
        initial.validate(catalog)?;
        if let Some(item) = level.item() {
            if item.index() >= catalog.item_count() {
                return Err(SolverError::UnknownItem(item).into());
            }
        }

        let start = Instant::now();
        let mut stats = SearchStats::default();
        let mut arena: Vec<ArenaEntry> = Vec::new();
        let mut open: BinaryHeap<Reverse<(Fixed64, usize)>> = BinaryHeap::new();
        let mut best: HashMap<StateKey, (Fixed64, usize)> = HashMap::new();
        let mut closed: HashSet<StateKey> = HashSet::new();
        let mut frontier_best: Option<usize> = None;

        let root = SearchState {
            level,
            configuration: initial.clone(),
            cost: Fixed64::ZERO,
        };
        best.insert(self.key(&root), (root.cost, 0));
        open.push(Reverse((root.cost, 0)));
        arena.push(ArenaEntry {
            state: root,
            parent: None,
            action: None,
        });

        while let Some(&Reverse((lower_bound, _))) = open.peek() {
            if self.budget_exhausted(&stats, start) {
                info!(
                    expanded = stats.expanded,
                    lower_bound = %lower_bound,
                    "search budget exhausted"
                );
                return Ok(PlanOutcome::BudgetExhausted {
                    lower_bound,
                    frontier_best: frontier_best.map(|i| arena[i].state.clone()),
                    stats,
                });
            }
            let Some(Reverse((cost, idx))) = open.pop() else {
                break;
            };

            let key = self.key(&arena[idx].state);
            if closed.contains(&key) || best.get(&key).is_some_and(|&(_, i)| i != idx) {
                continue;
            }
            closed.insert(key);

            let state = &arena[idx].state;
            if state.level.is_done() {
                let plan = self.reconstruct(&arena, idx, stats);
                info!(
                    cost = %plan.total_cost,
                    upgrades = plan.actions.len(),
                    expanded = stats.expanded,
                    pruned = stats.pruned,
                    "plan found"
                );
                return Ok(PlanOutcome::Found(plan));
            }

            if self.config.verify_validated_levels {
                self.verify_validated_levels(state)?;
            }

            if frontier_best.is_none_or(|b| state.level < arena[b].state.level) {
                frontier_best = Some(idx);
            }

            let successors = self.successors(state, &mut stats)?;
            stats.expanded += 1;
            trace!(
                level = ?state.level,
                cost = %cost,
                successors = successors.len(),
                "expanded state"
            );

            for succ in successors {
                stats.generated += 1;
                let key = self.key(&succ.state);
                if closed.contains(&key)
                    || best.get(&key).is_some_and(|&(c, _)| c <= succ.state.cost)
                {
                    stats.pruned += 1;
                    continue;
                }
                let child = arena.len();
                best.insert(key, (succ.state.cost, child));
                open.push(Reverse((succ.state.cost, child)));
                arena.push(ArenaEntry {
                    state: succ.state,
                    parent: Some(idx),
                    action: succ.action,
                });
            }
        }

        debug!(expanded = stats.expanded, "search space exhausted without a plan");
        Ok(PlanOutcome::Infeasible { stats })
    }

    fn budget_exhausted(&self, stats: &SearchStats, start: Instant) -> bool {
        self.config
            .max_expansions
            .is_some_and(|max| stats.expanded >= max)
            || self
                .config
                .time_budget
                .is_some_and(|budget| start.elapsed() >= budget)
    }

    /// Transitions out of a state that is not `Done`.
    fn successors(
        &self,
        state: &SearchState,
        stats: &mut SearchStats,
    ) -> Result<Vec<Successor>, SearchError> {
        let Some(item) = state.level.item() else {
            return Ok(Vec::new());
        };
        let snapshot = self.network.evaluate(item, &state.configuration)?;
        stats.evaluations += 1;

        if snapshot.feasible {
            return Ok(vec![Successor {
                state: SearchState {
                    level: state.level.next_basic(),
                    configuration: state.configuration.clone(),
                    cost: state.cost,
                },
                action: None,
            }]);
        }
        self.upgrades(state, &snapshot)
    }

    /// One successor per saturated producer or line with a next level.
    fn upgrades(
        &self,
        state: &SearchState,
        snapshot: &FlowSnapshot,
    ) -> Result<Vec<Successor>, SearchError> {
        let catalog = self.network.catalog();
        let conf = &state.configuration;
        let mut out = Vec::new();

        for id in snapshot.saturated_producers() {
            let to_level = conf.facility_level(id) + 1;
            let Some(next) = catalog
                .facility(id)
                .and_then(|f| f.levels.get(to_level as usize))
            else {
                continue;
            };
            let mut configuration = conf.clone();
            configuration.upgrade_facility(id);
            out.push(Successor {
                state: SearchState {
                    level: state.level,
                    configuration,
                    cost: add_cost(state.cost, next.incremental_cost)?,
                },
                action: Some(UpgradeAction::Facility {
                    id,
                    to_level,
                    cost: next.incremental_cost,
                }),
            });
        }

        for id in snapshot.saturated_lines() {
            let to_level = conf.line_level(id) + 1;
            let Some(next) = catalog.line(id).and_then(|l| l.levels.get(to_level as usize)) else {
                continue;
            };
            let mut configuration = conf.clone();
            configuration.upgrade_line(id);
            out.push(Successor {
                state: SearchState {
                    level: state.level,
                    configuration,
                    cost: add_cost(state.cost, next.incremental_cost)?,
                },
                action: Some(UpgradeAction::Line {
                    id,
                    to_level,
                    cost: next.incremental_cost,
                }),
            });
        }
        Ok(out)
    }

    fn reconstruct(&self, arena: &[ArenaEntry], goal: usize, stats: SearchStats) -> Plan {
        let mut actions = Vec::new();
        let mut cursor = Some(goal);
        while let Some(idx) = cursor {
            let entry = &arena[idx];
            actions.extend(entry.action);
            cursor = entry.parent;
        }
        actions.reverse();
        let state = &arena[goal].state;
        Plan {
            configuration: state.configuration.clone(),
            total_cost: state.cost,
            actions,
            stats,
        }
    }
}
