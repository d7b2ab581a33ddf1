use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::modules::grid::{Position, Step, WorldGrid};

/// How a robot turns "go to target" into a sequence of unit steps.
pub trait MoveStrategy: fmt::Debug + Send + Sync {
    /// Plan from `from` towards `to`; at most `max_steps` steps when non-zero.
    fn plan(
        &self,
        grid: &WorldGrid,
        from: Position,
        to: Position,
        max_steps: usize,
        rng: &mut StdRng,
    ) -> Vec<Step>;
}

/// A* that stops next to the target, so shelves and bays can be approached but not entered.
#[derive(Debug, Default, Clone, Copy)]
pub struct AStarStrategy;

impl MoveStrategy for AStarStrategy {
    fn plan(
        &self,
        grid: &WorldGrid,
        from: Position,
        to: Position,
        max_steps: usize,
        _rng: &mut StdRng,
    ) -> Vec<Step> {
        calculate_path(grid, from, to, max_steps, true)
    }
}

/// Random wiggling; ignores the target entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

impl MoveStrategy for RandomStrategy {
    fn plan(
        &self,
        _grid: &WorldGrid,
        _from: Position,
        _to: Position,
        max_steps: usize,
        rng: &mut StdRng,
    ) -> Vec<Step> {
        (0..max_steps.max(1))
            .map(|_| Step::ALL[rng.gen_range(0..Step::ALL.len())])
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Astar,
    Random,
}

impl StrategyKind {
    pub const fn label(self) -> &'static str {
        match self {
            StrategyKind::Astar => "astar",
            StrategyKind::Random => "random",
        }
    }

    pub fn build(self) -> Arc<dyn MoveStrategy> {
        match self {
            StrategyKind::Astar => Arc::new(AStarStrategy),
            StrategyKind::Random => Arc::new(RandomStrategy),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

struct Node {
    position: Position,
    parent: Option<usize>,
    g: i32,
}

/// A* over the 4-connected grid, returning unit deltas from `start`.
///
/// With `until_touch` the goal may be an obstacle and the search stops as soon as the goal
/// is a neighbour of the node being expanded; the returned path ends one cell short of it.
/// Without it the goal must be free and is reached exactly. An empty vector means there is
/// nothing to do or nothing to be found.
pub fn calculate_path(
    grid: &WorldGrid,
    start: Position,
    goal: Position,
    max_steps: usize,
    until_touch: bool,
) -> Vec<Step> {
    if start == goal || !grid.in_bounds(start) || !grid.in_bounds(goal) {
        return Vec::new();
    }
    if !until_touch && !grid.is_free(goal) {
        return Vec::new();
    }

    let mut nodes = vec![Node {
        position: start,
        parent: None,
        g: 0,
    }];
    let mut open = BinaryHeap::new();
    let mut g_costs: HashMap<Position, i32> = HashMap::from([(start, 0)]);
    let mut closed: HashSet<Position> = HashSet::new();
    let mut seq: u64 = 0;
    open.push(Reverse((start.manhattan(goal), seq, 0usize)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        let position = nodes[current].position;
        if closed.contains(&position) {
            continue;
        }
        if position == goal {
            return finish(&nodes, current, max_steps);
        }
        closed.insert(position);

        for step in Step::ALL {
            let neighbor = position.offset(step);
            if !grid.in_bounds(neighbor) {
                continue;
            }
            if until_touch && neighbor == goal {
                return finish(&nodes, current, max_steps);
            }
            if !grid.is_free(neighbor) || closed.contains(&neighbor) {
                continue;
            }

            let tentative = nodes[current].g + 1;
            if g_costs.get(&neighbor).is_some_and(|g| tentative >= *g) {
                continue;
            }
            g_costs.insert(neighbor, tentative);
            nodes.push(Node {
                position: neighbor,
                parent: Some(current),
                g: tentative,
            });
            seq += 1;
            open.push(Reverse((
                tentative + neighbor.manhattan(goal),
                seq,
                nodes.len() - 1,
            )));
        }
    }

    Vec::new()
}

fn finish(nodes: &[Node], last: usize, max_steps: usize) -> Vec<Step> {
    let mut trail = Vec::new();
    let mut cursor = Some(last);
    while let Some(idx) = cursor {
        trail.push(nodes[idx].position);
        cursor = nodes[idx].parent;
    }
    trail.reverse();

    let mut steps: Vec<Step> = trail
        .windows(2)
        .map(|pair| Step::between(pair[0], pair[1]))
        .collect();
    if max_steps > 0 {
        steps.truncate(max_steps);
    }
    steps
}
