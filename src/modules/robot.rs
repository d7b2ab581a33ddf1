use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::modules::allocator::TaskAllocator;
use crate::modules::error::SimError;
use crate::modules::grid::{CellCode, GridError, Position, Step, WorldGrid};
use crate::modules::inventory::{CellId, ProductId};
use crate::modules::planner::MoveStrategy;
use crate::modules::stats::Observer;
use crate::modules::world::{StoreKind, World};

pub type RobotId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotState {
    Idling,
    Moving,
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Idle,
    Reposition,
    Transfer,
}

impl TaskKind {
    pub const fn label(self) -> &'static str {
        match self {
            TaskKind::Idle => "idle",
            TaskKind::Reposition => "reposition",
            TaskKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for TaskKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(TaskKind::Idle),
            "reposition" => Ok(TaskKind::Reposition),
            "transfer" => Ok(TaskKind::Transfer),
            other => Err(SimError::Configuration(format!(
                "unknown task type '{}', use idle|reposition|transfer",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "lowercase")]
pub enum Action {
    Go { target: Position },
    Pick { target: Position, product: ProductId },
    Drop { target: Position, product: ProductId },
}

impl Action {
    pub const fn label(&self) -> &'static str {
        match self {
            Action::Go { .. } => "go",
            Action::Pick { .. } => "pick",
            Action::Drop { .. } => "drop",
        }
    }
}

#[derive(Debug)]
pub struct Robot {
    id: RobotId,
    name: String,
    strategy: Arc<dyn MoveStrategy>,
    plan_horizon: usize,
    position: Position,
    task: TaskKind,
    action_queue: VecDeque<Action>,
    current_action: Option<Action>,
    next_moves: VecDeque<Step>,
    state: RobotState,
    load: Option<ProductId>,
}

impl Robot {
    /// Drop a new robot onto a random empty cell.
    pub fn spawn(
        id: RobotId,
        name: impl Into<String>,
        strategy: Arc<dyn MoveStrategy>,
        plan_horizon: usize,
        world: &mut World,
    ) -> Result<Self, SimError> {
        let position = world.random_empty_position()?;
        Self::spawn_at(id, name, strategy, plan_horizon, position, &mut world.grid)
    }

    pub fn spawn_at(
        id: RobotId,
        name: impl Into<String>,
        strategy: Arc<dyn MoveStrategy>,
        plan_horizon: usize,
        position: Position,
        grid: &mut WorldGrid,
    ) -> Result<Self, SimError> {
        if !grid.is_free(position) {
            return Err(SimError::Configuration(format!(
                "cannot spawn a robot on occupied cell {}",
                position
            )));
        }
        grid.set_cell(position, CellCode::Robot)?;
        let robot = Self {
            id,
            name: name.into(),
            strategy,
            plan_horizon,
            position,
            task: TaskKind::Idle,
            action_queue: VecDeque::new(),
            current_action: None,
            next_moves: VecDeque::new(),
            state: RobotState::Idling,
            load: None,
        };
        debug!(robot = %robot.name, %position, "robot spawned");
        Ok(robot)
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn load(&self) -> Option<&ProductId> {
        self.load.as_ref()
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.current_action.as_ref()
    }

    pub fn queued_actions(&self) -> impl Iterator<Item = &Action> {
        self.action_queue.iter()
    }

    pub fn buffered_steps(&self) -> usize {
        self.next_moves.len()
    }

    pub fn is_busy(&self) -> bool {
        self.current_action.is_some() || !self.action_queue.is_empty()
    }

    /// Break a task into queued actions.
    pub fn assign_task(
        &mut self,
        kind: TaskKind,
        origin: Option<Position>,
        destination: Option<Position>,
        product: Option<ProductId>,
    ) -> Result<(), SimError> {
        let missing = |what: &str| {
            SimError::Configuration(format!("{} task must have {}", kind, what))
        };
        match kind {
            TaskKind::Idle => {
                info!(robot = %self.name, "asked to idle for a while");
            }
            TaskKind::Reposition => {
                let destination = destination.ok_or_else(|| missing("a destination"))?;
                info!(
                    robot = %self.name,
                    from = %self.position,
                    to = %destination,
                    "asked to reposition"
                );
                self.action_queue.push_back(Action::Go { target: destination });
            }
            TaskKind::Transfer => {
                let origin = origin.ok_or_else(|| missing("an origin"))?;
                let destination = destination.ok_or_else(|| missing("a destination"))?;
                let product = product.ok_or_else(|| missing("a product"))?;
                info!(
                    robot = %self.name,
                    %product,
                    from = %origin,
                    to = %destination,
                    "asked to transfer"
                );
                self.action_queue.extend([
                    Action::Go { target: origin },
                    Action::Pick {
                        target: origin,
                        product: product.clone(),
                    },
                    Action::Go {
                        target: destination,
                    },
                    Action::Drop {
                        target: destination,
                        product,
                    },
                ]);
            }
        }
        self.task = kind;
        Ok(())
    }

    /// One simulation step for this robot.
    pub fn act(
        &mut self,
        world: &mut World,
        allocator: &mut TaskAllocator,
        observer: &mut Observer,
    ) -> Result<(), SimError> {
        let action = match self.current_action.take() {
            Some(action) => action,
            None => match self.action_queue.pop_front() {
                Some(action) => action,
                None => {
                    self.task = TaskKind::Idle;
                    self.set_state(RobotState::Idling, &mut world.grid, observer)?;
                    allocator.process_idle(self, world, observer)?;
                    return Ok(());
                }
            },
        };

        match action {
            Action::Go { target } => {
                if self.position.manhattan(target) <= 1 {
                    debug!(robot = %self.name, %target, "arrived");
                    self.next_moves.clear();
                    return Ok(());
                }
                self.current_action = Some(Action::Go { target });
                self.move_towards(target, world, observer)?;
            }
            Action::Pick { product, .. } => {
                let (kind, cell_id) = self.reach(world)?;
                info!(robot = %self.name, %product, store = %kind, cell_id, "picking");
                world.remove_product(kind, cell_id, &product)?;
                self.load = Some(product);
            }
            Action::Drop { product, .. } => {
                let (kind, cell_id) = self.reach(world)?;
                info!(robot = %self.name, %product, store = %kind, cell_id, "storing");
                world.place_at(kind, cell_id, product)?;
                self.load = None;
            }
        }
        Ok(())
    }

    fn reach(&self, world: &World) -> Result<(StoreKind, CellId), SimError> {
        world
            .scan_adjacent(self.position)
            .ok_or_else(|| SimError::Unreachable {
                robot: self.name.clone(),
                position: self.position,
            })
    }

    /// A single one-cell move towards `target`, planning first if the step buffer is empty.
    ///
    /// A blocked step leaves the rest of the buffer in place; only an exhausted buffer
    /// triggers a new plan.
    fn move_towards(
        &mut self,
        target: Position,
        world: &mut World,
        observer: &mut Observer,
    ) -> Result<(), SimError> {
        if self.next_moves.is_empty() {
            debug!(robot = %self.name, at = %self.position, %target, "planning path");
            let World { grid, rng, .. } = world;
            self.next_moves = self
                .strategy
                .plan(grid, self.position, target, self.plan_horizon, rng)
                .into();
        }

        let Some(step) = self.next_moves.pop_front() else {
            self.set_state(RobotState::Blocked, &mut world.grid, observer)?;
            return Ok(());
        };

        let candidate = self.position.offset(step);
        if world.grid.is_free(candidate) {
            world.grid.set_cell(self.position, CellCode::Empty)?;
            self.position = candidate;
            observer.count_move();
            self.set_state(RobotState::Moving, &mut world.grid, observer)?;
        } else {
            self.set_state(RobotState::Blocked, &mut world.grid, observer)?;
        }
        Ok(())
    }

    /// Repaint the robot's cell and report Blocked transitions to the observer.
    fn set_state(
        &mut self,
        state: RobotState,
        grid: &mut WorldGrid,
        observer: &mut Observer,
    ) -> Result<(), GridError> {
        if state == RobotState::Blocked {
            grid.set_cell(self.position, CellCode::Confused)?;
            if self.state != RobotState::Blocked {
                observer.robot_blocked();
            }
        } else {
            grid.set_cell(self.position, CellCode::Robot)?;
            if self.state == RobotState::Blocked {
                observer.robot_unblocked();
            }
        }
        self.state = state;
        Ok(())
    }
}
