use serde::{Deserialize, Serialize};

use crate::modules::allocator::Operation;

/// Running counters the engine reports into. Purely additive; never drives decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observer {
    pub n_tasks: u64,
    pub store_tasks: u64,
    pub pick_tasks: u64,
    pub n_blocked: u64,
    pub n_robots: u64,
    pub moves: u64,
}

impl Observer {
    pub fn new(n_robots: usize) -> Self {
        Self {
            n_robots: n_robots as u64,
            ..Self::default()
        }
    }

    pub fn count_task(&mut self, operation: Operation) {
        self.n_tasks = self.n_tasks.saturating_add(1);
        match operation {
            Operation::Store => self.store_tasks = self.store_tasks.saturating_add(1),
            Operation::Pick => self.pick_tasks = self.pick_tasks.saturating_add(1),
        }
    }

    pub fn count_move(&mut self) {
        self.moves = self.moves.saturating_add(1);
    }

    pub fn robot_blocked(&mut self) {
        self.n_blocked = self.n_blocked.saturating_add(1);
    }

    pub fn robot_unblocked(&mut self) {
        self.n_blocked = self.n_blocked.saturating_sub(1);
    }

    pub fn blocked_percentage(&self) -> f64 {
        if self.n_robots == 0 {
            return 0.0;
        }
        self.n_blocked as f64 * 100.0 / self.n_robots as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_are_split_by_operation() {
        let mut observer = Observer::new(4);
        observer.count_task(Operation::Store);
        observer.count_task(Operation::Pick);
        observer.count_task(Operation::Pick);
        assert_eq!(observer.n_tasks, 3);
        assert_eq!(observer.store_tasks, 1);
        assert_eq!(observer.pick_tasks, 2);
    }

    #[test]
    fn blocked_percentage_tracks_transitions() {
        let mut observer = Observer::new(4);
        observer.robot_blocked();
        assert_eq!(observer.blocked_percentage(), 25.0);
        observer.robot_blocked();
        observer.robot_unblocked();
        observer.robot_unblocked();
        observer.robot_unblocked();
        assert_eq!(observer.n_blocked, 0);
        assert_eq!(Observer::default().blocked_percentage(), 0.0);
    }
}
