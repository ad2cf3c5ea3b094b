use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use log::{debug, error, trace, warn};

use crate::error::MonitorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Thinking,
    Hungry,
    Eating,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Thinking => "thinking",
            State::Hungry => "hungry",
            State::Eating => "eating",
        };
        f.write_str(s)
    }
}

// 食卓の状態。Monitor のロック越しにしか触らない
#[derive(Debug)]
struct Table {
    // 哲学者ごとの状態
    status: Vec<State>,
    // 誰も話していなければ true
    talk_available: bool,
}

impl Table {
    fn new(total: usize) -> Self {
        Table {
            status: vec![State::Thinking; total],
            talk_available: true,
        }
    }

    fn total(&self) -> usize {
        self.status.len()
    }

    fn left(&self, i: usize) -> usize {
        (i + self.total() - 1) % self.total()
    }

    fn right(&self, i: usize) -> usize {
        (i + 1) % self.total()
    }

    fn check_id(&self, id: usize) -> Result<(), MonitorError> {
        if id < self.total() {
            Ok(())
        } else {
            Err(MonitorError::InvalidIndex {
                id,
                total: self.total(),
            })
        }
    }

    // 空腹で、両隣が食事中でなければ食事中に昇格させる
    // 昇格したら true
    fn test(&mut self, i: usize) -> bool {
        if self.status[i] == State::Hungry
            && self.status[self.left(i)] != State::Eating
            && self.status[self.right(i)] != State::Eating
        {
            self.status[i] = State::Eating;
            trace!("philosopher {i}: admitted");
            true
        } else {
            false
        }
    }

    // THINKING -> HUNGRY に遷移し、そのまま食事できるか試す
    fn hungry(&mut self, id: usize) -> Result<bool, MonitorError> {
        self.check_id(id)?;
        let from = self.status[id];
        if from != State::Thinking {
            return Err(MonitorError::InvalidTransition {
                id,
                from,
                to: State::Hungry,
            });
        }

        self.status[id] = State::Hungry;
        Ok(self.test(id))
    }

    // EATING -> THINKING に遷移し、左、右の順に隣人を再評価する
    // どちらかが昇格したら true
    fn release(&mut self, id: usize) -> Result<bool, MonitorError> {
        self.check_id(id)?;
        let from = self.status[id];
        if from != State::Eating {
            return Err(MonitorError::InvalidTransition {
                id,
                from,
                to: State::Thinking,
            });
        }

        self.status[id] = State::Thinking;
        let left = self.test(self.left(id));
        let right = self.test(self.right(id));
        Ok(left || right)
    }
}

/// Returns the first pair of neighbours that are both eating, if any.
pub fn find_adjacent_eaters(states: &[State]) -> Option<(usize, usize)> {
    let total = states.len();
    (0..total)
        .map(|i| (i, (i + 1) % total))
        .filter(|(i, j)| i != j)
        .find(|&(i, j)| states[i] == State::Eating && states[j] == State::Eating)
}

/// Monitor for the dining philosophers.
///
/// One mutex guards the status table and the talk gate. Waiters park on a
/// condition variable and re-check their own predicate after every broadcast,
/// so spurious wakeups are harmless. Waits cannot be cancelled: once a
/// philosopher calls `pick_up` or `request_talk` it returns only after being
/// admitted, or with `MonitorError::Poisoned` if another thread panicked while
/// holding the lock.
#[derive(Clone)]
pub struct Monitor {
    total: usize,
    table: Arc<Mutex<Table>>,
    eat_cond: Arc<Condvar>,  // 食事待ち
    talk_cond: Arc<Condvar>, // 発言待ち
}

impl Monitor {
    pub fn new(total: usize) -> Result<Self, MonitorError> {
        if total == 0 {
            return Err(MonitorError::NoPhilosophers);
        }

        debug!("monitor seats {total} philosophers");
        Ok(Monitor {
            total,
            table: Arc::new(Mutex::new(Table::new(total))),
            eat_cond: Arc::new(Condvar::new()),
            talk_cond: Arc::new(Condvar::new()),
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Blocks until philosopher `id` may eat.
    pub fn pick_up(&self, id: usize) -> Result<(), MonitorError> {
        let mut table = self.table.lock()?;
        debug!("philosopher {id}: hungry");
        if table.hungry(id)? {
            self.eat_cond.notify_all();
        }

        while table.status[id] != State::Eating {
            table = self.eat_cond.wait(table)?;
        }
        debug!("philosopher {id}: eating");
        Ok(())
    }

    /// Puts both chopsticks down and lets the neighbours try again.
    pub fn put_down(&self, id: usize) -> Result<(), MonitorError> {
        let mut table = self.table.lock()?;
        if table.release(id)? {
            self.eat_cond.notify_all();
        }
        debug!("philosopher {id}: thinking");
        Ok(())
    }

    /// Blocks until the talk privilege is free, then takes it.
    pub fn request_talk(&self) -> Result<(), MonitorError> {
        let mut table = self.table.lock()?;
        while !table.talk_available {
            table = self.talk_cond.wait(table)?;
        }
        table.talk_available = false;
        Ok(())
    }

    /// Releases the talk privilege. The caller is trusted to hold it.
    pub fn end_talk(&self) -> Result<(), MonitorError> {
        let mut table = self.table.lock()?;
        if table.talk_available {
            warn!("end_talk called while nobody holds the talk privilege");
        }
        table.talk_available = true;
        self.talk_cond.notify_all();
        Ok(())
    }

    /// `pick_up` that puts the chopsticks down again when the guard drops.
    pub fn eat(&self, id: usize) -> Result<EatGuard<'_>, MonitorError> {
        self.pick_up(id)?;
        Ok(EatGuard { monitor: self, id })
    }

    /// `request_talk` that ends the talk when the guard drops.
    pub fn talk(&self) -> Result<TalkGuard<'_>, MonitorError> {
        self.request_talk()?;
        Ok(TalkGuard { monitor: self })
    }

    pub fn state(&self, id: usize) -> Result<State, MonitorError> {
        let table = self.table.lock()?;
        table.check_id(id)?;
        Ok(table.status[id])
    }

    pub fn snapshot(&self) -> Result<Vec<State>, MonitorError> {
        Ok(self.table.lock()?.status.clone())
    }

    pub fn talk_available(&self) -> Result<bool, MonitorError> {
        Ok(self.table.lock()?.talk_available)
    }
}

pub struct EatGuard<'a> {
    monitor: &'a Monitor,
    id: usize,
}

impl<'a> EatGuard<'a> {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl<'a> Drop for EatGuard<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.monitor.put_down(self.id) {
            error!("philosopher {}: put_down on drop failed: {e}", self.id);
        }
    }
}

pub struct TalkGuard<'a> {
    monitor: &'a Monitor,
}

impl<'a> Drop for TalkGuard<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.monitor.end_talk() {
            error!("end_talk on drop failed: {e}");
        }
    }
}
