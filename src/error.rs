use std::sync::PoisonError;

use thiserror::Error;

use crate::monitor::State;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("a table needs at least one philosopher")]
    NoPhilosophers,

    #[error("philosopher {id} is out of range (table seats {total})")]
    InvalidIndex { id: usize, total: usize },

    #[error("philosopher {id} cannot go from {from} to {to}")]
    InvalidTransition { id: usize, from: State, to: State },

    #[error("monitor lock poisoned by a panicking philosopher")]
    Poisoned,
}

// 待機中に他スレッドが panic した場合。復帰手段はないので致命的エラーとして返す
impl<T> From<PoisonError<T>> for MonitorError {
    fn from(_: PoisonError<T>) -> Self {
        MonitorError::Poisoned
    }
}

#[derive(Debug, Error)]
pub enum DinnerError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("talk chance must be within [0, 1], got {0}")]
    InvalidTalkChance(f64),

    #[error("philosophers {left} and {right} are eating at the same time")]
    ExclusionViolated { left: usize, right: usize },

    #[error("philosopher {0} panicked")]
    PhilosopherPanicked(usize),

    #[error("table observer panicked")]
    ObserverPanicked,
}
