use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};
use rand::Rng;

use crate::error::{DinnerError, MonitorError};
use crate::monitor::{find_adjacent_eaters, Monitor};

// 観測者のサンプリング間隔
const OBSERVE_INTERVAL: Duration = Duration::from_micros(100);

#[derive(Debug, Clone)]
pub struct DinnerConfig {
    pub philosophers: usize,
    /// Meals per philosopher. Zero keeps everyone eating until stopped.
    pub meals: usize,
    /// Upper bound of every think, eat and talk pause.
    pub max_delay: Duration,
    /// Probability of talking after a meal.
    pub talk_chance: f64,
}

impl Default for DinnerConfig {
    fn default() -> Self {
        DinnerConfig {
            philosophers: 4,
            meals: 10,
            max_delay: Duration::from_millis(100),
            talk_chance: 0.5,
        }
    }
}

impl DinnerConfig {
    pub fn validate(&self) -> Result<(), DinnerError> {
        if self.philosophers == 0 {
            return Err(MonitorError::NoPhilosophers.into());
        }
        if !(0.0..=1.0).contains(&self.talk_chance) {
            return Err(DinnerError::InvalidTalkChance(self.talk_chance));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DinnerReport {
    /// Meals eaten, indexed by philosopher.
    pub meals: Vec<usize>,
    /// Talks given, indexed by philosopher.
    pub talks: Vec<usize>,
    /// Table snapshots the observer checked.
    pub samples: usize,
}

impl DinnerReport {
    pub fn total_meals(&self) -> usize {
        self.meals.iter().sum()
    }

    pub fn total_talks(&self) -> usize {
        self.talks.iter().sum()
    }
}

pub struct Philosopher {
    id: usize,
    monitor: Monitor,
    config: DinnerConfig,
    stop: Arc<AtomicBool>,
}

impl Philosopher {
    pub fn new(id: usize, monitor: Monitor, config: DinnerConfig, stop: Arc<AtomicBool>) -> Self {
        Philosopher {
            id,
            monitor,
            config,
            stop,
        }
    }

    // 考える -> 箸を取る -> 食べる -> 箸を置く -> (たまに) 話す、を繰り返す
    // 食べた回数と話した回数を返す
    pub fn run(&self) -> Result<(usize, usize), DinnerError> {
        let mut rng = rand::thread_rng();
        let mut meals = 0;
        let mut talks = 0;

        while !self.stop.load(Ordering::Relaxed)
            && (self.config.meals == 0 || meals < self.config.meals)
        {
            self.pause(&mut rng);

            {
                let _meal = self.monitor.eat(self.id)?;
                info!("philosopher {}: eating meal {}", self.id, meals + 1);
                self.pause(&mut rng);
            }
            meals += 1;

            if rng.gen_bool(self.config.talk_chance) {
                let _talk = self.monitor.talk()?;
                info!("philosopher {}: talking", self.id);
                self.pause(&mut rng);
                talks += 1;
            }

            thread::yield_now();
        }

        info!(
            "philosopher {}: leaving after {meals} meals and {talks} talks",
            self.id
        );
        Ok((meals, talks))
    }

    fn pause(&self, rng: &mut impl Rng) {
        let max = self.config.max_delay.as_millis() as u64;
        if max > 0 {
            thread::sleep(Duration::from_millis(rng.gen_range(0..=max)));
        }
    }
}

// panic で巻き戻るときに stop を立てる
struct StopOnPanic<'a>(&'a AtomicBool);

impl<'a> Drop for StopOnPanic<'a> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

// f がエラーを返しても panic しても stop を立て、残りの哲学者を席から立たせる
fn stop_on_failure<T>(
    stop: &AtomicBool,
    f: impl FnOnce() -> Result<T, DinnerError>,
) -> Result<T, DinnerError> {
    let _guard = StopOnPanic(stop);
    let result = f();
    if result.is_err() {
        stop.store(true, Ordering::Relaxed);
    }
    result
}

// 食卓を定期的に覗いて、隣同士が同時に食べていないか確認する
fn observe(monitor: &Monitor, done: &AtomicBool) -> Result<usize, DinnerError> {
    let mut samples = 0;
    while !done.load(Ordering::Relaxed) {
        let states = monitor.snapshot()?;
        if let Some((left, right)) = find_adjacent_eaters(&states) {
            error!("inconsistent table: {states:?}");
            return Err(DinnerError::ExclusionViolated { left, right });
        }
        samples += 1;
        thread::sleep(OBSERVE_INTERVAL);
    }
    Ok(samples)
}

/// Seats `config.philosophers` philosophers around one monitor, one thread
/// each, and waits until all of them leave.
///
/// Setting `stop` makes every philosopher leave after the cycle it is in.
/// A philosopher or the observer that fails or panics sets `stop` too, so the
/// rest of the table drains even when meals are unlimited.
pub fn dine(config: &DinnerConfig, stop: Arc<AtomicBool>) -> Result<DinnerReport, DinnerError> {
    config.validate()?;
    let monitor = Monitor::new(config.philosophers)?;
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let monitor = monitor.clone();
        let done = done.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            stop_on_failure(&stop, || {
                observe(&monitor, &done).inspect_err(|e| error!("observer: {e}"))
            })
        })
    };

    let mut v = Vec::new();
    for id in 0..config.philosophers {
        let philosopher = Philosopher::new(id, monitor.clone(), config.clone(), stop.clone());
        let stop = stop.clone();
        v.push(thread::spawn(move || {
            stop_on_failure(&stop, || {
                philosopher
                    .run()
                    .inspect_err(|e| error!("philosopher {id}: {e}"))
            })
        }));
    }

    let mut meals = vec![0; config.philosophers];
    let mut talks = vec![0; config.philosophers];
    let mut failure = None;
    for (id, t) in v.into_iter().enumerate() {
        match t.join() {
            Ok(Ok((m, n))) => {
                meals[id] = m;
                talks[id] = n;
            }
            Ok(Err(e)) => {
                failure.get_or_insert(e);
            }
            Err(_) => {
                failure.get_or_insert(DinnerError::PhilosopherPanicked(id));
            }
        }
    }

    done.store(true, Ordering::Relaxed);
    let samples = match observer.join() {
        Ok(result) => result?,
        Err(_) => return Err(DinnerError::ObserverPanicked),
    };

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(DinnerReport {
        meals,
        talks,
        samples,
    })
}
