use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use libc::{SIGINT, SIGTERM};
use log::info;
use signal_hook::iterator::Signals;

use philosophers::{dine, DinnerConfig};

#[derive(Parser)]
#[command(author, version, about = "Dining philosophers around a monitor", long_about = None)]
struct Cli {
    /// Number of philosophers seated at the table
    #[arg(short = 'n', long, default_value_t = 4)]
    philosophers: usize,

    /// Meals each philosopher eats before leaving (0 = until interrupted)
    #[arg(short, long, default_value_t = 10)]
    meals: usize,

    /// Upper bound of each random think/eat/talk pause in milliseconds
    #[arg(long, default_value_t = 100)]
    max_delay_ms: u64,

    /// Probability that a philosopher talks after a meal
    #[arg(long, default_value_t = 0.5)]
    talk_chance: f64,
}

impl From<Cli> for DinnerConfig {
    fn from(cli: Cli) -> Self {
        DinnerConfig {
            philosophers: cli.philosophers,
            meals: cli.meals,
            max_delay: Duration::from_millis(cli.max_delay_ms),
            talk_chance: cli.talk_chance,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = DinnerConfig::from(Cli::parse());
    config.validate()?;

    // シグナルを受けたら、今の一巡を終えたところで全員席を立つ
    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let flag = stop.clone();
    thread::spawn(move || {
        for sig in signals.forever() {
            info!("received signal {sig}, finishing current meals");
            flag.store(true, Ordering::Relaxed);
        }
    });

    println!(
        "{} philosophers sit down ({} meals each)",
        config.philosophers,
        if config.meals == 0 {
            "unlimited".to_string()
        } else {
            config.meals.to_string()
        }
    );

    let report = dine(&config, stop)?;

    for (id, (meals, talks)) in report.meals.iter().zip(&report.talks).enumerate() {
        println!("philosopher {id}: {meals} meals, {talks} talks");
    }
    println!(
        "total: {} meals, {} talks, {} table checks",
        report.total_meals(),
        report.total_talks(),
        report.samples
    );
    Ok(())
}
