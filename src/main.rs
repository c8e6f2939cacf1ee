/*!
 * procsim - Checkout Line Demo
 *
 * Supermarket model driven by the process engine:
 * - customers take a cart, sometimes visit the deli counter, shop,
 *   then queue at the shortest of five checkouts
 * - arrivals are exponentially distributed
 * - a JSON summary is printed at the end
 *
 * Configuration comes from the JSON file named by PROCSIM_CONFIG, or from
 * PROCSIM_* environment variables. PROCSIM_SEED fixes the random stream.
 */

use anyhow::Context;
use procsim::{init_tracing, DispatchStats, EngineConfig, Facility, Process, SimResult, Simulation, Store};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Uniform};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

const CHECKOUTS: usize = 5;
const HORIZON: f64 = 1000.0;
const DEFAULT_SEED: u64 = 42;

type Rand = Rc<RefCell<StdRng>>;

/// Variates drawn by the model
struct Variates {
    interarrival: Exp<f64>,
    deli_service: Exp<f64>,
    checkout_service: Exp<f64>,
    shopping: Uniform<f64>,
    coin: Uniform<f64>,
}

fn exp_with_mean(mean: f64) -> anyhow::Result<Exp<f64>> {
    Exp::new(1.0 / mean).map_err(|e| anyhow::anyhow!("exponential with mean {}: {}", mean, e))
}

impl Variates {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            interarrival: exp_with_mean(8.0)?,
            deli_service: exp_with_mean(2.0)?,
            checkout_service: exp_with_mean(3.0)?,
            shopping: Uniform::new(10.0, 15.0),
            coin: Uniform::new(0.0, 1.0),
        })
    }
}

/// Shared state of the model
#[derive(Clone)]
struct Market {
    checkouts: Rc<Vec<Facility>>,
    deli: Store,
    carts: Store,
    rng: Rand,
    variates: Rc<Variates>,
    times: Rc<RefCell<Vec<f64>>>,
}

impl Market {
    fn new(seed: u64) -> anyhow::Result<Self> {
        Ok(Self {
            checkouts: Rc::new(
                (0..CHECKOUTS)
                    .map(|i| Facility::new(format!("checkout-{}", i)))
                    .collect(),
            ),
            deli: Store::new("deli", 2),
            carts: Store::new("carts", 50),
            rng: Rc::new(RefCell::new(StdRng::seed_from_u64(seed))),
            variates: Rc::new(Variates::new()?),
            times: Rc::new(RefCell::new(Vec::new())),
        })
    }

    fn draw<D: Distribution<f64>>(&self, dist: &D) -> f64 {
        dist.sample(&mut *self.rng.borrow_mut())
    }

    fn shortest_checkout(&self) -> &Facility {
        let mut best = &self.checkouts[0];
        for checkout in self.checkouts.iter().skip(1) {
            if checkout.queue().len() < best.queue().len() {
                best = checkout;
            }
        }
        best
    }
}

fn customer(market: Market, me: &Process) -> SimResult<()> {
    let arrival = me.now()?;
    me.enter(&market.carts, 1)?;
    let v = &market.variates;
    if market.draw(&v.coin) < 0.3 {
        me.enter(&market.deli, 1)?;
        me.wait(market.draw(&v.deli_service))?;
        me.leave(&market.deli, 1)?;
    }
    me.wait(market.draw(&v.shopping))?;

    let checkout = market.shortest_checkout().clone();
    me.seize(&checkout, 0)?;
    me.wait(market.draw(&v.checkout_service))?;
    me.release(&checkout)?;
    me.leave(&market.carts, 1)?;

    let total = me.now()? - arrival;
    market.times.borrow_mut().push(total);
    Ok(())
}

fn arrivals(market: Market, me: &Process) -> SimResult<()> {
    let sim = me.sim();
    loop {
        let m = market.clone();
        sim.process("customer").spawn(move |p| customer(m, p))?;
        me.wait(market.draw(&market.variates.interarrival))?;
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    seed: u64,
    horizon: f64,
    customers_served: usize,
    mean_time_in_system: f64,
    max_time_in_system: f64,
    carts_in_use: u64,
    deli_in_use: u64,
    checkout_queues: Vec<usize>,
    dispatch: DispatchStats,
}

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("PROCSIM_CONFIG") {
        Ok(path) => EngineConfig::from_json_file(&path)
            .with_context(|| format!("loading configuration from {}", path)),
        Err(_) => EngineConfig::from_env().context("reading PROCSIM_* environment"),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("procsim checkout demo starting...");
    info!("================================================");

    let config = load_config()?;
    info!(
        stack_size = config.dispatch_stack_size,
        guard_size = config.guard_size,
        "engine configuration loaded"
    );

    let seed = std::env::var("PROCSIM_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEED);
    let market = Market::new(seed)?;

    let sim = Simulation::builder().with_config(config).build()?;
    sim.init(0.0, HORIZON)?;

    let m = market.clone();
    sim.process("arrivals")
        .priority(1)
        .spawn(move |p| arrivals(m, p))?;

    let end = sim.run()?;
    info!(end, live = sim.live_processes().len(), "simulation finished");

    let times = market.times.borrow();
    let served = times.len();
    let mean = if served == 0 {
        0.0
    } else {
        times.iter().sum::<f64>() / served as f64
    };
    let summary = Summary {
        seed,
        horizon: HORIZON,
        customers_served: served,
        mean_time_in_system: mean,
        max_time_in_system: times.iter().copied().fold(0.0, f64::max),
        carts_in_use: market.carts.used(),
        deli_in_use: market.deli.used(),
        checkout_queues: market.checkouts.iter().map(|c| c.queue().len()).collect(),
        dispatch: sim.stats(),
    };
    drop(times);

    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("================================================");
    info!("procsim checkout demo finished");
    Ok(())
}
