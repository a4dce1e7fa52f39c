// src/main.rs
//
// Demo simulation that wires up the hashoracle library:
//
// - the worked call option, valued and re-derived by the solver
// - a bounded stable coin sized from a face value
// - three oracles publishing ladders and revealing over a channel, with a
//   2-of-3 condition settling as reveals arrive and the window closes.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use hashoracle::{
    AgreementPolicy, BoundedStableCoin, CallOption, ConditionTemplate, DefaultEvaluator,
    EngineConfig, Error, HashLadder, Holding, LevelSchedule, ObservationDate, OracleBoard,
    OracleId, OracleObservation, PairQuote, Pair, PartyId, Preimage, Scenario, Solver,
    SolverConfig, SynthesisRequest,
};

/// One disclosed preimage, as an oracle would broadcast it.
#[derive(Debug)]
struct Reveal {
    oracle: OracleId,
    threshold: Decimal,
    preimage: Preimage,
    at: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hashoracle=info".to_string()),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let cfg = EngineConfig::from_env()?;
    info!(?cfg, "loaded engine config");

    let pair = Pair::parse("BTS:USD")?;
    let date = ObservationDate(1_000);
    let buyer = PartyId::new("buyer");
    let writer = PartyId::new("writer");

    // ---------------------------
    // Call option
    // ---------------------------

    let option = CallOption::new(pair.clone(), Decimal::new(10_000, 0), Decimal::new(5, 2), Decimal::new(115, 2))?;
    let single = ConditionTemplate::single(date, OracleId::new("oracle-a"));
    let long = option.long(&buyer, &writer, &single.at(option.strike)?)?;
    info!(product = %long.label, id = %long.compute_id(), list_price = %option.list_price(), "built call option");

    let evaluator = DefaultEvaluator::new(PairQuote::new(pair.clone()));
    let prices: Vec<Decimal> = (0..=10).map(|k| Decimal::new(k, 2)).collect();
    for (price, value) in evaluator.value_curve(&long, &prices)? {
        info!(%price, %value, "long call value");
    }

    let request = SynthesisRequest::new(buyer.clone(), writer.clone(), pair.clone(), single, Decimal::ZERO, Decimal::new(1, 1))
        .with_opening(Holding::cash(option.escrow()));
    // The kink at the strike needs a check point inside its region.
    let solver = Solver::new(SolverConfig {
        samples_per_region: cfg.solver.samples_per_region.max(2),
        ..cfg.solver.clone()
    });
    let schedule = LevelSchedule::Interval {
        start: Decimal::new(3, 2),
        interval: Decimal::new(1, 2),
        steps: 6,
    };
    let thresholds = schedule.thresholds(8)?;
    match solver.synthesize(|p| option.payoff(p), &thresholds, &request) {
        Ok(product) => {
            for (id, leg) in product.iter_legs() {
                info!(leg = %id, "{leg}");
            }
        }
        Err(err) => warn!(%err, "solver could not match the call payoff on this table"),
    }

    // ---------------------------
    // Bounded stable coin
    // ---------------------------

    let coin = BoundedStableCoin::face(Decimal::new(100, 0), pair.clone(), Decimal::new(10, 2), Decimal::new(4, 0), Decimal::new(110, 2))?;
    let (lo, hi) = coin.band();
    info!(steps = coin.steps, principal = %coin.principal, %lo, %hi, "sized stable coin");
    let (stable, variable) = coin.products(
        &PartyId::new("escrow"),
        &PartyId::new("stable"),
        &PartyId::new("variable"),
        &ConditionTemplate::single(date, OracleId::new("oracle-a")),
    )?;
    let (from, to) = coin.protected_range();
    let mut price = from;
    while price <= to {
        let s = Scenario::spot(price);
        let stable_value = evaluator.evaluate(&stable, &s)?.portfolio_value;
        let variable_value = evaluator.evaluate(&variable, &s)?.portfolio_value;
        info!(%price, stable = %stable_value.round_dp(2), variable = %variable_value.round_dp(2), "stable coin split");
        price += Decimal::new(25, 3);
    }

    // ---------------------------
    // Live settlement, 2 of 3
    // ---------------------------

    let observed = [
        (OracleId::new("oracle-a"), Some(Decimal::new(62, 3))),
        (OracleId::new("oracle-b"), Some(Decimal::new(58, 3))),
        // Silent: never reveals anything.
        (OracleId::new("oracle-c"), None),
    ];
    let levels = cfg.ladder.default_levels.max(thresholds.len());
    let header = HashLadder::header_for(date, &pair, &schedule);

    let mut board = OracleBoard::new();
    let (tx, mut rx) = mpsc::channel::<Reveal>(64);
    let mut tasks = Vec::new();
    for (oracle, price) in observed.iter().cloned() {
        let secret: [u8; 32] = rand::random();
        let ladder = HashLadder::derive(&header, &secret, levels);
        board.insert(OracleObservation::from_ladder(
            oracle.clone(),
            pair.clone(),
            date,
            cfg.settlement.window_secs,
            &thresholds,
            &ladder,
        )?)?;

        let Some(price) = price else { continue };
        let reveals = ladder.reveals_for(&thresholds, price);
        let tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            for (seq, (threshold, preimage)) in reveals.into_iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let reveal = Reveal {
                    oracle: oracle.clone(),
                    threshold,
                    preimage,
                    at: date.0 + seq as u64,
                };
                if tx.send(reveal).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let oracles: Vec<OracleId> = observed.iter().map(|(o, _)| o.clone()).collect();
    let quorum = ConditionTemplate::new(date, oracles, AgreementPolicy::KOfN { k: 2 });
    let long = option.long(&buyer, &writer, &quorum.at(option.strike)?)?;
    let upper = quorum.at(Decimal::new(6, 2))?;
    let settle = Scenario::spot(Decimal::new(60, 3));

    while let Some(reveal) = rx.recv().await {
        match board.record_reveal(&reveal.oracle, date, reveal.threshold, &reveal.preimage, reveal.at) {
            Ok(true) => {
                let result = evaluator.evaluate_with(&long, &board, &settle)?;
                info!(
                    oracle = %reveal.oracle,
                    threshold = %reveal.threshold,
                    value = %result.portfolio_value,
                    disputed = result.disputed_legs.len(),
                    "reveal accepted"
                );
            }
            Ok(false) => {}
            Err(err) => warn!(oracle = %reveal.oracle, %err, "reveal rejected"),
        }
    }
    for task in tasks {
        if let Err(err) = task.await {
            warn!(%err, "oracle task failed");
        }
    }

    info!(condition = %upper, resolution = %upper.resolve_with(&board), "before the deadline");
    let sealed = board.seal_due(date.deadline(cfg.settlement.window_secs) + 1);
    info!(sealed, condition = %upper, resolution = %upper.resolve_with(&board), "after the deadline");

    let result = evaluator.evaluate_with(&long, &board, &settle)?;
    result.ensure_undisputed()?;
    info!(value = %result.portfolio_value, triggered = result.triggered_legs.len(), "call settled");

    Ok(())
}
