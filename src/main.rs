use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agreement_pool::engine::{AgreementsPool, ReleaseOutcome};
use agreement_pool::lifecycle::ChannelSink;
use agreement_pool::providers::{SimulatedNegotiator, SimulationProfile};
use agreement_pool::types::{AgreementId, Offer, TerminationReason};
use agreement_pool::{Config, PoolError};

#[derive(Parser)]
#[command(name = "agreement-pool")]
#[command(about = "Agreement selection and termination for compute marketplaces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pool against a simulated market
    Simulate {
        #[arg(long, default_value_t = 20, help = "Number of offers fed into the pool")]
        candidates: usize,
        #[arg(long, default_value_t = 4, help = "Concurrent workers using agreements")]
        workers: usize,
        #[arg(long, default_value_t = 30, help = "Units of work to run before shutdown")]
        jobs: usize,
        #[arg(long, default_value_t = 0.1)]
        failure_rate: f64,
        #[arg(long, default_value_t = 0.5)]
        multi_activity_rate: f64,
        #[arg(long, help = "TOML configuration file")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            candidates,
            workers,
            jobs,
            failure_rate,
            multi_activity_rate,
            config,
        } => {
            let config = match config {
                Some(path) => Config::from_toml_file(path)?,
                None => Config::from_env(),
            };
            let profile = SimulationProfile {
                failure_rate,
                multi_activity_rate,
                ..Default::default()
            };
            simulate(config, profile, candidates, workers, jobs).await?
        }
    }

    Ok(())
}

async fn simulate(
    config: Config,
    profile: SimulationProfile,
    candidates: usize,
    workers: usize,
    jobs: usize,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let pool = Arc::new(AgreementsPool::new(
        config.pool.clone(),
        Arc::new(SimulatedNegotiator::new(profile)),
        Arc::new(ChannelSink::new(tx)),
    ));

    let printer = tokio::spawn(async move {
        let mut count = 0;
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("  event: {}", line),
                Err(e) => println!("  event: {:?} ({})", event, e),
            }
            count += 1;
        }
        count
    });

    let offers: Vec<(f64, Offer)> = {
        let mut rng = rand::thread_rng();
        (0..candidates)
            .map(|i| {
                // One decimal place so that some scores tie.
                let score = rng.gen_range(0..10) as f64 / 10.0;
                let offer = Offer::new(
                    format!("provider-{}", i),
                    json!({ "golem.inf.cpu.threads": rng.gen_range(1..16) }),
                );
                (score, offer)
            })
            .collect()
    };
    for (score, offer) in offers {
        pool.add_candidate(score, offer);
    }
    println!(
        "Pool started with {} candidates, {} workers",
        pool.candidate_count(),
        workers
    );

    let budget = Arc::new(AtomicUsize::new(jobs));
    let handles: Vec<_> = (0..workers)
        .map(|worker_id| tokio::spawn(run_worker(pool.clone(), budget.clone(), worker_id)))
        .collect();

    let mut completed = 0;
    for handle in handles {
        completed += handle.await??;
    }

    let reason = TerminationReason::new(config.pool.shutdown_reason.clone()).with_code("Success");
    match pool.terminate_all(&reason).await {
        Ok(terminated) => println!("Shutdown terminated {} remaining agreements", terminated),
        Err(PoolError::ShutdownIncomplete { failed }) => {
            println!("Shutdown incomplete, remote termination failed for {:?}", failed)
        }
        Err(e) => return Err(e.into()),
    }

    println!("\nJobs completed: {}", completed);
    println!("Agreements confirmed: {}", pool.confirmed_count());

    drop(pool);
    let events = printer.await?;
    println!("Lifecycle events: {}", events);

    Ok(())
}

async fn run_worker(
    pool: Arc<AgreementsPool>,
    budget: Arc<AtomicUsize>,
    worker_id: usize,
) -> Result<usize> {
    let mut completed = 0;

    while take_job(&budget) {
        let mut taken: Option<AgreementId> = None;
        let outcome = match pool.reuse_agreement(|agreement| {
            taken = Some(agreement.id);
            true
        }) {
            Some(accepted) => Ok(Some(accepted)),
            None => {
                pool.use_agreement(|agreement| {
                    taken = Some(agreement.id);
                    true
                })
                .await
            }
        };

        match outcome {
            Ok(Some(_)) => {
                let Some(agreement_id) = taken else {
                    continue;
                };
                println!("worker {}: running on agreement {}", worker_id, agreement_id);
                tokio::time::sleep(Duration::from_millis(10)).await;
                completed += 1;

                match pool.release_agreement(agreement_id).await {
                    Ok(ReleaseOutcome::Idle) => {}
                    Ok(ReleaseOutcome::Terminated(_)) => {}
                    Err(e) => println!("worker {}: {}", worker_id, e),
                }
            }
            Ok(None) => break,
            Err(e @ (PoolError::NegotiationFailed { .. } | PoolError::AgreementRejected { .. })) => {
                println!("worker {}: {}", worker_id, e);
                budget.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(completed)
}

fn take_job(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}
