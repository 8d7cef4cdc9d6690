use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Lockstep workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scaling benchmarks across thread counts
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

const THREAD_COUNTS: &[usize] = &[1, 2, 4, 8];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running scaling benchmarks...");

    // Build first to avoid measuring build time
    println!("Compiling benchmarks...");
    let status = Command::new("cargo")
        .args(["build", "--bench", "bfs_benchmark", "--release"])
        .status()?;
    if !status.success() {
        anyhow::bail!("Failed to compile benchmarks");
    }

    for threads in THREAD_COUNTS {
        println!("\n>>> Benchmarking with {} thread(s)", threads);
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.env("CARGO_INCREMENTAL", "0")
            .env("LOCKSTEP_BENCH_THREADS", threads.to_string());

        cmd.arg("bench").arg("--bench").arg("bfs_benchmark");

        // Args for the test runner (Criterion) go after --
        cmd.arg("--");
        cmd.arg("--save-baseline").arg(format!("t{}", threads));

        if quick {
            cmd.arg("--measurement-time").arg("0.1");
            cmd.arg("--noplot");
            cmd.arg("--sample-size").arg("10");
        }

        let status = cmd
            .status()
            .context(format!("Failed to run bench with {} threads", threads))?;

        if !status.success() {
            eprintln!("Warning: Benchmark failed with {} threads", threads);
        } else {
            println!("Finished {} thread(s) in {:.2?}", threads, start.elapsed());
        }
    }

    Ok(())
}

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");
    let mut results: HashMap<String, HashMap<String, f64>> = HashMap::new();

    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    collect_results(criterion_dir, &mut results);

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }

    use std::io::Write;
    let mut file = fs::File::create(report_path)?;

    writeln!(file, "# Scaling Benchmark Report")?;

    let mut workloads: Vec<_> = results.keys().collect();
    workloads.sort();

    // Header
    write!(file, "| Workload |")?;
    for threads in THREAD_COUNTS {
        write!(file, " t{} (runs/s) | vs t1 |", threads)?;
    }
    writeln!(file)?;

    write!(file, "|---|")?;
    for _ in THREAD_COUNTS {
        write!(file, "---|---|")?;
    }
    writeln!(file)?;

    for workload in workloads {
        write!(file, "| {} |", workload)?;

        let serial_ops = results
            .get(workload)
            .and_then(|m| m.get("t1"))
            .copied()
            .unwrap_or(0.0);

        for threads in THREAD_COUNTS {
            let name = format!("t{}", threads);
            if let Some(ops) = results.get(workload).and_then(|m| m.get(&name)) {
                let rel = if serial_ops > 0.0 {
                    ops / serial_ops
                } else {
                    0.0
                };

                let ops_str = if *ops > 1_000.0 {
                    format!("{:.2}K", ops / 1_000.0)
                } else {
                    format!("{:.2}", ops)
                };

                write!(file, " {} | **{:.2}x** |", ops_str, rel)?;
            } else {
                write!(file, " N/A | - |")?;
            }
        }
        writeln!(file)?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn collect_results(dir: &Path, results: &mut HashMap<String, HashMap<String, f64>>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_results(&path, results);
        } else if path.file_name().and_then(|s| s.to_str()) == Some("estimates.json") {
            // Structure: .../workload/baseline/estimates.json
            if let Some(baseline_dir) = path.parent() {
                let baseline_name = baseline_dir
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                if let Some(workload_dir) = baseline_dir.parent() {
                    let workload_name = workload_dir
                        .file_name()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();

                    if baseline_name == "report" || workload_name == "report" {
                        continue;
                    }

                    if let Ok(content) = fs::read_to_string(&path) {
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) {
                            if let Some(mean) = json.get("mean").and_then(|m| m.get("point_estimate"))
                            {
                                let time_ns = mean.as_f64().unwrap_or(0.0);
                                if time_ns > 0.0 {
                                    results
                                        .entry(workload_name)
                                        .or_default()
                                        .insert(baseline_name, 1e9 / time_ns);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
