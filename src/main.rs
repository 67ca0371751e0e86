use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use port_probe_rs::scanner::PortScanner;
use port_probe_rs::types::{ProbeResult, PortStatus, ScanMetrics, ScanMethod, ScanRequest};
use port_probe_rs::{ports, targets};

/// port-probe-rs — concurrent async TCP port probing with banner-based
/// service detection.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-probe-rs",
    version,
    about = "Concurrent async TCP port prober with banner-based service detection.",
    long_about = None
)]
struct Cli {
    /// Host, IP, or last-octet range (e.g., 192.168.1.1-20).
    target: String,

    /// Port specification: comma-separated ports and ranges (e.g., 22,80-90,443),
    /// or a preset name (popular, web, databases, mail, common, all).
    #[arg(long, default_value = "popular")]
    ports: String,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 3000)]
    timeout_ms: u64,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Suppress the live progress line.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let spec = ports::preset(&cli.ports).unwrap_or(&cli.ports);
    let validation = ports::validate(spec);
    for warning in &validation.warnings {
        eprintln!("warning: {warning}");
    }
    let parsed = ports::parse(spec).context("invalid port specification")?;

    println!("port-probe-rs configuration:");
    println!("  target     : {}", cli.target);
    println!(
        "  ports      : {} ({} total)",
        ports::format_port_list(&parsed.expanded, 10),
        parsed.total
    );
    println!("  timeout_ms : {}", cli.timeout_ms);

    let request = ScanRequest {
        target: cli.target.clone(),
        ports: parsed.expanded,
        scan_type: targets::scan_type_for(&cli.target),
        timeout_ms: cli.timeout_ms,
        method: ScanMethod::Tcp,
    };

    let engine = Arc::new(PortScanner::new());

    // Ctrl-C requests cooperative cancellation; in-flight probes finish.
    let ctrlc_engine = engine.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("\nstopping scan...");
        ctrlc_engine.stop_scan();
    });

    let progress = if cli.quiet {
        None
    } else {
        Some(Arc::new(|done: u64, total: u64| {
            let pct = if total > 0 {
                done as f64 / total as f64 * 100.0
            } else {
                100.0
            };
            eprint!("\rscanned {done}/{total} ({pct:.0}%) ");
        }) as Arc<port_probe_rs::scanner::ProgressFn>)
    };

    let (results, metrics) = engine
        .perform_scan(&request, progress)
        .await
        .context("scan failed")?;
    if !cli.quiet {
        eprintln!();
    }

    print_results_table(&results);
    print_metrics(&metrics);

    if let Some(path) = cli.output.as_deref() {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &results)?;
        println!("Wrote JSON results to {}", path.display());
    }

    Ok(())
}

fn print_results_table(results: &[ProbeResult]) {
    let open: Vec<&ProbeResult> = results
        .iter()
        .filter(|r| r.status == PortStatus::Open)
        .collect();
    println!("\nOpen ports: {} (scanned: {})", open.len(), results.len());
    if open.is_empty() {
        return;
    }

    let mut ip_w = "ip".len();
    let mut svc_w = "service".len();
    for r in &open {
        ip_w = ip_w.max(r.ip.len());
        if let Some(s) = &r.service {
            svc_w = svc_w.max(s.len());
        }
    }
    println!(
        "{:<ip_w$}  {:>5}  {:<svc_w$}  {:>11}  banner",
        "ip", "port", "service", "response_ms"
    );
    for r in &open {
        let mut banner: String = r
            .banner
            .as_deref()
            .unwrap_or_default()
            .replace(['\r', '\n'], " ");
        if banner.chars().count() > 60 {
            banner = banner.chars().take(60).collect();
        }
        println!(
            "{:<ip_w$}  {:>5}  {:<svc_w$}  {:>11}  {}",
            r.ip,
            r.port,
            r.service.as_deref().unwrap_or("-"),
            r.response_time_ms,
            banner
        );
    }
}

fn print_metrics(metrics: &ScanMetrics) {
    println!("\nScan metrics:");
    println!(
        "  open/closed/timeout : {}/{}/{}",
        metrics.open_ports, metrics.closed_ports, metrics.timeout_ports
    );
    println!("  duration            : {} ms", metrics.duration_ms);
    println!("  speed               : {:.1} ports/sec", metrics.scan_speed);
    println!(
        "  avg response        : {:.1} ms",
        metrics.average_response_time_ms
    );
    println!(
        "  workers (max/avg)   : {}/{:.1}",
        metrics.max_concurrent_workers, metrics.average_active_workers
    );
    println!(
        "  peak memory         : {:.1} MB",
        metrics.peak_memory_bytes as f64 / (1024.0 * 1024.0)
    );
}
