use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vigil_core::{Alert, AlertSeverity, AppContext, CurrentStatus, HealthStatus, Trend, VigilConfig};

const SAMPLE_SPACING: Duration = Duration::from_millis(500);

async fn open_context() -> anyhow::Result<Arc<AppContext>> {
    let config = VigilConfig::load()?;
    debug!(
        memory_store = config.storage.memory_db_url.is_some(),
        "Opening application context"
    );
    Ok(Arc::new(AppContext::connect(config).await?))
}

/// Take `samples` readings, spaced so CPU usage has a baseline.
async fn collect(app: &Arc<AppContext>, samples: usize) -> anyhow::Result<Vec<Alert>> {
    let mut alerts = Vec::new();
    for i in 0..samples.max(1) {
        if i > 0 {
            tokio::time::sleep(SAMPLE_SPACING).await;
        }
        let app = Arc::clone(app);
        alerts = tokio::task::spawn_blocking(move || app.monitor().tick()).await?;
    }
    Ok(alerts)
}

pub async fn cmd_status(format: &str, samples: usize) -> anyhow::Result<()> {
    let app = open_context().await?;
    let alerts = collect(&app, samples).await?;

    let Some(status) = app.monitor().current_status() else {
        anyhow::bail!("no metrics were collected");
    };

    if format == "json" {
        let output = serde_json::json!({
            "status": status,
            "alerts": alerts,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_status(&status);

    if !alerts.is_empty() {
        println!();
        println!("  {}", "Alerts".yellow().bold());
        for alert in &alerts {
            print_alert(alert);
        }
    }

    Ok(())
}

pub async fn cmd_monitor(interval: Option<u64>, duration: Option<u64>) -> anyhow::Result<()> {
    let config = VigilConfig::load()?;
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.monitor.interval());
    let app = Arc::new(AppContext::connect(config).await?);

    app.monitor().register_alert_callback(|alert| {
        print_alert(alert);
        Ok(())
    });

    println!(
        "{} every {}s (Ctrl+C to stop)",
        "Monitoring".cyan().bold(),
        interval.as_secs_f64()
    );
    app.monitor().start(interval)?;

    match duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    let stopper = Arc::clone(&app);
    tokio::task::spawn_blocking(move || stopper.stop_monitoring()).await?;
    debug!("Monitor stopped");

    println!();
    println!(
        "{} after {} tick(s)",
        "Stopped".green().bold(),
        app.monitor().tick_count()
    );
    if let Some(status) = app.monitor().current_status() {
        println!();
        print_status(&status);
    }

    Ok(())
}

pub async fn cmd_report(samples: usize) -> anyhow::Result<()> {
    let app = open_context().await?;
    collect(&app, samples).await?;

    let output = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "monitor": app.monitor().performance_report(),
        "optimization": app.optimization_report(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_status(status: &CurrentStatus) {
    println!("{}", "Vigil Status".cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    let health = match status.health_status {
        HealthStatus::Excellent => status.health_status.to_string().green(),
        HealthStatus::Good => status.health_status.to_string().cyan(),
        HealthStatus::Warning => status.health_status.to_string().yellow(),
        HealthStatus::Critical => status.health_status.to_string().red(),
    };
    println!("  {} {}", "Health:".bold(), health.bold());
    println!();

    let system = &status.system;
    let app = &status.application;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Metric").fg(Color::White),
            Cell::new("Value").fg(Color::White),
            Cell::new("Trend").fg(Color::White),
        ]);

    table.add_row(vec![
        Cell::new("CPU"),
        Cell::new(format!("{:.1}%", system.cpu_percent)),
        trend_cell(status.trends.cpu),
    ]);
    table.add_row(vec![
        Cell::new("Memory"),
        Cell::new(format!(
            "{:.1}% ({:.0} MB)",
            system.memory_percent, system.memory_used_mb
        )),
        trend_cell(status.trends.memory),
    ]);
    table.add_row(vec![
        Cell::new("Disk"),
        Cell::new(format!("{:.1}%", system.disk_usage_percent)),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Threads"),
        Cell::new(system.active_threads),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Active sessions"),
        Cell::new(app.active_sessions),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Memory records"),
        Cell::new(app.memory_records),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Cache hit rate"),
        Cell::new(
            app.cache_hit_rate
                .map(|rate| format!("{:.1}%", rate * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        ),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Avg response"),
        Cell::new(format!("{:.3}s", app.average_response_time)),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Errors (1h)"),
        Cell::new(app.errors_last_hour),
        Cell::new(""),
    ]);

    println!("{table}");

    println!();
    println!("  {}", "Recommendations".yellow().bold());
    for hint in &status.recommendations {
        println!("    {} {}", "→".blue(), hint);
    }

    println!();
    println!(
        "  {} {}",
        "Timestamp:".dimmed(),
        status.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn trend_cell(trend: Trend) -> Cell {
    match trend {
        Trend::Increasing => Cell::new("↑ increasing").fg(Color::Yellow),
        Trend::Decreasing => Cell::new("↓ decreasing").fg(Color::Green),
        Trend::Stable => Cell::new("→ stable").fg(Color::DarkGrey),
    }
}

fn print_alert(alert: &Alert) {
    let label = match alert.severity {
        AlertSeverity::Warning => "WARNING".yellow().bold(),
        AlertSeverity::Critical => "CRITICAL".red().bold(),
    };
    println!(
        "  [{}] {} {}",
        label,
        alert.message,
        format!("({})", alert.kind).dimmed()
    );
}
