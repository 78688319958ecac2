//! One-shot health check

use libtether_core::{HealthMonitor, HealthSnapshot, TetherError};
use libtether_http::HttpProbe;

use crate::cli::Cli;
use crate::context::TetherContext;
use crate::output::output_success;

pub async fn run(cli: &Cli) -> Result<(), TetherError> {
    let ctx = TetherContext::resolve(cli)?;
    let config = &ctx.config;

    let monitor = HealthMonitor::new(
        HttpProbe::supervisor(config)?,
        HttpProbe::dashboard(config)?,
        config.probe_timeout(),
    );
    let snapshot = monitor.poll().await;

    output_success(cli, snapshot, render);
    Ok(())
}

fn up_down(healthy: bool) -> &'static str {
    if healthy {
        "up"
    } else {
        "down"
    }
}

pub fn render(snapshot: &HealthSnapshot) -> String {
    let mut out = format!(
        "state:      {}\nsupervisor: {}",
        snapshot.state,
        up_down(snapshot.supervisor_healthy)
    );
    if let Some(uptime) = snapshot.uptime_secs {
        out.push_str(&format!(" (uptime {:.0}s)", uptime));
    }
    out.push_str(&format!(
        "\ndashboard:  {}\nchecked:    {}",
        up_down(snapshot.dashboard_healthy),
        snapshot.last_check.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use libtether_core::HealthState;

    #[test]
    fn test_render_includes_uptime() {
        let snapshot = HealthSnapshot {
            state: HealthState::Degraded,
            supervisor_healthy: true,
            dashboard_healthy: false,
            uptime_secs: Some(61.4),
            ..HealthSnapshot::initial()
        };
        let text = render(&snapshot);
        assert!(text.contains("state:      degraded"));
        assert!(text.contains("supervisor: up (uptime 61s)"));
        assert!(text.contains("dashboard:  down"));
    }
}
