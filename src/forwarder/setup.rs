//! One-time remote setup: the alerts/metrics join and the alert plots

use std::time::Duration;

use tokio::sync::OnceCell;

use crate::engine::{Engine, EngineError};

/// Default name of the joined alerts/metrics table
pub const JOINED_TABLE: &str = "prometheus_alerts_metrics";

/// Scripts executed once the alert sink is known to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupScripts {
    pub join: String,
    pub plots: String,
}

impl SetupScripts {
    /// Render the setup scripts for the given tables.
    ///
    /// Both sides are floored to `bucket` before joining on time, job and
    /// instance, so alerts line up with the metric samples scraped around
    /// the same moment.
    pub fn render(
        alerts_table: &str,
        metrics_table: &str,
        joined_table: &str,
        bucket: Duration,
    ) -> Self {
        let bucket_nanos = bucket.as_nanos();

        let join = format!(
            r#"nanos_bin = {bucket_nanos}

{alerts}_floored = {alerts}.update(
    "PrometheusDateTimeFloored = lowerBin(PrometheusDateTime, nanos_bin)"
).dropColumns("PrometheusDateTime")

{metrics}_floored = {metrics}.update(
    "PrometheusDateTimeFloored = lowerBin(PrometheusDateTime, nanos_bin)"
).dropColumns("PrometheusDateTime")

{joined} = {alerts}_floored.join({metrics}_floored, "PrometheusDateTimeFloored, Job, Instance").update(
    "Delay = format(minus(AlertIngestDateTime, MetricIngestDateTime))"
)
"#,
            bucket_nanos = bucket_nanos,
            alerts = alerts_table,
            metrics = metrics_table,
            joined = joined_table,
        );

        let plots = format!(
            r#"from deephaven import Plot

firing_alerts = {alerts}.where("Status = `firing`")

alerts_count_by_category = Plot.catHistPlot("Count By Category", firing_alerts, "AlertIdentifier").show()
alerts_share_by_category = Plot.piePlot("Percentage By Category", firing_alerts.countBy("Status", "AlertIdentifier"), "AlertIdentifier", "Status").show()
"#,
            alerts = alerts_table,
        );

        Self { join, plots }
    }
}

/// Guard that runs the setup scripts at most once per process.
///
/// Each script has its own cell, so a script that already succeeded is never
/// executed again. Concurrent callers wait for the in-flight attempt. A failed
/// script leaves its cell unset so a later call can try again.
#[derive(Debug, Default)]
pub struct OneTimeSetup {
    join: OnceCell<()>,
    plots: OnceCell<()>,
}

impl OneTimeSetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.join.initialized() && self.plots.initialized()
    }

    /// Run the scripts that have not succeeded yet. Returns whether this call
    /// executed any of them.
    pub async fn ensure(
        &self,
        engine: &dyn Engine,
        scripts: &SetupScripts,
    ) -> Result<bool, EngineError> {
        let ran_join = run_once(&self.join, engine, &scripts.join).await?;
        let ran_plots = run_once(&self.plots, engine, &scripts.plots).await?;
        Ok(ran_join || ran_plots)
    }
}

async fn run_once(
    cell: &OnceCell<()>,
    engine: &dyn Engine,
    script: &str,
) -> Result<bool, EngineError> {
    let mut executed = false;
    let ran = &mut executed;

    cell.get_or_try_init(move || async move {
        engine.run_script(script).await?;
        *ran = true;
        Ok::<(), EngineError>(())
    })
    .await?;

    Ok(executed)
}
