//! Prometheus metrics export
//!
//! The runner is a short-lived process, so instead of serving `/metrics` it
//! renders the registry into a node_exporter textfile after each command:
//!
//! - `scraper_pool_selections_total` (counter): label `result`
//! - `scraper_pool_transitions_total` (counter): label `to`
//! - `scraper_provisions_total` (counter): label `source`
//! - `scraper_cycles_total` (counter): label `outcome`

use std::path::Path;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Render the registry to `path` for the textfile collector.
///
/// Writes to a sibling temp file and renames it so the collector never reads
/// a partial file.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// Create an isolated recorder/handle pair for unit tests.
    /// Uses build_recorder() instead of install_recorder() to avoid the
    /// global recorder singleton constraint.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn textfile_contains_rendered_counters() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::counter!("scraper_cycles_total", "outcome" => "success").increment(2);
        metrics::counter!("scraper_provisions_total", "source" => "pool").increment(1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrape_runner.prom");
        write_textfile(&handle, &path).unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(
            output.contains("scraper_cycles_total{outcome=\"success\"} 2"),
            "got: {output}"
        );
        assert!(output.contains("scraper_provisions_total{source=\"pool\"} 1"));
        assert!(!dir.path().join("scrape_runner.prom.tmp").exists());
    }

    #[test]
    fn textfile_write_replaces_previous_contents() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrape_runner.prom");
        std::fs::write(&path, "stale_metric 1\n").unwrap();

        metrics::counter!("scraper_cycles_total", "outcome" => "job_error").increment(1);
        write_textfile(&handle, &path).unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(!output.contains("stale_metric"));
        assert!(output.contains("outcome=\"job_error\""));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let (_recorder, handle) = isolated_recorder();
        let result = write_textfile(&handle, Path::new("/nonexistent/dir/scrape_runner.prom"));
        assert!(result.is_err());
    }
}
