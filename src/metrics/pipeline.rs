use crate::config::NodeIdentity;
use crate::k8s::cache::LabelSource;
use crate::k8s::types::LabelSet;
use crate::metrics::fetcher::MetricSource;
use crate::metrics::relabel::{InjectMode, Relabeler};
use crate::{LabelerError, Result};
use std::io::Write;
use tracing::debug;

/// Fetch, label lookup and relabel for one scrape.
pub struct RelabelPipeline<M, L> {
    node: NodeIdentity,
    source: M,
    labels: L,
}

impl<M, L> RelabelPipeline<M, L>
where
    M: MetricSource,
    L: LabelSource,
{
    pub fn new(node: NodeIdentity, source: M, labels: L) -> Self {
        Self {
            node,
            source,
            labels,
        }
    }

    pub fn node(&self) -> &NodeIdentity {
        &self.node
    }

    /// Returns the complete relabeled body, or the first error hit.
    pub async fn run(&self) -> Result<Vec<u8>> {
        let raw = self.source.fetch().await?;
        let labels = self.labels.labels(&self.node)?;

        let out = relabel_exposition(&raw, &labels)?;
        debug!(
            "Relabeled {} bytes into {} bytes with {} node labels",
            raw.len(),
            out.len(),
            labels.len()
        );

        Ok(out)
    }
}

/// Relabels a whole exposition body, threading [`InjectMode`] through the
/// lines in order starting from `Inject`.
pub fn relabel_exposition(raw: &[u8], labels: &LabelSet) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(raw)?;
    let relabeler = Relabeler::new(labels);
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 2);

    text.lines()
        .try_fold(InjectMode::Inject, |mode, line| -> Result<InjectMode> {
            let (line, next) = relabeler.relabel(line, mode)?;
            emit_line(&mut out, &line)?;
            Ok(next)
        })?;

    Ok(out)
}

/// Writes `line` plus a newline, failing unless every byte was accepted.
pub fn emit_line<W: Write>(w: &mut W, line: &str) -> Result<()> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');

    let written = w.write(&buf)?;
    if written != buf.len() {
        return Err(LabelerError::ShortWrite {
            expected: buf.len(),
            written,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    /// `None` behaves like an exporter answering 503.
    struct StaticSource(Option<&'static str>);

    #[async_trait]
    impl MetricSource for StaticSource {
        async fn fetch(&self) -> Result<Bytes> {
            match self.0 {
                Some(body) => Ok(Bytes::from_static(body.as_bytes())),
                None => Err(LabelerError::UpstreamStatus {
                    status: "503 Service Unavailable".to_string(),
                }),
            }
        }
    }

    struct StaticLabels(Option<LabelSet>);

    impl LabelSource for StaticLabels {
        fn labels(&self, node: &NodeIdentity) -> Result<LabelSet> {
            self.0.clone().ok_or_else(|| LabelerError::NodeNotFound {
                name: node.to_string(),
            })
        }
    }

    fn zone_labels() -> LabelSet {
        [("zone", "us-east1")].into_iter().collect()
    }

    fn pipeline(
        body: Option<&'static str>,
        labels: Option<LabelSet>,
    ) -> RelabelPipeline<StaticSource, StaticLabels> {
        RelabelPipeline::new(
            NodeIdentity::new("worker-1").unwrap(),
            StaticSource(body),
            StaticLabels(labels),
        )
    }

    const EXPOSITION: &str = "\
# HELP node_load1 1m load average.
# TYPE node_load1 gauge
node_load1 0.21
# HELP rpc_duration_seconds RPC latency.
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{quantile=\"0.5\"} 0.01
rpc_duration_seconds_sum 1.5
rpc_duration_seconds_count 100
# TYPE node_cpu_seconds_total counter
node_cpu_seconds_total{cpu=\"0\",mode=\"idle\"} 1234.5
";

    #[test]
    fn test_relabel_exposition_threads_mode() {
        let out = relabel_exposition(EXPOSITION.as_bytes(), &zone_labels()).unwrap();

        let expected = "\
# HELP node_load1 1m load average.
# TYPE node_load1 gauge
node_load1{zone=\"us-east1\"} 0.21
# HELP rpc_duration_seconds RPC latency.
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{quantile=\"0.5\"} 0.01
rpc_duration_seconds_sum 1.5
rpc_duration_seconds_count 100
# TYPE node_cpu_seconds_total counter
node_cpu_seconds_total{cpu=\"0\",mode=\"idle\",zone=\"us-east1\"} 1234.5
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_output_always_newline_terminated() {
        let out = relabel_exposition(b"up 1\r\nup2 0", &zone_labels()).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "up{zone=\"us-east1\"} 1\nup2{zone=\"us-east1\"} 0\n"
        );
    }

    #[test]
    fn test_empty_body() {
        assert!(relabel_exposition(b"", &zone_labels()).unwrap().is_empty());
    }

    #[test]
    fn test_blank_line_between_samples_is_malformed() {
        let err = relabel_exposition(b"up 1\n\nup 2\n", &zone_labels()).unwrap_err();

        assert!(matches!(
            err,
            LabelerError::MalformedSample { fields: 1, .. }
        ));
    }

    #[test]
    fn test_empty_labels_keep_format_check() {
        let err = relabel_exposition(b"bad line with spaces\n", &LabelSet::new()).unwrap_err();
        assert!(matches!(err, LabelerError::MalformedSample { .. }));

        let out = relabel_exposition(b"up 1\nx{a=\"b\"} 2\n", &LabelSet::new()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "up{} 1\nx{a=\"b\",} 2\n");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = relabel_exposition(b"up\xff 1", &zone_labels()).unwrap_err();
        assert!(matches!(err, LabelerError::InvalidEncoding(_)));
    }

    struct ShortWriter;

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len().saturating_sub(1))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_short_write_is_an_error() {
        let err = emit_line(&mut ShortWriter, "up 1").unwrap_err();

        assert!(matches!(
            err,
            LabelerError::ShortWrite {
                expected: 5,
                written: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_run_relabels_fetched_body() {
        let p = pipeline(Some("up 1\n"), Some(zone_labels()));

        let out = p.run().await.unwrap();
        assert_eq!(out, b"up{zone=\"us-east1\"} 1\n");
    }

    #[tokio::test]
    async fn test_run_fails_on_upstream_status() {
        let p = pipeline(None, Some(zone_labels()));

        let err = p.run().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_run_fails_on_unknown_node() {
        let p = pipeline(Some("up 1\n"), None);

        let err = p.run().await.unwrap_err();
        assert!(matches!(err, LabelerError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_surfaces_no_partial_output() {
        let body = "up 1\nbad line with spaces\nup 2\n";
        let p = pipeline(Some(body), Some(zone_labels()));

        let err = p.run().await.unwrap_err();
        assert!(matches!(err, LabelerError::MalformedSample { .. }));
    }
}
