//! Output of node score reports as json or a pretty table, to a file or stdout.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use prettytable::{row, Table};
use serde::{Deserialize, Serialize};

use crate::core::scheduler::score_profile::{select_host, NodeScore};

#[derive(Debug, Default, Deserialize, PartialEq, Clone, Copy)]
pub enum OutputFormat {
    #[default]
    JSON,
    PrettyTable,
}

#[derive(Debug, Default, Deserialize, PartialEq, Clone)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Stdout if not set.
    pub output_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScoreReport<'a> {
    pod: &'a str,
    selected_node: Option<&'a str>,
    nodes: &'a [NodeScore],
}

pub fn print_node_scores(
    pod_key: &str,
    node_scores: &[NodeScore],
    config: &OutputConfig,
) -> io::Result<()> {
    let mut out: Box<dyn Write> = match &config.output_file {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    match config.format {
        OutputFormat::PrettyTable => write_pretty_table(pod_key, node_scores, &mut out),
        OutputFormat::JSON => write_json(pod_key, node_scores, &mut out),
    }
}

pub fn write_pretty_table(
    pod_key: &str,
    node_scores: &[NodeScore],
    out: &mut dyn Write,
) -> io::Result<()> {
    let selected = select_host(node_scores).map(|node_score| node_score.node_name.as_str());

    let mut summary_table = Table::new();
    summary_table.add_row(row!["Pod", "Selected node"]);
    summary_table.add_row(row![pod_key, selected.unwrap_or("-")]);

    let mut scores_table = Table::new();
    scores_table.add_row(row!["Node", "In partition", "Plugin scores", "Total"]);
    for node_score in node_scores.iter() {
        let plugin_scores = node_score
            .plugin_scores
            .iter()
            .map(|plugin_score| format!("{}={}", plugin_score.plugin, plugin_score.score))
            .collect::<Vec<_>>()
            .join(", ");
        scores_table.add_row(row![
            node_score.node_name,
            node_score.in_partition,
            plugin_scores,
            node_score.total
        ]);
    }

    summary_table.print(&mut *out)?;
    scores_table.print(&mut *out)?;
    Ok(())
}

pub fn write_json(pod_key: &str, node_scores: &[NodeScore], out: &mut dyn Write) -> io::Result<()> {
    let report = ScoreReport {
        pod: pod_key,
        selected_node: select_host(node_scores).map(|node_score| node_score.node_name.as_str()),
        nodes: node_scores,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use crate::core::scheduler::score_profile::{NodeScore, PluginScore};
    use crate::printer::{write_json, write_pretty_table, OutputConfig, OutputFormat};

    fn node_scores() -> Vec<NodeScore> {
        vec![
            NodeScore {
                node_name: "node1".to_string(),
                in_partition: true,
                total: 97,
                plugin_scores: vec![PluginScore {
                    plugin: "LoadAware".to_string(),
                    score: 97,
                }],
            },
            NodeScore {
                node_name: "node2".to_string(),
                in_partition: false,
                total: 100,
                plugin_scores: vec![PluginScore {
                    plugin: "LoadAware".to_string(),
                    score: 100,
                }],
            },
        ]
    }

    #[test]
    fn test_output_config_from_yaml() {
        let config: OutputConfig = serde_yaml::from_str("format: PrettyTable").unwrap();
        assert_eq!(OutputFormat::PrettyTable, config.format);
        assert!(config.output_file.is_none());

        let config: OutputConfig = serde_yaml::from_str("output_file: scores.json").unwrap();
        assert_eq!(OutputFormat::JSON, config.format);
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_json("default/pod", &node_scores(), &mut out).unwrap();

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!("default/pod", report["pod"]);
        assert_eq!("node1", report["selected_node"]);
        assert_eq!(2, report["nodes"].as_array().unwrap().len());
        assert_eq!(100, report["nodes"][1]["total"]);
    }

    #[test]
    fn test_pretty_table_report() {
        let mut out = Vec::new();
        write_pretty_table("default/pod", &node_scores(), &mut out).unwrap();

        let table = String::from_utf8(out).unwrap();
        assert!(table.contains("node1"));
        assert!(table.contains("LoadAware=97"));
        assert!(table.contains("Selected node"));
    }
}
