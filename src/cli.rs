use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::parse_duration;

#[derive(Parser, Debug)]
#[command(name = "kube-log-tail")]
#[command(version)]
#[command(about = "Tail logs from Kubernetes pods with continuous discovery")]
pub struct Cli {
    /// Path to kubeconfig (defaults to $KUBECONFIG, then ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Namespace for pods. Use "" for all namespaces
    #[arg(short = 'n', long, default_value = "default")]
    pub namespace: String,

    /// Label selector for pods
    #[arg(short = 'l', long, default_value = "")]
    pub selector: String,

    /// How often to refresh the list of pods
    #[arg(short = 'r', long, default_value = "10s", value_parser = parse_duration)]
    pub refresh: Duration,

    /// Use colored output (pod|line|off)
    #[arg(short = 'k', long = "colored-output", default_value = "pod")]
    pub colored_output: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
