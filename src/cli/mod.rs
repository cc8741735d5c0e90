use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "node-labeler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Injects Kubernetes node labels into node-exporter metrics", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, env = "NODE", help = "Name of the node this process runs on")]
    pub node: Option<String>,

    #[arg(
        long,
        default_value = "0.0.0.0",
        help = "Host (IP address or resolvable hostname) to expose metrics on"
    )]
    pub host: String,

    #[arg(long, default_value_t = 9101, help = "Port to expose metrics on")]
    pub port: u16,

    #[arg(
        long,
        default_value_t = 9100,
        help = "Port which node-exporter exposes metrics on"
    )]
    pub node_exporter_port: u16,

    #[arg(
        long,
        default_value_t = 60,
        help = "Seconds to wait for the initial node cache sync"
    )]
    pub sync_timeout: u64,
}
