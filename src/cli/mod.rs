use clap::Parser;

#[derive(Parser)]
#[command(name = "speedprobe")]
#[command(about = "Measures connection latency and throughput against remote test servers")]
#[command(version)]
pub struct Cli {
    /// Provider node for the ICMP latency test (needs root rights)
    #[arg(long)]
    pub node: Option<String>,

    /// Number of ICMP echo requests
    #[arg(long, alias = "number_of_tests", default_value_t = 10_000)]
    pub number_of_tests: u32,

    /// ICMP payload size in bytes (at most 996)
    #[arg(long, alias = "packet_size", default_value_t = 996)]
    pub packet_size: usize,

    /// Provider mini server mode; skips the connectivity pre-check
    #[arg(long, alias = "server_mode")]
    pub server_mode: Option<String>,

    /// Servers sampled per tier in the local/worldwide phases
    #[arg(long, alias = "ratio_of_global_tests", default_value_t = 3)]
    pub ratio_of_global_tests: usize,

    /// Skip writing the HTML report file
    #[arg(long)]
    pub no_html: bool,

    /// Do not wait for a keypress before exiting
    #[arg(long)]
    pub no_wait: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = Cli::try_parse_from(["speedprobe"]).unwrap();
        assert!(cli.node.is_none());
        assert_eq!(cli.number_of_tests, 10_000);
        assert_eq!(cli.packet_size, 996);
        assert!(cli.server_mode.is_none());
        assert_eq!(cli.ratio_of_global_tests, 3);
        assert!(!cli.no_html);
    }

    #[test]
    fn underscore_aliases_are_accepted() {
        let cli = Cli::try_parse_from([
            "speedprobe",
            "--node",
            "gw.example.net",
            "--number_of_tests",
            "50",
            "--packet_size",
            "512",
            "--ratio_of_global_tests",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.node.as_deref(), Some("gw.example.net"));
        assert_eq!(cli.number_of_tests, 50);
        assert_eq!(cli.packet_size, 512);
        assert_eq!(cli.ratio_of_global_tests, 2);
    }
}
