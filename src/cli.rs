use clap::Parser;

/// devforge - workstation installer for developer tools
#[derive(Parser, Debug)]
#[command(name = "devforge")]
#[command(about = "Terminal installer for developer tools, fonts, MCP servers and boot diagnostics")]
#[command(version)]
pub struct Cli {
    /// Demo mode (for VHS/asciinema recording).
    ///
    /// Privileged commands are described rather than executed, unless
    /// credentials are known cached via --sudo-cached.
    #[arg(long = "demo-child")]
    pub demo_child: bool,

    /// Assert sudo credentials are already cached (pairs with --demo-child).
    #[arg(long = "sudo-cached")]
    pub sudo_cached: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
