use clap::{Args, Parser, Subcommand};
use lpvault_common::models::parameters::Template;

/// Operator tooling for the lpvault core
///
/// Inspects the strategy parameter templates and validates deployment configurations against
/// a fresh in-memory chain.
#[derive(Parser, PartialEq, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    global_args: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn args(&self) -> GlobalArgs {
        self.global_args.clone()
    }

    pub fn command(&self) -> Command {
        self.command.clone()
    }
}

#[derive(Subcommand, Clone, PartialEq, Debug)]
pub enum Command {
    /// Prints the parameter template tables as JSON.
    Templates(TemplatesArgs),
    /// Deploys the core from a config file into a fresh chain and prints the addresses.
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(long, short, env = "LPVAULT_VERBOSE")]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TemplatesArgs {
    /// Only print this template
    ///
    /// One of conservative, moderate, aggressive or none. Prints all three tables if omitted.
    #[clap(long)]
    pub template: Option<Template>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CheckConfigArgs {
    /// Deployment configuration file
    #[clap(long, env = "LPVAULT_CONFIG", default_value = "./lpvault.yaml")]
    pub config: String,
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::all(vec!["lpvault", "templates"], None)]
    #[case::single(vec!["lpvault", "templates", "--template", "aggressive"], Some(Template::Aggressive))]
    fn test_templates_args(#[case] args: Vec<&str>, #[case] expected: Option<Template>) {
        let cli = Cli::try_parse_from(args).expect("parse errored");

        assert_eq!(cli.command(), Command::Templates(TemplatesArgs { template: expected }));
        assert!(!cli.args().verbose);
    }

    #[test]
    fn test_check_config_args() {
        let cli = Cli::try_parse_from(vec![
            "lpvault",
            "--verbose",
            "check-config",
            "--config",
            "./deploy.yaml",
        ])
        .expect("parse errored");

        assert_eq!(
            cli.command(),
            Command::CheckConfig(CheckConfigArgs { config: "./deploy.yaml".to_string() })
        );
        assert!(cli.args().verbose);
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let result = Cli::try_parse_from(vec!["lpvault", "templates", "--template", "reckless"]);

        assert!(result.is_err());
    }
}
