use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "lapse",
    about = "Run a command with a progress bar estimated from its previous run",
    version
)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Spawn the command directly instead of through $SHELL
    #[arg(long)]
    pub no_shell: bool,

    /// Skip launching $PAGER on the log afterwards
    #[arg(long)]
    pub no_pager: bool,

    /// The command to run, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_args_become_the_command() {
        let cli = Cli::parse_from(["lapse", "cargo", "build", "--release"]);
        assert_eq!(cli.command, vec!["cargo", "build", "--release"]);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn own_flags_parse_before_the_command() {
        let cli = Cli::parse_from(["lapse", "-vv", "--no-pager", "make", "-j4"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_pager);
        assert!(!cli.no_shell);
        assert_eq!(cli.command, vec!["make", "-j4"]);
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["lapse"]).is_err());
    }

    #[test]
    fn command_flags_after_the_program_are_not_eaten() {
        // -v after the command's program belongs to the command.
        let cli = Cli::parse_from(["lapse", "make", "-v"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, vec!["make", "-v"]);
    }
}
