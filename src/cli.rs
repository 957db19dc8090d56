use std::path::PathBuf;

use cheatdex::{
    autocomplete::{Matcher, PrefixMatcher, SubsequenceMatcher, SubstringMatcher},
    resolve::RequestOptions,
};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "cheatdex",
    about = "Look up command cheat sheets by typing the command",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Upstream to mirror from: an http(s) base URL or a local directory
    #[arg(long, global = true)]
    pub upstream: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub lookup: LookupArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the index from the mirror and cached manifest
    Index,
    /// Search for a command
    Search(WordsArgs),
    /// Search Stack Overflow
    #[command(name = "stackoverflow", visible_aliases = ["so", "stack"])]
    StackOverflow(WordsArgs),
    /// Compare mirrored documents against upstream
    Compare,
    /// Refresh the index and re-download stale documents
    Update(UpdateArgs),
    /// Show queued updates or command history
    Show {
        #[command(subcommand)]
        what: ShowAction,
    },
    /// Print completion candidates for a partial command
    #[command(hide = true)]
    Complete(CompleteArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Lookup --

/// Arguments of a plain `cheatdex <words>` lookup.
#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Command to look up, e.g. `git commit`
    pub words: Vec<String>,

    /// Show the detailed write-up
    #[arg(short, long)]
    pub detail: bool,

    /// Show installation instructions
    #[arg(short, long)]
    pub install: bool,
}

impl LookupArgs {
    pub fn options(&self) -> RequestOptions {
        RequestOptions {
            detail: self.detail,
            install: self.install,
            ..RequestOptions::default()
        }
    }

    /// The phrase to resolve, without a leading program name.
    pub fn phrase(&self) -> String {
        let words = match self.words.split_first() {
            Some((first, rest)) if first.eq_ignore_ascii_case("cheatdex") => {
                rest
            }
            _ => &self.words[..],
        };
        words.join(" ")
    }
}

#[derive(Debug, Args)]
pub struct WordsArgs {
    #[arg(required = true)]
    pub words: Vec<String>,
}

impl WordsArgs {
    pub fn query(&self) -> String {
        self.words.join(" ")
    }
}

// -- Update --

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Re-download every document, not just stale ones
    #[arg(short, long)]
    pub force: bool,

    /// Download every document (not supported yet)
    #[arg(short, long)]
    pub all: bool,
}

// -- Show --

#[derive(Debug, Subcommand)]
pub enum ShowAction {
    /// Documents waiting to be re-downloaded
    Updates {
        /// Maximum entries to show
        #[arg(short, long, default_value = "30")]
        max: usize,
    },
    /// Recent command history
    Hist {
        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        max: usize,
    },
}

// -- Complete --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MatcherKind {
    #[default]
    Prefix,
    Substring,
    Subsequence,
}

impl MatcherKind {
    pub fn matcher(self) -> Box<dyn Matcher> {
        match self {
            MatcherKind::Prefix => Box::new(PrefixMatcher),
            MatcherKind::Substring => Box::new(SubstringMatcher),
            MatcherKind::Subsequence => Box::new(SubsequenceMatcher),
        }
    }
}

#[derive(Debug, Args)]
pub struct CompleteArgs {
    /// Partial command line
    pub text: String,

    /// How many times completion was requested for this text
    #[arg(long, default_value = "0")]
    pub iteration: usize,

    #[arg(long, value_enum, default_value_t = MatcherKind::Prefix)]
    pub matcher: MatcherKind,
}

// -- Completions --

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "cheatdex",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn words_become_a_lookup() {
        let cli = Cli::parse_from(["cheatdex", "git", "commit", "-d"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.lookup.phrase(), "git commit");
        assert_eq!(cli.lookup.options(), RequestOptions {
            detail: true,
            ..RequestOptions::default()
        });
    }

    #[test]
    fn leading_program_name_is_dropped() {
        let cli = Cli::parse_from(["cheatdex", "cheatdex", "tar", "--install"]);
        assert_eq!(cli.lookup.phrase(), "tar");
        assert!(cli.lookup.options().install);
    }

    #[test]
    fn subcommand_wins_over_lookup() {
        let cli = Cli::parse_from(["cheatdex", "index"]);
        assert!(matches!(cli.command, Some(Command::Index)));
        assert!(cli.lookup.words.is_empty());
    }

    #[test]
    fn stackoverflow_aliases() {
        for name in ["stackoverflow", "so", "stack"] {
            let cli = Cli::parse_from(["cheatdex", name, "undo", "commit"]);
            match cli.command {
                Some(Command::StackOverflow(args)) => {
                    assert_eq!(args.query(), "undo commit");
                }
                other => panic!("expected stackoverflow, got {other:?}"),
            }
        }
    }

    #[test]
    fn show_defaults() {
        let cli = Cli::parse_from(["cheatdex", "show", "updates"]);
        assert!(matches!(
            cli.command,
            Some(Command::Show {
                what: ShowAction::Updates { max: 30 }
            })
        ));

        let cli = Cli::parse_from(["cheatdex", "show", "hist", "--max", "5"]);
        assert!(matches!(
            cli.command,
            Some(Command::Show {
                what: ShowAction::Hist { max: 5 }
            })
        ));
    }

    #[test]
    fn update_flags() {
        let cli = Cli::parse_from(["cheatdex", "update", "--force"]);
        match cli.command {
            Some(Command::Update(args)) => {
                assert!(args.force);
                assert!(!args.all);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn complete_defaults() {
        let cli = Cli::parse_from(["cheatdex", "complete", "git co"]);
        match cli.command {
            Some(Command::Complete(args)) => {
                assert_eq!(args.text, "git co");
                assert_eq!(args.iteration, 0);
                assert_eq!(args.matcher, MatcherKind::Prefix);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = Cli::try_parse_from(["cheatdex", "git", "--bogus"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn search_requires_words() {
        assert!(Cli::try_parse_from(["cheatdex", "search"]).is_err());
    }

    #[test]
    fn global_options_parse_anywhere() {
        let cli = Cli::parse_from([
            "cheatdex",
            "git",
            "push",
            "--upstream",
            "/srv/sheets",
            "-vv",
        ]);
        assert_eq!(cli.upstream.as_deref(), Some("/srv/sheets"));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.lookup.phrase(), "git push");
    }
}
