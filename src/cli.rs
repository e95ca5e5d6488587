//! Command-line parsing for `verse-reader`.

use anyhow::{Result, anyhow, bail};
use verse_core::audio_resume::VoiceType;
use verse_core::insight::AnalysisType;

pub const USAGE: &str = "\
Usage:
  verse-reader analyze \"<Book C:V>\" [--type <analysis-type>] [--text \"<verse text>\"] [--save]
  verse-reader insights [list | remove <id> | clear]
  verse-reader resume [show | set \"<Book C:V>\" [--voice system|natural] | clear]

Analysis types: context-meaning, cross-references, historical-context,
original-language, practical-application";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze {
        reference: String,
        analysis_type: AnalysisType,
        text: Option<String>,
        save: bool,
    },
    Insights(InsightsCommand),
    Resume(ResumeCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightsCommand {
    List,
    Remove { id: String },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCommand {
    Show,
    Set {
        reference: String,
        voice: Option<VoiceType>,
    },
    Clear,
}

pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let rest: Vec<String> = args.collect();
    match command.as_str() {
        "analyze" => parse_analyze(rest),
        "insights" => parse_insights(rest),
        "resume" => parse_resume(rest),
        "-h" | "--help" | "help" => bail!(USAGE),
        other => bail!("Unknown command {other:?}\n\n{USAGE}"),
    }
}

fn parse_analyze(args: Vec<String>) -> Result<Command> {
    let mut reference = None;
    let mut analysis_type = AnalysisType::ContextMeaning;
    let mut text = None;
    let mut save = false;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--type" | "-t" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--type needs a value\n\n{USAGE}"))?;
                analysis_type = value
                    .parse()
                    .map_err(|err| anyhow!("{err}: {value:?}\n\n{USAGE}"))?;
            }
            "--text" => {
                text = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("--text needs a value\n\n{USAGE}"))?,
                );
            }
            "--save" => save = true,
            flag if flag.starts_with("--") => bail!("Unknown option {flag:?}\n\n{USAGE}"),
            _ if reference.is_none() => reference = Some(arg),
            _ => bail!("Unexpected argument {arg:?}\n\n{USAGE}"),
        }
    }
    let reference = reference.ok_or_else(|| anyhow!("analyze needs a verse reference\n\n{USAGE}"))?;
    Ok(Command::Analyze {
        reference,
        analysis_type,
        text,
        save,
    })
}

fn parse_insights(args: Vec<String>) -> Result<Command> {
    let mut args = args.into_iter();
    let command = match args.next().as_deref() {
        None | Some("list") => InsightsCommand::List,
        Some("remove") => InsightsCommand::Remove {
            id: args
                .next()
                .ok_or_else(|| anyhow!("insights remove needs an id\n\n{USAGE}"))?,
        },
        Some("clear") => InsightsCommand::Clear,
        Some(other) => bail!("Unknown insights command {other:?}\n\n{USAGE}"),
    };
    if let Some(extra) = args.next() {
        bail!("Unexpected argument {extra:?}\n\n{USAGE}");
    }
    Ok(Command::Insights(command))
}

fn parse_resume(args: Vec<String>) -> Result<Command> {
    let mut args = args.into_iter();
    let command = match args.next().as_deref() {
        None | Some("show") => ResumeCommand::Show,
        Some("clear") => ResumeCommand::Clear,
        Some("set") => {
            let reference = args
                .next()
                .ok_or_else(|| anyhow!("resume set needs a verse reference\n\n{USAGE}"))?;
            let mut voice = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--voice" => {
                        let value = args
                            .next()
                            .ok_or_else(|| anyhow!("--voice needs a value\n\n{USAGE}"))?;
                        voice = Some(
                            value
                                .parse()
                                .map_err(|err| anyhow!("{err}: {value:?}\n\n{USAGE}"))?,
                        );
                    }
                    other => bail!("Unexpected argument {other:?}\n\n{USAGE}"),
                }
            }
            return Ok(Command::Resume(ResumeCommand::Set { reference, voice }));
        }
        Some(other) => bail!("Unknown resume command {other:?}\n\n{USAGE}"),
    };
    if let Some(extra) = args.next() {
        bail!("Unexpected argument {extra:?}\n\n{USAGE}");
    }
    Ok(Command::Resume(command))
}
