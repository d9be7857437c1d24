use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use markov_brain::{
    normalize, Brain, BrainConfig, Direction, FlushMode, MarkovError, UserMap,
};

const DEFAULT_GENERATE_COUNT: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "markov-brain", version, about = "A triumph of machine over man.")]
struct Cli {
    /// YAML config file; command line values override it.
    #[arg(short, long, env = "CB_CONFIG")]
    config: Option<PathBuf>,

    /// Brain file to start from (.yaml, .bin, .gz or raw text).
    #[arg(short, long, env = "CB_BRAIN")]
    brain: Option<PathBuf>,

    /// Brain file rewritten after every learned message.
    #[arg(short, long, env = "CB_OUTPUT")]
    output: Option<PathBuf>,

    /// Name the bot answers to.
    #[arg(short, long, env = "CB_NAME")]
    name: Option<String>,

    /// Word never learned (repeatable).
    #[arg(long = "ignore", value_name = "WORD")]
    ignore: Vec<String>,

    /// YAML `name: id` map applied to replies.
    #[arg(long, env = "CB_USER_MAP")]
    user_map: Option<PathBuf>,

    /// Write the brain file from a worker thread.
    #[arg(long)]
    background_flush: bool,

    /// Answer without learning.
    #[arg(long)]
    no_learn: bool,

    #[arg(long)]
    max_words: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read chat messages from stdin, answer the ones that mention the bot.
    #[command(alias = "talk")]
    Chat,
    /// Print unseeded sentences.
    #[command(alias = "g")]
    Generate {
        #[arg(default_value_t = DEFAULT_GENERATE_COUNT)]
        count: usize,
    },
    /// Print corpus and index sizes.
    Stats,
}

impl Cli {
    fn into_config(self) -> Result<(BrainConfig, Command)> {
        let mut config = match &self.config {
            Some(path) => BrainConfig::from_file(path)?,
            None => BrainConfig::default(),
        };
        if let Some(brain) = self.brain {
            config.brain = brain;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(user_map) = self.user_map {
            config.user_map = Some(user_map);
        }
        if let Some(max_words) = self.max_words {
            config.max_words = max_words;
        }
        if self.background_flush {
            config.flush = FlushMode::Background;
        }
        if self.no_learn {
            config.learn = false;
        }
        config.ignore_words.extend(self.ignore);
        // The bot's own name is never part of what it learns.
        if !config.name.is_empty() {
            config.ignore_words.push(config.name.clone());
        }
        Ok((config.validate()?, self.command))
    }
}

/// Exact-name trigger: some word of the message, stripped and uppercased,
/// equals the bot name.
fn mentions(message: &str, name: &str) -> bool {
    let Some(name) = normalize(name) else {
        return false;
    };
    message
        .split_whitespace()
        .filter_map(normalize)
        .any(|word| word == name)
}

/// Up to `count` sentences. A sentence the index cannot finish is skipped;
/// an empty brain ends the run.
fn generate_sentences(
    count: usize,
    mut next: impl FnMut() -> Result<String, MarkovError>,
) -> Result<Vec<String>> {
    let mut sentences = Vec::with_capacity(count);
    for _ in 0..count {
        match next() {
            Ok(sentence) => sentences.push(sentence),
            Err(MarkovError::EmptyModel) => anyhow::bail!(MarkovError::EmptyModel),
            Err(e) => warn!(error = %e, "sentence skipped"),
        }
    }
    Ok(sentences)
}

fn chat(brain: &Brain, config: &BrainConfig, user_map: Option<&UserMap>) -> Result<()> {
    if config.name.is_empty() {
        anyhow::bail!("chat needs a bot name (--name or CB_NAME)");
    }
    println!("[◐] Chat mode as {}. Type /exit to quit.", config.name);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed == "/exit" || trimmed == "/quit" {
            break;
        }

        if !trimmed.is_empty() && mentions(trimmed, &config.name) {
            match brain.respond(trimmed, config.learn) {
                Ok(reply) if !reply.trim().is_empty() => {
                    let reply = match user_map {
                        Some(map) => map.apply(&reply, Direction::ToPlatform),
                        None => reply,
                    };
                    println!("{}", reply);
                }
                Ok(_) => {}
                Err(MarkovError::EmptyModel) => warn!("brain is empty, nothing to say"),
                Err(e) => warn!(error = %e, "no reply"),
            }
        }

        print!("> ");
        stdout.flush()?;
    }
    println!();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let (config, command) = Cli::parse().into_config()?;
    let user_map = config
        .user_map
        .as_deref()
        .map(UserMap::load)
        .transpose()
        .context("loading user map")?;
    let brain = Brain::open(&config)
        .with_context(|| format!("opening brain {}", config.brain.display()))?;

    match command {
        Command::Chat => chat(&brain, &config, user_map.as_ref())?,
        Command::Generate { count } => {
            for sentence in generate_sentences(count, || brain.generate())? {
                println!("{}", sentence);
            }
        }
        Command::Stats => {
            let stats = brain.stats();
            println!("[✓] Brain: {}", config.brain.display());
            println!("    tokens:     {}", stats.tokens);
            println!("    sentences:  {}", stats.sentences);
            println!("    starts:     {}", stats.index.starts);
            println!("    contexts:   {}", stats.index.contexts);
            println!("    edges:      {}", stats.index.edges);
            println!("    ignored:    {}", brain.tokenizer().ignore_count());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_needs_the_exact_name() {
        assert!(mentions("hey @CodeBro, what's up", "codebro"));
        assert!(mentions("CODEBRO!", "CodeBro"));
        assert!(!mentions("codebros are fun", "codebro"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn generate_skips_unfinished_sentences() {
        let mut calls = 0;
        let sentences = generate_sentences(4, || {
            calls += 1;
            if calls == 2 {
                Err(MarkovError::CorruptIndex {
                    context: "(THE, CAT)".to_string(),
                })
            } else {
                Ok(format!("LINE {calls}"))
            }
        })
        .unwrap();
        assert_eq!(sentences, vec!["LINE 1", "LINE 3", "LINE 4"]);

        assert!(generate_sentences(3, || Err(MarkovError::EmptyModel)).is_err());
    }

    #[test]
    fn cli_overrides_and_name_is_ignored() {
        let cli = Cli::parse_from([
            "markov-brain",
            "--brain",
            "seed.txt",
            "--name",
            "codebro",
            "--ignore",
            "um",
            "--background-flush",
            "generate",
            "3",
        ]);
        let (config, command) = cli.into_config().unwrap();
        assert_eq!(config.flush, FlushMode::Background);
        assert_eq!(config.ignore_words, vec!["um", "codebro"]);
        assert_eq!(config.output, PathBuf::from("seed.learned.txt"));
        assert!(matches!(command, Command::Generate { count: 3 }));
    }
}
