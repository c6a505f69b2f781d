//! Interactive chat loop.
//!
//! Lines starting with `/` are local commands; everything else is sent as a
//! chat turn in the configured session.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::session::{format_response, Session, SessionOptions};

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    History,
    Clear,
    Config,
    Quit,
    Help,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/history" => Input::History,
        "/clear" => Input::Clear,
        "/config" => Input::Config,
        cmd if cmd.starts_with('/') => Input::Help,
        text => Input::Message(text),
    }
}

const HELP: &str = "Commands: /history, /clear, /config, /quit";

pub async fn run(options: SessionOptions) -> Result<()> {
    let session = Session::start(options).await?;
    let session_id = session.options.session.clone();
    let config = session.orchestrator.current_config();

    println!(
        "Session '{}' using {} ({} retrieval). {}",
        session_id, config.selected_llm, config.selected_rag_variant, HELP
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::History => {
                for message in session.orchestrator.history(&session_id) {
                    println!(
                        "[{}] {}: {}",
                        message.timestamp.format("%H:%M:%S"),
                        message.role,
                        message.content
                    );
                }
            }
            Input::Clear => {
                session.orchestrator.clear_memory(&session_id);
                println!("Memory cleared");
            }
            Input::Config => {
                let config = session.orchestrator.current_config();
                println!("{}", serde_json::to_string_pretty(&config)?);
                println!("active retrieval: {}", session.orchestrator.active_variant());
            }
            Input::Message(text) => {
                let response = session.send(text).await;
                println!("{}\n", format_response(&response));
            }
        }
    }

    Ok(())
}
