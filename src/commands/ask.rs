//! Single-shot question.

use anyhow::Result;

use super::session::{format_response, Session, SessionOptions};

pub async fn run(options: SessionOptions, question: &str) -> Result<()> {
    let session = Session::start(options).await?;
    let response = session.send(question).await;
    println!("{}", format_response(&response));

    if response.is_rejected() {
        anyhow::bail!("request rejected");
    }
    Ok(())
}
