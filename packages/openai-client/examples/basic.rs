//! Summarize a short transcript with JSON mode enabled.

use openai_client::{ChatRequest, Message, OpenAIClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = OpenAIClient::from_env()?;

    let response = client
        .chat_completion(
            ChatRequest::new("gpt-4o-mini")
                .message(Message::system(
                    "Summarize the transcript. Reply with JSON: {\"summary\": string, \"key_points\": [string]}",
                ))
                .message(Message::user("Today we're making a three ingredient pasta..."))
                .temperature(0.3)
                .json_mode(),
        )
        .await?;

    println!("{}", response.content);
    if let Some(usage) = response.usage {
        println!("tokens: {}", usage.total_tokens);
    }

    Ok(())
}
