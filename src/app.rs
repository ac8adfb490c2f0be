//! Command-line front end: single queries and the interactive loop

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::config::{Config, Credentials};
use crate::llm::{QueryEngine, QueryReport};
use crate::ui::Renderer;

const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

/// Application state
pub struct App {
    engine: QueryEngine,
    renderer: Renderer,
}

impl App {
    pub fn new(config: &Config, credentials: &Credentials, color: bool) -> Self {
        let engine = QueryEngine::from_config(config, credentials);
        let renderer = Renderer::new(&config.display, color);

        Self { engine, renderer }
    }

    pub fn with_engine(engine: QueryEngine, renderer: Renderer) -> Self {
        Self { engine, renderer }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Run one query and print the result; true when a merged answer was produced
    pub async fn run_query(&self, prompt: &str, show_individual: bool) -> Result<bool> {
        let endpoints = self.engine.endpoint_names().len();
        if endpoints > 0 {
            println!("Querying {} endpoints...", endpoints);
        }
        let report = self.engine.process(prompt).await;

        print!("{}", self.render_report(&report, show_individual));
        std::io::stdout().flush()?;

        Ok(report.is_done())
    }

    /// Everything printed for a finished query
    pub fn render_report(&self, report: &QueryReport, show_individual: bool) -> String {
        let mut out = String::new();

        match &report.outcome {
            Ok(output) => {
                if show_individual {
                    out.push_str(&self.renderer.individual_responses(&report.responses));
                }
                out.push_str(&self.renderer.final_response(output, show_individual));
                out.push_str(&self.renderer.elapsed(report));
                out.push('\n');
                if show_individual {
                    out.push_str(&"=".repeat(60));
                    out.push_str(&self.renderer.summary(report));
                }
            }
            Err(_) => {
                // degraded mode: whatever did succeed is still worth showing
                if report.successes().next().is_some() {
                    out.push_str(&self.renderer.individual_responses(&report.responses));
                }
                out.push_str(&self.renderer.failure(report));
            }
        }

        out
    }

    /// Prompt for queries until the user quits or stdin closes
    pub async fn run_interactive(&self) -> Result<()> {
        self.run_interactive_with(BufReader::new(tokio::io::stdin())).await?;
        Ok(())
    }

    /// Interactive loop over any line source; returns how many queries ran
    pub async fn run_interactive_with<R: AsyncBufRead + Unpin>(&self, input: R) -> Result<usize> {
        println!("Interactive Mode - Type 'quit' to exit");
        let mut lines = input.lines();
        let mut queries = 0;

        loop {
            let Some(prompt) = ask(&mut lines, "\nEnter your query: ").await? else {
                break;
            };
            let prompt = prompt.trim();

            if QUIT_WORDS.contains(&prompt.to_lowercase().as_str()) {
                break;
            }
            if prompt.is_empty() {
                continue;
            }

            let show_individual = ask(&mut lines, "Show individual responses? (y/N): ")
                .await?
                .is_some_and(|answer| answer.trim().to_lowercase().starts_with('y'));

            println!("\n{}", "=".repeat(60));
            self.run_query(prompt, show_individual).await?;
            println!("{}", "=".repeat(60));
            queries += 1;
        }

        println!("Goodbye!");
        Ok(queries)
    }
}

async fn ask<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>, question: &str) -> Result<Option<String>> {
    print!("{}", question);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::error::Result as QueryResult;
    use crate::llm::LlmProvider;
    use std::time::Duration;

    struct Canned {
        name: &'static str,
        reply: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for Canned {
        async fn generate(&self, _prompt: &str) -> QueryResult<String> {
            self.reply.map(str::to_string).ok_or_else(|| crate::error::QueryError::EndpointRequest {
                endpoint: self.name.to_string(),
                reason: "HTTP 429: rate limited".to_string(),
            })
        }

        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    const MERGED: &str = "## Evaluation\nok\n## Final Response\nmerged alpha\n## Reasoning\nonly A";

    fn app(judge_reply: Option<&'static str>) -> App {
        let engine = QueryEngine::new(
            vec![
                Box::new(Canned { name: "A", reply: Some("alpha") }),
                Box::new(Canned { name: "B", reply: None }),
            ],
            Some(Box::new(Canned { name: "Judge", reply: judge_reply })),
        );
        App::with_engine(engine, Renderer::new(&DisplayConfig::default(), false))
    }

    #[tokio::test]
    async fn test_done_report_shows_answer_only_by_default() {
        let app = app(Some(MERGED));
        let report = app.engine.process("q").await;

        let out = app.render_report(&report, false);
        assert!(out.contains("Final Merged Response:\nmerged alpha"));
        assert!(!out.contains("Individual Responses"));
        assert!(!out.contains("Query Summary"));
    }

    #[tokio::test]
    async fn test_show_individual_adds_responses_and_summary() {
        let app = app(Some(MERGED));
        let report = app.engine.process("q").await;

        let out = app.render_report(&report, true);
        assert!(out.contains("Individual Responses"));
        assert!(out.contains("x B: Request to B failed: HTTP 429: rate limited"));
        assert!(out.contains("Successful Responses  1/2"));
    }

    #[tokio::test]
    async fn test_interactive_skips_blank_lines_and_stops_at_quit() {
        let app = app(Some(MERGED));
        let input: &[u8] = b"\n   \nwhat is rust?\nn\nQUIT\nnever asked\nn\n";

        let queries = app.run_interactive_with(input).await.unwrap();
        assert_eq!(queries, 1);
    }

    #[tokio::test]
    async fn test_interactive_exit_words_end_the_loop() {
        let app = app(Some(MERGED));

        for input in [&b"exit\nq1\nn\n"[..], &b"  q  \nq1\nn\n"[..], &b"Quit\n"[..]] {
            assert_eq!(app.run_interactive_with(input).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_interactive_ends_cleanly_at_eof() {
        let app = app(Some(MERGED));

        assert_eq!(app.run_interactive_with(&b""[..]).await.unwrap(), 0);
        // input closes while asking about individual responses
        assert_eq!(app.run_interactive_with(&b"one more\n"[..]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_query_reports_outcome() {
        assert!(app(Some(MERGED)).run_query("q", false).await.unwrap());
        assert!(!app(None).run_query("q", false).await.unwrap());

        let empty = App::with_engine(
            QueryEngine::new(Vec::new(), None),
            Renderer::new(&DisplayConfig::default(), false),
        );
        assert!(!empty.run_query("q", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_judge_failure_falls_back_to_raw_responses() {
        let app = app(None);
        let report = app.engine.process("q").await;
        assert!(!report.is_done());

        let out = app.render_report(&report, false);
        assert!(out.contains("alpha"));
        assert!(out.contains("Error: Judge Judge failed"));
        assert!(!out.contains("Final Merged Response"));
    }
}
