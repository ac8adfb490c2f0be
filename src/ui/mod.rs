//! UI module - renders query results for the terminal

mod widgets;

use crossterm::style::{Color, Stylize};
use std::fmt::Write;

use crate::config::{Config, Credentials, DisplayConfig, EndpointConfig};
use crate::llm::{EndpointResponse, JudgeOutput, QueryReport, ResponseOutcome};

pub use widgets::*;

/// Formats output as strings; colors only when writing to a terminal
pub struct Renderer {
    color: bool,
    preview_width: usize,
}

impl Renderer {
    pub fn new(display: &DisplayConfig, color: bool) -> Self {
        Self {
            color,
            preview_width: display.preview_width,
        }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn banner(&self) -> String {
        let banner = "\
╭─────────────────────────────────────────────────────────────╮
│                     multiquery                              │
│                                                             │
│        Ask several AI models at once and get the best       │
│              merged response automatically                  │
╰─────────────────────────────────────────────────────────────╯";
        self.paint(banner, Color::Blue)
    }

    pub fn individual_responses(&self, responses: &[EndpointResponse]) -> String {
        let mut out = format!("\n{}\n", self.paint("Individual Responses:", Color::Yellow));

        for response in responses {
            match &response.outcome {
                ResponseOutcome::Success(text) => {
                    let title = format!(
                        "{} ({:.1}s)",
                        response.endpoint,
                        response.latency.as_secs_f64()
                    );
                    let preview = truncate_to_width(text.trim(), self.preview_width);
                    out.push('\n');
                    out.push_str(&panel(&self.paint(&title, Color::Green), &preview));
                }
                ResponseOutcome::Failed { detail, .. } => {
                    let line = format!("x {}: {}", response.endpoint, detail);
                    let _ = writeln!(out, "\n{}", self.paint(&line, Color::Red));
                }
            }
        }

        out
    }

    /// The merged answer; evaluation and reasoning only when `verbose`
    pub fn final_response(&self, output: &JudgeOutput, verbose: bool) -> String {
        let mut out = String::new();

        match output {
            JudgeOutput::Merged(merged) => {
                if verbose {
                    let _ = writeln!(out, "\n{}", self.paint("Evaluation:", Color::Cyan));
                    let _ = writeln!(out, "{}", merged.evaluation);
                }
                let _ = writeln!(out, "\n{}", self.paint("Final Merged Response:", Color::Green));
                let _ = writeln!(out, "{}", merged.final_response);
                if verbose {
                    let _ = writeln!(out, "\n{}", self.paint("Reasoning:", Color::Cyan));
                    let _ = writeln!(out, "{}", merged.reasoning);
                }
            }
            JudgeOutput::Raw(raw) => {
                let _ = writeln!(out, "\n{}", self.paint("Final Merged Response:", Color::Green));
                let _ = writeln!(
                    out,
                    "{}",
                    self.paint(
                        "(judge output was not in the expected sections; shown unparsed)",
                        Color::DarkGrey
                    )
                );
                let _ = writeln!(out, "{}", raw);
            }
        }

        out
    }

    pub fn summary(&self, report: &QueryReport) -> String {
        let succeeded = report.successes().count();
        let used: Vec<&str> = report.responses.iter().map(|r| r.endpoint.as_str()).collect();

        let mut out = format!("\n{}\n", self.paint("Query Summary", Color::Yellow));
        let _ = writeln!(out, "  Query                 {}", truncate_to_width(&report.query, 100));
        let _ = writeln!(out, "  Endpoints Used        {}", used.join(", "));
        let _ = writeln!(out, "  Judge                 {}", report.judge);
        let _ = writeln!(
            out,
            "  Successful Responses  {}/{}",
            succeeded,
            report.responses.len()
        );
        out
    }

    /// Why the query failed, and which endpoints failed along the way
    pub fn failure(&self, report: &QueryReport) -> String {
        let mut out = String::new();

        if let Err(e) = &report.outcome {
            let _ = writeln!(out, "\n{}", self.paint(&format!("Error: {}", e), Color::Red));
        }
        for failed in report.failures() {
            let _ = writeln!(
                out,
                "  x {}: {}",
                failed.endpoint,
                failed.error().unwrap_or("unknown error")
            );
        }
        if report.successes().next().is_some() {
            let _ = writeln!(
                out,
                "{}",
                self.paint(
                    "No merged answer was produced; the individual responses above are unmerged.",
                    Color::Yellow
                )
            );
        }
        let _ = writeln!(out, "Use --setup to check configuration requirements");
        out
    }

    pub fn elapsed(&self, report: &QueryReport) -> String {
        self.paint(
            &format!("\nQuery completed in {:.2} seconds", report.elapsed.as_secs_f64()),
            Color::DarkGrey,
        )
    }

    /// Credential diagnostics; never prints key values
    pub fn setup(&self, config: &Config, credentials: &Credentials) -> String {
        let mut out = format!("{}\n\n", self.paint("multiquery setup", Color::Blue));

        let _ = writeln!(out, "Endpoints:");
        for endpoint in &config.endpoints {
            let _ = writeln!(out, "{}", self.credential_line(endpoint, credentials));
        }
        let _ = writeln!(out, "\nJudge:");
        let _ = writeln!(out, "{}", self.credential_line(&config.judge, credentials));

        let _ = writeln!(
            out,
            "\nCreate a .env file in the working directory (or export the variables):\n"
        );
        for var in config.credential_vars() {
            let _ = writeln!(out, "  {}=your_key_here", var);
        }
        let _ = writeln!(
            out,
            "\nAn endpoint is enabled when its variable is set and non-empty.\n\
             The judge key is required: without it no merged answer can be produced.\n\
             Endpoints and models can be changed in {}",
            Config::default_path().display()
        );
        out
    }

    fn credential_line(&self, endpoint: &EndpointConfig, credentials: &Credentials) -> String {
        let status = if credentials.is_set(&endpoint.api_key_env) {
            self.paint("set", Color::Green)
        } else {
            self.paint("missing", Color::Red)
        };
        format!(
            "  {:<20} {:<28} {:<20} {}",
            endpoint.name, endpoint.model, endpoint.api_key_env, status
        )
    }
}
