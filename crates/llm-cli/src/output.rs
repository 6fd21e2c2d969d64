//! Rendering of canonical results

use llm_endpoints::{ChatResult, EmbeddingResult, ModelList, StreamKind, VendorExtensions};
use serde::Serialize;
use std::io::{self, Write};

/// Writes results to stdout, as text or JSON lines
pub struct Printer {
    json: bool,
    mid_line: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            mid_line: false,
        }
    }

    fn json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    /// Complete (non-streamed) chat result
    pub fn result(&self, result: &ChatResult) -> anyhow::Result<()> {
        if self.json {
            return Self::json_line(result);
        }

        if let Some(text) = result.text() {
            println!("{text}");
        }
        for call in result.all_tool_calls() {
            println!("-> {}({}) [{}]", call.function.name, call.function.arguments, call.id);
        }
        if let Some(usage) = &result.usage {
            eprintln!(
                "[tokens: {} in / {} out]",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(())
    }

    /// One streamed increment
    pub fn increment(&mut self, result: &ChatResult) -> anyhow::Result<()> {
        if self.json {
            return Self::json_line(result);
        }

        match result.stream_kind {
            StreamKind::None => {
                if let Some(VendorExtensions::Cohere(ext)) = &result.vendor_extensions {
                    self.break_line();
                    eprintln!(
                        "[cohere: {} queries, {} results, {} citations]",
                        ext.search_queries.len(),
                        ext.search_results.len(),
                        ext.citations.len()
                    );
                }
                let calls = result.all_tool_calls();
                for call in &calls {
                    self.break_line();
                    println!("-> {}({}) [{}]", call.function.name, call.function.arguments, call.id);
                }
                match result.text() {
                    Some(text) if calls.is_empty() => {
                        let mut out = io::stdout().lock();
                        write!(out, "{text}")?;
                        out.flush()?;
                        self.mid_line = true;
                    }
                    _ => {}
                }
            }
            // Deltas were already printed
            StreamKind::AppendAssistantMessage => {}
            StreamKind::FinishData => {
                self.break_line();
                let reason = result
                    .finish_reason()
                    .map_or_else(|| "unknown".to_string(), |r| format!("{r:?}"));
                match &result.usage {
                    Some(usage) => eprintln!(
                        "[finish: {reason}, tokens: {} in / {} out]",
                        usage.prompt_tokens, usage.completion_tokens
                    ),
                    None => eprintln!("[finish: {reason}]"),
                }
            }
        }
        Ok(())
    }

    pub fn models(&self, models: &ModelList) -> anyhow::Result<()> {
        if self.json {
            return Self::json_line(models);
        }
        for model in &models.models {
            match model.context_length {
                Some(ctx) => println!("{:<40} {:>8}  {}", model.name, ctx, model.endpoints.join(",")),
                None => println!("{:<40} {:>8}  {}", model.name, "-", model.endpoints.join(",")),
            }
        }
        Ok(())
    }

    pub fn embeddings(&self, result: &EmbeddingResult) -> anyhow::Result<()> {
        if self.json {
            return Self::json_line(result);
        }
        for (i, vector) in result.embeddings.iter().enumerate() {
            let head: Vec<String> = vector.iter().take(4).map(|v| format!("{v:.4}")).collect();
            println!("#{i} dim={} [{}, ...]", vector.len(), head.join(", "));
        }
        Ok(())
    }

    fn break_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}
